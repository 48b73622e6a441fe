//! Strong/weak line flagging.
//!
//! A transition is weak when a sufficiently stronger neighbor sits within
//! one Doppler half-width of it; weak lines are absorbed into the
//! continuum, strong lines are kept line-by-line. The rule is evaluated
//! independently at the lower and upper sampling temperature and a line
//! survives if it is strong at either.

use std::collections::BTreeMap;

use log::warn;

use crate::constants::{AMU, C2, KBOLTZ, LIGHT_SPEED};
use crate::isotopes::IsotopeSet;
use crate::source::Transition;

/// Flags for one classified chunk.
#[derive(Debug)]
pub struct ChunkFlags {
    /// Strong at either temperature; parallel to the chunk.
    pub strong: Vec<bool>,
    /// Anomalous at either reference temperature (non-positive partition
    /// function); parallel to the chunk. These must be withheld from the
    /// continuum.
    pub anomalous: Vec<bool>,
    pub strong_low: usize,
    pub strong_high: usize,
}

impl ChunkFlags {
    pub fn strong_total(&self) -> usize {
        self.strong.iter().filter(|&&s| s).count()
    }

    /// Unique transitions anomalous at either reference temperature.
    pub fn anomaly_total(&self) -> usize {
        self.anomalous.iter().filter(|&&a| a).count()
    }
}

/// Two-temperature dominance classifier over merged chunks.
#[derive(Debug)]
pub struct Classifier {
    tmin: f64,
    tmax: f64,
    sthresh: f64,
}

impl Classifier {
    pub fn new(tmin: f64, tmax: f64, sthresh: f64) -> Self {
        Self {
            tmin,
            tmax,
            sthresh,
        }
    }

    /// Classify a wavenumber-sorted chunk.
    pub fn classify(&self, chunk: &[Transition], isotopes: &IsotopeSet) -> ChunkFlags {
        let mut anomalous = vec![false; chunk.len()];
        let low = self.flag_pass(chunk, isotopes, self.tmin, 1.0, &mut anomalous);
        // The upper-temperature pass normalizes the dominance metric by
        // sqrt(pi), matching the reference ranking.
        let high = self.flag_pass(
            chunk,
            isotopes,
            self.tmax,
            std::f64::consts::PI.sqrt(),
            &mut anomalous,
        );

        let strong: Vec<bool> = low.iter().zip(&high).map(|(&a, &b)| a | b).collect();
        ChunkFlags {
            strong_low: low.iter().filter(|&&s| s).count(),
            strong_high: high.iter().filter(|&&s| s).count(),
            strong,
            anomalous,
        }
    }

    /// One dominance pass at temperature `t`. Transitions whose isotope
    /// has a non-positive partition function are left out of the pass
    /// and marked in `anomalous`.
    fn flag_pass(
        &self,
        chunk: &[Transition],
        isotopes: &IsotopeSet,
        t: f64,
        dnorm: f64,
        anomalous: &mut [bool],
    ) -> Vec<bool> {
        let z: Vec<f64> = isotopes.partition.iter().map(|p| p.eval(t)).collect();
        for (j, &value) in z.iter().enumerate() {
            if value <= 0.0 {
                warn!(
                    "partition function of isotope {} is {} at {} K; skipping its lines at this temperature",
                    isotopes.labels[j], value, t
                );
            }
        }

        let n = chunk.len();
        let mut dominance = vec![0.0_f64; n];
        let mut alpha = vec![0.0_f64; n];
        let mut valid = vec![true; n];
        for (j, tr) in chunk.iter().enumerate() {
            let iso = tr.iso as usize;
            if z[iso] <= 0.0 {
                valid[j] = false;
                anomalous[j] = true;
                continue;
            }
            let s = tr.gf * isotopes.ratio[iso] / z[iso]
                * (-C2 * tr.elow / t).exp()
                * (1.0 - (-C2 * tr.wn / t).exp());
            let a = tr.wn / (100.0 * LIGHT_SPEED)
                * (2.0 * KBOLTZ * t / (isotopes.mass[iso] * AMU)).sqrt();
            alpha[j] = a;
            dominance[j] = s / a / dnorm;
        }

        let mut order: Vec<usize> = (0..n).filter(|&j| valid[j]).collect();
        order.sort_by(|&a, &b| dominance[b].total_cmp(&dominance[a]));

        // Walk in descending dominance; the processed set is indexed by
        // wavenumber so each neighborhood probe is a range scan. Keys use
        // the f64 bit pattern, order-preserving for the positive
        // wavenumbers the sources guarantee.
        let mut strong = vec![false; n];
        let mut seen: BTreeMap<(u64, usize), (f64, f64)> = BTreeMap::new();
        let mut alpha_seen: f64 = 0.0;

        for &j in &order {
            let wn = chunk[j].wn;
            let width = alpha_seen.max(alpha[j]);
            let lo = ((wn - width).max(0.0).to_bits(), 0);
            let hi = ((wn + width).to_bits(), usize::MAX);

            let mut weak = false;
            for (&(_, i), &(alpha_i, dom_i)) in seen.range(lo..=hi) {
                if (chunk[i].wn - wn).abs() <= alpha_i.max(alpha[j])
                    && dom_i >= dominance[j] / self.sthresh
                {
                    weak = true;
                    break;
                }
            }
            strong[j] = !weak;
            seen.insert((wn.to_bits(), j), (alpha[j], dominance[j]));
            alpha_seen = alpha_seen.max(alpha[j]);
        }
        strong
    }
}
