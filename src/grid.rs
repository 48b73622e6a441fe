//! The continuum opacity grid.
//!
//! A dense wavenumber x temperature array of f64, allocated once per run.
//! Weak lines deposit their integrated strength onto the two straddling
//! wavenumber samples; units are cm2 molecule-1 per cm-1 during the run
//! and are converted to cm-1 amagat-1 at write time.

use rayon::prelude::*;

use crate::constants::{C2, C3};
use crate::isotopes::IsotopeSet;
use crate::source::Transition;

/// Endpoint-inclusive evenly spaced samples (the last sample is exactly
/// `stop`).
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![start];
    }
    let step = (stop - start) / (n - 1) as f64;
    (0..n)
        .map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
        .collect()
}

#[derive(Debug)]
pub struct ContinuumGrid {
    wnmin: f64,
    wnmax: f64,
    dwn: f64,
    nwave: usize,
    temps: Vec<f64>,
    /// Temperature-major: `data[it * nwave + iw]`.
    data: Vec<f64>,
}

impl ContinuumGrid {
    pub fn new(wnmin: f64, wnmax: f64, dwn: f64, nwave: usize, temps: Vec<f64>) -> Self {
        let data = vec![0.0; nwave * temps.len()];
        Self {
            wnmin,
            wnmax,
            dwn,
            nwave,
            temps,
            data,
        }
    }

    pub fn nwave(&self) -> usize {
        self.nwave
    }

    pub fn temperatures(&self) -> &[f64] {
        &self.temps
    }

    /// The wavenumber sample positions of the output table.
    pub fn wnspec(&self) -> Vec<f64> {
        linspace(self.wnmin, self.wnmax, self.nwave)
    }

    /// One temperature's row.
    pub fn row(&self, it: usize) -> &[f64] {
        &self.data[it * self.nwave..(it + 1) * self.nwave]
    }

    /// Deposit the weak lines of one chunk for every temperature sample.
    ///
    /// Each temperature row is owned by exactly one rayon task and filled
    /// in chunk order, so per-cell summation order is fixed for a given
    /// input and runs reproduce bit-for-bit.
    pub fn accumulate(&mut self, weak: &[Transition], isotopes: &IsotopeSet) {
        let nwave = self.nwave;
        let wnmin = self.wnmin;
        let wnmax = self.wnmax;
        let dwn = self.dwn;
        let temps = &self.temps;

        self.data
            .par_chunks_mut(nwave)
            .zip(temps.par_iter())
            .for_each(|(row, &t)| {
                let z: Vec<f64> = isotopes.partition.iter().map(|p| p.eval(t)).collect();
                for tr in weak {
                    let iso = tr.iso as usize;
                    if z[iso] <= 0.0 || tr.wn < wnmin || tr.wn > wnmax {
                        continue;
                    }
                    // Integrated strength in cm molecule-1.
                    let s = C3 * tr.gf * isotopes.ratio[iso] / z[iso]
                        * (-C2 * tr.elow / t).exp()
                        * (1.0 - (-C2 * tr.wn / t).exp());

                    let k = (tr.wn - wnmin) / dwn;
                    let k0 = k.floor() as usize;
                    let frac = k - k0 as f64;
                    row[k0] += (1.0 - frac) * s / dwn;
                    if k0 + 1 < nwave {
                        row[k0 + 1] += frac * s / dwn;
                    }
                }
            });
    }

    /// Integral of one temperature's row over wavenumber.
    pub fn integrated(&self, it: usize) -> f64 {
        self.row(it).iter().sum::<f64>() * self.dwn
    }
}
