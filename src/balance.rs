//! Chunk planning: split a wavenumber window into bands holding roughly
//! equal transition counts summed across all sources of a group.

use log::debug;

use crate::error::Result;
use crate::source::TransitionSource;

/// Accepted fractional deviation from the per-chunk target count.
const BALANCE_TOLERANCE: f64 = 0.01;

/// Per-source row-index boundaries of every chunk.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    /// `boundaries[k][n]` is the first row of chunk `n` in source `k`;
    /// `boundaries[k][nchunks]` is one past the last in-window row.
    boundaries: Vec<Vec<usize>>,
    nchunks: usize,
    total: usize,
}

impl ChunkPlan {
    /// Build a plan over `[wnmin, wnmax]` targeting `chunksize`
    /// transitions per chunk.
    pub fn build(
        sources: &[TransitionSource],
        wnmin: f64,
        wnmax: f64,
        chunksize: usize,
    ) -> Result<Self> {
        let mut istart = Vec::with_capacity(sources.len());
        let mut iend = Vec::with_capacity(sources.len());

        for source in sources {
            let (start, end) = window_range(source, wnmin, wnmax)?;
            istart.push(start);
            iend.push(end);
        }

        let total: usize = istart.iter().zip(&iend).map(|(&a, &b)| b - a).sum();
        let nchunks = total / chunksize + 1;
        let target = total as f64 / nchunks as f64;

        let mut boundaries: Vec<Vec<usize>> = istart
            .iter()
            .zip(&iend)
            .map(|(&a, &b)| {
                let mut row = vec![a; nchunks + 1];
                row[nchunks] = b;
                row
            })
            .collect();

        if sources.len() == 1 {
            // Equal-index split; no balancing needed.
            let a = boundaries[0][0];
            let b = boundaries[0][nchunks];
            let step = (b - a) as f64 / nchunks as f64;
            for n in 1..nchunks {
                boundaries[0][n] = (a as f64 + step * n as f64) as usize;
            }
        } else {
            let mut wn_bound = wnmin;
            for n in 1..nchunks {
                let zero: usize = boundaries.iter().map(|row| row[n - 1]).sum();
                wn_bound = balance_boundary(sources, wn_bound, wnmax, target, zero, total)?;
                for (k, source) in sources.iter().enumerate() {
                    let lo = boundaries[k][n - 1];
                    let hi = boundaries[k][nchunks];
                    if lo >= hi {
                        boundaries[k][n] = lo;
                        continue;
                    }
                    let found = source.search(wn_bound, lo, hi - 1)?;
                    boundaries[k][n] = found.clamp(lo, hi);
                }
                debug!("chunk boundary {} at {:.3} cm-1", n, wn_bound);
            }
        }

        Ok(Self {
            boundaries,
            nchunks,
            total,
        })
    }

    pub fn nchunks(&self) -> usize {
        self.nchunks
    }

    /// In-window transitions summed over all sources.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Row range `[lo, hi)` of chunk `n` in source `k`.
    pub fn range(&self, k: usize, n: usize) -> (usize, usize) {
        (self.boundaries[k][n], self.boundaries[k][n + 1])
    }

    /// Transitions of chunk `n` summed over all sources.
    pub fn chunk_len(&self, n: usize) -> usize {
        self.boundaries.iter().map(|row| row[n + 1] - row[n]).sum()
    }
}

/// The in-window row range `[start, end)` of one source: closest-index
/// search, the reference linear widening at both edges, then clipping so
/// that `start` is the first row with wn >= wnmin and `end` is one past
/// the last row with wn <= wnmax.
fn window_range(source: &TransitionSource, wnmin: f64, wnmax: f64) -> Result<(usize, usize)> {
    let last = source.n_lines() - 1;

    let mut i0 = source.search(wnmin, 0, last)?;
    while i0 > 0 && source.wavenumber(i0 - 1)? >= wnmin {
        i0 -= 1;
    }
    let mut i_n = source.search(wnmax, i0, last)?;
    // Comparison against wnmin kept verbatim from the reference edge
    // policy.
    while i_n < last && source.wavenumber(i_n + 1)? <= wnmin {
        i_n += 1;
    }

    let mut start = i0;
    while start <= i_n && source.wavenumber(start)? < wnmin {
        start += 1;
    }
    let mut end = i_n + 1;
    while end > start && source.wavenumber(end - 1)? > wnmax {
        end -= 1;
    }
    Ok((start, end))
}

/// Transitions with wavenumber below `target` summed over all sources.
pub fn count(sources: &[TransitionSource], target: f64) -> Result<usize> {
    let mut n = 0;
    for source in sources {
        n += source.search(target, 0, source.n_lines() - 1)?;
    }
    Ok(n)
}

/// Bisect for the wavenumber with `target` transitions (beyond `zero`)
/// to its left. The count is monotone in wavenumber, so halving always
/// converges; with heavy ties the loop stops after ceil(log2(total))
/// halvings and keeps the best boundary seen.
fn balance_boundary(
    sources: &[TransitionSource],
    mut lo: f64,
    mut hi: f64,
    target: f64,
    zero: usize,
    total: usize,
) -> Result<f64> {
    let max_iter = usize::BITS - total.max(2).leading_zeros();
    let mut best = 0.5 * (lo + hi);
    let mut best_err = f64::INFINITY;

    for _ in 0..=max_iter {
        let mid = 0.5 * (lo + hi);
        let n = count(sources, mid)? as f64 - zero as f64;
        let err = (n - target).abs();
        if err < best_err {
            best_err = err;
            best = mid;
        }
        if err < BALANCE_TOLERANCE * target {
            return Ok(mid);
        }
        if n < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{testutil, Layout, States, TransitionSource};
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    /// Source with one transition per requested wavenumber, built on a
    /// states ladder with 1 cm-1 spacing.
    fn source_with_wavenumbers(wavenumbers: &[usize]) -> (NamedTempFile, TransitionSource) {
        let max = *wavenumbers.iter().max().unwrap();
        let states = Arc::new(States {
            energy: (0..=max).map(|i| i as f64).collect(),
            degen: vec![1.0; max + 1],
        });
        let mut file = NamedTempFile::new().unwrap();
        for &wn in wavenumbers {
            testutil::exomol_row(&mut file, wn + 1, 1, 1.0);
        }
        file.flush().unwrap();
        let source =
            TransitionSource::open(file.path(), Layout::Exomol { states, iso: 0 }).unwrap();
        (file, source)
    }

    #[test]
    fn window_covers_every_in_range_row() {
        let wavenumbers: Vec<usize> = (100..=1000).step_by(100).collect();
        let (_file, source) = source_with_wavenumbers(&wavenumbers);
        let sources = vec![source];

        let plan = ChunkPlan::build(&sources, 50.0, 1050.0, 100).unwrap();
        assert_eq!(plan.nchunks(), 1);
        assert_eq!(plan.range(0, 0), (0, 10));
        assert_eq!(plan.total(), 10);
    }

    #[test]
    fn window_clips_out_of_range_rows() {
        let wavenumbers: Vec<usize> = (100..=2000).step_by(100).collect();
        let (_file, source) = source_with_wavenumbers(&wavenumbers);

        let (start, end) = window_range(&source, 500.0, 1500.0).unwrap();
        assert_eq!(source.wavenumber(start).unwrap(), 500.0);
        assert_eq!(source.wavenumber(end - 1).unwrap(), 1500.0);
        assert_eq!(end - start, 11);
    }

    #[test]
    fn single_source_splits_by_index() {
        let wavenumbers: Vec<usize> = (1..=100).collect();
        let (_file, source) = source_with_wavenumbers(&wavenumbers);
        let sources = vec![source];

        let plan = ChunkPlan::build(&sources, 0.0, 200.0, 25).unwrap();
        assert_eq!(plan.nchunks(), 5);

        let mut covered = 0;
        for n in 0..plan.nchunks() {
            let (lo, hi) = plan.range(0, n);
            assert_eq!(lo, covered);
            covered = hi;
            assert_eq!(hi - lo, 20);
        }
        assert_eq!(covered, 100);
    }

    #[test]
    fn two_sources_balance_counts() {
        // A dense low band and a sparse high band.
        let low: Vec<usize> = (100..=500).collect();
        let high: Vec<usize> = (500..=1000).step_by(5).collect();
        let (_f1, s1) = source_with_wavenumbers(&low);
        let (_f2, s2) = source_with_wavenumbers(&high);
        let sources = vec![s1, s2];

        let total_hint = low.len() + high.len();
        let plan = ChunkPlan::build(&sources, 100.0, 1000.0, total_hint / 4).unwrap();
        assert!(plan.nchunks() >= 4);

        let target = plan.total() as f64 / plan.nchunks() as f64;
        for n in 0..plan.nchunks() {
            let len = plan.chunk_len(n) as f64;
            assert!(
                (len - target).abs() <= 0.05 * plan.total() as f64 + 2.0,
                "chunk {} holds {} lines, target {}",
                n,
                len,
                target
            );
        }

        // Chunks are non-overlapping and union-cover per source.
        for k in 0..sources.len() {
            for n in 1..plan.nchunks() {
                let (_, prev_hi) = plan.range(k, n - 1);
                let (lo, hi) = plan.range(k, n);
                assert_eq!(prev_hi, lo);
                assert!(lo <= hi);
            }
        }
    }

    #[test]
    fn count_sums_over_sources() {
        let (_f1, s1) = source_with_wavenumbers(&[10, 20, 30, 40]);
        let (_f2, s2) = source_with_wavenumbers(&[15, 25, 35]);
        let sources = vec![s1, s2];

        // search() returns closest-index counts: two below 26 in the
        // first source, one in the second.
        let n = count(&sources, 26.0).unwrap();
        assert_eq!(n, 3);
    }

    #[test]
    fn empty_window_yields_single_chunk() {
        let (_f1, source) = source_with_wavenumbers(&[100, 200, 300]);
        let sources = vec![source];

        let plan = ChunkPlan::build(&sources, 1000.0, 2000.0, 10).unwrap();
        assert_eq!(plan.nchunks(), 1);
        let (lo, hi) = plan.range(0, 0);
        assert_eq!(lo, hi);
    }
}
