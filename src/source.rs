//! Random-access readers for fixed-width line-transition files.
//!
//! Catalog files are memory-mapped; every row has the same byte length
//! (including its terminator), so row `i` lives at offset `i * row_len`
//! and a single transition's wavenumber can be decoded without touching
//! the rest of the record.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::warn;
use memchr::memchr;
use memmap2::Mmap;

use crate::constants::{C1, LIGHT_SPEED};
use crate::error::{RepackError, Result};

/// ExoMol fixed columns: upper state id, lower state id, Einstein A.
const EXOMOL_IUP: std::ops::Range<usize> = 0..12;
const EXOMOL_ILO: std::ops::Range<usize> = 13..25;
const EXOMOL_A21: std::ops::Range<usize> = 26..36;
const EXOMOL_MIN_ROW: usize = 36;

/// HITRAN fixed columns; the statistical weight runs to the row end.
const HITRAN_ISO: std::ops::Range<usize> = 2..3;
const HITRAN_WN: std::ops::Range<usize> = 3..15;
const HITRAN_A21: std::ops::Range<usize> = 25..35;
const HITRAN_ELOW: std::ops::Range<usize> = 45..55;
const HITRAN_G_START: usize = 155;
const HITRAN_MIN_ROW: usize = 156;

/// gf = g * A * C1 / (8 pi * 100 * c * nu^2); this is the nu-independent part.
const GF_NORM: f64 = C1 / (8.0 * std::f64::consts::PI * 100.0 * LIGHT_SPEED);

/// Cap on per-row warnings; anomalies beyond this are only counted.
const ROW_WARN_LIMIT: usize = 5;

/// One line transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// Wavenumber (cm-1).
    pub wn: f64,
    /// Lower-state energy (cm-1).
    pub elow: f64,
    /// Weighted oscillator strength.
    pub gf: f64,
    /// Index into the run's isotope set.
    pub iso: u8,
}

/// ExoMol states table, addressed by 1-based state id as stored on disk.
#[derive(Debug, Clone, Default)]
pub struct States {
    pub energy: Vec<f64>,
    pub degen: Vec<f64>,
}

/// Read an ExoMol states file: whitespace-separated rows with the state
/// energy in field 1 and the total degeneracy in field 2.
pub fn read_states<P: AsRef<Path>>(path: P) -> Result<States> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path).map_err(|e| RepackError::Input {
        path: path.to_path_buf(),
        message: format!("cannot read states file: {}", e),
    })?;

    let mut states = States::default();
    for (row, line) in data.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (energy, degen) = match (fields.next(), fields.next(), fields.next()) {
            (Some(_id), Some(energy), Some(degen)) => (energy, degen),
            _ => {
                return Err(RepackError::Parse {
                    path: path.to_path_buf(),
                    row,
                    message: "expected at least 3 columns (id, energy, degeneracy)".into(),
                })
            }
        };
        states.energy.push(parse_field(energy, path, row)?);
        states.degen.push(parse_field(degen, path, row)?);
    }
    Ok(states)
}

fn parse_field(field: &str, path: &Path, row: usize) -> Result<f64> {
    field.parse().map_err(|_| RepackError::Parse {
        path: path.to_path_buf(),
        row,
        message: format!("invalid number '{}'", field),
    })
}

/// Format-specific decoding context.
#[derive(Debug, Clone)]
pub enum Layout {
    Exomol {
        states: Arc<States>,
        /// Isotope index this file contributes to.
        iso: u8,
    },
    Hitran,
}

enum Decoded {
    Line(Transition),
    /// Row dropped: the decoded, non-positive wavenumber.
    NonPositive(f64),
}

/// A memory-mapped catalog file with O(1) access to the i-th transition.
///
/// Not shareable across concurrent readers; sources live for their
/// wavenumber-range group and release the mapping on drop.
#[derive(Debug)]
pub struct TransitionSource {
    path: PathBuf,
    map: Mmap,
    row_len: usize,
    n_lines: usize,
    layout: Layout,
    skipped: usize,
}

impl TransitionSource {
    /// Open a catalog file and measure the fixed row width from the first
    /// line terminator. The file size must be an exact multiple of it.
    pub fn open<P: AsRef<Path>>(path: P, layout: Layout) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| RepackError::Input {
            path: path.clone(),
            message: format!("cannot open transition file: {}", e),
        })?;
        let map = unsafe { Mmap::map(&file)? };

        if map.is_empty() {
            return Err(RepackError::Input {
                path,
                message: "transition file is empty".into(),
            });
        }
        let row_len = match memchr(b'\n', &map) {
            Some(pos) => pos + 1,
            None => map.len(),
        };
        if map.len() % row_len != 0 {
            return Err(RepackError::Parse {
                path,
                row: 0,
                message: format!(
                    "file size {} is not a multiple of the row length {}",
                    map.len(),
                    row_len
                ),
            });
        }
        let min_row = match layout {
            Layout::Exomol { .. } => EXOMOL_MIN_ROW,
            Layout::Hitran => HITRAN_MIN_ROW,
        };
        if row_len < min_row {
            return Err(RepackError::Parse {
                path,
                row: 0,
                message: format!(
                    "row length {} is below the {}-byte minimum for this format",
                    row_len, min_row
                ),
            });
        }

        let n_lines = map.len() / row_len;
        Ok(Self {
            path,
            map,
            row_len,
            n_lines,
            layout,
            skipped: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn n_lines(&self) -> usize {
        self.n_lines
    }

    /// Rows dropped so far for non-positive wavenumbers.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn row(&self, i: usize) -> &[u8] {
        &self.map[i * self.row_len..(i + 1) * self.row_len]
    }

    fn parse_f64(&self, field: &[u8], row: usize) -> Result<f64> {
        let s = std::str::from_utf8(field).map_err(|_| self.bad_field(row, field))?;
        s.trim().parse().map_err(|_| self.bad_field(row, field))
    }

    fn parse_id(&self, field: &[u8], row: usize) -> Result<usize> {
        let s = std::str::from_utf8(field).map_err(|_| self.bad_field(row, field))?;
        s.trim().parse().map_err(|_| self.bad_field(row, field))
    }

    fn bad_field(&self, row: usize, field: &[u8]) -> RepackError {
        RepackError::Parse {
            path: self.path.clone(),
            row,
            message: format!("invalid field '{}'", String::from_utf8_lossy(field)),
        }
    }

    /// Look up a 1-based state id.
    fn state(&self, states: &States, id: usize, row: usize) -> Result<usize> {
        if id == 0 || id > states.energy.len() {
            return Err(RepackError::Parse {
                path: self.path.clone(),
                row,
                message: format!(
                    "state id {} out of range (states table has {} entries)",
                    id,
                    states.energy.len()
                ),
            });
        }
        Ok(id - 1)
    }

    /// Decode only the wavenumber of row `i`.
    pub fn wavenumber(&self, i: usize) -> Result<f64> {
        let row = self.row(i);
        match &self.layout {
            Layout::Exomol { states, .. } => {
                let iup = self.state(states, self.parse_id(&row[EXOMOL_IUP], i)?, i)?;
                let ilo = self.state(states, self.parse_id(&row[EXOMOL_ILO], i)?, i)?;
                Ok(states.energy[iup] - states.energy[ilo])
            }
            Layout::Hitran => self.parse_f64(&row[HITRAN_WN], i),
        }
    }

    /// Decode rows `[lo, hi)` and append them to `out`. Rows with a
    /// non-positive wavenumber are counted and dropped.
    pub fn read_range(&mut self, lo: usize, hi: usize, out: &mut Vec<Transition>) -> Result<()> {
        assert!(lo <= hi && hi <= self.n_lines);
        for i in lo..hi {
            match self.decode(i)? {
                Decoded::Line(transition) => out.push(transition),
                Decoded::NonPositive(wn) => self.skip_row(i, wn),
            }
        }
        Ok(())
    }

    fn decode(&self, i: usize) -> Result<Decoded> {
        let row = self.row(i);
        match &self.layout {
            Layout::Exomol { states, iso } => {
                let iup = self.state(states, self.parse_id(&row[EXOMOL_IUP], i)?, i)?;
                let ilo = self.state(states, self.parse_id(&row[EXOMOL_ILO], i)?, i)?;
                let a21 = self.parse_f64(&row[EXOMOL_A21], i)?;

                let wn = states.energy[iup] - states.energy[ilo];
                if wn <= 0.0 {
                    return Ok(Decoded::NonPositive(wn));
                }
                Ok(Decoded::Line(Transition {
                    wn,
                    elow: states.energy[ilo],
                    gf: states.degen[ilo] * a21 * GF_NORM / (wn * wn),
                    iso: *iso,
                }))
            }
            Layout::Hitran => {
                let raw_iso = self.parse_id(&row[HITRAN_ISO], i)? as i64;
                let wn = self.parse_f64(&row[HITRAN_WN], i)?;
                let a21 = self.parse_f64(&row[HITRAN_A21], i)?;
                let elow = self.parse_f64(&row[HITRAN_ELOW], i)?;
                let g = self.parse_f64(&row[HITRAN_G_START..self.row_len], i)?;

                if wn <= 0.0 {
                    return Ok(Decoded::NonPositive(wn));
                }
                Ok(Decoded::Line(Transition {
                    wn,
                    elow,
                    gf: g * a21 * GF_NORM / (wn * wn),
                    iso: (raw_iso - 1).rem_euclid(10) as u8,
                }))
            }
        }
    }

    fn skip_row(&mut self, i: usize, wn: f64) {
        self.skipped += 1;
        if self.skipped <= ROW_WARN_LIMIT {
            warn!(
                "skipping row {} of '{}': non-positive wavenumber {}",
                i,
                self.path.display(),
                wn
            );
        }
    }

    /// Read-through binary search for the row whose wavenumber is closest
    /// to `target`, saturating at the file endpoints. Prefers the higher
    /// index when it is strictly closer.
    pub fn search(&self, target: f64, mut lo: usize, mut hi: usize) -> Result<usize> {
        if target <= self.wavenumber(0)? {
            return Ok(0);
        }
        let last = self.n_lines - 1;
        if target >= self.wavenumber(last)? {
            return Ok(last);
        }

        while hi - lo > 1 {
            let mid = (hi + lo) / 2;
            if self.wavenumber(mid)? > target {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        if (target - self.wavenumber(hi)?).abs() < (target - self.wavenumber(lo)?).abs() {
            Ok(hi)
        } else {
            Ok(lo)
        }
    }
}
