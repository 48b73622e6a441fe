//! Isotope descriptor table and the per-run isotope set.
//!
//! The table is a whitespace-separated text file with `#` comments:
//! `molecule  exomol_name  hitran_id  abundance  mass_amu`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::config::DbType;
use crate::error::{RepackError, Result};
use crate::partition::PartitionFunction;

/// The ordered isotope sequence of one run. Transitions carry an index
/// into these parallel arrays.
#[derive(Debug)]
pub struct IsotopeSet {
    /// Database labels, e.g. "116" or "161".
    pub labels: Vec<String>,
    /// Labels as integers, emitted into the binary LBL records.
    pub numeric: Vec<i32>,
    /// Fractional natural abundance per isotope.
    pub ratio: Vec<f64>,
    /// Mass in amu per isotope.
    pub mass: Vec<f64>,
    /// Partition function per isotope.
    pub partition: Vec<PartitionFunction>,
}

impl IsotopeSet {
    pub fn new(
        labels: Vec<String>,
        ratio: Vec<f64>,
        mass: Vec<f64>,
        partition: Vec<PartitionFunction>,
    ) -> Result<Self> {
        let numeric = labels
            .iter()
            .map(|label| {
                label.parse::<i32>().map_err(|_| {
                    RepackError::InvalidFormat(format!(
                        "isotope label '{}' is not numeric",
                        label
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        debug_assert_eq!(labels.len(), ratio.len());
        debug_assert_eq!(labels.len(), mass.len());
        debug_assert_eq!(labels.len(), partition.len());
        Ok(Self {
            labels,
            numeric,
            ratio,
            mass,
            partition,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Look up abundance ratio and mass for each label of `molecule`.
/// ExoMol labels match column 2, HITRAN ids column 3.
pub fn read_iso(
    path: &Path,
    molecule: &str,
    labels: &[String],
    dbtype: DbType,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let column = match dbtype {
        DbType::Exomol => 1,
        DbType::Hitran => 2,
    };

    let reader = BufReader::new(File::open(path).map_err(|e| RepackError::Input {
        path: path.to_path_buf(),
        message: format!("cannot open isotope table: {}", e),
    })?);

    let mut ratio = vec![0.0; labels.len()];
    let mut mass = vec![0.0; labels.len()];
    let mut found = vec![false; labels.len()];

    for (row, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            return Err(RepackError::Parse {
                path: path.to_path_buf(),
                row,
                message: format!("expected 5 columns, got {}", fields.len()),
            });
        }
        if fields[0] != molecule {
            continue;
        }
        if let Some(j) = labels.iter().position(|label| label == fields[column]) {
            ratio[j] = parse_float(fields[3], path, row)?;
            mass[j] = parse_float(fields[4], path, row)?;
            found[j] = true;
        }
    }

    if let Some(j) = found.iter().position(|&f| !f) {
        return Err(RepackError::InvalidFormat(format!(
            "isotope '{}' of {} not found in isotope table '{}'",
            labels[j],
            molecule,
            path.display()
        )));
    }
    Ok((ratio, mass))
}

fn parse_float(field: &str, path: &Path, row: usize) -> Result<f64> {
    field.parse().map_err(|_| RepackError::Parse {
        path: path.to_path_buf(),
        row,
        message: format!("invalid number '{}'", field),
    })
}
