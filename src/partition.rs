//! Tabulated partition functions evaluated by linear interpolation.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{RepackError, Result};

/// A `(T, Z)` table. Immutable after construction and freely shareable;
/// evaluation clamps at the tabulated ends.
#[derive(Debug, Clone)]
pub struct PartitionFunction {
    temp: Vec<f64>,
    z: Vec<f64>,
}

impl PartitionFunction {
    pub fn new(temp: Vec<f64>, z: Vec<f64>) -> Result<Self> {
        if temp.len() < 2 || temp.len() != z.len() {
            return Err(RepackError::InvalidFormat(format!(
                "partition table needs at least two (T, Z) samples, got {}",
                temp.len()
            )));
        }
        if temp.windows(2).any(|w| w[1] <= w[0]) {
            return Err(RepackError::InvalidFormat(
                "partition table temperatures must be strictly ascending".into(),
            ));
        }
        Ok(Self { temp, z })
    }

    /// Read a two-column ExoMol `.pf` file.
    pub fn from_exomol_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path).map_err(|e| RepackError::Input {
            path: path.to_path_buf(),
            message: format!("cannot open partition-function file: {}", e),
        })?);

        let mut temp = Vec::new();
        let mut z = Vec::new();
        for (row, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (t, value) = match (fields.next(), fields.next()) {
                (Some(t), Some(value)) => (t, value),
                _ => {
                    return Err(RepackError::Parse {
                        path: path.to_path_buf(),
                        row,
                        message: "expected two columns (T, Z)".into(),
                    })
                }
            };
            temp.push(parse_float(t, path, row)?);
            z.push(parse_float(value, path, row)?);
        }
        Self::new(temp, z)
    }

    /// Evaluate at `t` with clamped ends.
    pub fn eval(&self, t: f64) -> f64 {
        let temp = &self.temp;
        let last = temp.len() - 1;
        if t <= temp[0] {
            return self.z[0];
        }
        if t >= temp[last] {
            return self.z[last];
        }
        let hi = temp.partition_point(|&x| x < t);
        let lo = hi - 1;
        let frac = (t - temp[lo]) / (temp[hi] - temp[lo]);
        self.z[lo] + frac * (self.z[hi] - self.z[lo])
    }

    /// Reject a sampling window that leaves the tabulated range;
    /// evaluating there would silently extrapolate.
    pub fn check_range(&self, tmin: f64, tmax: f64) -> Result<()> {
        let last = self.temp.len() - 1;
        if tmin < self.temp[0] || tmax > self.temp[last] {
            return Err(RepackError::InvalidFormat(format!(
                "temperature window [{}, {}] K outside tabulated partition function [{}, {}] K",
                tmin, tmax, self.temp[0], self.temp[last]
            )));
        }
        Ok(())
    }
}

/// Read a multi-isotope partition file: `@ISOTOPES` names the columns,
/// `@DATA` starts the `(T, Z...)` table.
pub fn read_pyrat_file<P: AsRef<Path>>(
    path: P,
) -> Result<(Vec<String>, Vec<PartitionFunction>)> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path).map_err(|e| RepackError::Input {
        path: path.to_path_buf(),
        message: format!("cannot open partition-function file: {}", e),
    })?);

    let mut isotopes: Vec<String> = Vec::new();
    let mut temp: Vec<f64> = Vec::new();
    let mut columns: Vec<Vec<f64>> = Vec::new();
    let mut want_isotopes = false;
    let mut in_data = false;

    for (row, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if want_isotopes {
            isotopes = line.split_whitespace().map(str::to_string).collect();
            columns = vec![Vec::new(); isotopes.len()];
            want_isotopes = false;
            continue;
        }
        match line {
            "@ISOTOPES" => {
                want_isotopes = true;
                continue;
            }
            "@DATA" => {
                in_data = true;
                continue;
            }
            _ => {}
        }
        if !in_data {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != isotopes.len() + 1 {
            return Err(RepackError::Parse {
                path: path.to_path_buf(),
                row,
                message: format!(
                    "expected {} columns (T plus one Z per isotope), got {}",
                    isotopes.len() + 1,
                    fields.len()
                ),
            });
        }
        temp.push(parse_float(fields[0], path, row)?);
        for (j, field) in fields[1..].iter().enumerate() {
            columns[j].push(parse_float(field, path, row)?);
        }
    }

    if isotopes.is_empty() {
        return Err(RepackError::InvalidFormat(format!(
            "no @ISOTOPES section in '{}'",
            path.display()
        )));
    }

    let functions = columns
        .into_iter()
        .map(|z| PartitionFunction::new(temp.clone(), z))
        .collect::<Result<Vec<_>>>()?;
    Ok((isotopes, functions))
}

fn parse_float(field: &str, path: &Path, row: usize) -> Result<f64> {
    field.parse().map_err(|_| RepackError::Parse {
        path: path.to_path_buf(),
        row,
        message: format!("invalid number '{}'", field),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn linear_interpolation_with_clamped_ends() {
        let pf = PartitionFunction::new(vec![100.0, 200.0, 400.0], vec![1.0, 3.0, 7.0]).unwrap();

        assert_eq!(pf.eval(100.0), 1.0);
        assert_eq!(pf.eval(150.0), 2.0);
        assert_eq!(pf.eval(300.0), 5.0);
        assert_eq!(pf.eval(400.0), 7.0);
        // Clamped outside the table.
        assert_eq!(pf.eval(50.0), 1.0);
        assert_eq!(pf.eval(500.0), 7.0);
    }

    #[test]
    fn range_check() {
        let pf = PartitionFunction::new(vec![100.0, 400.0], vec![1.0, 7.0]).unwrap();
        assert!(pf.check_range(100.0, 400.0).is_ok());
        assert!(pf.check_range(50.0, 400.0).is_err());
        assert!(pf.check_range(100.0, 500.0).is_err());
    }

    #[test]
    fn short_table_rejected() {
        assert!(PartitionFunction::new(vec![100.0], vec![1.0]).is_err());
        assert!(PartitionFunction::new(vec![100.0, 100.0], vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn reads_exomol_pf_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "  1.0   10.0").unwrap();
        writeln!(file, "  2.0   20.0").unwrap();
        writeln!(file, "  3.0   30.0").unwrap();

        let pf = PartitionFunction::from_exomol_file(file.path()).unwrap();
        assert_eq!(pf.eval(1.5), 15.0);
    }

    #[test]
    fn reads_pyrat_pf_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "# partition functions\n\n\
             @ISOTOPES\n        161  181\n\n\
             @DATA\n\
             100.0  10.0  11.0\n\
             300.0  30.0  33.0\n"
        )
        .unwrap();

        let (isotopes, functions) = read_pyrat_file(file.path()).unwrap();
        assert_eq!(isotopes, vec!["161", "181"]);
        assert_eq!(functions.len(), 2);
        assert_eq!(functions[0].eval(200.0), 20.0);
        assert_eq!(functions[1].eval(200.0), 22.0);
    }
}
