//! Run configuration parsed from an INI-style file.
//!
//! The file must contain a `[REPACK]` section with `key = value` (or
//! `key: value`) entries. `#` and `;` start comments, keys are
//! case-insensitive, later duplicates override earlier ones.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rustc_hash::FxHashMap;

use crate::error::{RepackError, Result};

/// Default maximum number of transitions held in memory per chunk.
pub const DEFAULT_CHUNKSIZE: usize = 15_000_000;

/// Default location of the isotope descriptor table.
pub const DEFAULT_ISOFILE: &str = "inputs/isotopes.dat";

/// Line-transition database flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    Exomol,
    Hitran,
}

impl FromStr for DbType {
    type Err = RepackError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "exomol" => Ok(DbType::Exomol),
            "hitran" => Ok(DbType::Hitran),
            other => Err(RepackError::Config(format!(
                "invalid dbtype '{}', must be either hitran or exomol",
                other
            ))),
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbType::Exomol => write!(f, "exomol"),
            DbType::Hitran => write!(f, "hitran"),
        }
    }
}

/// Parsed and validated `[REPACK]` section.
#[derive(Debug, Clone)]
pub struct RepackConfig {
    pub lblfiles: Vec<PathBuf>,
    pub dbtype: DbType,
    pub outfile: String,
    pub pffile: Option<PathBuf>,
    pub isofile: PathBuf,
    pub chunksize: usize,
    pub tmin: f64,
    pub tmax: f64,
    pub dtemp: f64,
    pub wnmin: f64,
    pub wnmax: f64,
    pub dwn: f64,
    pub sthresh: f64,
}

impl RepackConfig {
    /// Read and validate a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let keys = read_section(path.as_ref(), "REPACK")?;

        let lblfiles: Vec<PathBuf> = require(&keys, "lblfiles")?
            .split_whitespace()
            .map(PathBuf::from)
            .collect();
        if lblfiles.is_empty() {
            return Err(RepackError::Config(
                "lblfiles must list at least one line-transition file".into(),
            ));
        }

        let dbtype: DbType = require(&keys, "dbtype")?.parse()?;
        let outfile = require(&keys, "outfile")?.to_string();
        let pffile = keys.get("pffile").map(PathBuf::from);
        let isofile = keys
            .get("isofile")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ISOFILE));

        let chunksize = match keys.get("chunksize") {
            Some(v) => v
                .parse::<usize>()
                .map_err(|_| RepackError::Config(format!("unparseable chunksize '{}'", v)))?,
            None => DEFAULT_CHUNKSIZE,
        };

        let config = Self {
            lblfiles,
            dbtype,
            outfile,
            pffile,
            isofile,
            chunksize,
            tmin: require_float(&keys, "tmin")?,
            tmax: require_float(&keys, "tmax")?,
            dtemp: require_float(&keys, "dtemp")?,
            wnmin: require_float(&keys, "wnmin")?,
            wnmax: require_float(&keys, "wnmax")?,
            dwn: require_float(&keys, "dwn")?,
            sthresh: require_float(&keys, "sthresh")?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.chunksize == 0 {
            return Err(RepackError::Config("chunksize must be positive".into()));
        }
        if self.tmax < self.tmin {
            return Err(RepackError::Config(format!(
                "tmax ({}) must not be below tmin ({})",
                self.tmax, self.tmin
            )));
        }
        if self.wnmax <= self.wnmin {
            return Err(RepackError::Config(format!(
                "wnmax ({}) must exceed wnmin ({})",
                self.wnmax, self.wnmin
            )));
        }
        if self.dtemp <= 0.0 || self.dwn <= 0.0 {
            return Err(RepackError::Config("dtemp and dwn must be positive".into()));
        }
        if self.sthresh < 0.0 {
            return Err(RepackError::Config("sthresh must be non-negative".into()));
        }
        Ok(())
    }

    /// Number of temperature samples (endpoint inclusive).
    pub fn ntemp(&self) -> usize {
        ((self.tmax - self.tmin) / self.dtemp + 1.0) as usize
    }

    /// Number of wavenumber samples (endpoint inclusive).
    pub fn nwave(&self) -> usize {
        ((self.wnmax - self.wnmin) / self.dwn + 1.0) as usize
    }
}

/// Collect the `key = value` entries of one section.
fn read_section(path: &Path, section: &str) -> Result<FxHashMap<String, String>> {
    let file = File::open(path).map_err(|e| RepackError::Input {
        path: path.to_path_buf(),
        message: format!("cannot open config file: {}", e),
    })?;
    let reader = BufReader::new(file);

    let mut keys = FxHashMap::default();
    let mut in_section = false;
    let mut seen_section = false;

    for line_result in reader.lines() {
        let line = line_result?;
        let line = strip_comment(&line).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            in_section = name.trim() == section;
            seen_section |= in_section;
            continue;
        }
        if !in_section {
            continue;
        }

        let split = line
            .find(|c| c == '=' || c == ':')
            .ok_or_else(|| RepackError::Config(format!("malformed entry '{}'", line)))?;
        let key = line[..split].trim().to_lowercase();
        let value = line[split + 1..].trim().to_string();
        if key.is_empty() {
            return Err(RepackError::Config(format!("malformed entry '{}'", line)));
        }
        keys.insert(key, value);
    }

    if !seen_section {
        return Err(RepackError::Config(format!(
            "section [{}] not found in '{}'",
            section,
            path.display()
        )));
    }
    Ok(keys)
}

fn strip_comment(line: &str) -> &str {
    match line.find(|c| c == '#' || c == ';') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn require<'a>(keys: &'a FxHashMap<String, String>, key: &str) -> Result<&'a str> {
    keys.get(key)
        .map(String::as_str)
        .ok_or_else(|| RepackError::Config(format!("missing key '{}' in [REPACK]", key)))
}

fn require_float(keys: &FxHashMap<String, String>, key: &str) -> Result<f64> {
    let value = require(keys, key)?;
    value
        .parse::<f64>()
        .map_err(|_| RepackError::Config(format!("unparseable number '{}' for '{}'", value, key)))
}
