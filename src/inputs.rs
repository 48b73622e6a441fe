//! Input file-name conventions for the supported databases.
//!
//! ExoMol transition files are named
//! `<isotopologue>__[<linelist>__]<range>.trans[.bz2|.zip]`, with sibling
//! `states` and `pf` files; HITRAN files carry a two-digit molecule id
//! prefix and a wavenumber-range suffix before `.par`.

use std::path::{Path, PathBuf};

use crate::config::DbType;
use crate::error::{RepackError, Result};

/// Known HITRAN/HITEMP molecule id prefixes.
const HITRAN_MOLECULES: &[(&str, &str)] = &[
    ("01", "H2O"),
    ("02", "CO2"),
    ("03", "O3"),
    ("04", "N2O"),
    ("05", "CO"),
    ("06", "CH4"),
    ("07", "O2"),
    ("08", "NO"),
];

/// What a line-transition file name tells us before opening it.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: PathBuf,
    /// Wavenumber-range token used to group files covering the same band.
    pub suffix: String,
    pub molecule: String,
    /// ExoMol isotope label derived from the isotopologue (e.g. "116").
    pub isotope: Option<String>,
    /// Sibling partition-function file (ExoMol).
    pub pffile: Option<PathBuf>,
    /// Sibling states file (ExoMol).
    pub states: Option<PathBuf>,
}

impl FileInfo {
    pub fn parse(path: &Path, dbtype: DbType) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RepackError::Input {
                path: path.to_path_buf(),
                message: "file name is not valid UTF-8".into(),
            })?;
        match dbtype {
            DbType::Exomol => parse_exomol(path, name),
            DbType::Hitran => parse_hitran(path, name),
        }
    }
}

fn parse_exomol(path: &Path, name: &str) -> Result<FileInfo> {
    let root = path.parent().unwrap_or_else(|| Path::new(""));

    // States files are shared by all range suffixes of one isotopologue,
    // so the suffix is cut out of the sibling name.
    let mut states_name = name.replace("trans", "states");
    let mut suffix = String::new();
    if states_name.matches("__").count() == 2 {
        let us = states_name.rfind("__").unwrap();
        let dot = states_name.find('.').unwrap_or(states_name.len());
        if us < dot {
            suffix = states_name[us..dot].to_string();
            states_name.replace_range(us..dot, "");
        }
    }
    let pf_name = strip_archive_extension(&states_name.replace("states", "pf")).to_string();

    let stem = &name[..name.find('_').unwrap_or(name.len())];
    let (molecule, isotope) = parse_isotopologue(stem, path)?;

    Ok(FileInfo {
        path: path.to_path_buf(),
        suffix,
        molecule,
        isotope: Some(isotope),
        pffile: Some(root.join(pf_name)),
        states: Some(root.join(states_name)),
    })
}

/// Split a hyphenated isotopologue (`1H2-16O`) into the molecule name
/// (`H2O`) and the isotope label built from the last digit of each mass
/// number, repeated per atom count (`116`).
fn parse_isotopologue(stem: &str, path: &Path) -> Result<(String, String)> {
    let mut molecule = String::new();
    let mut isotope = String::new();

    for token in stem.split('-') {
        let mass_len = token
            .bytes()
            .position(|b| !b.is_ascii_digit())
            .unwrap_or(token.len());
        let (mass, rest) = token.split_at(mass_len);
        let elem_len = rest
            .bytes()
            .position(|b| !b.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let (elem, count_str) = rest.split_at(elem_len);

        if mass.is_empty() || elem.is_empty() || !count_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RepackError::Input {
                path: path.to_path_buf(),
                message: format!("cannot parse isotopologue token '{}'", token),
            });
        }
        let count: usize = if count_str.is_empty() {
            1
        } else {
            count_str.parse().map_err(|_| RepackError::Input {
                path: path.to_path_buf(),
                message: format!("atom count out of range in token '{}'", token),
            })?
        };

        molecule.push_str(elem);
        molecule.push_str(count_str);
        let digit = mass.chars().last().unwrap();
        isotope.extend(std::iter::repeat(digit).take(count));
    }
    Ok((molecule, isotope))
}

fn parse_hitran(path: &Path, name: &str) -> Result<FileInfo> {
    let mol_id = name.get(0..2).unwrap_or("");
    let molecule = HITRAN_MOLECULES
        .iter()
        .find(|(id, _)| *id == mol_id)
        .map(|(_, mol)| mol.to_string())
        .ok_or_else(|| RepackError::Input {
            path: path.to_path_buf(),
            message: format!("unknown HITRAN molecule id '{}'", mol_id),
        })?;

    let start = name.find('_').map(|i| i + 1).unwrap_or(0);
    let end = name.rfind(".par").unwrap_or(name.len());
    let mut suffix = if start <= end {
        name[start..end].to_string()
    } else {
        String::new()
    };
    // A lo-hi range suffix keeps only the lower bound, zero-padded so
    // lexicographic group order matches wavenumber order.
    if let Some(dash) = suffix.find('-') {
        if dash > 0 {
            suffix = format!("{:0>5}", &suffix[..dash]);
        }
    }

    Ok(FileInfo {
        path: path.to_path_buf(),
        suffix,
        molecule,
        isotope: None,
        pffile: None,
        states: None,
    })
}

fn strip_archive_extension(name: &str) -> &str {
    name.strip_suffix(".bz2")
        .or_else(|| name.strip_suffix(".zip"))
        .unwrap_or(name)
}

/// Map an input path to the plain file that can be memory-mapped.
///
/// Archives must be extracted beforehand; an `x.trans.bz2` entry resolves
/// to the sibling `x.trans`.
pub fn resolve_data_path(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| RepackError::Input {
            path: path.to_path_buf(),
            message: "file name is not valid UTF-8".into(),
        })?;

    let stripped = strip_archive_extension(name);
    if stripped == name {
        return Ok(path.to_path_buf());
    }
    let sibling = path.with_file_name(stripped);
    if sibling.exists() {
        Ok(sibling)
    } else {
        Err(RepackError::Input {
            path: path.to_path_buf(),
            message: format!(
                "archives must be extracted before the run; expected '{}' next to the archive",
                stripped
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exomol_name_with_linelist() {
        let info = FileInfo::parse(
            Path::new("/data/1H2-16O__POKAZATEL__00000-00100.trans.bz2"),
            DbType::Exomol,
        )
        .unwrap();

        assert_eq!(info.molecule, "H2O");
        assert_eq!(info.isotope.as_deref(), Some("116"));
        assert_eq!(info.suffix, "__00000-00100");
        assert_eq!(
            info.states.unwrap(),
            PathBuf::from("/data/1H2-16O__POKAZATEL.states.bz2")
        );
        assert_eq!(
            info.pffile.unwrap(),
            PathBuf::from("/data/1H2-16O__POKAZATEL.pf")
        );
    }

    #[test]
    fn exomol_name_without_suffix() {
        let info =
            FileInfo::parse(Path::new("14N-1H3__BYTe.trans"), DbType::Exomol).unwrap();

        assert_eq!(info.molecule, "NH3");
        assert_eq!(info.isotope.as_deref(), Some("4111"));
        assert_eq!(info.suffix, "");
        assert_eq!(info.states.unwrap(), PathBuf::from("14N-1H3__BYTe.states"));
    }

    #[test]
    fn hitran_name_with_range() {
        let info = FileInfo::parse(
            Path::new("02_03750-04000_HITEMP2010.par"),
            DbType::Hitran,
        )
        .unwrap();

        assert_eq!(info.molecule, "CO2");
        assert_eq!(info.suffix, "03750");
        assert!(info.isotope.is_none());
        assert!(info.states.is_none());
    }

    #[test]
    fn hitran_name_without_range() {
        let info = FileInfo::parse(Path::new("01_HITEMP2010.par"), DbType::Hitran).unwrap();
        assert_eq!(info.molecule, "H2O");
        assert_eq!(info.suffix, "HITEMP2010");
    }

    #[test]
    fn unknown_hitran_id_rejected() {
        assert!(FileInfo::parse(Path::new("99_foo.par"), DbType::Hitran).is_err());
    }

    #[test]
    fn resolve_plain_path_untouched() {
        let path = resolve_data_path(Path::new("x.trans")).unwrap();
        assert_eq!(path, PathBuf::from("x.trans"));
    }

    #[test]
    fn resolve_missing_extraction_fails() {
        let err = resolve_data_path(Path::new("/nonexistent/x.trans.zip")).unwrap_err();
        assert!(err.to_string().contains("extracted"));
    }
}
