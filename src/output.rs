//! Output emitters: the packed binary LBL stream and the continuum
//! opacity table.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::constants::N0;
use crate::error::Result;
use crate::grid::ContinuumGrid;

/// Bytes per packed LBL record: wavenumber, lower-state energy and gf as
/// little-endian f64 plus the isotope label as i32.
pub const LBL_RECORD_SIZE: usize = 28;

/// Append-only writer of packed LBL records.
pub struct LblWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    records: u64,
}

impl LblWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            records: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn write_record(&mut self, wn: f64, elow: f64, gf: f64, iso_label: i32) -> Result<()> {
        self.writer.write_all(&wn.to_le_bytes())?;
        self.writer.write_all(&elow.to_le_bytes())?;
        self.writer.write_all(&gf.to_le_bytes())?;
        self.writer.write_all(&iso_label.to_le_bytes())?;
        self.records += 1;
        Ok(())
    }

    /// Flush and return the record count.
    pub fn finish(mut self) -> Result<u64> {
        self.writer.flush()?;
        Ok(self.records)
    }
}

/// Write the continuum table, converting from cm2 molecule-1 per cm-1 to
/// cm-1 amagat-1 with the Loschmidt number.
pub fn write_continuum<W: Write>(
    w: &mut W,
    molecule: &str,
    grid: &ContinuumGrid,
) -> io::Result<()> {
    write!(w, "@SPECIES\n{}\n\n", molecule)?;

    write!(w, "@TEMPERATURES\n        ")?;
    for t in grid.temperatures() {
        write!(w, " {:10.0}", t)?;
    }
    write!(w, "\n\n")?;

    writeln!(w, "# Wavenumber in cm-1, CIA coefficients in cm-1 amagat-1:")?;
    writeln!(w, "@DATA")?;
    let ntemp = grid.temperatures().len();
    for (iw, wn) in grid.wnspec().iter().enumerate() {
        write!(w, " {:12.6} ", wn)?;
        for it in 0..ntemp {
            write!(w, " {:>10}", format_sci(grid.row(it)[iw] * N0, 4))?;
        }
        writeln!(w)?;
    }
    Ok(())
}

/// Create the continuum file and write the table through a buffer.
pub fn write_continuum_file<P: AsRef<Path>>(
    path: P,
    molecule: &str,
    grid: &ContinuumGrid,
) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_continuum(&mut writer, molecule, grid)?;
    writer.flush()?;
    Ok(())
}

/// C-style scientific notation with a signed two-digit exponent
/// ("1.2345e-02"); Rust's `{:e}` leaves the exponent unpadded.
fn format_sci(value: f64, precision: usize) -> String {
    let formatted = format!("{:.*e}", precision, value);
    match formatted.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::ContinuumGrid;
    use std::io::Read;
    use tempfile::NamedTempFile;

    #[test]
    fn lbl_records_are_28_bytes_packed() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = LblWriter::create(file.path()).unwrap();
        writer.write_record(100.5, 0.0, 1.5e-6, 116).unwrap();
        writer.write_record(200.5, 10.0, 2.5e-6, 117).unwrap();
        assert_eq!(writer.finish().unwrap(), 2);

        let mut bytes = Vec::new();
        File::open(file.path())
            .unwrap()
            .read_to_end(&mut bytes)
            .unwrap();
        assert_eq!(bytes.len(), 2 * LBL_RECORD_SIZE);

        let wn = f64::from_le_bytes(bytes[0..8].try_into().unwrap());
        let elow = f64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let gf = f64::from_le_bytes(bytes[16..24].try_into().unwrap());
        let iso = i32::from_le_bytes(bytes[24..28].try_into().unwrap());
        assert_eq!((wn, elow, gf, iso), (100.5, 0.0, 1.5e-6, 116));

        let wn2 = f64::from_le_bytes(bytes[28..36].try_into().unwrap());
        assert_eq!(wn2, 200.5);
    }

    #[test]
    fn scientific_formatting_pads_exponent() {
        assert_eq!(format_sci(0.0, 4), "0.0000e+00");
        assert_eq!(format_sci(1.23456e-21, 4), "1.2346e-21");
        assert_eq!(format_sci(9.87e5, 4), "9.8700e+05");
        assert_eq!(format_sci(-4.2e-3, 4), "-4.2000e-03");
    }

    #[test]
    fn continuum_header_layout() {
        let grid = ContinuumGrid::new(50.0, 150.0, 50.0, 3, vec![300.0, 1000.0]);
        let mut out = Vec::new();
        write_continuum(&mut out, "H2O", &grid).unwrap();
        let text = String::from_utf8(out).unwrap();

        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("@SPECIES"));
        assert_eq!(lines.next(), Some("H2O"));
        assert_eq!(lines.next(), Some(""));
        assert_eq!(lines.next(), Some("@TEMPERATURES"));
        assert_eq!(lines.next(), Some("                300       1000"));
        assert_eq!(lines.next(), Some(""));
        assert_eq!(
            lines.next(),
            Some("# Wavenumber in cm-1, CIA coefficients in cm-1 amagat-1:")
        );
        assert_eq!(lines.next(), Some("@DATA"));
        assert_eq!(
            lines.next(),
            Some("    50.000000  0.0000e+00 0.0000e+00")
        );
        assert_eq!(lines.next(), Some("   100.000000  0.0000e+00 0.0000e+00"));
    }
}
