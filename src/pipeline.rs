//! The repack driver.
//!
//! Resolves the input set (molecule, isotopes, partition functions,
//! states tables), then streams each wavenumber-range group through the
//! balancer, the classifier and the emitters.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use rustc_hash::FxHashMap;

use crate::balance::ChunkPlan;
use crate::classify::Classifier;
use crate::config::{DbType, RepackConfig};
use crate::error::{RepackError, Result};
use crate::grid::{linspace, ContinuumGrid};
use crate::inputs::{resolve_data_path, FileInfo};
use crate::isotopes::{read_iso, IsotopeSet};
use crate::output::{write_continuum_file, LblWriter};
use crate::partition::{read_pyrat_file, PartitionFunction};
use crate::source::{read_states, Layout, States, Transition, TransitionSource};

/// Totals reported after a completed run.
#[derive(Debug)]
pub struct RunSummary {
    /// Strong transitions written to the LBL stream.
    pub kept: u64,
    /// Transitions classified across all chunks.
    pub classified: u64,
    /// Input rows dropped for non-positive wavenumbers.
    pub skipped_rows: usize,
    /// Transitions with a non-positive partition function at a reference
    /// temperature, withheld from the continuum.
    pub anomalies: usize,
    pub lbl_path: PathBuf,
    pub continuum_path: PathBuf,
}

/// A fully resolved run.
pub struct Repacker {
    config: RepackConfig,
    molecule: String,
    files: Vec<FileInfo>,
    /// Isotope index each input file contributes to (ExoMol; HITRAN
    /// rows carry their own).
    file_iso: Vec<u8>,
    isotopes: IsotopeSet,
    states: FxHashMap<u8, Arc<States>>,
}

impl Repacker {
    /// Parse the input file names and load every auxiliary table.
    pub fn new(config: RepackConfig) -> Result<Self> {
        let files = config
            .lblfiles
            .iter()
            .map(|path| FileInfo::parse(path, config.dbtype))
            .collect::<Result<Vec<_>>>()?;

        let molecule = files[0].molecule.clone();
        if let Some(other) = files.iter().find(|f| f.molecule != molecule) {
            return Err(RepackError::InvalidFormat(format!(
                "all input files must correspond to the same molecule, got {} and {}",
                molecule, other.molecule
            )));
        }

        // Isotope labels and partition functions, either from a shared
        // multi-isotope file or from the per-isotope ExoMol siblings.
        let (labels, partition) = match (&config.pffile, config.dbtype) {
            (Some(pffile), _) => {
                let path = resolve_data_path(pffile)?;
                read_pyrat_file(&path)?
            }
            (None, DbType::Exomol) => {
                let mut labels: Vec<String> = files
                    .iter()
                    .filter_map(|f| f.isotope.clone())
                    .collect();
                labels.sort();
                labels.dedup();

                let mut partition = Vec::with_capacity(labels.len());
                for label in &labels {
                    let file = files
                        .iter()
                        .find(|f| f.isotope.as_ref() == Some(label))
                        .unwrap();
                    let path = resolve_data_path(file.pffile.as_ref().unwrap())?;
                    partition.push(PartitionFunction::from_exomol_file(&path)?);
                }
                (labels, partition)
            }
            (None, DbType::Hitran) => {
                return Err(RepackError::Config(
                    "pffile is required for hitran input".into(),
                ));
            }
        };
        if labels.len() > u8::MAX as usize {
            return Err(RepackError::InvalidFormat(format!(
                "{} isotopes exceed the supported maximum",
                labels.len()
            )));
        }
        for pf in &partition {
            pf.check_range(config.tmin, config.tmax)?;
        }

        let (ratio, mass) = read_iso(&config.isofile, &molecule, &labels, config.dbtype)?;
        let isotopes = IsotopeSet::new(labels, ratio, mass, partition)?;

        // ExoMol files share one states table per isotope.
        let mut file_iso = Vec::with_capacity(files.len());
        let mut states: FxHashMap<u8, Arc<States>> = FxHashMap::default();
        for file in &files {
            let iso = match config.dbtype {
                DbType::Exomol => {
                    let label = file.isotope.as_ref().unwrap();
                    let j = isotopes
                        .labels
                        .iter()
                        .position(|l| l == label)
                        .ok_or_else(|| {
                            RepackError::InvalidFormat(format!(
                                "isotope '{}' of '{}' not in the partition-function file",
                                label,
                                file.path.display()
                            ))
                        })? as u8;
                    if !states.contains_key(&j) {
                        let path = resolve_data_path(file.states.as_ref().unwrap())?;
                        states.insert(j, Arc::new(read_states(&path)?));
                    }
                    j
                }
                DbType::Hitran => 0,
            };
            file_iso.push(iso);
        }

        Ok(Self {
            config,
            molecule,
            files,
            file_iso,
            isotopes,
            states,
        })
    }

    pub fn molecule(&self) -> &str {
        &self.molecule
    }

    /// Run the pipeline and write both output artifacts.
    pub fn run(&self) -> Result<RunSummary> {
        let config = &self.config;
        let temps = linspace(config.tmin, config.tmax, config.ntemp());
        let mut grid = ContinuumGrid::new(
            config.wnmin,
            config.wnmax,
            config.dwn,
            config.nwave(),
            temps,
        );
        let classifier = Classifier::new(config.tmin, config.tmax, config.sthresh);

        let (lbl_path, continuum_path) = self.output_paths();
        let mut writer = LblWriter::create(&lbl_path)?;

        // Wavenumber-range groups, ascending by suffix.
        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, file) in self.files.iter().enumerate() {
            groups.entry(file.suffix.as_str()).or_default().push(i);
        }

        let mut classified: u64 = 0;
        let mut skipped_rows = 0;
        let mut anomalies = 0;

        for indices in groups.values() {
            let mut sources = Vec::with_capacity(indices.len());
            for &i in indices {
                let file = &self.files[i];
                info!("Reading: '{}'", file.path.display());
                let path = resolve_data_path(&file.path)?;
                let layout = match config.dbtype {
                    DbType::Exomol => Layout::Exomol {
                        states: Arc::clone(&self.states[&self.file_iso[i]]),
                        iso: self.file_iso[i],
                    },
                    DbType::Hitran => Layout::Hitran,
                };
                sources.push(TransitionSource::open(&path, layout)?);
            }

            let plan = ChunkPlan::build(&sources, config.wnmin, config.wnmax, config.chunksize)?;

            for n in 0..plan.nchunks() {
                let mut chunk: Vec<Transition> = Vec::with_capacity(plan.chunk_len(n));
                for (k, source) in sources.iter_mut().enumerate() {
                    let (lo, hi) = plan.range(k, n);
                    source.read_range(lo, hi, &mut chunk)?;
                }
                self.check_isotope_indices(&chunk)?;
                chunk.sort_by(|a, b| a.wn.total_cmp(&b.wn));

                let flags = classifier.classify(&chunk, &self.isotopes);
                self.report(&plan, n, &flags.strong, flags.strong_low, flags.strong_high);

                // Anomalous transitions are withheld from the continuum;
                // they only survive through a valid strong flag.
                let mut weak: Vec<Transition> = Vec::new();
                for (j, tr) in chunk.iter().enumerate() {
                    if !flags.strong[j] && !flags.anomalous[j] {
                        weak.push(*tr);
                    }
                }
                grid.accumulate(&weak, &self.isotopes);

                for (tr, &strong) in chunk.iter().zip(&flags.strong) {
                    if strong {
                        writer.write_record(
                            tr.wn,
                            tr.elow,
                            tr.gf,
                            self.isotopes.numeric[tr.iso as usize],
                        )?;
                    }
                }

                classified += chunk.len() as u64;
                anomalies += flags.anomaly_total();
            }

            for source in &sources {
                skipped_rows += source.skipped();
            }
        }

        let kept = writer.finish()?;
        info!("Kept a total of {} line transitions", kept);
        if skipped_rows > 0 || anomalies > 0 {
            warn!(
                "{} input rows skipped, {} transitions withheld on numeric anomalies",
                skipped_rows, anomalies
            );
        }

        write_continuum_file(&continuum_path, &self.molecule, &grid)?;
        info!(
            "Successfully repacked {} line-transition info into '{}' and '{}'",
            config.dbtype,
            lbl_path.display(),
            continuum_path.display()
        );

        Ok(RunSummary {
            kept,
            classified,
            skipped_rows,
            anomalies,
            lbl_path,
            continuum_path,
        })
    }

    /// Output file names carry molecule and database; a directory
    /// component of `outfile` selects where they land.
    pub fn output_paths(&self) -> (PathBuf, PathBuf) {
        let out = std::path::Path::new(&self.config.outfile);
        let dir = out.parent().unwrap_or_else(|| std::path::Path::new(""));
        let stem = out
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(self.config.outfile.as_str());
        let name = |kind: &str| {
            dir.join(format!(
                "{}_{}_{}_{}.dat",
                self.molecule, self.config.dbtype, stem, kind
            ))
        };
        (name("lbl"), name("continuum"))
    }

    /// Every transition must reference a declared isotope.
    fn check_isotope_indices(&self, chunk: &[Transition]) -> Result<()> {
        for tr in chunk {
            if tr.iso as usize >= self.isotopes.len() {
                return Err(RepackError::InvalidFormat(format!(
                    "transition at {} cm-1 references isotope index {}, \
                     but only {} isotopes are declared",
                    tr.wn,
                    tr.iso,
                    self.isotopes.len()
                )));
            }
        }
        Ok(())
    }

    fn report(&self, plan: &ChunkPlan, n: usize, strong: &[bool], low: usize, high: usize) {
        let total = strong.len();
        let kept = strong.iter().filter(|&&s| s).count();
        let comment = if plan.nchunks() > 1 {
            format!(" (chunk {}/{})", n + 1, plan.nchunks())
        } else {
            String::new()
        };
        let pct = |kept: usize| {
            if total == 0 {
                0.0
            } else {
                (total - kept) as f64 * 100.0 / total as f64
            }
        };
        info!("Flagging lines{}:", comment);
        info!(
            "  {:4.0} K: {:6.2}% compression, {}/{} lines kept",
            self.config.tmin,
            pct(low),
            low,
            total
        );
        info!(
            "  {:4.0} K: {:6.2}% compression, {}/{} lines kept",
            self.config.tmax,
            pct(high),
            high,
            total
        );
        info!(
            "  union:  {:6.2}% compression, {}/{} lines kept",
            pct(kept),
            kept,
            total
        );
    }
}
