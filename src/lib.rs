//! repack: compact huge ExoMol/HITRAN line-transition catalogs.
//!
//! Line lists with billions of transitions are streamed chunk by chunk:
//! every transition is classified as strong or weak against a
//! Doppler-width dominance rule at the two reference temperatures.
//! Strong lines go to a packed binary line-by-line file; weak lines are
//! summed into a wavenumber x temperature continuum table.
//!
//! # Example
//!
//! ```rust,no_run
//! use repack::{Repacker, RepackConfig};
//!
//! let config = RepackConfig::from_file("run.cfg").unwrap();
//! let repacker = Repacker::new(config).unwrap();
//! let summary = repacker.run().unwrap();
//! println!("kept {} lines", summary.kept);
//! ```

pub mod balance;
pub mod classify;
pub mod config;
pub mod constants;
pub mod error;
pub mod grid;
pub mod inputs;
pub mod isotopes;
pub mod output;
pub mod partition;
pub mod pipeline;
pub mod source;

// Re-export commonly used types
pub use config::{DbType, RepackConfig};
pub use error::{RepackError, Result};
pub use pipeline::{Repacker, RunSummary};
pub use source::{Transition, TransitionSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
