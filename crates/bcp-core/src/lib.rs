// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod report;
pub mod series;

pub use config::{
    DEFAULT_CHAINS, DEFAULT_DRAWS, DEFAULT_N_CHANGE_POINTS, DEFAULT_TARGET_ACCEPT, DEFAULT_TUNE,
    ModelConfig,
};
#[cfg(feature = "serde")]
pub use config::{LoadedModelConfig, load_model_config};
pub use diagnostics::{RUN_DIAGNOSTICS_SCHEMA_VERSION, RunDiagnostics};
pub use error::BcpError;
pub use report::{BusinessImpactEntry, ChangePoint, Regime, Report};
pub use series::ObservationSeries;

/// Core shared types for bcp.
pub fn crate_name() -> &'static str {
    "bcp-core"
}
