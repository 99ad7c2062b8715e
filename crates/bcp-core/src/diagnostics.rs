// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Run-diagnostics schema version.
pub const RUN_DIAGNOSTICS_SCHEMA_VERSION: u32 = 1;

/// Structured metadata captured from a pipeline run.
///
/// `warnings` carries config-loader recoveries and degenerate-posterior flags;
/// neither is fatal, but both must be visible to the caller.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct RunDiagnostics {
    pub schema_version: u32,
    pub engine_version: Option<String>,
    pub n: usize,
    pub n_change_points: usize,
    pub chains: usize,
    pub draws_per_chain: usize,
    pub tune: usize,
    pub target_accept: f64,
    pub seed: Option<u64>,
    pub runtime_ms: Option<u64>,
    /// Mean proposal acceptance rate per chain, in chain order.
    pub chain_accept_rates: Vec<f64>,
    pub notes: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for RunDiagnostics {
    fn default() -> Self {
        Self {
            schema_version: RUN_DIAGNOSTICS_SCHEMA_VERSION,
            engine_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            n: 0,
            n_change_points: 0,
            chains: 0,
            draws_per_chain: 0,
            tune: 0,
            target_accept: 0.0,
            seed: None,
            runtime_ms: None,
            chain_accept_rates: vec![],
            notes: vec![],
            warnings: vec![],
        }
    }
}
