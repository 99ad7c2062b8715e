// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod persist;
pub mod pipeline;
pub mod summarize;

pub use persist::{
    CURRENT_POSTERIOR_SCHEMA_VERSION, MIN_SUPPORTED_POSTERIOR_SCHEMA_VERSION,
    POSTERIOR_ARTIFACT_ID, PayloadCodec, PosteriorEnvelope, load_posterior, read_report_json,
    save_posterior, write_report_json,
};
pub use pipeline::{ChangePointPipeline, PipelineOutcome, PipelinePaths};
pub use summarize::summarize_change_points;

/// Summarization and persistence namespace.
pub fn crate_name() -> &'static str {
    let _ = (bcp_core::crate_name(), bcp_model::crate_name());
    "bcp-report"
}
