// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod draws;
pub mod model;
pub mod sampler;

pub use draws::PosteriorDraws;
pub use model::{
    ChangePointModel, HalfNormalPrior, LatentState, NormalPrior, TauPrior,
    build_change_point_model,
};
pub use sampler::{ChainStats, MwgSampler, PosteriorSampler, SamplerOutput, SamplerSettings};

/// Generative model and sampler namespace.
pub fn crate_name() -> &'static str {
    let _ = bcp_core::crate_name();
    "bcp-model"
}
