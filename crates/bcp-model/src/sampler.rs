// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::draws::PosteriorDraws;
use crate::model::{ChangePointModel, LatentState};
use bcp_core::{BcpError, ModelConfig};
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_xoshiro::Xoshiro256PlusPlus;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

const CHAIN_SEED_STREAM: u64 = 0x9e3779b97f4a7c15;
const INITIAL_TAU_WINDOW: f64 = 3.0;
const INITIAL_MU_STEP: f64 = 0.1;
const INITIAL_SIGMA_STEP: f64 = 0.1;
/// Robbins-Monro gain decay exponent for tune-phase step adaptation.
const ADAPT_DECAY: f64 = 0.6;

/// Inference-effort settings handed to a sampler.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplerSettings {
    /// Retained draws per chain.
    pub draws: usize,
    /// Warm-up iterations per chain, discarded.
    pub tune: usize,
    pub chains: usize,
    pub target_accept: f64,
    /// Base seed; each chain derives its own deterministic sub-seed.
    pub seed: u64,
}

impl SamplerSettings {
    pub fn from_config(config: &ModelConfig, seed: u64) -> Self {
        Self {
            draws: config.draws,
            tune: config.tune,
            chains: config.chains,
            target_accept: config.target_accept,
            seed,
        }
    }

    pub fn validate(&self) -> Result<(), BcpError> {
        if self.draws < 1 {
            return Err(BcpError::invalid_input(format!(
                "sampler draws must be >= 1; got {}",
                self.draws
            )));
        }
        if self.chains < 1 {
            return Err(BcpError::invalid_input(format!(
                "sampler chains must be >= 1; got {}",
                self.chains
            )));
        }
        if !(self.target_accept.is_finite()
            && 0.0 < self.target_accept
            && self.target_accept < 1.0)
        {
            return Err(BcpError::invalid_input(format!(
                "sampler target_accept must be finite and in (0,1); got {}",
                self.target_accept
            )));
        }
        Ok(())
    }
}

/// Per-chain acceptance rates over the retained (post-tune) phase.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChainStats {
    pub chain: usize,
    pub tau_accept_rate: f64,
    pub mu_accept_rate: f64,
    pub sigma_accept_rate: f64,
}

impl ChainStats {
    /// Mean acceptance across the three proposal families.
    pub fn mean_accept_rate(&self) -> f64 {
        (self.tau_accept_rate + self.mu_accept_rate + self.sigma_accept_rate) / 3.0
    }
}

/// Posterior draws plus per-chain diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplerOutput {
    pub draws: PosteriorDraws,
    pub chain_stats: Vec<ChainStats>,
}

/// Sampler seam: executes MCMC against a declared model and returns raw
/// posterior draws. A run either completes fully or fails atomically; the
/// core never retries.
pub trait PosteriorSampler {
    fn sample(
        &self,
        model: &ChangePointModel,
        settings: &SamplerSettings,
    ) -> Result<SamplerOutput, BcpError>;
}

/// Random-walk Metropolis-within-Gibbs sampler.
///
/// Each chain owns a `Xoshiro256PlusPlus` seeded from the base seed and the
/// chain index, so runs are reproducible and chains are parallel-safe with no
/// shared state. The tune phase adapts per-family step sizes toward
/// `target_accept` via Robbins-Monro updates; adaptation freezes before any
/// draw is retained. Chains run in parallel when the `rayon` feature is on
/// and are concatenated in chain order either way, so parallel and serial
/// output are identical.
#[derive(Clone, Copy, Debug, Default)]
pub struct MwgSampler;

impl MwgSampler {
    pub fn new() -> Self {
        Self
    }
}

impl PosteriorSampler for MwgSampler {
    fn sample(
        &self,
        model: &ChangePointModel,
        settings: &SamplerSettings,
    ) -> Result<SamplerOutput, BcpError> {
        settings.validate()?;

        let chain_results = run_all_chains(model, settings)?;

        let k = model.n_change_points();
        let regimes = model.n_regimes();
        let samples = settings.chains * settings.draws;
        let mut tau = Vec::with_capacity(samples * k);
        let mut mu = Vec::with_capacity(samples * regimes);
        let mut sigma = Vec::with_capacity(samples * regimes);
        let mut chain_stats = Vec::with_capacity(settings.chains);
        for chain in chain_results {
            tau.extend_from_slice(&chain.tau);
            mu.extend_from_slice(&chain.mu);
            sigma.extend_from_slice(&chain.sigma);
            chain_stats.push(chain.stats);
        }

        let draws = PosteriorDraws::new(
            k,
            model.n_obs(),
            settings.chains,
            settings.draws,
            tau,
            mu,
            sigma,
        )
        .map_err(|err| BcpError::sampling(format!("sampler produced malformed draws: {err}")))?;

        Ok(SamplerOutput { draws, chain_stats })
    }
}

struct ChainDraws {
    tau: Vec<usize>,
    mu: Vec<f64>,
    sigma: Vec<f64>,
    stats: ChainStats,
}

#[cfg(feature = "rayon")]
fn run_all_chains(
    model: &ChangePointModel,
    settings: &SamplerSettings,
) -> Result<Vec<ChainDraws>, BcpError> {
    (0..settings.chains)
        .into_par_iter()
        .map(|chain| run_chain(model, settings, chain))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn run_all_chains(
    model: &ChangePointModel,
    settings: &SamplerSettings,
) -> Result<Vec<ChainDraws>, BcpError> {
    (0..settings.chains)
        .map(|chain| run_chain(model, settings, chain))
        .collect()
}

fn chain_seed(base: u64, chain: usize) -> u64 {
    base ^ CHAIN_SEED_STREAM.wrapping_mul(chain as u64 + 1)
}

/// Robbins-Monro gain at tune iteration `iter`.
fn adapt_gain(iter: usize) -> f64 {
    (1.0 + iter as f64).powf(-ADAPT_DECAY)
}

fn run_chain(
    model: &ChangePointModel,
    settings: &SamplerSettings,
    chain: usize,
) -> Result<ChainDraws, BcpError> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(chain_seed(settings.seed, chain));
    let prior = model.tau_prior();
    let k = model.n_change_points();
    let regimes = model.n_regimes();

    let mut state = LatentState {
        tau: (0..k)
            .map(|_| rng.gen_range(prior.lower..=prior.upper))
            .collect(),
        mu: vec![0.0; regimes],
        sigma: vec![1.0; regimes],
    };
    let mut current_lp = model.log_posterior(&state)?;
    if !current_lp.is_finite() {
        return Err(BcpError::sampling(format!(
            "chain {chain}: log-posterior is not finite at initialization; got {current_lp}"
        )));
    }

    let mut log_tau_window = INITIAL_TAU_WINDOW.ln();
    let mut log_mu_step = INITIAL_MU_STEP.ln();
    let mut log_sigma_step = INITIAL_SIGMA_STEP.ln();

    let max_window = (prior.upper - prior.lower).max(1);

    let mut tau_out = Vec::with_capacity(settings.draws * k);
    let mut mu_out = Vec::with_capacity(settings.draws * regimes);
    let mut sigma_out = Vec::with_capacity(settings.draws * regimes);

    // [tau, mu, sigma] acceptance counters over the retained phase.
    let mut accepted = [0usize; 3];
    let mut proposed = [0usize; 3];

    let total_iters = settings.tune + settings.draws;
    for iter in 0..total_iters {
        let tuning = iter < settings.tune;
        let gain = adapt_gain(iter);

        // Break-position sweep: discrete random walk, clamped by rejection.
        let window = (log_tau_window.exp().round() as usize).clamp(1, max_window);
        for idx in 0..k {
            let magnitude = rng.gen_range(1..=window) as i64;
            let delta = if rng.gen_bool(0.5) { magnitude } else { -magnitude };
            let candidate = state.tau[idx] as i64 + delta;

            let alpha = if candidate < prior.lower as i64 || candidate > prior.upper as i64 {
                0.0
            } else {
                let previous = state.tau[idx];
                state.tau[idx] = candidate as usize;
                let proposal_lp = model.log_posterior(&state)?;
                let alpha = acceptance_probability(chain, iter, current_lp, proposal_lp)?;
                if rng.gen::<f64>() < alpha {
                    current_lp = proposal_lp;
                } else {
                    state.tau[idx] = previous;
                }
                alpha
            };

            if tuning {
                log_tau_window += gain * (alpha - settings.target_accept);
            } else {
                proposed[0] += 1;
                if alpha > 0.0 && state.tau[idx] as i64 == candidate {
                    accepted[0] += 1;
                }
            }
        }

        // Regime-mean sweep: Gaussian random walk.
        for idx in 0..regimes {
            let step = log_mu_step.exp();
            let noise: f64 = rng.sample(StandardNormal);
            let previous = state.mu[idx];
            state.mu[idx] = previous + step * noise;
            let proposal_lp = model.log_posterior(&state)?;
            let alpha = acceptance_probability(chain, iter, current_lp, proposal_lp)?;
            let accept = rng.gen::<f64>() < alpha;
            if accept {
                current_lp = proposal_lp;
            } else {
                state.mu[idx] = previous;
            }

            if tuning {
                log_mu_step += gain * (alpha - settings.target_accept);
            } else {
                proposed[1] += 1;
                if accept {
                    accepted[1] += 1;
                }
            }
        }

        // Regime-scale sweep: Gaussian walk, rejected outside the support.
        for idx in 0..regimes {
            let step = log_sigma_step.exp();
            let noise: f64 = rng.sample(StandardNormal);
            let candidate = state.sigma[idx] + step * noise;

            let (alpha, accept) = if candidate <= 0.0 {
                (0.0, false)
            } else {
                let previous = state.sigma[idx];
                state.sigma[idx] = candidate;
                let proposal_lp = model.log_posterior(&state)?;
                let alpha = acceptance_probability(chain, iter, current_lp, proposal_lp)?;
                let accept = rng.gen::<f64>() < alpha;
                if accept {
                    current_lp = proposal_lp;
                } else {
                    state.sigma[idx] = previous;
                }
                (alpha, accept)
            };

            if tuning {
                log_sigma_step += gain * (alpha - settings.target_accept);
            } else {
                proposed[2] += 1;
                if accept {
                    accepted[2] += 1;
                }
            }
        }

        if !tuning {
            let mut tau_sorted = state.tau.clone();
            tau_sorted.sort_unstable();
            tau_out.extend_from_slice(&tau_sorted);
            mu_out.extend_from_slice(&state.mu);
            sigma_out.extend_from_slice(&state.sigma);
        }
    }

    let stats = ChainStats {
        chain,
        tau_accept_rate: accepted[0] as f64 / proposed[0] as f64,
        mu_accept_rate: accepted[1] as f64 / proposed[1] as f64,
        sigma_accept_rate: accepted[2] as f64 / proposed[2] as f64,
    };

    Ok(ChainDraws {
        tau: tau_out,
        mu: mu_out,
        sigma: sigma_out,
        stats,
    })
}

/// `min(1, exp(proposal - current))`, surfacing NaN as a sampling failure.
fn acceptance_probability(
    chain: usize,
    iter: usize,
    current_lp: f64,
    proposal_lp: f64,
) -> Result<f64, BcpError> {
    if proposal_lp.is_nan() {
        return Err(BcpError::sampling(format!(
            "chain {chain}: log-posterior is NaN at iteration {iter}"
        )));
    }
    if proposal_lp == f64::NEG_INFINITY {
        return Ok(0.0);
    }
    Ok((proposal_lp - current_lp).exp().min(1.0))
}
