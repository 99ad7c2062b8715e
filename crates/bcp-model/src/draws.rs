// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::BcpError;

/// Flattened posterior samples from all chains, immutable once produced.
///
/// Row s of `tau` is the sorted break vector of sample s; `mu`/`sigma` rows
/// hold the K+1 regime parameters. Rows are stored chain-major, draw-minor,
/// so chain 0's draws come first regardless of how chains executed.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct PosteriorDraws {
    n_change_points: usize,
    n_obs: usize,
    chains: usize,
    draws_per_chain: usize,
    tau: Vec<usize>,
    mu: Vec<f64>,
    sigma: Vec<f64>,
}

impl PosteriorDraws {
    /// Constructs shape-validated posterior draws.
    pub fn new(
        n_change_points: usize,
        n_obs: usize,
        chains: usize,
        draws_per_chain: usize,
        tau: Vec<usize>,
        mu: Vec<f64>,
        sigma: Vec<f64>,
    ) -> Result<Self, BcpError> {
        let draws = Self {
            n_change_points,
            n_obs,
            chains,
            draws_per_chain,
            tau,
            mu,
            sigma,
        };
        draws.validate()?;
        Ok(draws)
    }

    /// Re-checks every invariant; used after deserializing an artifact.
    pub fn validate(&self) -> Result<(), BcpError> {
        if self.n_change_points < 1 {
            return Err(BcpError::invalid_input(format!(
                "posterior draws require n_change_points >= 1; got {}",
                self.n_change_points
            )));
        }
        if self.chains < 1 || self.draws_per_chain < 1 {
            return Err(BcpError::invalid_input(format!(
                "posterior draws require chains >= 1 and draws_per_chain >= 1; got chains={}, draws_per_chain={}",
                self.chains, self.draws_per_chain
            )));
        }
        if self.n_obs <= self.n_change_points + 1 {
            return Err(BcpError::invalid_input(format!(
                "posterior draws n_obs {} must exceed n_change_points + 1 = {}",
                self.n_obs,
                self.n_change_points + 1
            )));
        }

        let samples = self.num_samples();
        let k = self.n_change_points;
        let regimes = k + 1;
        if self.tau.len() != samples * k {
            return Err(BcpError::invalid_input(format!(
                "tau length mismatch: got {}, expected {} ({} samples x {} change points)",
                self.tau.len(),
                samples * k,
                samples,
                k
            )));
        }
        if self.mu.len() != samples * regimes || self.sigma.len() != samples * regimes {
            return Err(BcpError::invalid_input(format!(
                "mu/sigma length mismatch: got {}/{}, expected {} ({} samples x {} regimes)",
                self.mu.len(),
                self.sigma.len(),
                samples * regimes,
                samples,
                regimes
            )));
        }

        let upper = self.n_obs - 2;
        for s in 0..samples {
            let row = &self.tau[s * k..(s + 1) * k];
            if let Some(&tau) = row.iter().find(|&&tau| tau < 1 || tau > upper) {
                return Err(BcpError::invalid_input(format!(
                    "tau value {tau} in sample {s} is outside [1, {upper}]"
                )));
            }
            if row.windows(2).any(|pair| pair[0] > pair[1]) {
                return Err(BcpError::invalid_input(format!(
                    "tau row in sample {s} is not sorted ascending: {row:?}"
                )));
            }
        }

        if let Some((idx, value)) = self
            .sigma
            .iter()
            .copied()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || *v < 0.0)
        {
            return Err(BcpError::invalid_input(format!(
                "sigma at flat index {idx} must be finite and >= 0; got {value}"
            )));
        }
        if let Some((idx, value)) = self
            .mu
            .iter()
            .copied()
            .enumerate()
            .find(|(_, v)| !v.is_finite())
        {
            return Err(BcpError::invalid_input(format!(
                "mu at flat index {idx} must be finite; got {value}"
            )));
        }

        Ok(())
    }

    pub fn n_change_points(&self) -> usize {
        self.n_change_points
    }

    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    pub fn chains(&self) -> usize {
        self.chains
    }

    pub fn draws_per_chain(&self) -> usize {
        self.draws_per_chain
    }

    /// Total sample count S = chains x draws_per_chain.
    pub fn num_samples(&self) -> usize {
        self.chains * self.draws_per_chain
    }

    /// Sorted break vector of sample `s` (length K).
    pub fn tau_row(&self, s: usize) -> &[usize] {
        let k = self.n_change_points;
        &self.tau[s * k..(s + 1) * k]
    }

    /// Regime means of sample `s` (length K+1).
    pub fn mu_row(&self, s: usize) -> &[f64] {
        let regimes = self.n_change_points + 1;
        &self.mu[s * regimes..(s + 1) * regimes]
    }

    /// Regime scales of sample `s` (length K+1).
    pub fn sigma_row(&self, s: usize) -> &[f64] {
        let regimes = self.n_change_points + 1;
        &self.sigma[s * regimes..(s + 1) * regimes]
    }
}
