// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::BcpError;

const LOG_2PI: f64 = 1.8378770664093453;

/// Discrete-uniform prior over raw break positions, inclusive bounds.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TauPrior {
    pub lower: usize,
    pub upper: usize,
}

impl TauPrior {
    /// Log prior mass at `tau`, `-inf` outside `[lower, upper]`.
    pub fn log_mass(&self, tau: usize) -> f64 {
        if tau < self.lower || tau > self.upper {
            return f64::NEG_INFINITY;
        }
        -((self.upper - self.lower + 1) as f64).ln()
    }
}

/// Normal prior on regime means.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalPrior {
    pub mu: f64,
    pub sigma: f64,
}

/// Half-normal prior on regime scales (support `[0, inf)`).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HalfNormalPrior {
    pub sigma: f64,
}

/// One point in latent-parameter space.
///
/// `tau` holds the K *raw* (unsorted) break positions; the model sorts a copy
/// wherever ordering matters, mirroring the sorted-deterministic construction
/// of the generative declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct LatentState {
    pub tau: Vec<usize>,
    pub mu: Vec<f64>,
    pub sigma: Vec<f64>,
}

/// Declarative multi-change-point generative model over a log-return series.
///
/// K raw break positions each iid `DiscreteUniform[1, T-2]`, sorted to form
/// the ordered break vector; K+1 regime means iid `Normal(0, 1)`; K+1 regime
/// scales iid `HalfNormal(1)`; observation t iid
/// `Normal(mu_{regime(t)}, sigma_{regime(t)})` with
/// `regime(t) = #{tau_k strictly < t}`. Construction declares the joint
/// density; no sampling happens here. Coincident raw draws are permitted and
/// yield a zero-width regime downstream.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangePointModel {
    n_obs: usize,
    n_change_points: usize,
    tau_prior: TauPrior,
    mu_prior: NormalPrior,
    sigma_prior: HalfNormalPrior,
    observations: Vec<f64>,
}

/// Builds the generative model from cleaned log-returns.
///
/// Fails with `InvalidInput` when `n_change_points < 1` or when the series is
/// too short to support K breaks plus K+1 regimes (`T <= K + 1`).
pub fn build_change_point_model(
    log_returns: &[f64],
    n_change_points: usize,
) -> Result<ChangePointModel, BcpError> {
    if n_change_points < 1 {
        return Err(BcpError::invalid_input(format!(
            "n_change_points must be >= 1; got {n_change_points}"
        )));
    }

    let t_size = log_returns.len();
    if t_size <= n_change_points + 1 {
        return Err(BcpError::invalid_input(format!(
            "insufficient data for {n_change_points} change points: series length {t_size} must exceed {}",
            n_change_points + 1
        )));
    }

    if let Some((idx, value)) = log_returns
        .iter()
        .copied()
        .enumerate()
        .find(|(_, v)| !v.is_finite())
    {
        return Err(BcpError::invalid_input(format!(
            "log-return at index {idx} must be finite; got {value}"
        )));
    }

    Ok(ChangePointModel {
        n_obs: t_size,
        n_change_points,
        tau_prior: TauPrior {
            lower: 1,
            upper: t_size - 2,
        },
        mu_prior: NormalPrior { mu: 0.0, sigma: 1.0 },
        sigma_prior: HalfNormalPrior { sigma: 1.0 },
        observations: log_returns.to_vec(),
    })
}

impl ChangePointModel {
    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    pub fn n_change_points(&self) -> usize {
        self.n_change_points
    }

    /// Number of regimes, always `n_change_points + 1`.
    pub fn n_regimes(&self) -> usize {
        self.n_change_points + 1
    }

    pub fn tau_prior(&self) -> TauPrior {
        self.tau_prior
    }

    pub fn mu_prior(&self) -> NormalPrior {
        self.mu_prior
    }

    pub fn sigma_prior(&self) -> HalfNormalPrior {
        self.sigma_prior
    }

    pub fn observations(&self) -> &[f64] {
        &self.observations
    }

    fn check_state_shape(&self, state: &LatentState) -> Result<(), BcpError> {
        if state.tau.len() != self.n_change_points {
            return Err(BcpError::invalid_input(format!(
                "latent tau length {} does not match n_change_points {}",
                state.tau.len(),
                self.n_change_points
            )));
        }
        if state.mu.len() != self.n_regimes() || state.sigma.len() != self.n_regimes() {
            return Err(BcpError::invalid_input(format!(
                "latent mu/sigma lengths {}/{} do not match n_regimes {}",
                state.mu.len(),
                state.sigma.len(),
                self.n_regimes()
            )));
        }
        Ok(())
    }

    /// Joint log prior of the latent state, `-inf` outside the support.
    pub fn log_prior(&self, state: &LatentState) -> Result<f64, BcpError> {
        self.check_state_shape(state)?;

        let mut total = 0.0;
        for &tau in &state.tau {
            total += self.tau_prior.log_mass(tau);
        }
        for &mu in &state.mu {
            total += normal_lpdf(mu, self.mu_prior.mu, self.mu_prior.sigma);
        }
        for &sigma in &state.sigma {
            total += half_normal_lpdf(sigma, self.sigma_prior.sigma);
        }
        Ok(total)
    }

    /// Observation log likelihood under the regime assignment implied by the
    /// sorted break vector.
    pub fn log_likelihood(&self, state: &LatentState) -> Result<f64, BcpError> {
        self.check_state_shape(state)?;

        if state.sigma.iter().any(|&s| s <= 0.0) {
            return Ok(f64::NEG_INFINITY);
        }

        let mut tau_sorted = state.tau.clone();
        tau_sorted.sort_unstable();

        let mut total = 0.0;
        let mut regime = 0usize;
        for (t, &x) in self.observations.iter().enumerate() {
            while regime < tau_sorted.len() && tau_sorted[regime] < t {
                regime += 1;
            }
            total += normal_lpdf(x, state.mu[regime], state.sigma[regime]);
        }
        Ok(total)
    }

    /// Unnormalized log posterior; skips the likelihood when the prior has
    /// already excluded the state.
    pub fn log_posterior(&self, state: &LatentState) -> Result<f64, BcpError> {
        let prior = self.log_prior(state)?;
        if prior == f64::NEG_INFINITY {
            return Ok(f64::NEG_INFINITY);
        }
        Ok(prior + self.log_likelihood(state)?)
    }
}

/// `regime(t) = #{tau_k strictly < t}` for a sorted break vector.
pub fn regime_index(tau_sorted: &[usize], t: usize) -> usize {
    tau_sorted.iter().take_while(|&&tau| tau < t).count()
}

fn normal_lpdf(x: f64, mu: f64, sigma: f64) -> f64 {
    let z = (x - mu) / sigma;
    -0.5 * LOG_2PI - sigma.ln() - 0.5 * z * z
}

fn half_normal_lpdf(x: f64, sigma: f64) -> f64 {
    if x < 0.0 {
        return f64::NEG_INFINITY;
    }
    std::f64::consts::LN_2 + normal_lpdf(x, 0.0, sigma)
}
