// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, BusinessImpactEntry, ChangePoint, Regime, Report};
use bcp_model::PosteriorDraws;
use chrono::NaiveDate;

/// Reduces raw posterior draws into a structured report.
///
/// Pure and deterministic: identical draws and dates always yield an
/// identical report. Point estimates are asymmetric: break positions use the
/// component-wise posterior *median*, regime mu/sigma use the posterior
/// *mean*. Coincident medianed break positions are kept, not rejected; the
/// affected regime collapses to the duration floor of 1.
pub fn summarize_change_points(
    dates: &[NaiveDate],
    draws: &PosteriorDraws,
) -> Result<Report, BcpError> {
    let t_size = dates.len();
    if t_size == 0 {
        return Err(BcpError::summarization(
            "date sequence must contain at least one entry",
        ));
    }
    if t_size != draws.n_obs() {
        return Err(BcpError::summarization(format!(
            "date sequence length {} does not match posterior n_obs {}",
            t_size,
            draws.n_obs()
        )));
    }
    draws
        .validate()
        .map_err(|err| BcpError::summarization(format!("malformed posterior draws: {err}")))?;

    let k = draws.n_change_points();
    let samples = draws.num_samples();

    // Per-component tau median, truncated to an integer, clamped, sorted.
    let mut tau_sorted = Vec::with_capacity(k);
    for component in 0..k {
        let mut column: Vec<f64> = (0..samples)
            .map(|s| draws.tau_row(s)[component] as f64)
            .collect();
        let median = median_in_place(&mut column);
        let clamped = (median.trunc() as i64).clamp(0, t_size as i64 - 1) as usize;
        tau_sorted.push(clamped);
    }
    tau_sorted.sort_unstable();

    let change_points: Vec<ChangePoint> = tau_sorted
        .iter()
        .enumerate()
        .map(|(idx, &tau_index)| ChangePoint {
            name: format!("cp_{}", idx + 1),
            tau_index,
            tau_date: dates[tau_index],
        })
        .collect();

    // Posterior-mean regime parameters.
    let regimes_len = k + 1;
    let mut mu_mean = vec![0.0_f64; regimes_len];
    let mut sigma_mean = vec![0.0_f64; regimes_len];
    for s in 0..samples {
        let mu_row = draws.mu_row(s);
        let sigma_row = draws.sigma_row(s);
        for j in 0..regimes_len {
            mu_mean[j] += mu_row[j];
            sigma_mean[j] += sigma_row[j];
        }
    }
    for j in 0..regimes_len {
        mu_mean[j] /= samples as f64;
        sigma_mean[j] /= samples as f64;
    }

    let mut boundaries = Vec::with_capacity(k + 2);
    boundaries.push(0);
    boundaries.extend_from_slice(&tau_sorted);
    boundaries.push(t_size - 1);

    let regimes: Vec<Regime> = (0..regimes_len)
        .map(|idx| {
            let start = boundaries[idx];
            let end = boundaries[idx + 1];
            Regime {
                name: format!("regime_{}", idx + 1),
                start_date: dates[start],
                end_date: dates[end],
                // Floor of 1 guards the zero-width regime from coincident
                // change points.
                duration: (end + 1).saturating_sub(start).max(1),
                mu: mu_mean[idx],
                sigma: sigma_mean[idx],
            }
        })
        .collect();

    let business_impact: Vec<BusinessImpactEntry> = regimes
        .windows(2)
        .map(|pair| {
            let before = &pair[0];
            let after = &pair[1];
            let mean_shift = after.mu - before.mu;
            let mean_shift_percent = if before.mu != 0.0 {
                Some(mean_shift / before.mu.abs() * 100.0)
            } else {
                None
            };
            BusinessImpactEntry {
                transition: format!("{} -> {}", before.name, after.name),
                mean_shift,
                mean_shift_percent,
                volatility_shift: after.sigma - before.sigma,
                duration_before: before.duration,
                duration_after: after.duration,
            }
        })
        .collect();

    Ok(Report {
        n_change_points: change_points.len(),
        change_points,
        regimes,
        business_impact,
    })
}

/// Median of a finite column; sorts its scratch argument.
fn median_in_place(column: &mut [f64]) -> f64 {
    column.sort_unstable_by(f64::total_cmp);
    let mid = column.len() / 2;
    if column.len() % 2 == 1 {
        column[mid]
    } else {
        (column[mid - 1] + column[mid]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::{median_in_place, summarize_change_points};
    use bcp_model::PosteriorDraws;
    use chrono::NaiveDate;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid start date");
        (0..n)
            .map(|offset| start + chrono::Days::new(offset as u64))
            .collect()
    }

    /// Spec scenario: T=10, K=1, every sample identical.
    fn constant_draws(samples: usize) -> PosteriorDraws {
        let tau = vec![4usize; samples];
        let mu: Vec<f64> = (0..samples).flat_map(|_| [0.10, 0.50]).collect();
        let sigma: Vec<f64> = (0..samples).flat_map(|_| [0.20, 0.30]).collect();
        PosteriorDraws::new(1, 10, 1, samples, tau, mu, sigma)
            .expect("constant draws should construct")
    }

    #[test]
    fn concrete_single_break_scenario() {
        let dates = dates(10);
        let report = summarize_change_points(&dates, &constant_draws(8))
            .expect("summarization should succeed");

        assert_eq!(report.n_change_points, 1);
        assert_eq!(report.change_points.len(), 1);
        let cp = &report.change_points[0];
        assert_eq!(cp.name, "cp_1");
        assert_eq!(cp.tau_index, 4);
        assert_eq!(cp.tau_date, dates[4]);

        assert_eq!(report.regimes.len(), 2);
        let first = &report.regimes[0];
        assert_eq!(first.name, "regime_1");
        assert_eq!(first.start_date, dates[0]);
        assert_eq!(first.end_date, dates[4]);
        assert_eq!(first.duration, 5);
        assert!((first.mu - 0.10).abs() < 1e-12);
        assert!((first.sigma - 0.20).abs() < 1e-12);

        let second = &report.regimes[1];
        assert_eq!(second.name, "regime_2");
        assert_eq!(second.start_date, dates[4]);
        assert_eq!(second.end_date, dates[9]);
        assert_eq!(second.duration, 6);
        assert!((second.mu - 0.50).abs() < 1e-12);
        assert!((second.sigma - 0.30).abs() < 1e-12);

        assert_eq!(report.business_impact.len(), 1);
        let impact = &report.business_impact[0];
        assert_eq!(impact.transition, "regime_1 -> regime_2");
        assert!((impact.mean_shift - 0.40).abs() < 1e-12);
        let percent = impact.mean_shift_percent.expect("percent should be present");
        assert!((percent - 400.0).abs() < 1e-9);
        assert!((impact.volatility_shift - 0.10).abs() < 1e-12);
        assert_eq!(impact.duration_before, 5);
        assert_eq!(impact.duration_after, 6);
    }

    #[test]
    fn percent_is_null_exactly_when_preceding_mu_is_zero() {
        let dates = dates(10);
        let samples = 4;
        let tau = vec![4usize; samples];
        let mu: Vec<f64> = (0..samples).flat_map(|_| [0.0, 0.7]).collect();
        let sigma: Vec<f64> = (0..samples).flat_map(|_| [0.2, 0.3]).collect();
        let draws = PosteriorDraws::new(1, 10, 1, samples, tau, mu, sigma)
            .expect("draws should construct");

        let report = summarize_change_points(&dates, &draws).expect("summarization should succeed");
        let impact = &report.business_impact[0];
        assert_eq!(impact.mean_shift_percent, None);
        assert!((impact.mean_shift - 0.7).abs() < 1e-12);
    }

    #[test]
    fn coincident_break_positions_produce_a_duration_one_regime() {
        let dates = dates(12);
        let samples = 3;
        // Both components sit at index 6 in every sample.
        let tau: Vec<usize> = (0..samples).flat_map(|_| [6usize, 6]).collect();
        let mu: Vec<f64> = (0..samples).flat_map(|_| [0.1, 0.2, 0.3]).collect();
        let sigma: Vec<f64> = (0..samples).flat_map(|_| [0.1, 0.1, 0.1]).collect();
        let draws = PosteriorDraws::new(2, 12, 1, samples, tau, mu, sigma)
            .expect("draws should construct");

        let report = summarize_change_points(&dates, &draws).expect("summarization should succeed");
        assert_eq!(report.change_points[0].tau_index, 6);
        assert_eq!(report.change_points[1].tau_index, 6);
        // Middle regime spans [6, 6]: zero width floored to duration 1.
        assert_eq!(report.regimes[1].duration, 1);
        assert_eq!(report.regimes[1].start_date, report.regimes[1].end_date);
        assert_eq!(report.regimes[0].duration, 7);
        assert_eq!(report.regimes[2].duration, 6);
    }

    #[test]
    fn even_sample_median_truncates_like_the_float_median() {
        let dates = dates(20);
        // Two samples with tau 8 and 11: float median 9.5 truncates to 9.
        let draws = PosteriorDraws::new(
            1,
            20,
            1,
            2,
            vec![8, 11],
            vec![0.1, 0.2, 0.1, 0.2],
            vec![0.1, 0.1, 0.1, 0.1],
        )
        .expect("draws should construct");

        let report = summarize_change_points(&dates, &draws).expect("summarization should succeed");
        assert_eq!(report.change_points[0].tau_index, 9);
    }

    #[test]
    fn summarization_is_pure_and_repeatable() {
        let dates = dates(10);
        let draws = constant_draws(6);
        let first = summarize_change_points(&dates, &draws).expect("first call should succeed");
        let second = summarize_change_points(&dates, &draws).expect("second call should succeed");
        assert_eq!(first, second);
    }

    #[test]
    fn date_length_mismatch_is_a_contract_violation() {
        let err = summarize_change_points(&dates(9), &constant_draws(4))
            .expect_err("mismatched dates must fail");
        assert!(err.to_string().starts_with("summarization contract violation"));
        assert!(err.to_string().contains("length 9"));
    }

    #[test]
    fn empty_dates_are_rejected() {
        let err = summarize_change_points(&[], &constant_draws(4))
            .expect_err("empty dates must fail");
        assert!(err.to_string().contains("at least one entry"));
    }

    #[test]
    fn median_handles_odd_and_even_lengths() {
        let mut odd = [5.0, 1.0, 3.0];
        assert_eq!(median_in_place(&mut odd), 3.0);
        let mut even = [4.0, 1.0, 2.0, 3.0];
        assert_eq!(median_in_place(&mut even), 2.5);
        let mut single = [7.0];
        assert_eq!(median_in_place(&mut single), 7.0);
    }
}
