// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::NaiveDate;

/// Estimated structural break.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ChangePoint {
    /// `cp_1`, `cp_2`, ... in temporal order.
    pub name: String,
    /// Position in the observation index, within `[0, T-1]`.
    pub tau_index: usize,
    /// Calendar date at `tau_index`; serializes as `YYYY-MM-DD`.
    pub tau_date: NaiveDate,
}

/// Contiguous span modeled with constant mean/scale.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Regime {
    /// `regime_1`, `regime_2`, ... in temporal order.
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Observation count spanned, floored at 1 for zero-width regimes.
    pub duration: usize,
    /// Posterior-mean regime mean.
    pub mu: f64,
    /// Posterior-mean regime scale.
    pub sigma: f64,
}

/// Shift in mean/volatility between two adjacent regimes.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct BusinessImpactEntry {
    /// `"regime_i -> regime_{i+1}"`.
    pub transition: String,
    pub mean_shift: f64,
    /// `100 * mean_shift / |mu_before|`; `None` exactly when `mu_before == 0`.
    pub mean_shift_percent: Option<f64>,
    pub volatility_shift: f64,
    pub duration_before: usize,
    pub duration_after: usize,
}

/// Structured change-point analysis report, the pipeline's durable output.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub n_change_points: usize,
    pub change_points: Vec<ChangePoint>,
    pub regimes: Vec<Regime>,
    pub business_impact: Vec<BusinessImpactEntry>,
}

#[cfg(test)]
mod tests {
    use super::{BusinessImpactEntry, ChangePoint, Regime, Report};
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).expect("valid test date")
    }

    fn sample_report() -> Report {
        Report {
            n_change_points: 1,
            change_points: vec![ChangePoint {
                name: "cp_1".to_string(),
                tau_index: 4,
                tau_date: day(5),
            }],
            regimes: vec![
                Regime {
                    name: "regime_1".to_string(),
                    start_date: day(1),
                    end_date: day(5),
                    duration: 5,
                    mu: 0.1,
                    sigma: 0.2,
                },
                Regime {
                    name: "regime_2".to_string(),
                    start_date: day(5),
                    end_date: day(10),
                    duration: 6,
                    mu: 0.5,
                    sigma: 0.3,
                },
            ],
            business_impact: vec![BusinessImpactEntry {
                transition: "regime_1 -> regime_2".to_string(),
                mean_shift: 0.4,
                mean_shift_percent: Some(400.0),
                volatility_shift: 0.1,
                duration_before: 5,
                duration_after: 6,
            }],
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn report_serializes_dates_as_iso_and_null_percent_as_null() {
        let mut report = sample_report();
        report.business_impact[0].mean_shift_percent = None;

        let encoded = serde_json::to_value(&report).expect("report should serialize");
        assert_eq!(encoded["change_points"][0]["tau_date"], "2024-03-05");
        assert_eq!(encoded["regimes"][1]["end_date"], "2024-03-10");
        assert!(encoded["business_impact"][0]["mean_shift_percent"].is_null());
        assert_eq!(encoded["n_change_points"], 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn report_serde_roundtrip_preserves_all_fields() {
        let report = sample_report();
        let encoded = serde_json::to_string(&report).expect("report should serialize");
        let decoded: Report = serde_json::from_str(&encoded).expect("report should deserialize");
        assert_eq!(decoded, report);
    }
}
