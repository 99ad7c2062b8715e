// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::persist::{PayloadCodec, save_posterior, write_report_json};
use crate::summarize::summarize_change_points;
use bcp_core::{BcpError, LoadedModelConfig, ModelConfig, ObservationSeries, Report, RunDiagnostics};
use bcp_model::sampler::{PosteriorSampler, SamplerSettings};
use bcp_model::build_change_point_model;
use std::path::PathBuf;
use std::time::Instant;

/// Destination paths for the run's durable artifacts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelinePaths {
    pub posterior_path: PathBuf,
    pub report_path: PathBuf,
    pub posterior_codec: PayloadCodec,
}

impl PipelinePaths {
    pub fn new(posterior_path: impl Into<PathBuf>, report_path: impl Into<PathBuf>) -> Self {
        Self {
            posterior_path: posterior_path.into(),
            report_path: report_path.into(),
            posterior_codec: PayloadCodec::Json,
        }
    }

    pub fn with_codec(mut self, codec: PayloadCodec) -> Self {
        self.posterior_codec = codec;
        self
    }
}

/// Report plus run metadata from one pipeline execution.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineOutcome {
    pub report: Report,
    pub diagnostics: RunDiagnostics,
}

/// Batch pipeline: build model, sample, persist posterior, summarize, write
/// report. Synchronous orchestration; every failure propagates unretried.
#[derive(Clone, Debug)]
pub struct ChangePointPipeline {
    paths: PipelinePaths,
}

impl ChangePointPipeline {
    pub fn new(paths: PipelinePaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &PipelinePaths {
        &self.paths
    }

    /// Runs the full pipeline for an already-resolved config.
    pub fn run<S: PosteriorSampler>(
        &self,
        series: &ObservationSeries,
        config: &ModelConfig,
        sampler: &S,
        seed: u64,
    ) -> Result<PipelineOutcome, BcpError> {
        self.run_with_warnings(series, config, sampler, seed, Vec::new())
    }

    /// Runs with a loader result, folding its warnings into the diagnostics.
    pub fn run_loaded<S: PosteriorSampler>(
        &self,
        series: &ObservationSeries,
        loaded: &LoadedModelConfig,
        sampler: &S,
        seed: u64,
    ) -> Result<PipelineOutcome, BcpError> {
        self.run_with_warnings(series, &loaded.config, sampler, seed, loaded.warnings.clone())
    }

    fn run_with_warnings<S: PosteriorSampler>(
        &self,
        series: &ObservationSeries,
        config: &ModelConfig,
        sampler: &S,
        seed: u64,
        mut warnings: Vec<String>,
    ) -> Result<PipelineOutcome, BcpError> {
        let started = Instant::now();

        let model = build_change_point_model(series.log_returns(), config.n_change_points)?;
        let settings = SamplerSettings::from_config(config, seed);
        let output = sampler.sample(&model, &settings)?;

        save_posterior(
            &output.draws,
            &self.paths.posterior_path,
            self.paths.posterior_codec,
        )?;

        let report = summarize_change_points(series.dates(), &output.draws)?;
        write_report_json(&report, &self.paths.report_path)?;

        warnings.extend(degenerate_break_warnings(&report));

        let diagnostics = RunDiagnostics {
            n: series.len(),
            n_change_points: config.n_change_points,
            chains: config.chains,
            draws_per_chain: config.draws,
            tune: config.tune,
            target_accept: config.target_accept,
            seed: Some(seed),
            runtime_ms: Some(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)),
            chain_accept_rates: output
                .chain_stats
                .iter()
                .map(|stats| stats.mean_accept_rate())
                .collect(),
            notes: vec![
                format!(
                    "posterior artifact written to '{}'",
                    self.paths.posterior_path.display()
                ),
                format!("report written to '{}'", self.paths.report_path.display()),
            ],
            warnings,
            ..RunDiagnostics::default()
        };

        Ok(PipelineOutcome { report, diagnostics })
    }
}

/// Flags coincident medianed break positions instead of hiding them: a
/// duplicated index may mask a genuinely degenerate posterior.
fn degenerate_break_warnings(report: &Report) -> Vec<String> {
    report
        .change_points
        .windows(2)
        .filter(|pair| pair[0].tau_index == pair[1].tau_index)
        .map(|pair| {
            format!(
                "change points {} and {} coincide at index {}; the regime between them collapses to duration 1",
                pair[0].name, pair[1].name, pair[0].tau_index
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{ChangePointPipeline, PipelinePaths, degenerate_break_warnings};
    use crate::persist::{PayloadCodec, load_posterior, read_report_json};
    use bcp_core::{ChangePoint, LoadedModelConfig, ModelConfig, ObservationSeries, Report};
    use bcp_model::MwgSampler;
    use chrono::NaiveDate;
    use std::path::PathBuf;
    use std::process;
    use std::sync::atomic::{AtomicU64, Ordering};

    static SEQ: AtomicU64 = AtomicU64::new(0);

    fn temp_path(stem: &str) -> PathBuf {
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("{stem}-{}-{seq}.json", process::id()))
    }

    fn test_series(n: usize) -> ObservationSeries {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).expect("valid start date");
        let half = n / 2;
        let pairs = (0..n).map(|i| {
            let level = if i < half { 0.8 } else { -0.8 };
            let wiggle = if i % 2 == 0 { 0.05 } else { -0.05 };
            (start + chrono::Days::new(i as u64), level + wiggle)
        });
        ObservationSeries::from_pairs(pairs).expect("test series should construct")
    }

    fn small_config() -> ModelConfig {
        ModelConfig {
            n_change_points: 1,
            draws: 60,
            tune: 60,
            chains: 2,
            target_accept: 0.9,
        }
    }

    #[test]
    fn run_produces_report_and_both_artifacts() {
        let posterior_path = temp_path("bcp-pipeline-posterior");
        let report_path = temp_path("bcp-pipeline-report");
        let pipeline = ChangePointPipeline::new(
            PipelinePaths::new(&posterior_path, &report_path).with_codec(PayloadCodec::Bincode),
        );
        let series = test_series(40);

        let outcome = pipeline
            .run(&series, &small_config(), &MwgSampler::new(), 17)
            .expect("pipeline should succeed");

        assert_eq!(outcome.report.n_change_points, 1);
        assert_eq!(outcome.report.regimes.len(), 2);
        assert_eq!(outcome.diagnostics.n, 40);
        assert_eq!(outcome.diagnostics.chains, 2);
        assert_eq!(outcome.diagnostics.seed, Some(17));
        assert_eq!(outcome.diagnostics.chain_accept_rates.len(), 2);
        assert!(outcome.diagnostics.runtime_ms.is_some());

        let persisted = load_posterior(&posterior_path).expect("posterior artifact should load");
        assert_eq!(persisted.num_samples(), 120);
        let report = read_report_json(&report_path).expect("report artifact should load");
        assert_eq!(report, outcome.report);

        let _ = std::fs::remove_file(&posterior_path);
        let _ = std::fs::remove_file(&report_path);
    }

    #[test]
    fn run_is_deterministic_for_a_fixed_seed() {
        let series = test_series(30);
        let config = small_config();

        let mut reports = Vec::new();
        for _ in 0..2 {
            let posterior_path = temp_path("bcp-pipeline-det-posterior");
            let report_path = temp_path("bcp-pipeline-det-report");
            let pipeline =
                ChangePointPipeline::new(PipelinePaths::new(&posterior_path, &report_path));
            let outcome = pipeline
                .run(&series, &config, &MwgSampler::new(), 23)
                .expect("pipeline should succeed");
            reports.push(outcome.report);
            let _ = std::fs::remove_file(&posterior_path);
            let _ = std::fs::remove_file(&report_path);
        }
        assert_eq!(reports[0], reports[1]);
    }

    #[test]
    fn run_loaded_folds_loader_warnings_into_diagnostics() {
        let posterior_path = temp_path("bcp-pipeline-warn-posterior");
        let report_path = temp_path("bcp-pipeline-warn-report");
        let pipeline = ChangePointPipeline::new(PipelinePaths::new(&posterior_path, &report_path));
        let loaded = LoadedModelConfig {
            config: small_config(),
            warnings: vec!["unrecognized config key 'drws' ignored".to_string()],
        };

        let outcome = pipeline
            .run_loaded(&test_series(30), &loaded, &MwgSampler::new(), 2)
            .expect("pipeline should succeed");
        assert!(
            outcome
                .diagnostics
                .warnings
                .iter()
                .any(|w| w.contains("unrecognized config key"))
        );

        let _ = std::fs::remove_file(&posterior_path);
        let _ = std::fs::remove_file(&report_path);
    }

    #[test]
    fn insufficient_series_fails_before_any_artifact_is_written() {
        let posterior_path = temp_path("bcp-pipeline-short-posterior");
        let report_path = temp_path("bcp-pipeline-short-report");
        let pipeline = ChangePointPipeline::new(PipelinePaths::new(&posterior_path, &report_path));

        let config = ModelConfig {
            n_change_points: 5,
            ..small_config()
        };
        let err = pipeline
            .run(&test_series(6), &config, &MwgSampler::new(), 0)
            .expect_err("T=6, K=5 must fail validation");
        assert!(err.to_string().contains("insufficient data"));
        assert!(!posterior_path.exists());
        assert!(!report_path.exists());
    }

    #[test]
    fn coincident_change_points_are_flagged() {
        let day = NaiveDate::from_ymd_opt(2022, 5, 1).expect("valid date");
        let report = Report {
            n_change_points: 2,
            change_points: vec![
                ChangePoint {
                    name: "cp_1".to_string(),
                    tau_index: 6,
                    tau_date: day,
                },
                ChangePoint {
                    name: "cp_2".to_string(),
                    tau_index: 6,
                    tau_date: day,
                },
            ],
            regimes: vec![],
            business_impact: vec![],
        };

        let warnings = degenerate_break_warnings(&report);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("cp_1 and cp_2 coincide at index 6"));

        let distinct = Report {
            change_points: vec![
                ChangePoint {
                    name: "cp_1".to_string(),
                    tau_index: 3,
                    tau_date: day,
                },
                ChangePoint {
                    name: "cp_2".to_string(),
                    tau_index: 6,
                    tau_date: day,
                },
            ],
            ..report
        };
        assert!(degenerate_break_warnings(&distinct).is_empty());
    }
}
