//! Country-level coordination: sweep, stages, reports.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Datelike, Local, Utc};

use crate::config::{HorizonConfig, pause};
use crate::crew::{StageInputs, StageRunner};
use crate::report::{CountryOutcome, CountryReport, Reporter};
use crate::scout::Scout;

/// Task result key for the coordinator's own discovery sweep.
pub const SWEEP_TASK: &str = "startup_discovery";

fn file_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

pub struct Horizon {
    config: HorizonConfig,
    scout: Scout,
    runner: Arc<dyn StageRunner>,
    reporter: Reporter,
}

impl Horizon {
    pub fn new(config: HorizonConfig, scout: Scout, runner: Arc<dyn StageRunner>) -> Self {
        let reporter = Reporter::new(&config.output.dir, &config.output.prefix);
        Self {
            config,
            scout,
            runner,
            reporter,
        }
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Run one country end to end. Any failure is captured in the outcome.
    pub async fn discover_country(&self, country: &str, ventures: &[String]) -> CountryOutcome {
        tracing::info!(country, ventures = ventures.len(), "Starting country discovery");
        match self.run_country(country, ventures).await {
            Ok(report) => {
                tracing::info!(country, tasks = report.summary.total_tasks, "Country discovery complete");
                CountryOutcome::Completed(report)
            }
            Err(e) => {
                tracing::error!(country, error = %format!("{e:#}"), "Country discovery failed");
                CountryOutcome::Failed {
                    error: format!("Error processing {country}: {e:#}"),
                }
            }
        }
    }

    async fn run_country(&self, country: &str, ventures: &[String]) -> Result<CountryReport> {
        let discovery = &self.config.discovery;
        let sweep = self
            .scout
            .sweep(country, &discovery.industry, ventures)
            .await?
            .to_json()?;

        let inputs = StageInputs::new(discovery, country, ventures, Local::now().year(), sweep.clone());
        let outputs = self.runner.run_stages(&inputs).await?;

        let mut task_results = Vec::with_capacity(outputs.len() + 1);
        task_results.push((SWEEP_TASK.to_string(), sweep));
        task_results.extend(outputs.into_iter().map(|o| (o.stage, o.output)));

        let report = CountryReport::new(country, Utc::now().to_rfc3339(), task_results);
        self.reporter.export_country(&report, &file_timestamp())?;
        Ok(report)
    }

    /// Run each country in turn with a fixed pause between them, then write
    /// the consolidated report. The same ventures apply to every country.
    pub async fn discover_countries(
        &self,
        countries: &[String],
        ventures: &[String],
    ) -> Result<Vec<(String, CountryOutcome)>> {
        tracing::info!(countries = countries.len(), "Starting multi-country discovery");
        let mut outcomes = Vec::with_capacity(countries.len());
        for (i, country) in countries.iter().enumerate() {
            if i > 0 {
                pause(self.config.pacing.country_delay()).await;
            }
            let outcome = self.discover_country(country, ventures).await;
            outcomes.push((country.clone(), outcome));
        }

        let generated = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.reporter
            .export_consolidated(&outcomes, &file_timestamp(), &generated)?;
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Pacing;
    use crate::crew::{Stage, StageOutput};
    use crate::store::RecordStore;
    use crate::web::WebSearch;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct QuietWeb;

    #[async_trait]
    impl WebSearch for QuietWeb {
        async fn search(&self, _query: &str) -> Result<String> {
            Ok(String::new())
        }

        async fn scrape(&self, _url: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    /// Echoes the country into every stage; fails for one country.
    struct FakeRunner {
        fail_for: &'static str,
        seen: Mutex<Vec<StageInputs>>,
    }

    #[async_trait]
    impl StageRunner for FakeRunner {
        async fn run_stages(&self, inputs: &StageInputs) -> Result<Vec<StageOutput>> {
            self.seen.lock().unwrap().push(inputs.clone());
            if inputs.country == self.fail_for {
                anyhow::bail!("model unavailable");
            }
            Ok(Stage::ALL
                .iter()
                .map(|s| StageOutput {
                    stage: s.name().to_string(),
                    output: format!("{} for {}", s.name(), inputs.country),
                })
                .collect())
        }
    }

    fn horizon(dir: &std::path::Path, runner: Arc<FakeRunner>) -> Horizon {
        paced_horizon(dir, runner, Pacing::none())
    }

    fn paced_horizon(dir: &std::path::Path, runner: Arc<FakeRunner>, pacing: Pacing) -> Horizon {
        let mut config = HorizonConfig::default();
        config.pacing = pacing;
        config.output.dir = dir.join("reports");
        config.output.prefix = "test".into();
        let store = Arc::new(RecordStore::open(dir.join("store.json")).unwrap());
        let scout = Scout::new(Arc::new(QuietWeb), store, config.pacing);
        Horizon::new(config, scout, runner)
    }

    fn runner(fail_for: &'static str) -> Arc<FakeRunner> {
        Arc::new(FakeRunner {
            fail_for,
            seen: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn sweep_is_the_first_task_result() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner("");
        let h = horizon(dir.path(), runner.clone());

        let CountryOutcome::Completed(report) = h.discover_country("Panama", &[]).await else {
            panic!("expected success");
        };
        assert_eq!(report.task_results.len(), 7);
        assert_eq!(report.task_results[0].0, SWEEP_TASK);
        assert_eq!(report.task_results[1], ("discovery".to_string(), "discovery for Panama".to_string()));
        assert_eq!(report.summary.total_tasks, 7);

        let seen = runner.seen.lock().unwrap();
        assert!(seen[0].discovery_sweep.contains("general_discovery"));
        assert_eq!(seen[0].specific_ventures, "None specified");
    }

    #[tokio::test]
    async fn one_failing_country_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let h = horizon(dir.path(), runner("Chile"));
        let countries = vec!["Chile".to_string(), "Peru".to_string()];

        let outcomes = h.discover_countries(&countries, &[]).await.unwrap();
        assert_eq!(outcomes.len(), 2);
        match &outcomes[0].1 {
            CountryOutcome::Failed { error } => {
                assert!(error.starts_with("Error processing Chile"));
                assert!(error.contains("model unavailable"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(outcomes[1].1.is_success());

        let files: Vec<String> = std::fs::read_dir(h.reporter().dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(files.iter().any(|f| f.starts_with("test_peru_") && f.ends_with(".json")));
        assert!(!files.iter().any(|f| f.starts_with("test_chile_")));
        assert!(files.iter().any(|f| f.ends_with("_consolidated.json")));
        assert!(files.iter().any(|f| f.ends_with("_consolidated.md")));
    }

    #[tokio::test(start_paused = true)]
    async fn countries_are_separated_by_one_pause() {
        let dir = tempfile::tempdir().unwrap();
        let pacing = Pacing {
            country_delay_secs: 30,
            ..Pacing::none()
        };
        let h = paced_horizon(dir.path(), runner(""), pacing);
        let countries = vec!["Chile".to_string(), "Peru".to_string()];

        let start = tokio::time::Instant::now();
        let outcomes = h.discover_countries(&countries, &[]).await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(outcomes.len(), 2);
        // No pause before the first country or after the last.
        assert!(elapsed >= std::time::Duration::from_secs(30), "{elapsed:?}");
        assert!(elapsed < std::time::Duration::from_secs(60), "{elapsed:?}");
    }
}
