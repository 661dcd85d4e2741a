//! Two consecutive discovery passes over the same store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use horizon_agents::config::{HorizonConfig, Pacing};
use horizon_agents::crew::{Stage, StageInputs, StageOutput, StageRunner};
use horizon_agents::pipeline::Horizon;
use horizon_agents::report::CountryOutcome;
use horizon_agents::scout::Scout;
use horizon_agents::store::RecordStore;
use horizon_agents::web::WebSearch;

const FIRST_PASS: &str = "\
Acme Inc. is an AI startup founded in 2021, raised $5M Series A
Short line
";

const SECOND_PASS: &str = "\
Acme Inc. is an AI startup founded in 2021, raised $5M Series A
Orbita Labs startup builds computer vision for farms
";

/// Serves one page of results for the first general query only.
struct OnePageWeb(&'static str);

#[async_trait]
impl WebSearch for OnePageWeb {
    async fn search(&self, query: &str) -> Result<String> {
        if query.contains("startups 2024") {
            Ok(self.0.to_string())
        } else {
            Ok(String::new())
        }
    }

    async fn scrape(&self, url: &str) -> Result<String> {
        anyhow::bail!("no scraping in this test: {url}")
    }
}

/// Stage outputs that carry no startup data of their own.
struct ProseRunner;

#[async_trait]
impl StageRunner for ProseRunner {
    async fn run_stages(&self, inputs: &StageInputs) -> Result<Vec<StageOutput>> {
        Ok(Stage::ALL
            .iter()
            .map(|s| StageOutput {
                stage: s.name().to_string(),
                output: format!("Notes on {} from the {} stage.", inputs.country, s.role()),
            })
            .collect())
    }
}

async fn run_pass(root: &Path, store: Arc<RecordStore>, page: &'static str, pass: &str) -> PathBuf {
    let mut config = HorizonConfig::default();
    config.pacing = Pacing::none();
    config.output.dir = root.join(pass);
    config.output.prefix = "nvidia_inception".into();

    let scout = Scout::new(Arc::new(OnePageWeb(page)), store, config.pacing);
    let horizon = Horizon::new(config, scout, Arc::new(ProseRunner));

    let outcome = horizon.discover_country("Brazil", &[]).await;
    assert!(outcome.is_success(), "pass {pass} failed: {outcome:?}");
    horizon.reporter().dir().to_path_buf()
}

fn single_file(dir: &Path, suffix: &str) -> PathBuf {
    let matches: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.to_string_lossy().ends_with(suffix))
        .collect();
    assert_eq!(matches.len(), 1, "expected one {suffix} in {}", dir.display());
    matches.into_iter().next().unwrap()
}

fn csv_names(path: &Path) -> Vec<String> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|r| r.unwrap().get(0).unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn second_pass_adds_only_the_new_startup() {
    let root = tempfile::tempdir().unwrap();
    let store = Arc::new(RecordStore::open(root.path().join("outputs/discovered_startups.json")).unwrap());

    let first = run_pass(root.path(), store.clone(), FIRST_PASS, "first").await;
    assert_eq!(store.load().len(), 1);
    assert_eq!(csv_names(&single_file(&first, ".csv")), vec!["Acme"]);

    let second = run_pass(root.path(), store.clone(), SECOND_PASS, "second").await;
    let stored = store.load();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].name, "Orbita Labs");
    assert_eq!(stored[1].location.as_deref(), Some("Brazil"));
    assert_eq!(csv_names(&single_file(&second, ".csv")), vec!["Orbita Labs"]);

    let report_text = std::fs::read_to_string(single_file(&second, ".json")).unwrap();
    let report: serde_json::Value = serde_json::from_str(&report_text).unwrap();
    let sweep: serde_json::Value =
        serde_json::from_str(report["task_results"]["startup_discovery"].as_str().unwrap()).unwrap();
    assert_eq!(sweep["total_found"], 1);
    assert_eq!(report["summary"]["total_tasks"], 7);
}

#[tokio::test]
async fn failed_country_is_recorded_not_raised() {
    struct BrokenRunner;

    #[async_trait]
    impl StageRunner for BrokenRunner {
        async fn run_stages(&self, _inputs: &StageInputs) -> Result<Vec<StageOutput>> {
            anyhow::bail!("Claude API error 529: overloaded")
        }
    }

    let root = tempfile::tempdir().unwrap();
    let store = Arc::new(RecordStore::open(root.path().join("store.json")).unwrap());
    let mut config = HorizonConfig::default();
    config.pacing = Pacing::none();
    config.output.dir = root.path().join("reports");
    let scout = Scout::new(Arc::new(OnePageWeb(FIRST_PASS)), store.clone(), config.pacing);
    let horizon = Horizon::new(config, scout, Arc::new(BrokenRunner));

    match horizon.discover_country("Mexico", &[]).await {
        CountryOutcome::Failed { error } => assert!(error.contains("overloaded")),
        other => panic!("expected failure, got {other:?}"),
    }
    // The sweep ran before the stages failed.
    assert_eq!(store.load().len(), 1);
}
