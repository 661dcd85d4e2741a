//! horizon: AI startup discovery for the NVIDIA Inception pipeline.
//!
//!   horizon discover [--country Brazil ...] [--venture Clip]
//!   horizon startups [--country Brazil]
//!   horizon extract <companies|funding|ventures|profiles> [--file page.txt] --target <name>
//!
//! `discover` requires ANTHROPIC_API_KEY and TAVILY_API_KEY.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use horizon_agents::config::HorizonConfig;
use horizon_agents::crew::AgentCrew;
use horizon_agents::extract::{self, MENTION_CAP, PROFILE_CAP};
use horizon_agents::llm::LlmClient;
use horizon_agents::pipeline::Horizon;
use horizon_agents::report::CountryOutcome;
use horizon_agents::scout::Scout;
use horizon_agents::store::RecordStore;
use horizon_agents::tools::Toolbox;
use horizon_agents::web::WebClient;

#[derive(Parser)]
#[command(name = "horizon", about = "AI startup discovery agents for Latin America")]
struct Args {
    /// TOML config file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the discovery pipeline for one or more countries
    Discover {
        /// Country to search (repeatable; configured targets when omitted)
        #[arg(long = "country")]
        countries: Vec<String>,

        /// Venture to research in every country (repeatable)
        #[arg(long = "venture")]
        ventures: Vec<String>,

        /// Directory for report files
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Record store path
        #[arg(long)]
        store: Option<PathBuf>,

        /// Claude model override
        #[arg(long)]
        model: Option<String>,

        /// Anthropic API key
        #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Tavily search API key
        #[arg(long, env = "TAVILY_API_KEY", hide_env_values = true)]
        search_api_key: String,
    },
    /// List stored startups as JSON
    Startups {
        /// Record store path
        #[arg(long)]
        store: Option<PathBuf>,

        /// Only startups whose location mentions this country
        #[arg(long)]
        country: Option<String>,
    },
    /// Run an extractor over text from a file or stdin and print JSON
    Extract {
        #[arg(value_enum)]
        mode: ExtractMode,

        /// Input file (stdin when omitted)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Venture, company or person the text is about
        #[arg(long)]
        target: Option<String>,

        /// Company context for profile extraction
        #[arg(long, default_value = "")]
        company: String,

        #[arg(long, default_value = "Brazil")]
        country: String,

        #[arg(long, default_value = "AI")]
        industry: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExtractMode {
    Companies,
    Funding,
    Ventures,
    Profiles,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("horizon_agents=info,horizon=info"));
    if args.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let mut config = HorizonConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Discover {
            countries,
            ventures,
            output_dir,
            store,
            model,
            api_key,
            search_api_key,
        } => {
            if let Some(dir) = output_dir {
                config.output.dir = dir;
            }
            if let Some(path) = store {
                config.output.store_path = path;
            }
            if let Some(model) = model {
                config.agents.model = model;
            }
            let countries = config.discovery.countries(&countries);
            discover(config, &countries, &ventures, api_key, search_api_key).await
        }
        Command::Startups { store, country } => {
            let path = store.unwrap_or(config.output.store_path);
            list_startups(RecordStore::open(path)?, country.as_deref())
        }
        Command::Extract {
            mode,
            file,
            target,
            company,
            country,
            industry,
        } => {
            let text = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read stdin")?;
                    buf
                }
            };
            let json = run_extract(mode, &text, target.as_deref(), &company, &country, &industry)?;
            println!("{json}");
            Ok(())
        }
    }
}

async fn discover(
    config: HorizonConfig,
    countries: &[String],
    ventures: &[String],
    api_key: String,
    search_api_key: String,
) -> Result<()> {
    let store = Arc::new(RecordStore::open(&config.output.store_path)?);
    let web = Arc::new(WebClient::new(search_api_key)?);
    let scout = Scout::new(web, store, config.pacing);
    let model = Arc::new(LlmClient::new(api_key, &config.agents));
    let crew = Arc::new(AgentCrew::new(
        model,
        Toolbox::new(scout.clone()),
        config.agents.clone(),
    ));

    tracing::info!(
        countries = %countries.join(", "),
        ventures = ventures.len(),
        store = %config.output.store_path.display(),
        model = %config.agents.model,
        "Starting horizon"
    );

    let horizon = Horizon::new(config, scout, crew);
    let outcomes = if let [country] = countries {
        vec![(country.clone(), horizon.discover_country(country, ventures).await)]
    } else {
        horizon.discover_countries(countries, ventures).await?
    };

    for (country, outcome) in &outcomes {
        match outcome {
            CountryOutcome::Completed(report) => {
                println!("{country}: {} tasks completed", report.summary.total_tasks)
            }
            CountryOutcome::Failed { error } => println!("{country}: {error}"),
        }
    }
    println!("Reports written to {}", horizon.reporter().dir().display());
    Ok(())
}

fn list_startups(store: RecordStore, country: Option<&str>) -> Result<()> {
    let country = country.map(str::to_lowercase);
    let records: Vec<_> = store
        .load()
        .into_iter()
        .filter(|r| match (&country, &r.location) {
            (None, _) => true,
            (Some(c), Some(location)) => location.to_lowercase().contains(c.as_str()),
            (Some(_), None) => false,
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn run_extract(
    mode: ExtractMode,
    text: &str,
    target: Option<&str>,
    company: &str,
    country: &str,
    industry: &str,
) -> Result<String> {
    let target = || target.context("--target is required for this mode");
    let json = match mode {
        ExtractMode::Companies => {
            serde_json::to_string_pretty(&extract::extract_companies(text, country, industry))?
        }
        ExtractMode::Funding => serde_json::to_string_pretty(&extract::dedupe(
            extract::extract_funding(text, target()?),
            MENTION_CAP,
        ))?,
        ExtractMode::Ventures => serde_json::to_string_pretty(&extract::dedupe(
            extract::extract_venture_info(text, target()?),
            MENTION_CAP,
        ))?,
        ExtractMode::Profiles => serde_json::to_string_pretty(&extract::dedupe(
            extract::extract_profiles(text, target()?, company),
            PROFILE_CAP,
        ))?,
    };
    Ok(json)
}
