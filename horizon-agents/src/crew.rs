//! The six analysis stages and the LLM crew that runs them.
//!
//! Stages run strictly in order. Each stage is one agent conversation: the
//! task prompt plus earlier stage outputs go in, the agent may call its
//! tools for a bounded number of rounds, and its final text is the stage
//! output.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::config::{AgentSettings, DiscoveryConfig, prompt_list};
use crate::extract::truncate_chars;
use crate::llm::{ChatModel, ContentBlock, Message, Role, ToolResultBlock};
use crate::tools::{
    self, COMPANY_ANALYSIS, FUNDING_RESEARCH, LINKEDIN_SEARCH, SCRAPE_WEBSITE,
    STARTUP_DISCOVERY, Toolbox, WEB_SEARCH,
};

/// Config list entries substituted into prompts.
const PROMPT_LIST_LIMIT: usize = 10;

const CONCLUDE_PROMPT: &str =
    "Tool budget exhausted. Give your final answer now using what you have gathered.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovery,
    Qualification,
    FundingResearch,
    LeadershipResearch,
    MarketAnalysis,
    ValidationAndScoring,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Discovery,
        Stage::Qualification,
        Stage::FundingResearch,
        Stage::LeadershipResearch,
        Stage::MarketAnalysis,
        Stage::ValidationAndScoring,
    ];

    /// Key used for this stage in task results.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Discovery => "discovery",
            Stage::Qualification => "qualification",
            Stage::FundingResearch => "funding_research",
            Stage::LeadershipResearch => "leadership_research",
            Stage::MarketAnalysis => "market_analysis",
            Stage::ValidationAndScoring => "validation_and_scoring",
        }
    }

    pub fn role(self) -> &'static str {
        match self {
            Stage::Discovery => "AI Startup Discovery Specialist",
            Stage::Qualification => "AI Technology Assessment Analyst",
            Stage::FundingResearch => "Investment Research Analyst",
            Stage::LeadershipResearch => "Technical Leadership Researcher",
            Stage::MarketAnalysis => "Latin America AI Market Analyst",
            Stage::ValidationAndScoring => "Startup Data Validation Specialist",
        }
    }

    pub fn tools(self) -> &'static [&'static str] {
        match self {
            Stage::Discovery => &[STARTUP_DISCOVERY, WEB_SEARCH],
            Stage::Qualification => &[COMPANY_ANALYSIS, SCRAPE_WEBSITE, WEB_SEARCH],
            Stage::FundingResearch | Stage::LeadershipResearch => {
                &[FUNDING_RESEARCH, LINKEDIN_SEARCH, WEB_SEARCH]
            }
            Stage::MarketAnalysis => &[WEB_SEARCH, SCRAPE_WEBSITE],
            Stage::ValidationAndScoring => &[SCRAPE_WEBSITE, WEB_SEARCH],
        }
    }

    pub fn system_prompt(self) -> String {
        let duty = match self {
            Stage::Discovery => {
                "You find early and growth stage AI startups in Latin America that fit the \
                 NVIDIA Inception program. Prefer primary sources and record where each \
                 company was found."
            }
            Stage::Qualification => {
                "You assess whether discovered startups build real AI technology. Check their \
                 websites, identify their AI stack and products, and flag companies whose AI \
                 claims are thin."
            }
            Stage::FundingResearch => {
                "You research funding history: rounds, amounts, dates and lead investors. \
                 Report only funding you can attribute to a source."
            }
            Stage::LeadershipResearch => {
                "You identify founders and technical leaders (CEO, CTO, heads of AI) and their \
                 professional profiles."
            }
            Stage::MarketAnalysis => {
                "You analyze the country's AI ecosystem: active sectors, investors, \
                 accelerators and trends relevant to GPU-accelerated startups."
            }
            Stage::ValidationAndScoring => {
                "You validate the collected startup data, drop unverifiable entries and \
                 produce the final startup list with a short rationale for each company."
            }
        };
        format!("You are the {}. {duty}", self.role())
    }

    pub fn task_prompt(self, inputs: &StageInputs) -> String {
        let StageInputs {
            country,
            current_year,
            target_technologies,
            target_sectors,
            funding_stages,
            known_investors,
            specific_ventures,
            ..
        } = inputs;
        match self {
            Stage::Discovery => format!(
                "Discover AI startups in {country} as of {current_year}. Focus on these \
                 technologies: {target_technologies}. Specific ventures to research: \
                 {specific_ventures}.\n\nReturn a JSON object with a \"startups\" array. Each \
                 entry has name, website, description, location, technology, market, founded \
                 and milestones."
            ),
            Stage::Qualification => format!(
                "Qualify the startups discovered in {country}. For each one confirm the AI \
                 technology in use and the market sector (one of: {target_sectors}). Analyze \
                 company websites where available."
            ),
            Stage::FundingResearch => format!(
                "Research funding for the qualified startups in {country}. Relevant stages: \
                 {funding_stages}. Check the portfolios of regional investors such as \
                 {known_investors}. Give round, amount, date and investors for each company."
            ),
            Stage::LeadershipResearch => format!(
                "Identify the founders and technical leaders of the qualified startups in \
                 {country}, with LinkedIn profiles where found."
            ),
            Stage::MarketAnalysis => format!(
                "Analyze the {current_year} AI startup market in {country}: leading sectors \
                 among {target_sectors}, active investors (including {known_investors}) and \
                 ecosystem trends."
            ),
            Stage::ValidationAndScoring => format!(
                "Validate everything gathered for {country} and produce the final list. \
                 Return a JSON object with a \"startups\" array using the same fields as \
                 discovery, keeping only companies you could verify."
            ),
        }
    }
}

/// Values templated into stage prompts for one country run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInputs {
    pub country: String,
    pub current_year: String,
    pub target_technologies: String,
    pub target_sectors: String,
    pub funding_stages: String,
    /// Regional venture firms worth checking during funding research.
    pub known_investors: String,
    /// Comma-joined venture names, or "None specified".
    pub specific_ventures: String,
    /// Output of the coordinator's own discovery sweep.
    pub discovery_sweep: String,
}

impl StageInputs {
    pub fn new(
        discovery: &DiscoveryConfig,
        country: &str,
        ventures: &[String],
        current_year: i32,
        discovery_sweep: String,
    ) -> Self {
        Self {
            country: country.to_string(),
            current_year: current_year.to_string(),
            target_technologies: prompt_list(&discovery.ai_technologies, PROMPT_LIST_LIMIT),
            target_sectors: prompt_list(&discovery.market_sectors, PROMPT_LIST_LIMIT),
            funding_stages: prompt_list(&discovery.funding_stages, PROMPT_LIST_LIMIT),
            known_investors: prompt_list(&discovery.latam_vcs, PROMPT_LIST_LIMIT),
            specific_ventures: if ventures.is_empty() {
                "None specified".to_string()
            } else {
                ventures.join(", ")
            },
            discovery_sweep,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageOutput {
    pub stage: String,
    pub output: String,
}

/// Runs every stage in order for one country.
#[async_trait]
pub trait StageRunner: Send + Sync {
    async fn run_stages(&self, inputs: &StageInputs) -> Result<Vec<StageOutput>>;
}

/// LLM-backed stage runner.
pub struct AgentCrew {
    model: Arc<dyn ChatModel>,
    toolbox: Toolbox,
    settings: AgentSettings,
}

impl AgentCrew {
    pub fn new(model: Arc<dyn ChatModel>, toolbox: Toolbox, settings: AgentSettings) -> Self {
        Self {
            model,
            toolbox,
            settings,
        }
    }

    fn opening_prompt(&self, stage: Stage, inputs: &StageInputs, done: &[StageOutput]) -> String {
        let mut prompt = stage.task_prompt(inputs);
        let limit = self.settings.context_chars;
        prompt.push_str("\n\n## Discovery sweep\n");
        prompt.push_str(&truncate_chars(&inputs.discovery_sweep, limit));
        for prior in done {
            prompt.push_str(&format!(
                "\n\n## Output of {}\n{}",
                prior.stage,
                truncate_chars(&prior.output, limit)
            ));
        }
        prompt
    }

    async fn run_stage(&self, stage: Stage, opening: String) -> Result<String> {
        let system = stage.system_prompt();
        let tools = tools::tool_defs(stage.tools());
        let mut messages = vec![Message::user_text(opening)];

        for round in 0..self.settings.max_tool_rounds {
            let resp = self.model.chat(&system, &messages, &tools).await?;
            let tool_uses: Vec<_> = resp.tool_uses().into_iter().cloned().collect();
            if tool_uses.is_empty() {
                return Ok(resp.text());
            }
            tracing::debug!(stage = stage.name(), round, calls = tool_uses.len(), "Tool round");

            messages.push(Message {
                role: Role::Assistant,
                content: resp.content,
            });

            let mut results = Vec::with_capacity(tool_uses.len());
            for tu in &tool_uses {
                let block = match self.toolbox.execute(&tu.name, &tu.input).await {
                    Ok(content) => ToolResultBlock {
                        tool_use_id: tu.id.clone(),
                        content,
                        is_error: false,
                    },
                    Err(e) => {
                        tracing::warn!(stage = stage.name(), tool = %tu.name, error = %e, "Tool failed");
                        ToolResultBlock {
                            tool_use_id: tu.id.clone(),
                            content: format!("Error: {e:#}"),
                            is_error: true,
                        }
                    }
                };
                results.push(ContentBlock::ToolResult(block));
            }
            messages.push(Message {
                role: Role::User,
                content: results,
            });
        }

        tracing::info!(stage = stage.name(), "Tool budget exhausted, asking for conclusion");
        if let Some(last) = messages.last_mut()
            && last.role == Role::User
        {
            last.content.push(ContentBlock::Text {
                text: CONCLUDE_PROMPT.to_string(),
            });
        }
        let resp = self.model.chat(&system, &messages, &[]).await?;
        Ok(resp.text())
    }
}

#[async_trait]
impl StageRunner for AgentCrew {
    async fn run_stages(&self, inputs: &StageInputs) -> Result<Vec<StageOutput>> {
        let mut done: Vec<StageOutput> = Vec::with_capacity(Stage::ALL.len());
        for stage in Stage::ALL {
            tracing::info!(country = %inputs.country, stage = stage.name(), "Running stage");
            let opening = self.opening_prompt(stage, inputs, &done);
            let output = self.run_stage(stage, opening).await?;
            done.push(StageOutput {
                stage: stage.name().to_string(),
                output,
            });
        }
        Ok(done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Pacing;
    use crate::llm::{ChatResponse, ToolDef, ToolUseBlock};
    use crate::scout::Scout;
    use crate::store::RecordStore;
    use crate::web::WebSearch;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct CannedWeb;

    #[async_trait]
    impl WebSearch for CannedWeb {
        async fn search(&self, query: &str) -> Result<String> {
            Ok(format!("hits for {query}"))
        }

        async fn scrape(&self, _url: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    /// Replays queued responses and records what each call saw.
    #[derive(Default)]
    struct ScriptedModel {
        replies: Mutex<VecDeque<ChatResponse>>,
        calls: Mutex<Vec<(String, Vec<Message>, usize)>>,
    }

    impl ScriptedModel {
        fn push(&self, content: Vec<ContentBlock>) {
            self.replies.lock().unwrap().push_back(ChatResponse {
                content,
                stop_reason: None,
                usage: None,
            });
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn chat(
            &self,
            system: &str,
            messages: &[Message],
            tools: &[ToolDef],
        ) -> Result<ChatResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((system.to_string(), messages.to_vec(), tools.len()));
            let next = self.replies.lock().unwrap().pop_front();
            Ok(next.unwrap_or_else(|| ChatResponse {
                content: vec![text("done")],
                stop_reason: None,
                usage: None,
            }))
        }
    }

    fn text(s: &str) -> ContentBlock {
        ContentBlock::Text {
            text: s.to_string(),
        }
    }

    fn tool_use(id: &str, name: &str, input: serde_json::Value) -> ContentBlock {
        ContentBlock::ToolUse(ToolUseBlock {
            id: id.to_string(),
            name: name.to_string(),
            input,
        })
    }

    fn crew_with(model: Arc<ScriptedModel>, max_tool_rounds: usize) -> (tempfile::TempDir, AgentCrew) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RecordStore::open(dir.path().join("store.json")).unwrap());
        let scout = Scout::new(Arc::new(CannedWeb), store, Pacing::none());
        let settings = AgentSettings {
            max_tool_rounds,
            ..AgentSettings::default()
        };
        (dir, AgentCrew::new(model, Toolbox::new(scout), settings))
    }

    fn inputs(ventures: &[String]) -> StageInputs {
        StageInputs::new(&DiscoveryConfig::default(), "Brazil", ventures, 2025, "{}".into())
    }

    #[test]
    fn inputs_join_config_lists() {
        let i = inputs(&[]);
        assert_eq!(i.specific_ventures, "None specified");
        assert_eq!(i.current_year, "2025");
        assert_eq!(i.target_technologies.split(", ").count(), 10);
        assert!(i.funding_stages.starts_with("Pre-Seed, Seed, Series A"));
        assert!(i.known_investors.contains("Kaszek"));
        assert!(Stage::FundingResearch.task_prompt(&i).contains(&i.known_investors));

        let named = inputs(&["Clip".to_string(), "Kavak".to_string()]);
        assert_eq!(named.specific_ventures, "Clip, Kavak");
    }

    #[test]
    fn every_stage_offers_known_tools() {
        for stage in Stage::ALL {
            assert_eq!(tools::tool_defs(stage.tools()).len(), stage.tools().len());
            assert!(stage.system_prompt().contains(stage.role()));
        }
    }

    #[tokio::test]
    async fn stages_run_in_order_with_prior_context() {
        let model = Arc::new(ScriptedModel::default());
        for name in ["found A", "qualified A", "f", "l", "m", "final"] {
            model.push(vec![text(name)]);
        }
        let (_dir, crew) = crew_with(model.clone(), 4);

        let outputs = crew.run_stages(&inputs(&[])).await.unwrap();
        let names: Vec<&str> = outputs.iter().map(|o| o.stage.as_str()).collect();
        assert_eq!(
            names,
            Stage::ALL.iter().map(|s| s.name()).collect::<Vec<_>>()
        );
        assert_eq!(outputs[0].output, "found A");
        assert_eq!(outputs[5].output, "final");

        let calls = model.calls.lock().unwrap();
        assert_eq!(calls.len(), 6);
        let ContentBlock::Text { text: opening } = &calls[1].1[0].content[0] else {
            panic!("expected text opening");
        };
        assert!(opening.contains("## Output of discovery\nfound A"));
    }

    #[tokio::test]
    async fn tool_errors_go_back_to_the_model() {
        let model = Arc::new(ScriptedModel::default());
        model.push(vec![
            text("Let me search."),
            tool_use("tu_1", WEB_SEARCH, json!({"query": "Brazil AI"})),
            tool_use("tu_2", "deploy", json!({})),
        ]);
        model.push(vec![text("discovery result")]);
        let (_dir, crew) = crew_with(model.clone(), 4);

        let out = crew
            .run_stage(Stage::Discovery, "go".to_string())
            .await
            .unwrap();
        assert_eq!(out, "discovery result");

        let calls = model.calls.lock().unwrap();
        let second = &calls[1].1;
        assert_eq!(second.len(), 3);
        assert_eq!(second[1].role, Role::Assistant);
        let ContentBlock::ToolResult(ok) = &second[2].content[0] else {
            panic!("expected tool result");
        };
        assert_eq!(ok.content, "hits for Brazil AI");
        assert!(!ok.is_error);
        let ContentBlock::ToolResult(err) = &second[2].content[1] else {
            panic!("expected tool result");
        };
        assert!(err.is_error);
        assert!(err.content.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn exhausted_budget_asks_for_a_conclusion_without_tools() {
        let model = Arc::new(ScriptedModel::default());
        for i in 0..2 {
            model.push(vec![tool_use(&format!("tu_{i}"), WEB_SEARCH, json!({"query": "q"}))]);
        }
        model.push(vec![text("concluded")]);
        let (_dir, crew) = crew_with(model.clone(), 2);

        let out = crew
            .run_stage(Stage::MarketAnalysis, "go".to_string())
            .await
            .unwrap();
        assert_eq!(out, "concluded");

        let calls = model.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].2, 2);
        assert_eq!(calls[2].2, 0);
        let last = calls[2].1.last().unwrap();
        assert!(matches!(
            last.content.last(),
            Some(ContentBlock::Text { text }) if text == CONCLUDE_PROMPT
        ));
    }
}
