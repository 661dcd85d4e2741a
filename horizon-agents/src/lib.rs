//! horizon-agents: LLM agent crew that discovers AI startups in Latin America.
//!
//! - Scout: paced web searches, line extraction, store merge
//! - Crew: six sequential analysis stages with tool use
//! - Pipeline: per-country runs and report files

pub mod config;
pub mod crew;
pub mod extract;
pub mod llm;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod scout;
pub mod site;
pub mod store;
pub mod tools;
pub mod web;
