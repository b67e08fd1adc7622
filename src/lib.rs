//! Natural-language analysis of tabular data through a routed,
//! multi-agent pipeline with a scripting sandbox and a chart tool.

pub mod cli;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod llm;
pub mod pipeline;
pub mod router;
pub mod tools;

pub use engine::{AnalysisResult, Engine};
