pub mod admin;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod fetch;
pub mod github;
pub mod orchestrator;
pub mod repo_scoring;
pub mod report;
