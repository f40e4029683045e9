pub mod classifier;
pub mod config;
pub mod explainer;
pub mod guard;
pub mod history;
pub mod incident;
pub mod llm;
pub mod normalizer;
pub mod pipeline;
pub mod terminal;
