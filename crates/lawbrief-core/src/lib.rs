pub mod chart;
pub mod chunk;
pub mod config;
pub mod detect;
pub mod extract;
pub mod llm;
pub mod mail;
pub mod pipeline;
pub mod qa;
pub mod regulatory;
pub mod report;
pub mod session;
pub mod summarize;
pub mod types;

pub use types::*;
