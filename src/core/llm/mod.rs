//! LLM integration for writing route documentation
//!
//! A trait-based seam over model providers, plus the generator that prompts the
//! model, validates its reply and turns it into positioned changes.

mod documenter;
mod generator;
mod providers;

pub use documenter::{CompletionRequest, CompletionResponse, LlmDocumenter};
pub use generator::DocGenerator;
pub use providers::create_documenter;
