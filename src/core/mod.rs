mod engine;
mod parser;
mod text;
mod params;
mod schema;
mod responses;
mod validation;
mod resource;
mod context;
mod changes;
mod git;
mod finetune;
mod llm;

// Framework-specific route extractors
mod languages;

pub use parser::{CodeParser, SourceFile};
pub use context::{ApiContext, ContextAssembler};
pub use changes::{Change, ChangeApplier};
pub use git::GitWorkspace;
pub use finetune::DatasetBuilder;
pub use llm::{
    create_documenter, CompletionRequest, CompletionResponse, DocGenerator, LlmDocumenter,
};

// Export the main engine
pub use engine::{Engine, GenerateOptions};
