use clap::{Parser, Subcommand};
use std::path::PathBuf;
use anyhow::Result;

use crate::core::{Engine, GenerateOptions};

#[derive(Parser)]
#[command(name = "auto-swagger")]
#[command(about = "Writes Swagger JSDoc for undocumented Express routes")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Document routes and commit the result on the documentation branch
    Generate {
        /// Repository to document
        #[arg(short, long, default_value = ".")]
        repo: PathBuf,

        /// Compare against this branch instead of HEAD
        #[arg(short, long)]
        branch: Option<String>,

        /// Document every API file instead of only changed ones
        #[arg(long)]
        all: bool,

        /// Apply the comments but do not commit them
        #[arg(long)]
        no_commit: bool,

        /// Show which routes would be documented without calling the model
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the extracted route contexts as JSON
    Scan {
        /// Repository to scan
        #[arg(short, long, default_value = ".")]
        repo: PathBuf,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build a JSONL fine-tuning dataset from documented routes
    PrepareFinetune {
        /// Directory of documented route files
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output JSONL file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a default configuration file
    Init {
        /// Target directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

impl Cli {
    pub async fn execute(self, engine: Engine) -> Result<()> {
        match self.command {
            Commands::Generate { repo, branch, all, no_commit, dry_run } => {
                engine
                    .generate(GenerateOptions { repo, branch, all, no_commit, dry_run })
                    .await
            }
            Commands::Scan { repo, output } => {
                engine.scan(repo, output).await
            }
            Commands::PrepareFinetune { input, output } => {
                engine.prepare_finetune(input, output).await
            }
            Commands::Init { path } => {
                engine.init(path).await
            }
        }
    }
}
