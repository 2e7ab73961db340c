//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    completions::CompletionsArgs,
    index::IndexCommands,
    init::InitArgs,
    list::ListArgs,
    overview::OverviewArgs,
    related::RelatedArgs,
    show::ShowArgs,
    transition::{TransitionArgs, TransitionsArgs},
    tree::TreeArgs,
};

#[derive(Parser)]
#[command(name = "wl")]
#[command(author, version, about = "Workline - work items as plain-text Markdown")]
#[command(long_about = "Keeps a derived index of epics, issues, tasks and pull requests stored as Markdown files, resolves their relationships and enforces the status workflow.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging unless WORKLINE_LOG is set)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .workline/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new workline project
    Init(InitArgs),

    /// Index maintenance: rebuild, status, validate, repair, clear
    #[command(subcommand)]
    Index(IndexCommands),

    /// List items of one type
    List(ListArgs),

    /// Show a single item
    Show(ShowArgs),

    /// Show an item with its ancestors and descendants
    Tree(TreeArgs),

    /// Show what an item waits on and what waits on it
    Related(RelatedArgs),

    /// Show the states an item can move to
    Transitions(TransitionsArgs),

    /// Move an item to a new workflow state
    Transition(TransitionArgs),

    /// Project-wide counts, completion and recent activity
    Overview(OverviewArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Automatically detect based on context (table for lists, text for details)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// Markdown tables
    Md,
    /// Just IDs, one per line
    Id,
}
