use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "notes", about = "Notes: a small persistent notebook", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the store (overrides the config file)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a note
    Add(AddArgs),
    /// Change the title or body of a note
    Edit(EditArgs),
    /// Show one note
    Show(IdArgs),
    /// List every note
    List,
    /// Delete a note
    Delete(IdArgs),
    /// Rewrite the store log with only live notes
    Compact,
}

#[derive(Args)]
pub struct AddArgs {
    #[arg(short, long, default_value = "")]
    pub title: String,
    #[arg(short, long, default_value = "")]
    pub note: String,
}

#[derive(Args)]
pub struct EditArgs {
    pub id: u64,
    #[arg(short, long)]
    pub title: Option<String>,
    #[arg(short, long)]
    pub note: Option<String>,
}

#[derive(Args)]
pub struct IdArgs {
    pub id: u64,
}
