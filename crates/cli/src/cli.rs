use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// SQL risk gating from the command line.
///
/// Administers the policy catalog and assesses work orders offline against
/// recorded database facts.
#[derive(Parser, Debug)]
#[command(name = "sqlrisk", version, about = "Classify SQL work orders by risk")]
pub struct CliArgs {
    /// Configuration profile; selects `{PROFILE}_{KEY}` environment overrides.
    #[arg(long, global = true, env = "SQLRISK_PROFILE")]
    pub profile: Option<String>,

    /// Policy store backend: file or sqlite (default from SQLRISK_POLICY_STORE)
    #[arg(long, global = true)]
    pub store: Option<String>,

    /// Policy store location (default from SQLRISK_POLICY_PATH)
    #[arg(long, global = true)]
    pub policy_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage the policy catalog
    Policy {
        #[command(subcommand)]
        action: PolicyCommand,
    },
    /// Assess a work order against recorded facts
    Check(CheckArgs),
}

#[derive(Subcommand, Debug)]
pub enum PolicyCommand {
    /// Create the store and seed the default policies
    Init,
    /// List active policies with their compiled expressions
    List {
        #[arg(long)]
        json: bool,
    },
    /// Validate and compile the stored policies
    Validate,
    /// Print the rule catalog
    Catalog {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Database the work order is declared against
    #[arg(long, short)]
    pub database: String,

    /// File holding the work-order SQL
    #[arg(long, conflicts_with = "stdin", required_unless_present = "stdin")]
    pub sql: Option<PathBuf>,

    /// Read the work-order SQL from standard input
    #[arg(long)]
    pub stdin: bool,

    /// YAML document of table and host facts
    #[arg(long)]
    pub facts: PathBuf,

    /// Print the full assessment as JSON
    #[arg(long)]
    pub json: bool,
}
