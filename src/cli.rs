//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Page data inheritance for wikitext: render pages and query published fields
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Config file name (default: usingdata.toml)
    #[arg(short = 'C', long, default_value = "usingdata.toml")]
    pub config: PathBuf,

    /// Report discovery, redirects and skipped fetches on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Render one page to stdout
    Render {
        /// Page name; the configured main page when omitted
        page: Option<String>,
    },

    /// Print one field another page publishes with #data
    Query {
        /// Page name with an optional #fragment, e.g. "Sword#Stats"
        target: String,

        /// Field name
        field: String,

        /// Printed when the field is not declared
        #[arg(long)]
        default: Option<String>,
    },

    /// Dump the data a page publishes as JSON
    Inspect {
        /// Page name
        page: String,
    },

    /// Render every page into the output directory
    Build {
        /// Clean output directory completely before building
        #[arg(long)]
        clean: bool,
    },
}

#[allow(unused)]
impl Cli {
    pub const fn is_render(&self) -> bool {
        matches!(self.command, Commands::Render { .. })
    }
    pub const fn is_query(&self) -> bool {
        matches!(self.command, Commands::Query { .. })
    }
    pub const fn is_inspect(&self) -> bool {
        matches!(self.command, Commands::Inspect { .. })
    }
    pub const fn is_build(&self) -> bool {
        matches!(self.command, Commands::Build { .. })
    }

    /// `--clean` of the build command, `None` for other commands.
    pub const fn clean_flag(&self) -> Option<bool> {
        match &self.command {
            Commands::Build { clean } => Some(*clean),
            _ => None,
        }
    }
}
