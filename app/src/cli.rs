//! CLI definitions for Marcanet.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Marcanet CLI.
#[derive(Parser)]
#[command(name = "marcanet")]
#[command(about = "Trademark availability and phonetic similarity searches")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "MARCANET_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Check whether a mark name looks available
    Denomination {
        /// Mark name to check
        mark: String,
    },

    /// Collect phonetically similar registered marks
    Phonetic {
        /// Mark name to search for
        mark: String,

        /// Restrict to one Nice class (1-45)
        #[arg(long = "class", value_parser = clap::value_parser!(u8).range(1..=45))]
        nice_class: Option<u8>,

        /// Score the results and estimate registration viability
        #[arg(long)]
        assess: bool,
    },
}
