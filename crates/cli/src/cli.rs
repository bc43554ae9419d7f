use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Publish and update performance templates
#[derive(Debug, Parser)]
#[command(name = "cuecast")]
#[command(version, about = "Publish and update performance templates")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Publish a template into a language section for the first time
    Publish {
        /// Template directory
        dir: PathBuf,

        /// Language section to publish into
        section: String,
    },

    /// Send the changes made since the last sync
    Update {
        /// Template directory
        dir: PathBuf,

        /// Replace the server copy if the server reports a conflict
        #[arg(long)]
        force: bool,
    },

    /// Show local sync state and the server's processing status
    Status {
        /// Template directory
        dir: PathBuf,
    },

    /// List published templates across language sections, newest first
    List {
        /// Language sections to list
        #[arg(required = true)]
        sections: Vec<String>,
    },

    /// Show the entries of a package archive
    Inspect {
        /// Package archive
        package: PathBuf,
    },

    /// Download a package
    Fetch {
        /// Package URL, absolute or relative to the API base
        url: String,

        /// Output file
        out: PathBuf,
    },
}
