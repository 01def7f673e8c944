use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use debhub_core::package::Component;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Publish .deb assets of GitHub releases as an APT repository",
    arg_required_else_help = true
)]
pub struct Args {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// User agent sent with HTTP requests
    #[arg(short = 'A', long, global = true)]
    pub user_agent: Option<String>,

    /// Extra HTTP header, as `Name: value` (repeatable)
    #[arg(short = 'H', long, global = true)]
    pub header: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build an APT index from the release assets of an owner or repository
    #[clap(name = "build")]
    Build {
        /// GitHub user or organization
        owner: String,

        /// Repository; all of the owner's repositories when omitted
        repo: Option<String>,

        /// Directory the index is written to
        #[arg(short, long)]
        output: PathBuf,

        /// Only publish packages of this suite, plus suite-less ones
        #[arg(short, long, default_value = "")]
        suite: String,

        /// Publish stable releases or pre-releases
        #[arg(long, default_value = "releases")]
        component: Component,

        /// Lay the index out as dists/<codename>/<component>/binary-<arch>
        #[arg(short, long)]
        partitioned: bool,
    },

    /// Show how every release asset of an owner or repository loads
    #[clap(name = "status")]
    Status {
        /// GitHub user or organization
        owner: String,

        /// Repository; all of the owner's repositories when omitted
        repo: Option<String>,
    },

    /// Print the control block of a local .deb file
    #[clap(name = "inspect")]
    Inspect {
        /// Path to the package
        file: PathBuf,
    },

    /// Print the armored public key of the signing key
    #[clap(name = "export-key")]
    ExportKey,

    /// Remove the package cache directory
    #[clap(name = "clean")]
    Clean,

    /// Print the resolved configuration
    #[clap(name = "config")]
    Config,
}
