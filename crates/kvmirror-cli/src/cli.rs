use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "kvm",
    about = "kvmirror: inspect and repair collections in a live store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML file with store settings (KVMIRROR_* variables override it)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Key prefix, overriding the configured one
    #[arg(long, global = true)]
    pub prefix: Option<String>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Print the raw value of a cell
    Get { name: String },
    /// Store a raw value in a cell
    Put { name: String, value: String },
    /// Delete a cell
    Del { name: String },
    /// List the members of a set
    Members { name: String },
    /// Add members to a set
    Sadd {
        name: String,
        #[arg(required = true)]
        members: Vec<String>,
    },
    /// Remove members from a set
    Srem {
        name: String,
        #[arg(required = true)]
        members: Vec<String>,
    },
    /// Check set membership
    Sismember { name: String, member: String },
    /// List the entries of a map
    Hgetall { name: String },
    /// Set one map entry
    Hset {
        name: String,
        field: String,
        value: String,
    },
    /// Print one map entry
    Hget { name: String, field: String },
    /// Remove map entries
    Hdel {
        name: String,
        #[arg(required = true)]
        fields: Vec<String>,
    },
    /// Delete a whole map
    Hclear { name: String },
}
