//! The static command surface. The `check` subcommand's per-provider flags
//! are synthesized at runtime from the registry; see `adhoc`.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::render::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "platform-health",
    version,
    about = "Distributed health-check aggregator"
)]
pub struct Cli {
    /// Raise log verbosity (repeatable)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Quieter output: -q hides healthy children, -qq drops children,
    /// -qqq exit code only
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the gRPC health server
    Server {
        /// Path to the YAML configuration
        #[arg(short, long)]
        config: PathBuf,

        /// Listen address
        #[arg(short, long, default_value = "127.0.0.1:50059")]
        listen: SocketAddr,

        /// Identifier used for federation loop detection (defaults to the
        /// listen address)
        #[arg(long)]
        server_id: Option<String>,

        /// Reject the config on any warning instead of degrading
        #[arg(long)]
        strict: bool,

        /// Cap on concurrent probes (defaults to the CPU count)
        #[arg(long)]
        parallelism: Option<usize>,

        /// Disable hot reload
        #[arg(long)]
        no_watch: bool,
    },

    /// Query a running server and render the response
    Client {
        /// Server address (host:port); overrides the active context
        #[arg(short, long)]
        server: Option<String>,

        /// Named context to use instead of --server
        #[arg(long)]
        context: Option<String>,

        /// Component path to check (repeatable); empty means everything
        #[arg(short, long = "component")]
        components: Vec<String>,

        /// Stop probing after the first unhealthy component
        #[arg(long)]
        fail_fast: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "yaml")]
        output: OutputFormat,
    },

    /// Probe a single provider ad hoc, e.g. `check http --url https://e.com`
    Check {
        /// Provider type followed by its flags
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Load a configuration strictly and report every problem
    Validate {
        /// Path to the YAML configuration
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Rewrite a legacy flat config into the current shape
    Migrate {
        /// Legacy YAML file
        input: PathBuf,

        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage named server contexts for the client
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ContextAction {
    /// List stored contexts
    List,
    /// Print the active context
    Show,
    /// Add or update a context
    Set {
        name: String,
        /// Server address (host:port)
        #[arg(long)]
        server: String,
    },
    /// Mark a context as the default for `client`
    Use { name: String },
}
