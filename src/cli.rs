use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "lxd-mcp",
    version,
    about = "MCP server for LXD instance lifecycle management"
)]
pub struct Cli {
    /// Path to config file [default: ~/.config/lxd-mcp/config.toml]
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve MCP requests on stdin/stdout
    Serve,

    /// List the available tools
    Tools,

    /// Invoke a single tool and print its result
    Call {
        /// Tool name (see `lxd-mcp tools`)
        tool: String,

        /// Tool arguments as a JSON object
        args: Option<String>,
    },
}
