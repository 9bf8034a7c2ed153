use std::path::Path;

use clap::Parser;
use serde_json::Value;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use lxd_mcp::backend::lxd::LxdClient;
use lxd_mcp::cli::{Cli, Command};
use lxd_mcp::config;
use lxd_mcp::error::{LxdMcpError, ToolError};
use lxd_mcp::logging;
use lxd_mcp::{mcp, tools};

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Stdout carries the protocol; every log line goes to stderr.
    let terminal_filter = if cli.verbose {
        EnvFilter::new("lxd_mcp=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lxd_mcp=info"))
    };

    let terminal_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(terminal_filter);

    // File layer: always captures lxd_mcp=debug, initially discards until activated
    let (file_writer, file_handle) = logging::DeferredFileWriter::new();
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_filter(EnvFilter::new("lxd_mcp=debug"));

    tracing_subscriber::registry()
        .with(terminal_layer)
        .with(file_layer)
        .init();

    match cli.command {
        // Listing tools needs neither config nor a daemon
        Command::Tools => {
            for tool in tools::TOOLS {
                println!("{:<20} {}", tool.name, tool.description);
            }
        }
        Command::Serve => {
            let config = load_config(cli.config.as_deref(), &file_handle)?;
            let client = connect(&config).await?;
            mcp::serve(&client, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;
        }
        Command::Call { tool, args } => {
            let config = load_config(cli.config.as_deref(), &file_handle)?;
            if tools::find(&tool).is_none() {
                return Err(LxdMcpError::from(ToolError::UnknownTool(tool)).into());
            }
            let args = parse_args(&tool, args.as_deref())?;
            let client = connect(&config).await?;
            let report = tools::call(&client, &tool, args)
                .await
                .map_err(LxdMcpError::from)?;
            println!("{report}");
        }
    }

    Ok(())
}

/// Load the config and, when a log file is configured, start writing to it.
fn load_config(
    path: Option<&Path>,
    file_handle: &logging::DeferredFileHandle,
) -> Result<config::Config, LxdMcpError> {
    let config = config::load_config(path)?;

    if let Some(file) = &config.log.file {
        file_handle
            .set_file(Path::new(file))
            .map_err(|source| LxdMcpError::Io {
                context: format!("failed to open log file {file}"),
                source,
            })?;
    }

    Ok(config)
}

async fn connect(config: &config::Config) -> Result<LxdClient, LxdMcpError> {
    LxdClient::connect(&config.lxd)
        .await
        .map_err(|source| LxdMcpError::Connect {
            socket: config.lxd.socket_path().display().to_string(),
            source,
        })
}

fn parse_args(tool: &str, args: Option<&str>) -> Result<Value, LxdMcpError> {
    let Some(args) = args else {
        return Ok(Value::Null);
    };
    serde_json::from_str(args).map_err(|e| {
        LxdMcpError::from(ToolError::InvalidArguments {
            tool: tool.to_string(),
            message: format!("arguments are not valid JSON: {e}"),
        })
    })
}
