use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum LxdMcpError {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("Failed connecting to LXD: {source}")]
    #[diagnostic(help("ensure the LXD daemon is running and {socket} is accessible to this user"))]
    Connect {
        socket: String,
        #[source]
        source: BackendError,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Failures reported by, or while talking to, the hypervisor daemon.
#[derive(Debug, Error, Diagnostic)]
pub enum BackendError {
    #[error("cannot reach {socket}: {message}")]
    Connect { socket: String, message: String },

    #[error("{message}")]
    Transport { message: String },

    /// The daemon rejected the request (`error` envelope or non-2xx status).
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("{message}")]
    OperationFailed { message: String },

    #[error("Operation cancelled")]
    OperationCancelled,

    #[error("Invalid response from LXD: {message}")]
    Decode { message: String },
}

/// Why an execution's exit status could not be read from its terminal metadata.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExitCodeError {
    #[error("operation reported no metadata")]
    NoMetadata,

    #[error("metadata has no \"return\" field")]
    Missing,

    #[error("\"return\" is not an integer exit status: {value}")]
    NotNumeric { value: String },
}

/// The reason text handed back to the calling agent. Every variant names the
/// step that failed.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    /// Submission or synchronous read rejected before any wait.
    #[error("{context}: {source}")]
    Backend {
        context: &'static str,
        #[source]
        source: BackendError,
    },

    /// The operation was accepted but did not reach Success.
    #[error("{context}: {source}")]
    Operation {
        context: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("{0} parameter is required")]
    MissingParameter(&'static str),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Command finished but its exit code could not be read: {0}")]
    ExitCode(#[from] ExitCodeError),

    #[error("Failed formatting result: {0}")]
    Render(#[from] serde_json::Error),
}
