use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to start server '{server}': {reason}")]
    ServerStartup { server: String, reason: String },

    #[error("Failed to shut down server '{server}': {reason}")]
    ServerShutdown { server: String, reason: String },

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("JSON-RPC error {code}: {message}")]
    RpcError { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0}s")]
    Timeout(u64),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Duplicate tool names across MCP servers: {0}")]
    DuplicateTool(String),

    #[error("LLM error: {0}")]
    LLMError(String),

    #[error("Max turns ({0}) exceeded")]
    MaxTurnsExceeded(usize),

    #[error("Invalid agent: {0}")]
    InvalidAgent(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// JSON-RPC errors reported by the server itself, as opposed to transport failures
    pub fn is_remote(&self) -> bool {
        matches!(self, Error::RpcError { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_error_message() {
        let err = Error::ServerStartup {
            server: "playwright".to_string(),
            reason: "No such file or directory".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to start server 'playwright': No such file or directory"
        );
    }

    #[test]
    fn test_rpc_error_is_remote() {
        let err = Error::RpcError {
            code: -32601,
            message: "Method not found".to_string(),
        };
        assert!(err.is_remote());
        assert!(!Error::Timeout(5).is_remote());
    }
}
