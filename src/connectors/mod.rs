/// Connection transport mechanisms for MCP
///
/// Only the stdio transport is needed: the tool server always runs as a
/// subprocess speaking newline-delimited JSON-RPC.

pub mod base;
pub mod stdio;

pub use base::Connector;
pub use stdio::StdioConnector;
