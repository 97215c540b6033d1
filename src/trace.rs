/// Trace context for correlating one workflow's runs.
///
/// The trace is an ordinary value handed to the runner, not process-wide state.
use chrono::{DateTime, Utc};
use uuid::Uuid;

const TRACE_VIEWER_BASE: &str = "https://platform.openai.com/traces";

/// Generate a new trace id: `trace_` followed by 32 lowercase hex digits
pub fn gen_trace_id() -> String {
    format!("trace_{}", Uuid::new_v4().simple())
}

#[derive(Debug, Clone)]
pub struct Trace {
    pub workflow_name: String,
    pub trace_id: String,
    pub started_at: DateTime<Utc>,
}

impl Trace {
    pub fn new(workflow_name: impl Into<String>) -> Self {
        Self::with_id(workflow_name, gen_trace_id())
    }

    pub fn with_id(workflow_name: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            trace_id: trace_id.into(),
            started_at: Utc::now(),
        }
    }

    /// Where the trace can be inspected
    pub fn url(&self) -> String {
        format!("{}/{}", TRACE_VIEWER_BASE, self.trace_id)
    }

    /// Span that tags every event of a run with this trace
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "workflow",
            name = %self.workflow_name,
            trace_id = %self.trace_id
        )
    }
}
