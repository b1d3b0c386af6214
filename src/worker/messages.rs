//! Worker message types for scheduler ⇄ collaborator communication.
//!
//! Storage and network collaborators are asynchronous. The scheduler posts a
//! [`WorkerMessage`] as an action and later receives the [`WorkerResponse`] as
//! an ordinary event. Messages carry the poster's trace context so worker spans
//! link to the scheduler step that caused them.

use crate::domain::{FeedItem, ItemId};
use serde::{Deserialize, Serialize};

/// Distributed tracing context for cross-thread span propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    /// OpenTelemetry trace ID as a hex string.
    pub trace_id: String,

    /// Parent span ID for linking spans across threads.
    pub parent_span_id: String,
}

impl TraceContext {
    /// Captures the trace and span IDs of the current span.
    ///
    /// Returns `None` when no valid OpenTelemetry context is active, which is
    /// the case whenever tracing was not initialized.
    pub fn from_current() -> Option<Self> {
        use opentelemetry::trace::TraceContextExt;
        use tracing_opentelemetry::OpenTelemetrySpanExt;

        let otel_context = tracing::Span::current().context();
        let span_ref = otel_context.span();
        let span_context = span_ref.span_context();

        if !span_context.is_valid() {
            return None;
        }

        Some(Self {
            trace_id: format!("{:032x}", span_context.trace_id()),
            parent_span_id: format!("{:016x}", span_context.span_id()),
        })
    }
}

/// Generates constructors that attach the current trace context.
macro_rules! worker_message_builders {
    (
        $(
            $builder_name:ident($variant:ident { $($field:ident: $ty:ty),* $(,)? })
        ),* $(,)?
    ) => {
        impl WorkerMessage {
            $(
                #[doc = concat!("Create a ", stringify!($variant), " message with current trace context")]
                pub fn $builder_name($($field: $ty),*) -> Self {
                    Self::$variant {
                        $($field,)*
                        trace_context: TraceContext::from_current(),
                    }
                }
            )*
        }
    };
}

worker_message_builders! {
    load_saved(LoadSaved {}),
    save_item(SetSaved { item_id: ItemId, saved: bool }),
    reload(Reload { limit: usize }),
    load_more(LoadMore { cursor: Option<String>, limit: usize }),
    submit_report(SubmitReport { item_id: ItemId, reason: String }),
}

/// Requests from the scheduler to its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerMessage {
    /// Read the persisted saved-set.
    LoadSaved {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trace_context: Option<TraceContext>,
    },

    /// Add an item to (`saved = true`) or remove it from the saved-set.
    SetSaved {
        item_id: ItemId,
        saved: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trace_context: Option<TraceContext>,
    },

    /// Fetch the first page, replacing the feed.
    Reload {
        limit: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trace_context: Option<TraceContext>,
    },

    /// Fetch the page after `cursor`.
    LoadMore {
        cursor: Option<String>,
        limit: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trace_context: Option<TraceContext>,
    },

    /// Forward a report to moderation.
    SubmitReport {
        item_id: ItemId,
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trace_context: Option<TraceContext>,
    },
}

impl WorkerMessage {
    /// Trace context attached when the message was built.
    #[must_use]
    pub fn trace_context(&self) -> Option<&TraceContext> {
        match self {
            Self::LoadSaved { trace_context }
            | Self::SetSaved { trace_context, .. }
            | Self::Reload { trace_context, .. }
            | Self::LoadMore { trace_context, .. }
            | Self::SubmitReport { trace_context, .. } => trace_context.as_ref(),
        }
    }
}

/// Completions delivered back to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerResponse {
    /// The persisted saved-set.
    SavedLoaded { item_ids: Vec<ItemId> },

    /// A save/unsave was persisted (or already matched storage).
    SavedChanged { item_id: ItemId, saved: bool },

    /// A save/unsave failed after retries.
    SaveFailed {
        item_id: ItemId,
        saved: bool,
        message: String,
    },

    /// A page arrived. `replace` is set for reloads.
    PageLoaded {
        items: Vec<FeedItem>,
        next_cursor: Option<String>,
        replace: bool,
    },

    /// A page request failed after retries.
    PageFailed { message: String },

    /// A report was accepted.
    ReportSubmitted { item_id: ItemId },

    /// A report submission failed after retries.
    ReportFailed { item_id: ItemId, message: String },

    /// Any other failure, such as an uninitialized collaborator.
    Error { message: String },
}
