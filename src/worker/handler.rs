//! Collaborator worker executing storage and content operations.
//!
//! [`FeedWorker`] owns the storage backend and content store and turns each
//! [`WorkerMessage`] into exactly one [`WorkerResponse`]. Failed operations
//! are retried a configured number of times before an error response is
//! produced; the scheduler only ever sees the final outcome.

use crate::domain::error::{FeedError, Result};
use crate::domain::ItemId;
use crate::feed::{ContentPage, ContentStore};
use crate::infrastructure::paths;
use crate::storage::backend::Storage;
use crate::storage::models::ReportRecord;
use crate::storage::JsonStorage;
use crate::worker::{WorkerMessage, WorkerResponse};
use crate::Config;

/// Worker state: the collaborators it drives and its retry policy.
///
/// Backends are optional so a worker can run with only one of them (the
/// replay binary may omit a catalog); messages for a missing backend produce
/// [`WorkerResponse::Error`].
#[derive(Default)]
pub struct FeedWorker {
    storage: Option<Box<dyn Storage>>,
    content: Option<Box<dyn ContentStore>>,
    retries: u32,
}

impl FeedWorker {
    /// Creates a worker from explicit collaborators.
    #[must_use]
    pub fn new(storage: Box<dyn Storage>, content: Box<dyn ContentStore>, retries: u32) -> Self {
        Self {
            storage: Some(storage),
            content: Some(content),
            retries,
        }
    }

    /// Creates a worker backed by `reelfeed.json` in the configured data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage file cannot be opened.
    pub fn from_config(config: &Config, content: Option<Box<dyn ContentStore>>) -> Result<Self> {
        let path = paths::get_data_dir(config).join("reelfeed.json");
        let storage: Box<dyn Storage> = Box::new(JsonStorage::new(path)?);
        Ok(Self {
            storage: Some(storage),
            content,
            retries: config.save_retries,
        })
    }

    fn get_storage(&mut self) -> Result<&mut Box<dyn Storage>> {
        self.storage
            .as_mut()
            .ok_or_else(|| FeedError::Worker("Storage not initialized".to_string()))
    }

    fn get_content(&mut self) -> Result<&mut Box<dyn ContentStore>> {
        self.content
            .as_mut()
            .ok_or_else(|| FeedError::Worker("Content store not initialized".to_string()))
    }

    /// Runs `op` up to `retries + 1` times, returning the first success or a
    /// [`FeedError::TransientIo`] carrying the last failure.
    fn with_retries<T, F>(&mut self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut(&mut Self) -> Result<T>,
    {
        let attempts = self.retries.saturating_add(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match op(self) {
                Ok(value) => return Ok(value),
                Err(e @ FeedError::Worker(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(operation, attempt, attempts, error = %e, "collaborator operation failed");
                    last_error = Some(e);
                }
            }
        }
        let message = last_error.map_or_else(|| "no attempts made".to_string(), |e| e.to_string());
        Err(FeedError::TransientIo(format!("{operation}: {message}")))
    }

    fn handle_load_saved(&mut self) -> WorkerResponse {
        match self.with_retries("load saved", |w| w.get_storage()?.get_saved()) {
            Ok(records) => WorkerResponse::SavedLoaded {
                item_ids: records.into_iter().map(|r| r.item_id).collect(),
            },
            Err(e) => WorkerResponse::Error { message: e.to_string() },
        }
    }

    fn handle_set_saved(&mut self, item_id: ItemId, saved: bool) -> WorkerResponse {
        match self.with_retries("set saved", |w| w.get_storage()?.set_saved(&item_id, saved)) {
            Ok(changed) => {
                tracing::debug!(item_id = %item_id, saved, changed, "saved state persisted");
                WorkerResponse::SavedChanged { item_id, saved }
            }
            Err(e) => WorkerResponse::SaveFailed {
                item_id,
                saved,
                message: e.to_string(),
            },
        }
    }

    fn handle_page(&mut self, cursor: Option<String>, limit: usize, replace: bool) -> WorkerResponse {
        let operation = if replace { "reload" } else { "load more" };
        let result = self.with_retries(operation, |w| w.get_content()?.load_page(cursor.as_deref(), limit));
        match result {
            Ok(ContentPage { items, next_cursor }) => {
                tracing::debug!(count = items.len(), replace, "page loaded");
                WorkerResponse::PageLoaded {
                    items,
                    next_cursor,
                    replace,
                }
            }
            Err(e) => WorkerResponse::PageFailed { message: e.to_string() },
        }
    }

    fn handle_submit_report(&mut self, item_id: ItemId, reason: String) -> WorkerResponse {
        let report = ReportRecord::new(item_id.clone(), reason);
        match self.with_retries("submit report", |w| w.get_storage()?.record_report(&report)) {
            Ok(()) => WorkerResponse::ReportSubmitted { item_id },
            Err(e) => WorkerResponse::ReportFailed {
                item_id,
                message: e.to_string(),
            },
        }
    }

    /// Links spans created here to the span that posted the message.
    fn attach_parent_trace_context(message: &WorkerMessage) -> Option<opentelemetry::ContextGuard> {
        use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState};

        let trace_context = message.trace_context()?;
        let trace_id = TraceId::from_hex(&trace_context.trace_id).ok()?;
        let span_id = SpanId::from_hex(&trace_context.parent_span_id).ok()?;

        let span_context = SpanContext::new(trace_id, span_id, TraceFlags::SAMPLED, true, TraceState::default());
        let otel_context = opentelemetry::Context::current().with_remote_span_context(span_context);

        Some(otel_context.attach())
    }

    /// Processes one message and returns its response.
    pub fn handle_message(&mut self, message: WorkerMessage) -> WorkerResponse {
        let _context_guard = Self::attach_parent_trace_context(&message);
        let _span = tracing::debug_span!("worker_handle_message", message_type = ?message).entered();

        match message {
            WorkerMessage::LoadSaved { .. } => self.handle_load_saved(),
            WorkerMessage::SetSaved { item_id, saved, .. } => self.handle_set_saved(item_id, saved),
            WorkerMessage::Reload { limit, .. } => self.handle_page(None, limit, true),
            WorkerMessage::LoadMore { cursor, limit, .. } => self.handle_page(cursor, limit, false),
            WorkerMessage::SubmitReport { item_id, reason, .. } => self.handle_submit_report(item_id, reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FeedItem;
    use crate::storage::models::SavedRecord;
    use std::collections::BTreeSet;

    /// Storage that fails the first `failures` writes.
    struct FlakyStorage {
        failures: u32,
        saved: BTreeSet<ItemId>,
        writes: u32,
    }

    impl Storage for FlakyStorage {
        fn get_saved(&self) -> Result<Vec<SavedRecord>> {
            Ok(self.saved.iter().cloned().map(SavedRecord::new).collect())
        }
        fn set_saved(&mut self, item_id: &ItemId, saved: bool) -> Result<bool> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(FeedError::Storage("disk busy".into()));
            }
            self.writes += 1;
            Ok(if saved {
                self.saved.insert(item_id.clone())
            } else {
                self.saved.remove(item_id)
            })
        }
        fn record_report(&mut self, _report: &ReportRecord) -> Result<()> {
            Err(FeedError::Storage("moderation offline".into()))
        }
    }

    struct OnePage;

    impl ContentStore for OnePage {
        fn load_page(&mut self, _cursor: Option<&str>, _limit: usize) -> Result<ContentPage> {
            Ok(ContentPage {
                items: vec![FeedItem::video("a", "m://a")],
                next_cursor: None,
            })
        }
    }

    fn worker(failures: u32, retries: u32) -> FeedWorker {
        FeedWorker::new(
            Box::new(FlakyStorage {
                failures,
                saved: BTreeSet::new(),
                writes: 0,
            }),
            Box::new(OnePage),
            retries,
        )
    }

    #[test]
    fn save_succeeds_within_retry_budget() {
        let mut w = worker(2, 2);
        let response = w.handle_message(WorkerMessage::save_item(ItemId::new("a"), true));
        assert_eq!(
            response,
            WorkerResponse::SavedChanged {
                item_id: ItemId::new("a"),
                saved: true
            }
        );
    }

    #[test]
    fn save_fails_after_retries_exhausted() {
        let mut w = worker(3, 2);
        let response = w.handle_message(WorkerMessage::save_item(ItemId::new("a"), true));
        assert!(matches!(response, WorkerResponse::SaveFailed { saved: true, .. }));
    }

    #[test]
    fn report_failure_is_reported_not_swallowed() {
        let mut w = worker(0, 0);
        let response = w.handle_message(WorkerMessage::submit_report(ItemId::new("a"), "spam".into()));
        assert!(matches!(response, WorkerResponse::ReportFailed { .. }));
    }

    #[test]
    fn reload_replaces() {
        let mut w = worker(0, 0);
        let response = w.handle_message(WorkerMessage::reload(10));
        assert!(matches!(response, WorkerResponse::PageLoaded { replace: true, .. }));
    }

    #[test]
    fn missing_content_store_is_an_error_without_retries() {
        let mut w = FeedWorker::default();
        let response = w.handle_message(WorkerMessage::load_more(None, 10));
        assert!(matches!(response, WorkerResponse::PageFailed { .. }));
    }
}
