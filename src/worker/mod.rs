//! Worker layer for asynchronous collaborator operations.
//!
//! Saves, reports, and page loads run outside the scheduler step. The host
//! executes [`crate::Action::PostToWorker`] against a [`FeedWorker`] (on
//! whatever thread it likes) and feeds each [`WorkerResponse`] back as an
//! [`crate::Event::Worker`].

pub mod handler;
pub mod messages;

pub use handler::FeedWorker;
pub use messages::{TraceContext, WorkerMessage, WorkerResponse};
