//! Feed data: the ordered playable sequence and the store it pages from.
//!
//! - [`content`]: [`ContentStore`] trait implemented by content backends
//! - [`source`]: [`FeedDataSource`], the filtered sequence the scheduler reads

pub mod content;
pub mod source;

pub use content::{ContentPage, ContentStore};
pub use source::FeedDataSource;
