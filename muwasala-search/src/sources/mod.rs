//! Built-in source adapters.
//!
//! Each module provides a struct implementing [`crate::source::SourceAdapter`]
//! for one family of upstream APIs. Which one a source uses is chosen by
//! [`crate::types::AdapterKind`] in its descriptor.

pub mod html_listing;
pub mod json_api;
pub mod quran;

pub use html_listing::HtmlListingSource;
pub use json_api::JsonApiSource;
pub use quran::QuranApiSource;
