//! Notion destination client for threadnote.
//!
//! Implements [`threadnote_core::DestinationApi`] over the Notion REST API:
//! database schema reads, filtered queries, page creation, and property
//! updates.

pub mod client;
pub mod error;
pub mod properties;
pub mod types;

mod destination;

pub use client::NotionClient;
pub use error::NotionError;
