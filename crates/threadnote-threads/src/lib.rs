//! Threads Graph API client: post listing, insights, identity, and token
//! lifecycle endpoints.

pub mod client;
pub mod error;
pub mod normalize;
pub mod types;

mod account;
mod posts;
mod source;

pub use client::ThreadsClient;
pub use error::ThreadsError;
