//! # Orchestrate Rust Client
//!
//! A Rust client for [Orchestrate.io](https://orchestrate.io), a hosted
//! key/value, full-text search, time-ordered events and graph database
//! exposed over a REST API.
//!
//! The client provides typed async operations over collections and maps
//! the service's wire protocol: ETag-based optimistic concurrency,
//! cursor-driven pagination and a structured error envelope.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use orchestrate_client::{ConditionalIntent, OrchestrateClient};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = OrchestrateClient::new("your-api-key")?;
//!     let products = client.collection("products");
//!
//!     let metadata = products
//!         .put("widget-1", &json!({ "name": "Widget" }), &ConditionalIntent::MustNotExist)
//!         .await?;
//!
//!     println!("stored {} at version {}", metadata.key, metadata.reference);
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod collection;
pub mod conditional;
pub mod error;
pub mod pagination;
pub mod types;
pub mod url_builder;

// Re-export main types for convenience
pub use client::{ApiResponse, ClientConfig, OrchestrateClient};
pub use collection::{Collection, Events, Graph, Record};
pub use conditional::{ConditionalIntent, RecordMetadata};
pub use error::{FailureKind, OrchestrateError, RequestFailure, Result};
pub use pagination::ResultPage;
pub use types::*;
pub use url_builder::{Locator, UrlBuilder};
