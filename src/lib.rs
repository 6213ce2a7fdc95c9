//! # unillm
//!
//! A provider-agnostic LLM client: one canonical data model, one request
//! pipeline, one streaming contract, any number of providers behind the
//! [`adapter::ProviderAdapter`] seam.
//!
//! ```no_run
//! use std::sync::Arc;
//! use unillm::{Client, Context, Message};
//! use unillm::adapter::{DefaultAdapter, ProviderMetadata};
//!
//! # async fn demo() -> Result<(), unillm::ClientError> {
//! let client = Client::new();
//! client.registry().register_adapter(
//!     Arc::new(DefaultAdapter::new("openai", "https://api.openai.com/v1")),
//!     ProviderMetadata {
//!         id: "openai".into(),
//!         name: "OpenAI".into(),
//!         base_url: None,
//!         models: vec![],
//!     },
//! )?;
//!
//! let response = client
//!     .generate_text(
//!         "openai:gpt-4o",
//!         Context::new().with(Message::user("Say hello.")),
//!         Default::default(),
//!     )
//!     .await?;
//! println!("{}", response.text().unwrap_or_default());
//! # Ok(())
//! # }
//! ```
//!
//! ## Streaming
//!
//! [`Client::stream_text`] returns a [`streaming::StreamResponse`]: a chunk
//! channel, a cancellation lever, and a metadata handle that resolves once
//! with the final usage and finish reason, completed or cancelled alike.

pub mod adapter;
pub mod assembler;
pub mod auth;
pub mod client;
pub mod error;
pub mod options;
pub mod pipeline;
pub mod registry;
pub mod streaming;
pub mod types;

pub use client::{Client, ClientBuilder};
pub use error::{ClientError, ErrorCategory};
pub use types::{
    ChunkStream, ContentPart, Context, EmbeddingResponse, FinishReason, Message, ModelDescriptor,
    Operation, Response, Role, StreamChunk, Usage,
};
