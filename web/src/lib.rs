//! Axum integration for Utshob services.
//!
//! The marketplace's HTTP surface is an imperative shell around reducers:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (Axum)         │  ← HTTP, JSON, bearer tokens
//! │  - Request parsing                      │  ← Correlation ids, tracing
//! │  - Response serialization               │  ← Uniform error bodies
//! ├─────────────────────────────────────────┤
//! │         Functional Core                 │
//! │  - Flow reducers                        │  ← Testable without I/O
//! │  - Effect descriptions (values)         │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives at an Axum handler
//! 2. **Extract** path, query, JSON body and bearer token
//! 3. **Dispatch** a command through the application service
//! 4. **Map** the outcome (or [`AppError`]) to a response

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{ApiJson, ApiPath, ApiQuery, BearerToken, CorrelationId};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
