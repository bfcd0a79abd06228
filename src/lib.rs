//! LLM Request Broker
//!
//! A concurrency-safe gateway between application code and a single
//! external, rate-limited, costly inference backend shared by many
//! simultaneous conversations.
//!
//! The broker guarantees the backend is never called faster than its rate
//! limit, absorbs transient failures with bounded exponential backoff,
//! stops calling the backend entirely once its usage quota is exhausted,
//! and keeps callers responsive with cached or canned answers while
//! degraded.
//!
//! # Architecture
//!
//! ```text
//! caller ──► RequestBroker ──► ResponseCache (hit? return)
//!                 │
//!       priority? │ no ──► BatchScheduler ──┐ (flush on timer/size)
//!                 │ yes                     │
//!                 ▼                         ▼
//!            PacedInvoker ◄─────────────────┘
//!          (pacing lock, retry/backoff, circuit breaker)
//!                 │
//!                 ▼
//!              Backend (injected)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use llm_broker::{Backend, ChatRequest, ModelTier, RateLimitConfig, RequestBroker};
//!
//! # struct MyBackend;
//! # #[async_trait::async_trait]
//! # impl Backend for MyBackend {
//! #     async fn complete(
//! #         &self,
//! #         _messages: &[llm_broker::MessageSegment],
//! #         _tier: ModelTier,
//! #     ) -> anyhow::Result<String> { Ok(String::new()) }
//! # }
//! # async fn run() -> Result<(), llm_broker::BrokerError> {
//! let broker = RequestBroker::new(RateLimitConfig::default(), Arc::new(MyBackend))?;
//! broker.initialize().await;
//!
//! let answer = broker
//!     .submit(ChatRequest::prompt(
//!         "You are a scheduling assistant.",
//!         "Schedule a sync with Dana at 3pm",
//!         ModelTier::Light,
//!     ))
//!     .await?;
//!
//! broker.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod breaker;
pub mod broker;
pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod fallback;
pub mod invoker;
pub mod metrics;
pub mod types;

pub use broker::RequestBroker;
pub use cache::ResponseCache;
pub use classify::ErrorKind;
pub use config::RateLimitConfig;
pub use error::BrokerError;
pub use fallback::FallbackResponder;
pub use invoker::{Backend, PacedInvoker};
pub use metrics::{BrokerMetrics, BrokerStats};
pub use types::{ChatRequest, MessageSegment, ModelTier, Role};
