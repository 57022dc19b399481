//! Cache tier for the Compass platform
//!
//! This crate provides the fast in-memory side of the two-tier state
//! layer:
//! - Key-value client over the store's wire protocol, with an in-process
//!   implementation for tests and local runs
//! - Cache facade adding namespacing, tolerant JSON handling and batch
//!   operations
//! - Session store for per-user sessions, preferences and cached search
//!   results
//!
//! The cache is an optimization, never a correctness dependency: every
//! failure here is typed so callers can degrade to the durable tier.

pub mod client;
pub mod config;
pub mod error;
pub mod facade;
pub mod session;

pub use client::{KvStore, MemoryStore, RedisStore};
pub use config::{CacheConfig, RedisConfig};
pub use error::{CacheError, CacheResult};
pub use facade::CacheFacade;
pub use session::SessionStore;
