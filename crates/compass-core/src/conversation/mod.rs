//! Conversation lifecycle management
//!
//! Owns the `active -> completed` state machine and keeps two copies of
//! every conversation: a fast denormalized copy in the cache and a
//! durable row-oriented copy in the backing store.
//!
//! ## Read path
//!
//! Cache-first, store-fallback: a hit on the cache meta key plus the
//! message list serves the request; a miss reassembles the conversation
//! from the durable rows and writes it back so the next read is fast.
//!
//! ## Write path
//!
//! Message appends go to the cache's native list with an atomic push —
//! the whole-object overwrite that loses concurrent siblings never
//! happens on this path. Durable appends are independent row inserts and
//! need no coordination. `reconcile` force-converges the durable tier
//! from the cache view when it lags.

mod manager;

pub use manager::{ConversationConfig, ConversationManager};
