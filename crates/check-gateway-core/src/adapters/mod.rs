//! # Infrastructure Adapters
//!
//! Implementations of the [`DedupStore`](crate::dedup::DedupStore) trait.

pub mod memory_dedup_store;
pub mod upstash_dedup_store;

pub use memory_dedup_store::InMemoryDedupStore;
pub use upstash_dedup_store::{UpstashConfig, UpstashDedupStore};
