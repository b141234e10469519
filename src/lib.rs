//! # Paper Search
//!
//! Federated academic-paper search over Semantic Scholar, PubMed and
//! OpenAlex: one query fans out to all three backends, results are
//! normalized into a canonical record, merged across sources, cached and
//! served behind a rate-limited HTTP endpoint that stays up when
//! individual backends fail.
//!
//! ## Architecture
//!
//! - [`models`]: canonical paper record and wire payloads
//! - [`sources`]: per-backend query adapters
//! - [`normalize`]: pure field normalizers shared by adapters and dedup
//! - [`search`]: fan-out, identity resolution/merge, sorting, assembly
//! - [`cache`]: durable response cache
//! - [`limiter`]: sliding-window admission control
//! - [`api`]: HTTP surface
//! - [`config`]: configuration management

pub mod api;
pub mod cache;
pub mod config;
pub mod limiter;
pub mod models;
pub mod normalize;
pub mod search;
pub mod sources;

// Re-export commonly used types
pub use models::{PaperRecord, SourceId};
pub use search::SearchService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
