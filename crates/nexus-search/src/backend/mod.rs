//! Concrete capability implementations.
//!
//! - [`memory::MemoryIndex`]: documents held in memory (fixtures, tests)
//! - [`sqlite::SqliteStore`]: the on-disk document store
//! - [`hashing::HashingEmbedder`] and [`overlap::TermOverlapJudge`]: offline
//!   stand-ins for model-backed services
//! - [`http`]: OpenAI-compatible embedding and chat-completion clients

pub mod hashing;
pub mod http;
pub mod memory;
pub mod overlap;
pub mod sqlite;

pub use hashing::HashingEmbedder;
pub use http::{HttpCoherenceJudge, HttpEmbedder, HttpServiceConfig};
pub use memory::MemoryIndex;
pub use overlap::TermOverlapJudge;
pub use sqlite::SqliteStore;
