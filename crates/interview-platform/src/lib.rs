//! Native adapters for the `interview-core` ports.
//!
//! - [`llm`]: OpenAI-compatible chat completions over `reqwest`
//! - [`storage`]: in-memory session, analytics, and user stores
//! - [`identity`]: trusts a caller id forwarded by an upstream auth layer

pub mod identity;
pub mod llm;
pub mod storage;

pub use identity::{HeaderIdentityProvider, USER_ID_HEADER};
pub use llm::OpenAiCompatProvider;
pub use storage::{MemoryAnalyticsStore, MemorySessionStore, MemoryUserDirectory};
