pub mod memory;

pub use memory::{MemoryAnalyticsStore, MemorySessionStore, MemoryUserDirectory};
