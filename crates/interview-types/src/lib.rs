pub mod analytics;
pub mod assistant;
pub mod config;
pub mod error;
pub mod event;
pub mod feedback;
pub mod message;
pub mod session;
pub mod user;


pub use error::InterviewError;
pub type Result<T> = std::result::Result<T, InterviewError>;
