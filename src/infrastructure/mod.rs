//! Infrastructure layer - External service implementations

pub mod cache;
pub mod events;
pub mod jobs;
pub mod llm;
pub mod logging;
pub mod observability;
pub mod storage;
