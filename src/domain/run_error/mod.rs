//! Run error domain - Typed failure vocabulary of the chain run pipeline

mod chain_error;
mod code;
mod entity;
mod repository;

pub use chain_error::ChainError;
pub use code::{RunErrorCode, RunErrorDetails};
pub use entity::{Errorable, ErrorableType, NewRunError, RunError};
pub use repository::RunErrorRepository;

#[cfg(test)]
pub use repository::MockRunErrorRepository;
