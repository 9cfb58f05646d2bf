//! Provider log domain - Durable records of provider calls

mod entity;
mod repository;
mod service;
mod writer;

pub use entity::{
    CreatedProviderLog, NewProviderLog, ProviderErrorLink, ProviderLog, ProviderLogData,
};
pub use repository::ProviderLogRepository;
pub use service::ProviderLogService;
pub use writer::{ProviderLogWriter, SaveProviderLog};

#[cfg(test)]
pub(crate) use entity::fixtures;
#[cfg(test)]
pub use repository::MockProviderLogRepository;
