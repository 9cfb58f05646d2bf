//! Provider credentials domain

mod entity;

pub use entity::{build_providers_map, ProviderApiKey, Providers, ProvidersMap};
