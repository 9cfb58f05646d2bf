//! Usage domain - Cost estimation for provider calls

mod pricing;

pub use pricing::{default_model_pricing, estimate_cost, find_pricing, ModelPricing};
