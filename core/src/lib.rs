//! Customer health-tiering and decline-risk pipeline.
//!
//! Turns a tidy invoice table into a monthly health table with tiers and
//! cadence labels, a per-account decline-risk score, and a ranked list of
//! accounts a sales rep should contact.

pub mod alert_stage;
pub mod cadence_stage;
pub mod config;
pub mod decline_stage;
pub mod engine;
pub mod error;
pub mod health_stage;
pub mod invoice;
pub mod linear_model;
pub mod mock;
pub mod monthly_stage;
pub mod report;
pub mod rng;
pub mod stage;
pub mod store;
pub mod tier_stage;
pub mod types;

pub use config::HealthConfig;
pub use engine::{HealthEngine, RunSummary};
pub use error::{HealthError, HealthResult};
pub use store::HealthStore;
