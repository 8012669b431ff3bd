//! cloud.ca API client core
//!
//! `EntityApi` issues entity operations, `TaskPoller` awaits asynchronous
//! tasks, and `ResponseEnvelope` classifies every response in between.

pub mod client;
pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod options;
pub mod pool;
pub mod response;
pub mod task;

#[cfg(test)]
mod test_helpers;

pub use client::Client;
pub use config::{ClientConfig, PollConfig};
pub use context::Context;
pub use entity::{EntityApi, EntityOperations, EntityRef, EntityRegistry, EntityType};
pub use error::ApiError;
pub use options::QueryOptions;
pub use pool::{ConnectionPoolConfig, ConnectionStats};
pub use response::{ListPage, ResponseEnvelope, ResponseError};
pub use task::{Task, TaskPoller, TaskStatus};
