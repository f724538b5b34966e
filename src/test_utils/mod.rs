//! Test utilities.
//!
//! This module provides:
//! - Test data factories for subscriptions and commerce orders
//! - An in-memory subscription store with the same claim semantics as Postgres
//!   and the dashboard aggregates computed in memory
//! - A scripted commerce gateway with call counters and failure injection
//! - An email sink that records what was sent
//! - An `AppState` builder for route tests

mod app_state_builder;
mod email_mocks;
mod factories;
mod gateway_mocks;
mod reporting_mocks;
mod subscription_mocks;

pub use app_state_builder::*;
pub use email_mocks::*;
pub use factories::*;
pub use gateway_mocks::*;
pub use subscription_mocks::*;
