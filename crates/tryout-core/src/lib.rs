//! tryout-core: timed exam sessions, answer capture and scoring.
//!
//! This crate defines the data model, the entity-store and auth traits, and
//! the session state machine that the rest of the tryout workspace builds on.

pub mod account;
pub mod admin;
pub mod answers;
pub mod context;
pub mod countdown;
pub mod error;
pub mod history;
pub mod memory;
pub mod model;
pub mod parser;
pub mod payment;
pub mod repo;
pub mod report;
pub mod scoring;
pub mod session;
pub mod traits;

pub use error::{Result, TryoutError};
