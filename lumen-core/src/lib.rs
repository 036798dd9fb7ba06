//! Core types and traits for lumen
//!
//! This crate provides the conversation data model, profile records,
//! configuration, logging and the document-store abstraction shared by
//! all other lumen components.

pub mod config;
pub mod error;
pub mod logging;
pub mod records;
pub mod session;
pub mod store;
pub mod utils;

pub use error::{Error, Result};
