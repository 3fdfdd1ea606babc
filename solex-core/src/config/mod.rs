//! Configuration module for Solex.
//!
//! Manages application settings stored in SQLite.

mod settings;

pub use settings::{Settings, Theme};
