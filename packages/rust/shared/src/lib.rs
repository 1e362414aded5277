//! Shared types, error model, and configuration for InviteBoard.
//!
//! This crate is the foundation depended on by all other InviteBoard crates.
//! It provides:
//! - [`InviteBoardError`]: the unified error type
//! - Domain types ([`Record`], [`Dataset`], [`Field`], [`OrgLabel`])
//! - Field-name casing between uploaded headers and stored columns
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod fields;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DatabaseConfig, DeliveryConfig, DeliveryMode, ReportConfig, config_dir,
    config_file_path, expand_home, init_config, load_config, load_config_from,
};
pub use error::{InviteBoardError, Result};
pub use fields::{Field, display_field_name, normalize_header, storage_field_name};
pub use types::{Dataset, DatasetOrigin, OrgLabel, Record};
