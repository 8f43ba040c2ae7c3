//! Common utilities and shared types for lgu-rs.
//!
//! This crate provides foundational components used across all lgu-rs crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **Identifiers**: The [`ActorId`] newtype for authenticated actors
//! - **Storage**: File storage backends for item images
//!
//! # Example
//!
//! ```no_run
//! use lgu_common::{AppResult, Config};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     println!("Listening on port {}", config.server.port);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::ActorId;
pub use storage::{
    LocalStorage, StorageBackend, StorageConfig, UploadedFile, generate_image_key,
    image_extension,
};
