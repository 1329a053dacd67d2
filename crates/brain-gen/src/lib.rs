//! Brain-gen: combinatorial alpha generation for the WorldQuant BRAIN platform.
//!
//! This crate provides:
//! - Config loading from TOML with CLI overrides
//! - Field selection from the fetched catalog, with a static fallback
//! - Lazy Cartesian enumeration of alpha expressions
//! - Task packaging and CSV/manifest output

pub mod catalog;
pub mod config;
pub mod expr;
pub mod output;
pub mod task;

pub use config::GenerateConfig;
pub use expr::ExpressionGrid;
pub use task::{build_tasks, AlphaSettings, AlphaTask};
