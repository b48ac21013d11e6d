//! ClipMix Catalog
//!
//! Defines the inputs of a render batch and how they are combined:
//! - **Clips:** Uploaded media files, each filed under one of three categories
//! - **Catalog:** The clips per category plus an optional background track
//! - **Combinations:** The lead × middle × body outer product, one per output
//!
//! Everything here is pure data. Enumeration order and labels are stable
//! for identical catalogs so reruns overwrite the same output files.

pub mod catalog;
pub mod clip;
pub mod combination;

pub use catalog::*;
pub use clip::*;
pub use combination::*;
