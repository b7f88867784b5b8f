// src/process/mod.rs
//! Loading, filtering, classifying, aggregating and writing the dataset.

pub mod aggregate;
pub mod classify;
pub mod filter;
pub mod loader;
pub mod output;
