pub mod config;
pub mod error;
pub mod jobs;
pub mod manifest;
pub mod pipeline;
pub mod process;
pub mod schema;
pub mod store;
