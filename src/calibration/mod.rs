pub mod config;
pub mod pipeline;
pub mod sample;
pub mod types;
