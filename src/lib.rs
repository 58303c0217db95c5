pub mod api;
pub mod bootstrap;
pub mod common;
pub mod config;
pub mod table;
pub mod utils;
pub mod workflow;
