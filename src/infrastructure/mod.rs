// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod config_file;
pub mod firebase_store;
pub mod memory_store;
