// Application layer - Use cases and the ports they depend on
pub mod data_service;
pub mod error;
pub mod paths;
pub mod realtime_store;
pub mod session;
pub mod subscription;
pub mod views;
