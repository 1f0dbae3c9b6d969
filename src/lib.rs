pub mod cache;
pub mod config;
pub mod marshalling;
pub mod metrics;
pub mod models;
pub mod storage;
