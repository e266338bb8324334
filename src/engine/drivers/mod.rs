//! Pooling engines backed by native Rust drivers

pub mod mysql;

pub use mysql::{MySqlDataSourcePool, MySqlPoolEngine};
