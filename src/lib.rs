pub mod config;
pub mod database_ops;
pub mod ingest;
pub mod normalization;
pub mod tracing;

pub mod util {
    pub mod db;
    pub mod env;
}
