pub mod config;
pub mod fetch;
pub mod query;
pub mod server;
pub mod table;
