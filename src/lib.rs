pub mod authz;
pub mod config;
pub mod filter;
pub mod logs;
pub mod store;
pub mod types;
