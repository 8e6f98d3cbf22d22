pub mod auth;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod ingest;
pub mod normalize;
pub mod pagination;
pub mod rewrite;
pub mod search;
