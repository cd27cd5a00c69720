pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod iterext;
pub mod model;
pub mod pipeline;
pub mod useragent;
