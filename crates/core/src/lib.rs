pub mod analytics;
pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod query;
pub mod time;
pub mod timeline;
pub mod tree;
pub mod view;
pub mod window;

pub use error::{Result, TracedeckError};
