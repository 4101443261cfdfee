#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod config;
pub mod data;
pub mod feed;
pub mod format;
pub mod markup;
pub mod page;
pub mod reddit;
pub mod render;
pub mod vote;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
