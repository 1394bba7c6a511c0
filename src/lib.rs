#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod app;
pub mod builders;
pub mod config;
pub mod data;
pub mod dom;
pub mod lifecycle;
pub mod listeners;
pub mod logging;
pub mod page;
pub mod toggle;
pub mod ui;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
