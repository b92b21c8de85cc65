pub mod app;
pub mod board;
pub mod calendar;
pub mod cli;
pub mod clipboard;
pub mod config;
pub mod drag;
pub mod history;
pub mod range;
pub mod remote;
pub mod sanitize;
pub mod search;
pub mod selection;
pub mod storage;
pub mod view;

pub use app::Board;
pub use config::{AppConfig, ConfigLoader, ConfigPaths};
