pub mod args;
pub mod command;
pub mod config;
pub mod error;
pub mod form;
pub mod line_decor;
pub mod logging;
pub mod methods;
pub mod schema;
pub mod supervisor;
pub mod tabs;
pub mod web;

pub use error::{Error, Result};
