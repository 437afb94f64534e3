pub mod api;
pub mod batch;
pub mod boundary;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod ui;

pub use error::{BmrmError, Result};
