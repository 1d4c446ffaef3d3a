pub mod archive;
pub mod badge;
pub mod config;
pub mod error;
pub mod favorites;
pub mod fsio;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod scan;
pub mod thumbs;

pub use crate::config::BuildConfig;
pub use crate::error::{Error, Result};
pub use crate::models::*;
