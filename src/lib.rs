pub mod config;
pub mod error;
pub mod gateway;
pub mod pipeline;
pub mod progress;
pub mod quality;
pub mod textutil;
pub mod verses;

pub use error::{Result, StylerError};
