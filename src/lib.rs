pub mod cli;
pub mod config;
pub mod engine;
pub mod error;

pub use engine::Engine;
pub use error::{CodeletError, Result};
