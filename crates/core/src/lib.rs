pub mod config;
pub mod error;
pub mod filter;
pub mod ids;
pub mod model;
pub mod query;
pub mod time;
pub mod validate;

pub use error::{LogdockError, Result};
