pub mod backend;
pub mod db;
pub mod query;
pub mod retention;
pub mod schema;
pub mod write;

pub use backend::{Backend, JsonFileBackend, MemoryBackend};
pub use db::Store;
pub use query::query;
