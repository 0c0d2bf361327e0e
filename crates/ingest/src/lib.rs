pub mod broadcast;
pub mod http;
pub mod pipeline;
pub mod server;
pub mod ws;

pub use broadcast::{Broadcaster, Subscription};
pub use http::AppState;
pub use pipeline::{IngestError, Pipeline, PipelineConfig};
