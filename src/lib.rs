pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod health;
pub mod model;
pub mod reddit;
pub mod scheduler;
pub mod scorer;
pub mod source;
pub mod store;
pub mod transform;

pub use context::{PipelineContext, PipelineSettings};
pub use error::PipelineError;
