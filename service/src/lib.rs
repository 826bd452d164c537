pub mod config;
pub mod error;
pub mod file_store;
pub mod service;
pub mod store;

pub use config::ServiceConfig;
pub use error::{Result, ServiceErr};
pub use file_store::FileStore;
pub use service::{Classified, PredictionService};
pub use store::{MemoryStore, NewPrediction, Page, PredictionRecord, PredictionStore};
