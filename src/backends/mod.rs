mod http;
mod traits;

pub use http::HttpProgressStore;
pub use traits::{ProgressStore, ProgressUpdate, StoreError};
