mod policy;
mod session_cache;
mod synchronizer;

pub use policy::{FlushKind, FlushPolicy};
pub use session_cache::SessionCache;
pub use synchronizer::ProgressSynchronizer;
