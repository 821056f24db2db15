//! Style model registry, on-disk cache, and session memoization.

mod loader;
mod session;

pub use loader::{load_session, ModelCache, StyleModel};
pub use session::SessionCache;
