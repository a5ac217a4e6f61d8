//! Bearer credentials: redacted secrets, pluggable credential sources, and the shared token cache.

mod cache;
mod secret;
mod source;

pub use cache::*;
pub use secret::*;
pub use source::*;
