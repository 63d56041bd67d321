//! lf-core: shared foundation for lcaflow.
//!
//! Contains:
//! - ids (entity keys, method references, subscription handles)
//! - numeric (amount checks + float comparison)
//! - signal (synchronous observer lists, global and per key)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod signal;

pub use error::{LfError, LfResult};
pub use ids::*;
pub use numeric::*;
pub use signal::{KeyedSignal, Signal};
