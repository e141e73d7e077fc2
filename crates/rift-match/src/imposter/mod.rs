//! Mountebank-compatible imposters and stub resolution.
//!
//! ## Module Structure
//!
//! - `types`: Configuration types, match reports and errors
//! - `cycler`: Lock-free per-stub response cursor
//! - `core`: `Stub`, `Imposter` and the resolution algorithm

mod core;
mod cycler;
mod types;


pub use self::core::{Imposter, Resolution, Stub};
pub use cycler::{HasRepeatBehavior, ResponseCursor};
pub(crate) use types::is_yaml;
pub use types::{
    ImposterConfig, ImposterError, MatchReport, ResponseMode, StubConfig, StubResponse, PROTOCOLS,
};
