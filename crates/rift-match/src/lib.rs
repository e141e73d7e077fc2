//! Rift predicate matching and stub resolution.
//!
//! Given an imposter (an ordered list of stubs, each pairing predicates with
//! canned responses) and a protocol-normalized request, decide which stub
//! matches and which of its responses to return.
//!
//! ```
//! use rift_match::imposter::{Imposter, ImposterConfig};
//! use rift_match::request::Request;
//!
//! let config: ImposterConfig = serde_json::from_value(serde_json::json!({
//!     "protocol": "http",
//!     "stubs": [{
//!         "predicates": [{"equals": {"method": "GET", "path": "/hello"}}],
//!         "responses": [{"is": {"body": "hi"}}]
//!     }]
//! }))
//! .unwrap();
//! let imposter = Imposter::from_config(&config).unwrap();
//!
//! let request = Request::new()
//!     .with_field("method", "GET")
//!     .with_field("path", "/hello");
//! assert!(imposter.resolve(&request).is_match());
//! ```

pub mod imposter;
pub mod predicate;
pub mod request;

pub use imposter::{Imposter, ImposterConfig, ImposterError, Resolution};
pub use predicate::{Predicate, PredicateError};
pub use request::Request;
