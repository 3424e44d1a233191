//! The traffic-shadowing engine.
//!
//! - [`policy`] decides per request whether it is mirrored.
//! - [`capture`] buffers the body once into a replayable [`RequestSnapshot`].
//! - [`dispatcher`] samples and fans the snapshot out to every shadow host.
//! - [`headers`] and [`target`] shape each outbound copy.
//! - [`client`] and [`sampler`] are the seams for transport and randomness.

pub mod capture;
pub mod client;
pub mod dispatcher;
pub mod headers;
pub mod policy;
pub mod sampler;
pub mod target;

pub use capture::{RequestMeta, RequestSnapshot};
pub use dispatcher::ShadowDispatcher;
