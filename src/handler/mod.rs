//! Request handler module
//!
//! The edge pipeline and its stages: redirects, asset fallback, the image
//! proxy and the application renderer.

pub mod assets;
pub mod image_proxy;
pub mod pipeline;
pub mod redirect;
pub mod renderer;
pub mod stage;

pub use pipeline::{EdgeHandler, EdgeServices};
pub use stage::{Stage, StageOutcome};
