//! Routing module
//!
//! Static tables consulted per request: redirects, the image-proxy allow-list,
//! and the classifier tying them to a request path.

pub mod classifier;
pub mod domains;
pub mod redirects;

pub use classifier::{Classifier, RequestKind};
pub use domains::AllowedDomains;
pub use redirects::{RedirectRule, RedirectTable};
