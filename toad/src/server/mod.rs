//! Resource trees, request dispatch and RFC 7641 Observe subscriber tracking.

/// resource tree and request dispatch
pub mod resource;

/// RFC 7641 Observe subscriber tracking
pub mod observe;
