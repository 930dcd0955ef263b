//! HTTP middleware stack.

pub mod cors;
pub mod identity;
pub mod trace;

pub use identity::CallerIdentity;
