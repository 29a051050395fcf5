//! Hash primitives used by the PKCE helpers.

pub mod sha256;

pub use sha256::{sha256, DIGEST_LEN};
