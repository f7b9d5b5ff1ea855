//! Secret types for protecting channel access tokens from accidental logging.
//!
//! Re-exports the [`secrecy`] wrappers. Any struct that derives `Debug` and
//! holds a [`SecretString`] prints `[REDACTED]` in place of the value, so a
//! token passed to `join()` cannot leak through `{:?}` or a tracing field.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct JoinRequest {
//!     channel: String,
//!     token: SecretString,
//! }
//!
//! let req = JoinRequest {
//!     channel: "videochat".to_string(),
//!     token: SecretString::from("006abc"),
//! };
//!
//! assert!(!format!("{req:?}").contains("006abc"));
//! assert_eq!(req.token.expose_secret(), "006abc");
//! ```
//!
//! Only the engine adapter calls `expose_secret()`, at the moment the token
//! is handed to the native join call.

pub use secrecy::{ExposeSecret, SecretString};

/// Returns true when the secret holds no characters.
///
/// Used for argument validation without exposing the value to callers.
#[must_use]
pub fn is_blank(secret: &SecretString) -> bool {
    secret.expose_secret().is_empty()
}
