//! Authentication hook for the WebSocket front door.
//!
//! Duelhall doesn't know how users log in. The front door hands the token
//! from a client's `Hello` frame to an [`Authenticator`] and seats the
//! socket under whatever [`UserId`] comes back. A `Hello` without a token
//! skips authentication and joins as an anonymous spectator.

use std::future::Future;

use duelhall_protocol::UserId;

use crate::DuelhallError;

/// Validates a client's token and returns their identity.
///
/// ```rust
/// use duelhall::{Authenticator, DuelhallError};
/// use duelhall_protocol::UserId;
///
/// /// Treats the token as a numeric user id. Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<UserId, DuelhallError> {
///         token
///             .parse()
///             .map(UserId)
///             .map_err(|_| DuelhallError::AuthFailed("token must be a number".into()))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// # Errors
    /// [`DuelhallError::AuthFailed`] when the token is invalid or expired.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<UserId, DuelhallError>> + Send;
}
