//! Authentication error taxonomy.

use thiserror::Error;

/// Errors raised by authentication operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Login rejected: unknown email or wrong password. The backend does not
    /// say which, and neither do we.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Registration rejected: an account with this email already exists.
    #[error("an account with this email already exists")]
    DuplicateAccount,

    /// The refresh token was rejected. The session has been torn down and
    /// the user must log in again.
    #[error("refresh token rejected; please log in again")]
    InvalidRefreshToken,

    /// The access token was rejected even after a refresh.
    #[error("access token expired")]
    ExpiredAccessToken,
}
