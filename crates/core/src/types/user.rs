//! User identity and session types.

use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::UserId;

/// Role assigned to an account by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular shopper.
    #[default]
    Customer,
    /// Back-office administrator.
    Admin,
}

/// Profile snapshot returned by the backend on login/register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Backend identifier for the account.
    pub id: UserId,
    /// Account email address.
    pub email: Email,
    /// Full display name.
    pub full_name: String,
    /// Contact phone, if provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Shipping address, if provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Account role.
    #[serde(default)]
    pub role: UserRole,
}

/// An authenticated session: the token pair plus the cached profile.
///
/// Created on successful login or register, replaced wholesale on refresh
/// (the profile is carried over), destroyed on logout or unrecoverable
/// refresh failure. Both tokens are opaque bearer strings to this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Short-lived credential attached to every authenticated request.
    pub access_token: String,
    /// Longer-lived credential used solely to mint a new pair.
    pub refresh_token: String,
    /// Profile of the authenticated user.
    pub user: UserProfile,
}

impl Session {
    /// Replace the token pair, keeping the cached profile.
    #[must_use]
    pub fn with_tokens(self, access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            user: self.user,
        }
    }
}
