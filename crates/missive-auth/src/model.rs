//! Users and sessions as returned by the auth provider.
//!
//! All types serialize with camelCase keys, matching the JSON the auth
//! routes put in the envelope's `data`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Provider-assigned identifier.
    pub id: String,
    /// Email address, unique per provider.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Whether the email address has been verified.
    pub email_verified: bool,
    /// Avatar URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates an unverified user with both timestamps set to `now`.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
            email_verified: false,
            image: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A bearer session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque bearer token.
    pub token: String,
    /// Owner of the session.
    pub user_id: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Returns true once `now` has reached the expiry instant.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A user together with one of their sessions.
///
/// Returned by sign-up and sign-in.
///
/// # Example
///
/// ```
/// use chrono::{Duration, Utc};
/// use missive_auth::{AuthSession, Session, User};
///
/// let now = Utc::now();
/// let session = AuthSession {
///     user: User::new("u1", "ada@example.com", "Ada", now),
///     session: Session {
///         token: "t1".into(),
///         user_id: "u1".into(),
///         expires_at: now + Duration::days(30),
///     },
/// };
/// let json = serde_json::to_value(&session).unwrap();
/// assert_eq!(json["session"]["userId"], "u1");
/// assert_eq!(json["user"]["emailVerified"], false);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    /// The signed-in user.
    pub user: User,
    /// The session created for them.
    pub session: Session,
}

/// What a session lookup returns. Same shape as [`AuthSession`].
pub type SessionInfo = AuthSession;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_user_serialization_omits_missing_image() {
        let now = Utc::now();
        let mut user = User::new("u1", "ada@example.com", "Ada", now);
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("image").is_none());
        assert_eq!(json["createdAt"], json["updatedAt"]);

        user.image = Some("https://example.com/ada.png".to_string());
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["image"], "https://example.com/ada.png");
    }

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let session = Session {
            token: "t".to_string(),
            user_id: "u".to_string(),
            expires_at: now + Duration::days(1),
        };
        assert!(!session.is_expired_at(now));
        assert!(session.is_expired_at(now + Duration::days(1)));
    }
}
