use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Leeway applied when deciding whether a session is close enough to
/// expiry to warrant a refresh before use.
pub const EXPIRY_LEEWAY_SECS: i64 = 60;

/// An authenticated session as issued by the auth service and persisted
/// in the local vault between runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: Uuid,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    /// True when the access token has expired or will within the leeway
    /// window, meaning it should be refreshed before use.
    pub fn needs_refresh(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_LEEWAY_SECS) >= self.expires_at
    }
}

/// Claims decoded from the access token payload. The signature is not
/// verified locally; the hosted platform is the trust boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    pub sub: Uuid,
    pub exp: i64,
    #[serde(default)]
    pub email: Option<String>,
}
