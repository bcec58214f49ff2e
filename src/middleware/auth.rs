use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::profile::Role;
use crate::storage::SessionCache;

/// Claims the portal puts in its session tokens. Everything is optional;
/// only `exp` is used client-side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Reads the claims of a session token. The signature is not checked: the
/// backend does that on every request, the client only needs the expiry.
pub fn read_claims(token: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| Error::Unauthorized(format!("Malformed session token: {}", e)))
}

pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let exp = read_claims(token).ok()?.exp?;
    Utc.timestamp_opt(exp, 0).single()
}

/// Tokens without a readable `exp` are left for the server to judge.
pub fn is_expired(token: &str, now: DateTime<Utc>) -> bool {
    token_expiry(token).map_or(false, |exp| exp <= now)
}

/// Checks the cached session before a call is made. An expired staff token
/// clears the session and is reported as [`Error::Unauthorized`] so the
/// caller goes back to login without a round trip.
pub async fn require_session(session: &SessionCache, role: Role, now: DateTime<Utc>) -> Result<()> {
    if !session.is_logged_in(role).await {
        return Err(Error::Unauthorized("Not logged in".into()));
    }
    if role == Role::Staff {
        if let Some(token) = session.token(role).await {
            if is_expired(&token, now) {
                debug!(%role, "cached token expired");
                session.invalidate().await?;
                return Err(Error::Unauthorized("Session expired".into()));
            }
        }
    }
    Ok(())
}
