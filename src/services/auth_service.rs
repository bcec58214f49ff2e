use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dto::auth_dto::{
    ForgotPasswordPayload, GoogleLoginPayload, LoginPayload, ResetPasswordPayload,
    StaffLoginResponse, StaffSignupPayload, StudentLoginResponse, StudentSignupPayload,
    VerifyCodePayload,
};
use crate::error::{Error, Result};
use crate::middleware::auth::require_session;
use crate::middleware::lockout::LockoutGuard;
use crate::models::profile::{ProfileImage, Role, StudentProfile};
use crate::services::api_client::ApiClient;
use crate::services::sync_service::{ChangeFeed, PortalEvent};
use crate::storage::SessionCache;
use crate::utils::time::format_countdown;
use crate::utils::validation::validate;

/// Seconds a password reset code stays valid after it was requested.
pub const RESET_CODE_TTL_SECS: i64 = 300;

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub role: Role,
    pub name: String,
}

/// Login and logout for both roles. A session is written to the store only
/// after the server accepted the credentials.
#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
    session: SessionCache,
    feed: ChangeFeed,
    lockout: LockoutGuard,
}

impl AuthService {
    pub fn new(api: ApiClient, session: SessionCache, feed: ChangeFeed) -> Self {
        Self {
            api,
            session,
            feed,
            lockout: LockoutGuard::new(),
        }
    }

    pub fn lockout(&self) -> &LockoutGuard {
        &self.lockout
    }

    /// Restores the session of a previous run. An expired staff token is
    /// dropped here instead of failing on the first request.
    pub async fn resume(&self) -> Option<SessionInfo> {
        let now = crate::utils::time::now();
        for role in [Role::Staff, Role::Student] {
            match require_session(&self.session, role, now).await {
                Ok(()) => {
                    if let Some(token) = self.session.token(role).await {
                        self.api.set_bearer(Some(token)).await;
                    }
                    let name = self.session.username().await.unwrap_or_default();
                    return Some(SessionInfo { role, name });
                }
                Err(e) => debug!(error = %e, %role, "no session to resume"),
            }
        }
        None
    }

    pub async fn staff_login(&self, email: &str, password: &str) -> Result<SessionInfo> {
        self.lockout.check()?;
        let payload = LoginPayload {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        validate(&payload)?;

        let res = self
            .api
            .post::<_, StaffLoginResponse>("/api/staff/login/", &payload, "Login failed")
            .await;
        let res = self.lockout.observe(res)?;
        self.start_staff_session(res).await
    }

    /// `credential` is the ID token handed out by Google Identity Services.
    pub async fn google_login(&self, credential: &str) -> Result<SessionInfo> {
        self.lockout.check()?;
        if credential.trim().is_empty() {
            return Err(Error::BadRequest("Google sign-in did not return a credential.".into()));
        }
        let res = self
            .api
            .post::<_, StaffLoginResponse>(
                "/api/staff/google/login/",
                &GoogleLoginPayload {
                    token: credential.to_string(),
                },
                "Google login failed",
            )
            .await;
        let res = self.lockout.observe(res)?;
        self.start_staff_session(res).await
    }

    async fn start_staff_session(&self, res: StaffLoginResponse) -> Result<SessionInfo> {
        let token = res
            .tokens
            .jwt
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Api {
                status: 200,
                message: "Login response carried no token".into(),
            })?;

        self.lockout.clear();
        self.session.set_token(Role::Staff, &token).await?;
        self.session.set_username(&res.name).await?;
        if let Some(image) = res.profile_image.as_deref().and_then(ProfileImage::from_raw) {
            self.session.set_avatar(Role::Staff, &image).await?;
        }
        self.api.set_bearer(Some(token)).await;

        info!(name = %res.name, "staff signed in");
        Ok(SessionInfo {
            role: Role::Staff,
            name: res.name,
        })
    }

    pub async fn student_login(&self, email: &str, password: &str) -> Result<SessionInfo> {
        self.lockout.check()?;
        let payload = LoginPayload {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        validate(&payload)?;

        let res = self
            .api
            .post::<_, StudentLoginResponse>("/api/student/login/", &payload, "Login failed")
            .await;
        let res = self.lockout.observe(res)?;
        self.lockout.clear();

        let profile = StudentProfile {
            student_id: res.student_id,
            name: res.name.clone(),
            email: res.email,
            regno: res.regno,
            dept: res.dept,
            collegename: res.collegename,
            profile_image: res.profile_image.clone(),
            ..Default::default()
        };
        self.session.set_profile(Role::Student, &profile).await?;
        self.session.set_username(&res.name).await?;
        if let Some(image) = res.profile_image.as_deref().and_then(ProfileImage::from_raw) {
            self.session.set_avatar(Role::Student, &image).await?;
        }

        info!(regno = %profile.regno, "student signed in");
        Ok(SessionInfo {
            role: Role::Student,
            name: res.name,
        })
    }

    /// Registers a staff account. Nothing is stored; the user signs in next.
    pub async fn staff_signup(&self, payload: &StaffSignupPayload) -> Result<()> {
        validate(payload)?;
        self.api
            .request(reqwest::Method::POST, "/api/staff/signup/")?
            .json(payload)
            .send_empty("Registration failed. Please try again.")
            .await?;
        info!(email = %payload.email, role = %payload.role, "staff account registered");
        Ok(())
    }

    pub async fn student_signup(&self, payload: &StudentSignupPayload) -> Result<()> {
        validate(payload)?;
        self.api
            .request(reqwest::Method::POST, "/api/student/signup/")?
            .json(payload)
            .send_empty("Registration failed. Please try again.")
            .await?;
        info!(regno = %payload.regno, "student account registered");
        Ok(())
    }

    /// Tells the server, then clears the local session whatever it answered.
    pub async fn logout(&self, role: Role) -> Result<()> {
        let path = match role {
            Role::Staff => "/api/staff/staff_logout/",
            Role::Student => "/api/student/logout/",
        };
        let server = self
            .api
            .request(reqwest::Method::POST, path)?
            .json(&serde_json::json!({}))
            .send_empty("Logout failed")
            .await;
        if let Err(e) = &server {
            warn!(error = %e, %role, "server logout failed, clearing local session anyway");
        }

        self.session.invalidate().await?;
        self.api.set_bearer(None).await;
        self.feed.publish(PortalEvent::SessionExpired);
        info!(%role, "signed out");
        Ok(())
    }

    pub fn reset_flow(&self, email: &str) -> ResetFlow {
        ResetFlow::new(self.api.clone(), email)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResetStep {
    RequestCode,
    VerifyCode,
    NewPassword,
    Done,
}

/// Staff password reset: request a code by email, verify it, set a new
/// password. The code is only accepted within [`RESET_CODE_TTL_SECS`].
#[derive(Debug, Clone)]
pub struct ResetFlow {
    api: ApiClient,
    email: String,
    step: ResetStep,
    requested_at: Option<DateTime<Utc>>,
    code: Option<String>,
}

impl ResetFlow {
    pub fn new(api: ApiClient, email: &str) -> Self {
        Self {
            api,
            email: email.trim().to_string(),
            step: ResetStep::RequestCode,
            requested_at: None,
            code: None,
        }
    }

    pub fn step(&self) -> ResetStep {
        self.step
    }

    pub fn seconds_left(&self, now: DateTime<Utc>) -> Option<u64> {
        let requested = self.requested_at?;
        let left = RESET_CODE_TTL_SECS - (now - requested).num_seconds();
        Some(left.max(0) as u64)
    }

    /// Remaining validity as `m:ss`, empty before a code was requested.
    pub fn countdown(&self, now: DateTime<Utc>) -> String {
        self.seconds_left(now).map(format_countdown).unwrap_or_default()
    }

    fn ensure_code_alive(&self, now: DateTime<Utc>) -> Result<()> {
        match self.seconds_left(now) {
            Some(0) => Err(Error::BadRequest(
                "Verification code expired. Please request a new one.".into(),
            )),
            Some(_) => Ok(()),
            None => Err(Error::BadRequest("Please request a verification code first.".into())),
        }
    }

    pub async fn request_code(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.email.is_empty() {
            return Err(Error::BadRequest("Please enter an email address".into()));
        }
        let payload = ForgotPasswordPayload {
            email: self.email.clone(),
        };
        validate(&payload)?;
        self.api
            .request(reqwest::Method::POST, "/api/staff/forgot-password/")?
            .json(&payload)
            .send_empty("Error sending verification code")
            .await?;

        self.requested_at = Some(now);
        self.code = None;
        self.step = ResetStep::VerifyCode;
        Ok(())
    }

    pub async fn verify_code(&mut self, code: &str, now: DateTime<Utc>) -> Result<()> {
        self.ensure_code_alive(now)?;
        let payload = VerifyCodePayload {
            email: self.email.clone(),
            token: code.trim().to_string(),
        };
        validate(&payload)?;
        self.api
            .request(reqwest::Method::POST, "/api/staff/verify-token/")?
            .json(&payload)
            .send_empty("Invalid or expired verification code")
            .await?;

        self.code = Some(payload.token);
        self.step = ResetStep::NewPassword;
        Ok(())
    }

    pub async fn reset_password(&mut self, password: &str, confirm: &str, now: DateTime<Utc>) -> Result<()> {
        self.ensure_code_alive(now)?;
        let Some(code) = self.code.clone() else {
            return Err(Error::BadRequest("Please verify the code first.".into()));
        };
        let payload = ResetPasswordPayload {
            email: self.email.clone(),
            token: code,
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        };
        validate(&payload)?;
        self.api
            .request(reqwest::Method::POST, "/api/staff/reset-password/")?
            .json(&payload)
            .send_empty("Error resetting password")
            .await?;

        self.step = ResetStep::Done;
        info!("password reset completed");
        Ok(())
    }

    /// One step back; leaving the password step keeps the requested code.
    pub fn back(&mut self) -> ResetStep {
        self.step = match self.step {
            ResetStep::NewPassword => {
                self.code = None;
                ResetStep::VerifyCode
            }
            ResetStep::VerifyCode => ResetStep::RequestCode,
            other => other,
        };
        self.step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::TimeZone;

    fn flow() -> ResetFlow {
        let config = Config::with_base_url("http://127.0.0.1:9").unwrap();
        ResetFlow::new(ApiClient::new(&config).unwrap(), "staff@college.edu")
    }

    #[test]
    fn countdown_runs_out_after_five_minutes() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let mut flow = flow();
        assert_eq!(flow.countdown(t0), "");
        flow.requested_at = Some(t0);
        assert_eq!(flow.countdown(t0 + chrono::Duration::seconds(1)), "4:59");
        assert_eq!(flow.seconds_left(t0 + chrono::Duration::minutes(6)), Some(0));
        assert!(flow.ensure_code_alive(t0 + chrono::Duration::minutes(6)).is_err());
    }

    #[tokio::test]
    async fn expired_code_is_refused_before_any_request() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let mut flow = flow();
        flow.requested_at = Some(t0);
        flow.step = ResetStep::VerifyCode;
        let err = flow
            .verify_code("123456", t0 + chrono::Duration::seconds(301))
            .await
            .unwrap_err();
        assert_eq!(err.notice(), "Verification code expired. Please request a new one.");
        assert_eq!(flow.step(), ResetStep::VerifyCode);
    }
}
