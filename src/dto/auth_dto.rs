use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Validate)]
pub struct LoginPayload {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoogleLoginPayload {
    /// ID token returned by Google Identity Services.
    pub token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionTokens {
    #[serde(default, alias = "access_token")]
    pub jwt: Option<String>,
}

/// Body of a successful staff login, password or Google.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffLoginResponse {
    #[serde(default)]
    pub tokens: SessionTokens,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentLoginResponse {
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub regno: String,
    #[serde(default)]
    pub dept: Option<String>,
    #[serde(default)]
    pub collegename: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct ForgotPasswordPayload {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct VerifyCodePayload {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(custom(function = "validate_reset_code"))]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct ResetPasswordPayload {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(custom(function = "validate_reset_code"))]
    pub token: String,
    #[validate(
        length(min = 8, message = "Password must be at least 8 characters"),
        custom(function = "validate_password_strength")
    )]
    pub password: String,
    #[serde(skip)]
    #[validate(must_match(other = "password", message = "Passwords must match"))]
    pub confirm_password: String,
}

/// Body of `POST /api/staff/signup/`. Departments go over the wire joined
/// with `", "`.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct StaffSignupPayload {
    #[validate(length(min = 1, message = "Required"))]
    pub name: String,
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[serde(serialize_with = "join_departments")]
    #[validate(length(min = 1, message = "Select at least one department"))]
    pub department: Vec<String>,
    #[validate(length(min = 1, message = "Required"))]
    pub collegename: String,
    #[validate(
        length(min = 8, message = "Password must be at least 8 characters"),
        custom(function = "validate_password_strength")
    )]
    pub password: String,
    #[serde(skip)]
    #[validate(must_match(other = "password", message = "Passwords must match"))]
    pub confirm_password: String,
    #[validate(custom(function = "validate_phone"))]
    pub phoneno: String,
    #[validate(length(min = 1, message = "Required"))]
    pub role: String,
}

fn join_departments<S: serde::Serializer>(departments: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&departments.join(", "))
}

/// Body of `POST /api/student/signup/`.
#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct StudentSignupPayload {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long."))]
    pub password: String,
    #[validate(length(min = 1, message = "College name is required"))]
    pub collegename: String,
    #[validate(length(min = 1, message = "Department is required"))]
    pub dept: String,
    #[validate(length(min = 1, message = "Registration number is required"))]
    pub regno: String,
    pub year: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct SetStudentPasswordPayload {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long."))]
    pub new_password: String,
}

pub fn validate_reset_code(code: &str) -> Result<(), ValidationError> {
    if code.len() == 6 && code.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("reset_code").with_message("Must be a 6-digit number".into()))
    }
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("phone").with_message("Invalid phone number".into()))
    }
}

pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let rules: [(fn(char) -> bool, &'static str); 4] = [
        (|c| c.is_ascii_digit(), "Must contain at least one number"),
        (|c| c.is_ascii_uppercase(), "Must contain at least one uppercase letter"),
        (|c| c.is_ascii_lowercase(), "Must contain at least one lowercase letter"),
        (|c| !c.is_ascii_alphanumeric(), "Must contain at least one special character"),
    ];
    for (check, message) in rules {
        if !password.chars().any(check) {
            return Err(ValidationError::new("password_strength").with_message(message.into()));
        }
    }
    Ok(())
}
