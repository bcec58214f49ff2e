pub mod auth;
pub mod lockout;
