use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OtpType {
    ForgetPassword,
    EmailVerification,
    SignIn,
}

impl OtpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpType::ForgetPassword => "forget-password",
            OtpType::EmailVerification => "email-verification",
            OtpType::SignIn => "sign-in",
        }
    }

    /// Key under which the pending code for `email` is stored.
    pub fn identifier(&self, email: &str) -> String {
        format!("{}-otp-{}", self.as_str(), email.trim().to_lowercase())
    }
}

impl Display for OtpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
