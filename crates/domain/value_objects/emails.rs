use super::otp_types::OtpType;

/// Minutes an emailed one-time code stays valid.
pub const OTP_VALIDITY_MINUTES: i64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: Option<String>,
}

fn greeting(user_name: Option<&str>) -> String {
    match user_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => format!("Hi {name},"),
        None => "Hi,".to_string(),
    }
}

fn wrap(body: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">{body}</div>"#
    )
}

impl OutgoingEmail {
    pub fn custom(to: &str, subject: &str, html: &str, text: Option<String>) -> Self {
        Self {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
            text,
        }
    }

    pub fn password_reset(to: &str, reset_link: &str, user_name: Option<&str>) -> Self {
        let html = wrap(&format!(
            r#"<h2>Reset your password</h2>
<p>{}</p>
<p>We received a request to reset your password. Click the link below to choose a new one:</p>
<p><a href="{reset_link}">Reset password</a></p>
<p>If you didn't request a password reset, you can safely ignore this email.</p>"#,
            greeting(user_name)
        ));

        Self {
            to: to.to_string(),
            subject: "Reset your password".to_string(),
            html,
            text: Some(format!("Reset your password: {reset_link}")),
        }
    }

    pub fn welcome(to: &str, user_name: &str, login_link: &str) -> Self {
        let html = wrap(&format!(
            r#"<h2>Welcome aboard!</h2>
<p>{}</p>
<p>Your account is ready. You can sign in any time:</p>
<p><a href="{login_link}">Sign in</a></p>"#,
            greeting(Some(user_name))
        ));

        Self {
            to: to.to_string(),
            subject: "Welcome!".to_string(),
            html,
            text: Some(format!("Welcome {user_name}! Sign in at {login_link}")),
        }
    }

    pub fn email_verification(to: &str, verification_link: &str, user_name: Option<&str>) -> Self {
        let html = wrap(&format!(
            r#"<h2>Verify your email address</h2>
<p>{}</p>
<p>Please confirm your email address by clicking the link below:</p>
<p><a href="{verification_link}">Verify email</a></p>"#,
            greeting(user_name)
        ));

        Self {
            to: to.to_string(),
            subject: "Verify your email address".to_string(),
            html,
            text: Some(format!("Verify your email: {verification_link}")),
        }
    }

    pub fn one_time_code(to: &str, otp: &str, otp_type: OtpType) -> Self {
        let (subject, heading, intro) = match otp_type {
            OtpType::ForgetPassword => (
                "Password Reset Verification Code",
                "Password Reset Request",
                "You requested to reset your password. Please use the code below:",
            ),
            OtpType::EmailVerification => (
                "Email Verification Code",
                "Verify your email",
                "Use the code below to verify your email address:",
            ),
            OtpType::SignIn => (
                "Sign-in Code",
                "Sign in",
                "Use the code below to finish signing in:",
            ),
        };

        let html = wrap(&format!(
            r#"<h2>{heading}</h2>
<p>{intro}</p>
<div style="background-color: #f4f4f4; padding: 20px; text-align: center; font-size: 32px; font-weight: bold; letter-spacing: 5px;">{otp}</div>
<p>This code will expire in {OTP_VALIDITY_MINUTES} minutes.</p>
<p>If you didn't request this code, please ignore this email.</p>"#
        ));

        Self {
            to: to.to_string(),
            subject: subject.to_string(),
            html,
            text: Some(format!("Your code is {otp}. It expires in {OTP_VALIDITY_MINUTES} minutes.")),
        }
    }
}
