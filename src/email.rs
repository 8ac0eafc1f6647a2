use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{error, info};

use crate::config::Config;

/// SMTP mailer for account emails. Dispatch is best-effort: a failure is
/// logged and reported as `false`, never bubbled up to the caller.
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
    frontend_url: String,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Self {
        let transport = if config.smtp_user.is_empty() {
            // No credentials configured: every send fails softly.
            None
        } else {
            match AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host) {
                Ok(builder) => Some(
                    builder
                        .credentials(Credentials::new(
                            config.smtp_user.clone(),
                            config.smtp_password.clone(),
                        ))
                        .build(),
                ),
                Err(err) => {
                    error!("Failed to configure SMTP relay {}: {}", config.smtp_host, err);
                    None
                }
            }
        };

        Self {
            transport,
            from: config.email_from.clone(),
            frontend_url: config.frontend_url.clone(),
        }
    }

    pub async fn send_verification_email(&self, email: &str, token: &str, user_name: &str) -> bool {
        let verification_url = format!("{}/verify-email?token={}", self.frontend_url, token);
        let html = verification_body(user_name, &verification_url);
        self.send(email, "Email Verification", html).await
    }

    async fn send(&self, to: &str, subject: &str, html: String) -> bool {
        let Some(transport) = &self.transport else {
            error!("Email not sent to {}: SMTP transport not configured", to);
            return false;
        };

        let message = Message::builder()
            .from(match self.from.parse() {
                Ok(mailbox) => mailbox,
                Err(err) => {
                    error!("Invalid sender address {:?}: {}", self.from, err);
                    return false;
                }
            })
            .to(match to.parse() {
                Ok(mailbox) => mailbox,
                Err(err) => {
                    error!("Invalid recipient address {:?}: {}", to, err);
                    return false;
                }
            })
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html);

        let message = match message {
            Ok(message) => message,
            Err(err) => {
                error!("Failed to build email for {}: {}", to, err);
                return false;
            }
        };

        match transport.send(message).await {
            Ok(_) => {
                info!("Verification email sent to {}", to);
                true
            }
            Err(err) => {
                error!("Error sending email to {}: {}", to, err);
                false
            }
        }
    }
}

fn verification_body(user_name: &str, verification_url: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2>Welcome, {user_name}!</h2>
  <p>Thank you for registering. To complete your registration and access your
  account, please verify your email address by clicking the link below:</p>
  <p><a href="{verification_url}">Verify Email Address</a></p>
  <p>If the link doesn't work, copy and paste this URL into your browser:</p>
  <p>{verification_url}</p>
  <p>This verification link will expire in 24 hours. If you didn't create an
  account, please ignore this email.</p>
</div>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_the_verification_link() {
        let body = verification_body("Asha", "http://localhost:5173/verify-email?token=abc123");
        assert!(body.contains("Welcome, Asha!"));
        assert!(body.contains("verify-email?token=abc123"));
        assert!(body.contains("expire in 24 hours"));
    }
}
