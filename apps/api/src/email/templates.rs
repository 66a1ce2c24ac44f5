//! Transactional email bodies. Every message carries a plain-text part and an HTML part.

const STYLE: &str = r#"
        body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }
        .container { max-width: 600px; margin: 0 auto; padding: 20px; }
        .header { background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
                  color: white; padding: 30px; text-align: center; border-radius: 10px 10px 0 0; }
        .content { background: #f9f9f9; padding: 30px; border-radius: 0 0 10px 10px; }
        .button { display: inline-block; padding: 12px 30px; background: #667eea;
                  color: white; text-decoration: none; border-radius: 5px; margin: 20px 0; }
        .footer { text-align: center; margin-top: 20px; color: #666; font-size: 12px; }
"#;

#[derive(Debug, Clone)]
pub struct EmailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub fn verification_link(frontend_url: &str, token: &str) -> String {
    format!("{frontend_url}/verify-email?token={token}")
}

pub fn reset_link(frontend_url: &str, token: &str) -> String {
    format!("{frontend_url}/reset-password?token={token}")
}

pub fn verification_email(frontend_url: &str, token: &str) -> EmailContent {
    let link = verification_link(frontend_url, token);
    EmailContent {
        subject: "Verify Your InsightCare Account".to_string(),
        text: format!(
            "Welcome to InsightCare!\n\n\
             Please verify your email address to activate your account.\n\n\
             Click this link to verify:\n{link}\n\n\
             This link will expire in 24 hours.\n"
        ),
        html: wrap_html(
            "Verify Your Email",
            &format!(
                "<p>Welcome to InsightCare!</p>\n\
                 <p>Please verify your email address to activate your account.</p>\n\
                 {}\n\
                 <p><strong>This link will expire in 24 hours.</strong></p>",
                button("Verify Email", &link)
            ),
        ),
    }
}

pub fn password_reset_email(frontend_url: &str, token: &str) -> EmailContent {
    let link = reset_link(frontend_url, token);
    EmailContent {
        subject: "Reset Your InsightCare Password".to_string(),
        text: format!(
            "Password Reset Request\n\n\
             We received a request to reset your password for your InsightCare account.\n\n\
             Click this link to reset your password:\n{link}\n\n\
             This link will expire in 1 hour.\n\n\
             If you didn't request this, please ignore this email.\n"
        ),
        html: wrap_html(
            "Password Reset Request",
            &format!(
                "<p>Hello,</p>\n\
                 <p>We received a request to reset your password for your InsightCare account.</p>\n\
                 {}\n\
                 <p><strong>This link will expire in 1 hour.</strong></p>\n\
                 <p>If you didn't request this, please ignore this email. \
                 Your password won't be changed.</p>",
                button("Reset Password", &link)
            ),
        ),
    }
}

fn button(label: &str, link: &str) -> String {
    format!(
        "<center><a href=\"{link}\" class=\"button\">{label}</a></center>\n\
         <p>Or copy and paste this link into your browser:</p>\n\
         <p style=\"word-break: break-all; color: #667eea;\">{link}</p>"
    )
}

fn wrap_html(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <div class=\"container\">\n\
         <div class=\"header\"><h1>{title}</h1></div>\n\
         <div class=\"content\">\n{body}\n\
         <div class=\"footer\"><p>&copy; InsightCare. All rights reserved.</p></div>\n\
         </div>\n</div>\n</body>\n</html>\n"
    )
}
