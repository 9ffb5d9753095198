//! Message content for each notification kind

use super::Notification;
use crate::models::Contact;

const SIGNATURE: &str = "<p>Best regards,<br>KYC Automation Team</p>";

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub email_subject: String,
    pub email_html: String,
    pub sms_text: String,
}

pub fn render(notification: &Notification, contact: &Contact) -> RenderedMessage {
    let greeting = format!("<p>Dear {},</p>", contact.full_name());

    match notification {
        Notification::Approval => RenderedMessage {
            email_subject: "Your KYC Verification is Complete".to_string(),
            email_html: page(
                "KYC Verification Complete",
                &[
                    greeting,
                    "<p>We are pleased to inform you that your KYC verification has been completed successfully.</p>".to_string(),
                    "<p>You can now proceed with using our services.</p>".to_string(),
                ],
            ),
            sms_text: format!(
                "Dear {}, your KYC verification is complete. You can now use our services.",
                contact.first_name
            ),
        },
        Notification::Review { required_actions } => {
            let items: String = required_actions
                .iter()
                .map(|action| format!("<li>{}</li>", action))
                .collect();

            RenderedMessage {
                email_subject: "Additional Information Required for KYC Verification".to_string(),
                email_html: page(
                    "Additional Information Required",
                    &[
                        greeting,
                        "<p>We need some additional information to complete your KYC verification:</p>".to_string(),
                        format!("<ul>{}</ul>", items),
                        "<p>Please provide the requested information at your earliest convenience.</p>".to_string(),
                    ],
                ),
                sms_text: format!(
                    "Dear {}, additional information is required for your KYC verification. Please check your email.",
                    contact.first_name
                ),
            }
        }
        Notification::Rejection { reason } => RenderedMessage {
            email_subject: "KYC Verification Update".to_string(),
            email_html: page(
                "KYC Verification Update",
                &[
                    greeting,
                    "<p>We regret to inform you that your KYC verification could not be completed at this time.</p>".to_string(),
                    format!("<p>Reason: {}</p>", reason),
                    "<p>Please contact our support team for further assistance.</p>".to_string(),
                ],
            ),
            sms_text: format!(
                "Dear {}, your KYC verification requires attention. Please check your email for details.",
                contact.first_name
            ),
        },
    }
}

fn page(heading: &str, paragraphs: &[String]) -> String {
    format!(
        "<html><body><h1>{}</h1>{}{}</body></html>",
        heading,
        paragraphs.concat(),
        SIGNATURE
    )
}
