//! User-facing texts and button layouts of the conversation.

use crate::bot::transport::{Button, Markup};
use crate::config::{PaymentConfig, TargetPhoneRule};
use crate::db::entities::users;
use crate::db::types::ConversationState;
use crate::flow::event::CallbackAction;

pub const HELP_LABEL: &str = "ℹ️ Help";
pub const INFO_LABEL: &str = "📋 My info";
pub const AGREE_LABEL: &str = "✅ I agree to the terms";
pub const SKIP_LABEL: &str = "⏭️ Skip the file";
pub const SHARE_PHONE_LABEL: &str = "📱 Share my phone number";
pub const EXPEDITE_LABEL: &str = "⚡ Expedite my request";
pub const DOWNLOAD_LABEL: &str = "💾 Download";
pub const SERVICE_LABEL: &str = "🔗 Our service";
pub const RESTART_LABEL: &str = "🔄 Start again";

pub fn terms(name: &str) -> String {
    format!(
        "Hello {}! 👋\n\n\
         To continue, please accept the terms of use:\n\n\
         By using this bot you agree to follow all applicable laws and regulations. \
         Using the bot for unlawful or harmful purposes is forbidden.",
        name
    )
}

pub fn terms_markup() -> Markup {
    Markup::single(Button::callback(AGREE_LABEL, CallbackAction::AgreeTerms.to_string()))
}

pub fn ready(name: &str) -> String {
    format!(
        "Welcome back {}! ✅\n\nYou have already accepted the terms.\nHow can I help you today?",
        name
    )
}

/// Help and info buttons, optionally followed by a URL button.
pub fn ready_markup(service_link: Option<Button>) -> Markup {
    let mut rows = vec![vec![
        Button::callback(HELP_LABEL, CallbackAction::Help.to_string()),
        Button::callback(INFO_LABEL, CallbackAction::ShowInfo.to_string()),
    ]];
    if let Some(link) = service_link {
        rows.push(vec![link]);
    }
    Markup::Inline(rows)
}

pub fn require_start() -> &'static str {
    "⚠️ You need to accept the terms first. Send /start to begin."
}

pub fn agreed_answer() -> &'static str {
    "Terms accepted ✅"
}

pub fn already_agreed() -> &'static str {
    "You have already accepted the terms."
}

pub fn agreed_ready() -> &'static str {
    "Great! ✨\n\nYou have accepted the terms.\nHow can I help you today?"
}

pub fn request_phone() -> &'static str {
    "📱 To continue, please share your phone number using the button below."
}

pub fn phone_markup() -> Markup {
    Markup::RequestContact(SHARE_PHONE_LABEL.to_string())
}

pub fn phone_saved(phone: &str) -> String {
    format!(
        "✅ Thanks! Your phone number has been saved.\n\n📞 Number: {}\n\nYou can now use every feature of the bot.",
        phone
    )
}

pub fn photo_rejected() -> &'static str {
    "❌ Photos can't be sent at this stage.\n\n\
     ⚠️ Photos are only accepted as payment screenshots."
}

pub fn contact_file_prompt() -> &'static str {
    "📁 Please send your contact list file.\n\n\
     Accepted formats:\n\
     ✅ VCF (.vcf)\n\
     ✅ CSV (.csv)\n\n\
     ⚠️ Other formats are not accepted."
}

pub fn contact_file_markup() -> Markup {
    Markup::single(Button::callback(
        SKIP_LABEL,
        CallbackAction::SkipContactFile.to_string(),
    ))
}

pub fn contact_file_received(file_name: &str, extension: &str) -> String {
    format!(
        "✅ Contact file received!\n\n📄 File: {}\n📊 Format: {}",
        file_name,
        extension.to_uppercase()
    )
}

pub fn contact_file_rejected(file_name: Option<&str>, extension: Option<&str>) -> String {
    format!(
        "❌ Unsupported file format!\n\n\
         File: {}\n\
         Format: {}\n\n\
         ⚠️ Please send a .vcf or .csv file.",
        file_name.unwrap_or("-"),
        extension
            .map(|e| e.to_uppercase())
            .unwrap_or_else(|| "unknown".to_string())
    )
}

pub fn contact_file_required() -> &'static str {
    "⚠️ Please send a file, not a text message.\n\n\
     Accepted formats:\n\
     ✅ VCF (.vcf)\n\
     ✅ CSV (.csv)"
}

pub fn skipped_answer() -> &'static str {
    "File skipped ✅"
}

pub fn target_phone_prompt(rule: TargetPhoneRule) -> String {
    let example = match rule {
        TargetPhoneRule::ElevenDigits => "Example: 01012345678",
        TargetPhoneRule::International => "Example: 0501234567 or +966501234567",
    };
    format!(
        "📞 Now send the phone number this request is about.\n\n{}\n\n⚠️ Send the number only.",
        example
    )
}

pub fn target_phone_accepted(phone: &str) -> String {
    format!("✅ Phone number received!\n\n📞 Number: {}", phone)
}

pub fn target_phone_rejected(digits: usize, rule: TargetPhoneRule) -> String {
    let expected = match rule {
        TargetPhoneRule::ElevenDigits => "The number must have exactly 11 digits.",
        TargetPhoneRule::International => {
            "The number must have 10 to 15 digits, optionally starting with +."
        }
    };
    format!(
        "❌ Invalid phone number!\n\n⚠️ {}\n\n❌ Digits received: {}\n\nPlease check the number and send it again.",
        expected, digits
    )
}

pub fn request_prompt() -> &'static str {
    "📝 Now describe what you need regarding this number.\n\n⚠️ Please write your request clearly."
}

pub fn request_received(request: &str) -> String {
    format!("✅ Request received!\n\n📋 Your request: {}", request)
}

pub fn request_required() -> &'static str {
    "⚠️ Please write your request as a text message."
}

pub fn payment_instructions(payment: &PaymentConfig) -> String {
    let mut text = String::from("💰 Payment\n\n");
    if let Some(amount) = &payment.amount {
        text.push_str(&format!("Amount: {}\n", amount));
    }
    if let Some(channel) = &payment.channel {
        text.push_str(&format!("Pay via: {}\n", channel));
    }
    let marker = payment
        .done_markers
        .first()
        .map(String::as_str)
        .unwrap_or("done");
    text.push_str(&format!(
        "\nOnce paid:\n\
         1️⃣ send one or more screenshots of the payment\n\
         2️⃣ write \"{}\" when all screenshots are sent",
        marker
    ));
    text
}

pub fn screenshot_received(count: usize) -> String {
    format!(
        "✅ Screenshot received!\n\n📸 Screenshots so far: {}\n\n\
         💡 Send more, or write the confirmation word to submit.",
        count
    )
}

pub fn payment_required() -> &'static str {
    "⚠️ Please send:\n\
     • one or more payment screenshots\n\
     • then the confirmation word once you are done"
}

pub fn verification_status(remaining_secs: Option<u64>) -> String {
    let mut text = String::from("✅ Payment confirmation received!\n\n🔍 Verifying your payment...\n");
    if let Some(secs) = remaining_secs {
        text.push_str(&format!("⏱️ Time remaining: {} seconds\n", secs));
    }
    text.push_str("\n⚠️ Please wait, you will be notified as soon as verification is complete.");
    text
}

pub fn verification_pending() -> &'static str {
    "⏳ Your payment is being verified. Please wait."
}

pub fn echo(text: &str) -> String {
    format!(
        "Thanks for your message: \"{}\"\n\nPress help to start a new request.",
        text
    )
}

pub fn stale_button() -> &'static str {
    "This button is no longer active."
}

/// The prompt that belongs to a collection step.
pub fn step_prompt(
    state: ConversationState,
    rule: TargetPhoneRule,
    payment: &PaymentConfig,
) -> (String, Option<Markup>) {
    match state {
        ConversationState::AwaitingPhone => (request_phone().to_string(), Some(phone_markup())),
        ConversationState::AwaitingContactFile => {
            (contact_file_prompt().to_string(), Some(contact_file_markup()))
        }
        ConversationState::AwaitingTargetPhone => (target_phone_prompt(rule), None),
        ConversationState::AwaitingRequest => (request_prompt().to_string(), None),
        ConversationState::AwaitingPayment => (payment_instructions(payment), None),
        ConversationState::VerifyingPayment => (verification_pending().to_string(), None),
        ConversationState::Completed => (agreed_ready().to_string(), None),
    }
}

pub fn profile(user: &users::Model) -> String {
    format!(
        "📋 Your information:\n\n\
         🆔 Telegram id: {}\n\
         👤 Name: {}\n\
         📱 Username: {}\n\
         📞 Phone: {}\n\
         ✅ Terms accepted: {}\n\
         📅 Accepted on: {}",
        user.id,
        user.display_name(),
        user.handle().unwrap_or_else(|| "-".to_string()),
        user.phone_number.as_deref().unwrap_or("-"),
        if user.agreed_to_terms { "yes" } else { "no" },
        user.agreed_at
            .map(|at| at.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string()),
    )
}

pub fn unlock() -> &'static str {
    "🎉 Your payment has been verified!\n\n\
     ✅ Your request has been received and will be reviewed.\n\n\
     ⏱️ We will get back to you within an hour.\n\n\
     Thank you! 🙏"
}

pub fn unlock_markup(download: Option<Button>) -> Markup {
    let mut rows = vec![vec![Button::callback(
        EXPEDITE_LABEL,
        CallbackAction::Expedite.to_string(),
    )]];
    if let Some(link) = download {
        rows.push(vec![link]);
    }
    Markup::Inline(rows)
}

pub fn expedited() -> &'static str {
    "⚡ Your expedite request has been sent!\n\n⏱️ We will contact you as soon as possible.\n\nThank you for your patience! 🙏"
}

pub fn expedite_answer() -> &'static str {
    "Expedite request sent ⚡"
}

pub fn expedite_failed() -> &'static str {
    "❌ Could not send the expedite request"
}

pub fn expedite_unconfigured() -> &'static str {
    "❌ Could not send the expedite request (configuration error)"
}

pub fn payment_rejected() -> &'static str {
    "❌ We could not verify your payment.\n\n\
     All data of this request has been cleared.\n\n\
     🔄 You can start again with the button below or by sending /start."
}

pub fn restart_markup() -> Markup {
    Markup::single(Button::callback(RESTART_LABEL, CallbackAction::Help.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_instructions_use_config() {
        let payment = PaymentConfig {
            amount: Some("100".to_string()),
            channel: Some("bank transfer".to_string()),
            done_markers: vec!["paid".to_string()],
        };

        let text = payment_instructions(&payment);
        assert!(text.contains("Amount: 100"));
        assert!(text.contains("Pay via: bank transfer"));
        assert!(text.contains("\"paid\""));
    }

    #[test]
    fn test_payment_instructions_without_details() {
        let text = payment_instructions(&PaymentConfig::default());
        assert!(!text.contains("Amount"));
        assert!(text.contains("\"تم\""));
    }

    #[test]
    fn test_rejected_target_phone_reports_count() {
        let text = target_phone_rejected(7, TargetPhoneRule::ElevenDigits);
        assert!(text.contains("Digits received: 7"));
        assert!(text.contains("exactly 11 digits"));
    }

    #[test]
    fn test_verification_status() {
        assert!(verification_status(Some(60)).contains("60 seconds"));
        assert!(!verification_status(None).contains("remaining"));
    }

    #[test]
    fn test_ready_markup_with_service_link() {
        let url = url::Url::parse("https://example.com/s").unwrap();
        let markup = ready_markup(Some(Button::url(SERVICE_LABEL, url)));

        match markup {
            Markup::Inline(rows) => {
                assert_eq!(rows.len(), 2);
                assert!(matches!(rows[1][0], Button::Url { .. }));
            }
            other => panic!("unexpected markup {:?}", other),
        }
    }
}
