//! Operator-facing texts.

use crate::bot::transport::{Button, Markup};
use crate::db::entities::users;
use crate::db::repo::Resolution;
use crate::flow::event::CallbackAction;

/// Telegram caption limit, in characters
pub const CAPTION_LIMIT: usize = 1024;
/// Telegram text message limit, in characters
pub const TEXT_LIMIT: usize = 4096;
/// Room left for the request once the fixed summary lines are in
const REQUEST_LIMIT: usize = 3000;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━";

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

/// Keep at most `max` characters, marking the cut with an ellipsis.
fn clip(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => {
            let keep = text[..end]
                .char_indices()
                .nth(max.saturating_sub(1))
                .map_or(end, |(i, _)| i);
            format!("{}…", &text[..keep])
        }
        None => text.to_string(),
    }
}

/// Everything collected for one request.
pub fn request_summary(user: &users::Model) -> String {
    format!(
        "🔔 New request\n\n\
         {rule}\n\
         👤 User:\n\
         • Name: {name}\n\
         • Username: {handle}\n\
         • Telegram id: {id}\n\
         • Phone: {phone}\n\n\
         {rule}\n\
         📞 Target phone:\n\
         {target}\n\n\
         {rule}\n\
         📝 Request:\n\
         {request}\n\
         {rule}\n\
         📸 Screenshots: {shots}",
        rule = RULE,
        name = user.display_name(),
        handle = user.handle().unwrap_or_else(|| "-".to_string()),
        id = user.id,
        phone = or_dash(user.phone_number.as_deref()),
        target = or_dash(user.target_phone.as_deref()),
        request = clip(or_dash(user.user_request.as_deref()), REQUEST_LIMIT),
        shots = user.payment_screenshot_file_ids.len(),
    )
}

pub fn fits_caption(text: &str) -> bool {
    text.chars().count() <= CAPTION_LIMIT
}

pub fn contact_file_caption() -> &'static str {
    "📁 Contact file for the request above"
}

pub fn actions_prompt() -> &'static str {
    "⚠️ Confirm the payment manually"
}

pub fn actions_markup(user_id: i64) -> Markup {
    Markup::Inline(vec![
        vec![Button::callback(
            "✅ Confirm payment and clear the chat",
            CallbackAction::ConfirmPayment(user_id).to_string(),
        )],
        vec![Button::callback(
            "❌ Not paid, reset",
            CallbackAction::RejectPayment(user_id).to_string(),
        )],
    ])
}

/// Sent when a countdown releases a request without an operator click.
pub fn completed_note(user: &users::Model) -> String {
    format!(
        "📬 Request completed\n\n\
         👤 Name: {}\n\
         📱 Username: {}\n\
         🆔 Telegram id: {}\n\
         📞 Target phone: {}\n\n\
         📝 Request:\n{}",
        user.display_name(),
        user.handle().unwrap_or_else(|| "-".to_string()),
        user.id,
        or_dash(user.target_phone.as_deref()),
        clip(or_dash(user.user_request.as_deref()), REQUEST_LIMIT),
    )
}

/// Replaces the operator's action message once resolved.
pub fn resolved_note(resolution: Resolution, user_id: i64) -> String {
    match resolution {
        Resolution::Confirm => format!("✅ Payment confirmed for user {}", user_id),
        Resolution::Expire => format!("⏱️ Request of user {} was released automatically", user_id),
        Resolution::Reject => format!("❌ Payment rejected for user {}, data cleared", user_id),
    }
}

pub fn confirmed_answer() -> &'static str {
    "Payment confirmed ✅"
}

pub fn rejected_answer() -> &'static str {
    "Request reset ❌"
}

pub fn already_resolved() -> &'static str {
    "This request has already been handled."
}

pub fn not_authorized() -> &'static str {
    "⛔ You are not authorized to do this."
}

pub fn expedite_note(user: &users::Model) -> String {
    format!(
        "⚡ User {} ({}) asked to expedite their request.",
        user.display_name(),
        user.id
    )
}
