use std::fmt;

/// Who sent an inbound update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub user_id: i64,
    pub chat_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl Sender {
    pub fn new(user_id: i64, chat_id: i64) -> Self {
        Self {
            user_id,
            chat_id,
            first_name: None,
            last_name: None,
            username: None,
        }
    }

    pub fn greeting_name(&self) -> String {
        self.first_name
            .clone()
            .or_else(|| self.username.clone())
            .unwrap_or_else(|| self.user_id.to_string())
    }
}

/// Transport-neutral inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// `/start`
    Start,
    Text(String),
    Document {
        file_id: String,
        file_name: Option<String>,
    },
    /// Highest resolution variant only
    Photo { file_id: String },
    Contact { phone_number: String },
    Callback {
        callback_id: String,
        action: CallbackAction,
        /// Message the button was attached to
        message_id: Option<i32>,
    },
    /// Stickers, voice notes, locations...
    Unsupported,
}

/// Parsed inline button payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    AgreeTerms,
    Help,
    SkipContactFile,
    ShowInfo,
    Expedite,
    ConfirmPayment(i64),
    RejectPayment(i64),
    Unknown,
}

const CONFIRM_PREFIX: &str = "confirm_payment:";
const REJECT_PREFIX: &str = "reject_payment:";

impl CallbackAction {
    pub fn parse(data: &str) -> Self {
        match data {
            "agree_terms" => Self::AgreeTerms,
            "help" => Self::Help,
            "skip_contact_file" => Self::SkipContactFile,
            "show_info" => Self::ShowInfo,
            "expedite_request" => Self::Expedite,
            _ => {
                if let Some(id) = data.strip_prefix(CONFIRM_PREFIX) {
                    id.parse().map(Self::ConfirmPayment).unwrap_or(Self::Unknown)
                } else if let Some(id) = data.strip_prefix(REJECT_PREFIX) {
                    id.parse().map(Self::RejectPayment).unwrap_or(Self::Unknown)
                } else {
                    Self::Unknown
                }
            }
        }
    }

    /// Operator-only actions are routed to the approval coordinator.
    pub fn is_operator_action(&self) -> bool {
        matches!(self, Self::ConfirmPayment(_) | Self::RejectPayment(_))
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AgreeTerms => f.write_str("agree_terms"),
            Self::Help => f.write_str("help"),
            Self::SkipContactFile => f.write_str("skip_contact_file"),
            Self::ShowInfo => f.write_str("show_info"),
            Self::Expedite => f.write_str("expedite_request"),
            Self::ConfirmPayment(id) => write!(f, "{}{}", CONFIRM_PREFIX, id),
            Self::RejectPayment(id) => write!(f, "{}{}", REJECT_PREFIX, id),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}
