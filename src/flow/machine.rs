//! Pure transition table of the conversation.
//!
//! `decide` never performs I/O: the engine loads the record, asks for a
//! [`Step`] and then applies it (persist first, send second).

use crate::config::{Config, TargetPhoneRule};
use crate::db::entities::users;
use crate::db::types::ConversationState;

use super::event::{CallbackAction, InboundEvent};
use super::validate::{self, ContactFileCheck};

/// The part of a user record the transition table looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub exists: bool,
    pub agreed: bool,
    pub has_phone: bool,
    pub state: Option<ConversationState>,
}

impl Snapshot {
    pub fn of(user: Option<&users::Model>) -> Self {
        match user {
            Some(user) => Self {
                exists: true,
                agreed: user.agreed_to_terms,
                has_phone: user.phone_number.is_some(),
                state: user.state,
            },
            None => Self::default(),
        }
    }
}

/// Input validation settings.
#[derive(Debug, Clone)]
pub struct Rules {
    pub target_phone_rule: TargetPhoneRule,
    pub done_markers: Vec<String>,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            target_phone_rule: TargetPhoneRule::default(),
            done_markers: vec!["تم".to_string(), "done".to_string()],
        }
    }
}

impl Rules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_phone_rule: config.flow.target_phone_rule,
            done_markers: config.payment.done_markers.clone(),
        }
    }

    /// Substring match, case-insensitive; blank markers never match.
    pub fn is_payment_done(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.done_markers
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .any(|m| lowered.contains(&m.to_lowercase()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Unknown user or terms not accepted yet
    RequireStart,
    ShowTerms,
    ShowReady,
    Agree { needs_phone: bool },
    AlreadyAgreed,
    RequestPhone,
    SavePhone(String),
    RejectPhoto,
    StartCollection,
    /// Help pressed in the middle of a step
    RepeatPrompt(ConversationState),
    SkipContactFile,
    AcceptContactFile {
        file_id: String,
        file_name: String,
        extension: String,
    },
    RejectContactFile {
        file_name: Option<String>,
        extension: Option<String>,
    },
    ContactFileRequired,
    AcceptTargetPhone(String),
    RejectTargetPhone { digits: usize },
    AcceptRequest(String),
    RequestRequired,
    AddScreenshot(String),
    PaymentDone,
    PaymentRequired,
    VerificationPending,
    Echo(String),
    ShowInfo,
    Expedite,
    /// Button from a step that is no longer current
    StaleButton,
    Ignore,
}

impl Action {
    /// Whether applying the action writes to the user record.
    pub fn mutates_record(&self) -> bool {
        matches!(
            self,
            Action::Agree { .. }
                | Action::SavePhone(_)
                | Action::StartCollection
                | Action::SkipContactFile
                | Action::AcceptContactFile { .. }
                | Action::AcceptTargetPhone(_)
                | Action::AcceptRequest(_)
                | Action::AddScreenshot(_)
                | Action::PaymentDone
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Stay,
    To(Option<ConversationState>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub action: Action,
    pub transition: Transition,
}

impl Step {
    fn stay(action: Action) -> Self {
        Self {
            action,
            transition: Transition::Stay,
        }
    }

    fn to(action: Action, state: Option<ConversationState>) -> Self {
        Self {
            action,
            transition: Transition::To(state),
        }
    }
}

pub fn decide(rules: &Rules, snapshot: &Snapshot, event: &InboundEvent) -> Step {
    use ConversationState as S;

    if let InboundEvent::Start = event {
        return Step::stay(match (snapshot.agreed, snapshot.state) {
            (false, _) => Action::ShowTerms,
            (true, Some(S::AwaitingPhone)) => Action::RequestPhone,
            (true, _) => Action::ShowReady,
        });
    }

    if let InboundEvent::Callback { action, .. } = event {
        match action {
            CallbackAction::Unknown
            | CallbackAction::ConfirmPayment(_)
            | CallbackAction::RejectPayment(_) => return Step::stay(Action::Ignore),
            CallbackAction::AgreeTerms if snapshot.exists => {
                return agree(snapshot);
            }
            CallbackAction::ShowInfo if snapshot.exists => {
                return Step::stay(Action::ShowInfo);
            }
            _ => {}
        }
    }

    if !snapshot.exists || !snapshot.agreed {
        return Step::stay(Action::RequireStart);
    }

    if let InboundEvent::Callback { action, .. } = event {
        return callback(snapshot, *action);
    }

    // Contact share completes the phone step; every other input there re-asks.
    if snapshot.state == Some(S::AwaitingPhone) {
        return match event {
            InboundEvent::Contact { phone_number } => {
                Step::to(Action::SavePhone(phone_number.clone()), None)
            }
            InboundEvent::Photo { .. } => Step::stay(Action::RejectPhoto),
            _ => Step::stay(Action::RequestPhone),
        };
    }

    if matches!(event, InboundEvent::Photo { .. }) && snapshot.state != Some(S::AwaitingPayment) {
        return Step::stay(Action::RejectPhoto);
    }

    match snapshot.state {
        Some(S::AwaitingContactFile) => match event {
            InboundEvent::Document { file_id, file_name } => {
                match validate::check_contact_file(file_name.as_deref()) {
                    ContactFileCheck::Accepted { extension } => Step::to(
                        Action::AcceptContactFile {
                            file_id: file_id.clone(),
                            file_name: file_name.clone().unwrap_or_default(),
                            extension,
                        },
                        Some(S::AwaitingTargetPhone),
                    ),
                    ContactFileCheck::Rejected { extension } => {
                        Step::stay(Action::RejectContactFile {
                            file_name: file_name.clone(),
                            extension,
                        })
                    }
                }
            }
            _ => Step::stay(Action::ContactFileRequired),
        },
        Some(S::AwaitingTargetPhone) => {
            let text = text_of(event);
            match validate::normalize_target_phone(text, rules.target_phone_rule) {
                Ok(phone) => Step::to(Action::AcceptTargetPhone(phone), Some(S::AwaitingRequest)),
                Err(digits) => Step::stay(Action::RejectTargetPhone { digits }),
            }
        }
        Some(S::AwaitingRequest) => match validate::normalize_request(text_of(event)) {
            Some(request) => Step::to(
                Action::AcceptRequest(request.to_string()),
                Some(S::AwaitingPayment),
            ),
            None => Step::stay(Action::RequestRequired),
        },
        Some(S::AwaitingPayment) => match event {
            InboundEvent::Photo { file_id } => Step::stay(Action::AddScreenshot(file_id.clone())),
            InboundEvent::Text(text) if rules.is_payment_done(text) => {
                Step::to(Action::PaymentDone, Some(S::VerifyingPayment))
            }
            _ => Step::stay(Action::PaymentRequired),
        },
        Some(S::VerifyingPayment) => Step::stay(Action::VerificationPending),
        Some(S::AwaitingPhone) => Step::stay(Action::RequestPhone),
        None | Some(S::Completed) => match event {
            InboundEvent::Text(text) => Step::stay(Action::Echo(text.clone())),
            _ => Step::stay(Action::ShowReady),
        },
    }
}

fn agree(snapshot: &Snapshot) -> Step {
    if snapshot.agreed {
        return Step::stay(Action::AlreadyAgreed);
    }
    if snapshot.has_phone {
        Step::to(Action::Agree { needs_phone: false }, None)
    } else {
        Step::to(
            Action::Agree { needs_phone: true },
            Some(ConversationState::AwaitingPhone),
        )
    }
}

fn callback(snapshot: &Snapshot, action: CallbackAction) -> Step {
    use ConversationState as S;

    match action {
        CallbackAction::Help => match snapshot.state {
            None | Some(S::Completed) => {
                Step::to(Action::StartCollection, Some(S::AwaitingContactFile))
            }
            Some(S::VerifyingPayment) => Step::stay(Action::VerificationPending),
            Some(state) => Step::stay(Action::RepeatPrompt(state)),
        },
        CallbackAction::SkipContactFile => match snapshot.state {
            Some(S::AwaitingContactFile) => {
                Step::to(Action::SkipContactFile, Some(S::AwaitingTargetPhone))
            }
            _ => Step::stay(Action::StaleButton),
        },
        CallbackAction::Expedite => match snapshot.state {
            Some(S::Completed) => Step::stay(Action::Expedite),
            _ => Step::stay(Action::StaleButton),
        },
        CallbackAction::AgreeTerms => agree(snapshot),
        CallbackAction::ShowInfo => Step::stay(Action::ShowInfo),
        CallbackAction::ConfirmPayment(_)
        | CallbackAction::RejectPayment(_)
        | CallbackAction::Unknown => Step::stay(Action::Ignore),
    }
}

/// Non-text inputs validate as empty text.
fn text_of(event: &InboundEvent) -> &str {
    match event {
        InboundEvent::Text(text) => text,
        _ => "",
    }
}
