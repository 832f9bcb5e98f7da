use core::fmt;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Position of a user in the conversation.
///
/// Stored as a nullable string column: `NULL` means the user is idle (new,
/// or fully onboarded with no pending collection step). Any string outside
/// this set fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[sea_orm(string_value = "awaiting_phone")]
    AwaitingPhone,
    #[sea_orm(string_value = "awaiting_contact_file")]
    AwaitingContactFile,
    #[sea_orm(string_value = "awaiting_target_phone")]
    AwaitingTargetPhone,
    #[sea_orm(string_value = "awaiting_request")]
    AwaitingRequest,
    #[sea_orm(string_value = "awaiting_payment")]
    AwaitingPayment,
    #[sea_orm(string_value = "verifying_payment")]
    VerifyingPayment,
    #[sea_orm(string_value = "completed")]
    Completed,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::AwaitingPhone => "awaiting_phone",
            ConversationState::AwaitingContactFile => "awaiting_contact_file",
            ConversationState::AwaitingTargetPhone => "awaiting_target_phone",
            ConversationState::AwaitingRequest => "awaiting_request",
            ConversationState::AwaitingPayment => "awaiting_payment",
            ConversationState::VerifyingPayment => "verifying_payment",
            ConversationState::Completed => "completed",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
