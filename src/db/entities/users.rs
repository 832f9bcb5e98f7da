use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::types::{ConversationState, FileIds};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "users")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Telegram user id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub phone_number: Option<String>,
    #[sea_orm(default_value = false)]
    pub agreed_to_terms: bool,
    pub agreed_at: Option<DateTime>,
    pub state: Option<ConversationState>,
    pub contact_file_id: Option<String>,
    pub target_phone: Option<String>,
    pub payment_screenshot_file_ids: FileIds,
    #[sea_orm(column_type = "Text", nullable)]
    pub user_request: Option<String>,
    pub first_message_id: Option<i32>,
    /// Download link rotation, unbounded
    #[sea_orm(default_value = 0)]
    pub link_counter: i64,
    /// Service link rotation, kept below the list length
    #[sea_orm(default_value = 0)]
    pub service_link_counter: i64,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::messages::Entity")]
    Messages,
}

impl Related<super::messages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.id.to_string(),
        }
    }

    pub fn handle(&self) -> Option<String> {
        self.username.as_ref().map(|u| format!("@{}", u))
    }
}
