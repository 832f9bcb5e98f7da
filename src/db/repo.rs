use anyhow::{Context, Result};
use chrono::Local;
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Set,
};

use super::entities::{messages, users};
use crate::db::types::{ConversationState, FileIds};

/// Profile fields captured from the transport when a record is first created.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub first_message_id: Option<i32>,
}

/// How an approval session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Operator pressed confirm
    Confirm,
    /// Countdown ran out
    Expire,
    /// Operator pressed reject
    Reject,
}

/// Logged messages kept per user unless configured otherwise
pub const DEFAULT_MESSAGE_LOG_LIMIT: u64 = 100;

pub struct Repo {
    db: DatabaseConnection,
    message_log_limit: u64,
}

impl Repo {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            message_log_limit: DEFAULT_MESSAGE_LOG_LIMIT,
        }
    }

    /// Keep at most `limit` logged messages per user (minimum 1).
    pub fn with_message_log_limit(mut self, limit: u64) -> Self {
        self.message_log_limit = limit.max(1);
        self
    }

    pub async fn ping(&self) -> Result<()> {
        self.db.ping().await.context("Database ping failed")
    }

    // ==================== Users ====================

    pub async fn get_user(&self, user_id: i64) -> Result<Option<users::Model>> {
        users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .context("Failed to get user")
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username.trim_start_matches('@')))
            .one(&self.db)
            .await
            .context("Failed to get user by username")
    }

    /// Create a user record.
    ///
    /// INSERT ... ON CONFLICT(id) DO NOTHING: an existing record is returned
    /// untouched, profile fields are never re-synced.
    pub async fn create_user(&self, new_user: NewUser) -> Result<users::Model> {
        let now = Local::now().naive_local();
        let user_id = new_user.id;

        let model = users::ActiveModel {
            id: Set(user_id),
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            username: Set(new_user.username),
            phone_number: Set(None),
            agreed_to_terms: Set(false),
            agreed_at: Set(None),
            state: Set(None),
            contact_file_id: Set(None),
            target_phone: Set(None),
            payment_screenshot_file_ids: Set(FileIds::default()),
            user_request: Set(None),
            first_message_id: Set(new_user.first_message_id),
            link_counter: Set(0),
            service_link_counter: Set(0),
            created_at: Set(now),
        };

        users::Entity::insert(model)
            .on_conflict(
                OnConflict::column(users::Column::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .do_nothing()
            .exec(&self.db)
            .await
            .context("Failed to create user")?;

        // Fetch the result (exec_with_returning is not available for SQLite with ON CONFLICT)
        self.get_user(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User {} not found after insert", user_id))
    }

    /// Mark the terms as accepted.
    ///
    /// Monotonic: the conditional update only touches records that have not
    /// agreed yet, so `agreed_at` is written exactly once.
    pub async fn set_agreed(&self, user_id: i64) -> Result<Option<users::Model>> {
        let now = Local::now().naive_local();

        users::Entity::update_many()
            .set(users::ActiveModel {
                agreed_to_terms: Set(true),
                agreed_at: Set(Some(now)),
                ..Default::default()
            })
            .filter(users::Column::Id.eq(user_id))
            .filter(users::Column::AgreedToTerms.eq(false))
            .exec(&self.db)
            .await
            .context("Failed to update agreement")?;

        self.get_user(user_id).await
    }

    pub async fn set_state(
        &self,
        user_id: i64,
        state: Option<ConversationState>,
    ) -> Result<Option<users::Model>> {
        self.modify(user_id, "state", |user| user.state = Set(state))
            .await
    }

    pub async fn set_phone_number(
        &self,
        user_id: i64,
        phone_number: &str,
    ) -> Result<Option<users::Model>> {
        let phone_number = phone_number.to_string();
        self.modify(user_id, "phone_number", |user| {
            user.phone_number = Set(Some(phone_number))
        })
        .await
    }

    pub async fn set_contact_file(
        &self,
        user_id: i64,
        file_id: &str,
    ) -> Result<Option<users::Model>> {
        let file_id = file_id.to_string();
        self.modify(user_id, "contact_file_id", |user| {
            user.contact_file_id = Set(Some(file_id))
        })
        .await
    }

    pub async fn set_target_phone(
        &self,
        user_id: i64,
        target_phone: &str,
    ) -> Result<Option<users::Model>> {
        let target_phone = target_phone.to_string();
        self.modify(user_id, "target_phone", |user| {
            user.target_phone = Set(Some(target_phone))
        })
        .await
    }

    pub async fn set_user_request(
        &self,
        user_id: i64,
        request: &str,
    ) -> Result<Option<users::Model>> {
        let request = request.to_string();
        self.modify(user_id, "user_request", |user| {
            user.user_request = Set(Some(request))
        })
        .await
    }

    /// Append a payment screenshot (read-modify-write, last write wins).
    pub async fn push_payment_screenshot(
        &self,
        user_id: i64,
        file_id: &str,
    ) -> Result<Option<users::Model>> {
        let Some(user) = self.get_user(user_id).await? else {
            return Ok(None);
        };

        let screenshots = user.payment_screenshot_file_ids.clone().with(file_id);
        let mut active: users::ActiveModel = user.into_active_model();
        active.payment_screenshot_file_ids = Set(screenshots);
        active
            .update(&self.db)
            .await
            .map(Some)
            .context("Failed to append payment screenshot")
    }

    /// Start a fresh collection cycle: clear artifacts and wait for the contact file.
    pub async fn begin_collection(&self, user_id: i64) -> Result<Option<users::Model>> {
        self.modify(user_id, "collection", |user| {
            clear_artifacts(user);
            user.state = Set(Some(ConversationState::AwaitingContactFile));
        })
        .await
    }

    /// Resolve an approval session.
    ///
    /// Compare-and-set on `state = verifying_payment`: only the first caller
    /// wins. Returns `None` if the record does not exist or the session was
    /// already resolved.
    pub async fn resolve_verification(
        &self,
        user_id: i64,
        resolution: Resolution,
    ) -> Result<Option<users::Model>> {
        let mut update = <users::ActiveModel as Default>::default();
        match resolution {
            Resolution::Confirm | Resolution::Expire => {
                update.state = Set(Some(ConversationState::Completed));
            }
            Resolution::Reject => {
                clear_artifacts(&mut update);
                update.state = Set(None);
            }
        }

        let result = users::Entity::update_many()
            .set(update)
            .filter(users::Column::Id.eq(user_id))
            .filter(users::Column::State.eq(ConversationState::VerifyingPayment))
            .exec(&self.db)
            .await
            .context("Failed to resolve verification")?;

        if result.rows_affected == 0 {
            return Ok(None);
        }

        self.get_user(user_id).await
    }

    /// Advance the rotating link index.
    ///
    /// With a modulus the counter wraps (`(c + 1) % m`); without one it grows
    /// unbounded and is reduced only when a link is selected.
    pub async fn rotate_link_counter(
        &self,
        user_id: i64,
        modulus: Option<u64>,
    ) -> Result<Option<users::Model>> {
        let Some(user) = self.get_user(user_id).await? else {
            return Ok(None);
        };

        let next = match modulus {
            Some(m) if m > 0 => (user.link_counter + 1).rem_euclid(m as i64),
            _ => user.link_counter + 1,
        };

        let mut active: users::ActiveModel = user.into_active_model();
        active.link_counter = Set(next);
        active
            .update(&self.db)
            .await
            .map(Some)
            .context("Failed to rotate link counter")
    }

    /// Link currently selected for the user; a missing record counts as 0.
    pub async fn current_link<T: AsRef<str>>(
        &self,
        user_id: i64,
        links: &[T],
    ) -> Result<Option<String>> {
        let counter = self
            .get_user(user_id)
            .await?
            .map(|u| u.link_counter)
            .unwrap_or(0);

        Ok(select_link(counter, links).map(str::to_string))
    }

    /// Current service link, then advance the service counter modulo the list length.
    ///
    /// Uses its own counter so the download rotation is never shifted.
    pub async fn next_service_link<T: AsRef<str>>(
        &self,
        user_id: i64,
        links: &[T],
    ) -> Result<Option<String>> {
        let Some(user) = self.get_user(user_id).await? else {
            return Ok(None);
        };
        let Some(link) = select_link(user.service_link_counter, links).map(str::to_string) else {
            return Ok(None);
        };

        let next = (user.service_link_counter + 1).rem_euclid(links.len() as i64);
        let mut active: users::ActiveModel = user.into_active_model();
        active.service_link_counter = Set(next);
        active
            .update(&self.db)
            .await
            .context("Failed to rotate service link counter")?;

        Ok(Some(link))
    }

    async fn modify<F>(
        &self,
        user_id: i64,
        what: &str,
        apply: F,
    ) -> Result<Option<users::Model>>
    where
        F: FnOnce(&mut users::ActiveModel),
    {
        let Some(user) = self.get_user(user_id).await? else {
            return Ok(None);
        };

        let mut active: users::ActiveModel = user.into_active_model();
        apply(&mut active);
        active
            .update(&self.db)
            .await
            .map(Some)
            .with_context(|| format!("Failed to update user {}", what))
    }

    // ==================== Messages ====================

    /// Append a message id to the user's conversation log.
    pub async fn record_message(&self, user_id: i64, chat_id: i64, message_id: i32) -> Result<()> {
        let now = Local::now().naive_local();

        messages::ActiveModel {
            user_id: Set(user_id),
            chat_id: Set(chat_id),
            message_id: Set(message_id),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .context("Failed to record message")?;

        self.prune_messages(user_id).await
    }

    /// Drop everything older than the newest `message_log_limit` entries.
    async fn prune_messages(&self, user_id: i64) -> Result<()> {
        let boundary = messages::Entity::find()
            .filter(messages::Column::UserId.eq(user_id))
            .order_by_desc(messages::Column::Id)
            .offset(self.message_log_limit)
            .one(&self.db)
            .await
            .context("Failed to find message log boundary")?;

        if let Some(oldest_dropped) = boundary {
            messages::Entity::delete_many()
                .filter(messages::Column::UserId.eq(user_id))
                .filter(messages::Column::Id.lte(oldest_dropped.id))
                .exec(&self.db)
                .await
                .context("Failed to prune message log")?;
        }

        Ok(())
    }

    /// The most recent `limit` logged messages, oldest first.
    pub async fn conversation_messages(
        &self,
        user_id: i64,
        limit: u64,
    ) -> Result<Vec<messages::Model>> {
        let mut recent = messages::Entity::find()
            .filter(messages::Column::UserId.eq(user_id))
            .order_by_desc(messages::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .context("Failed to list conversation messages")?;

        recent.reverse();
        Ok(recent)
    }

    pub async fn forget_messages(&self, user_id: i64) -> Result<u64> {
        let result = messages::Entity::delete_many()
            .filter(messages::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await
            .context("Failed to forget conversation messages")?;

        Ok(result.rows_affected)
    }
}

fn clear_artifacts(user: &mut users::ActiveModel) {
    user.contact_file_id = Set(None);
    user.target_phone = Set(None);
    user.user_request = Set(None);
    user.payment_screenshot_file_ids = Set(FileIds::default());
}

/// `links[counter % len]`, or `None` for an empty list.
pub fn select_link<T: AsRef<str>>(counter: i64, links: &[T]) -> Option<&str> {
    if links.is_empty() {
        return None;
    }
    let index = counter.rem_euclid(links.len() as i64) as usize;
    Some(links[index].as_ref())
}
