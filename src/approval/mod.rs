//! Approval sessions: operator hand-off, manual confirm / reject, timed release.

pub mod countdown;
pub mod summary;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::bot::transport::{Button, Markup, Transport};
use crate::config::Config;
use crate::db::entities::users;
use crate::db::repo::{Repo, Resolution};
use crate::flow::engine::{answer_quietly, send_logged};
use crate::flow::prompts;

use countdown::Session;

#[derive(Debug, Clone)]
pub struct ApprovalSettings {
    pub operator_chat_id: Option<i64>,
    /// `None` disables the automatic path
    pub auto_release: Option<Duration>,
    pub tick: Duration,
    pub cleanup_limit: u64,
    pub download_links: Vec<Url>,
}

impl Default for ApprovalSettings {
    fn default() -> Self {
        Self {
            operator_chat_id: None,
            auto_release: Some(Duration::from_secs(90)),
            tick: Duration::from_secs(30),
            cleanup_limit: 100,
            download_links: Vec::new(),
        }
    }
}

impl ApprovalSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            operator_chat_id: config.telegram.operator_chat_id,
            auto_release: config.approval.auto_release(),
            tick: Duration::from_secs(config.approval.tick_secs),
            cleanup_limit: config.approval.cleanup_limit,
            download_links: config.links.download.clone(),
        }
    }
}

/// Coordinates approval sessions.
///
/// Private chats share their id with the user, so the user's chat is
/// addressed by `user.id` once the original event is gone.
#[derive(Clone)]
pub struct ApprovalCoordinator {
    repo: Arc<Repo>,
    transport: Arc<dyn Transport>,
    settings: Arc<ApprovalSettings>,
    sessions: Arc<Mutex<HashMap<i64, JoinHandle<()>>>>,
}

impl ApprovalCoordinator {
    pub fn new(repo: Arc<Repo>, transport: Arc<dyn Transport>, settings: ApprovalSettings) -> Self {
        Self {
            repo,
            transport,
            settings: Arc::new(settings),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Open a session for a user who just signalled payment.
    pub async fn begin(&self, user: &users::Model, chat_id: i64) -> Result<()> {
        let remaining = self.settings.auto_release.map(|d| d.as_secs());
        // The hand-off goes ahead even when the user chat is unreachable
        let status_message_id = match send_logged(
            &self.repo,
            self.transport(),
            user.id,
            chat_id,
            &prompts::verification_status(remaining),
            None,
        )
        .await
        {
            Ok(message_id) => Some(message_id),
            Err(e) => {
                warn!("Failed to send verification status to user {}: {:#}", user.id, e);
                None
            }
        };

        self.forward_to_operator(user).await;

        if let Some(total) = self.settings.auto_release {
            let session = Session {
                user_id: user.id,
                chat_id,
                status_message_id,
            };
            let handle = countdown::spawn(self.clone(), session, total, self.settings.tick);
            if let Some(previous) = self.sessions.lock().await.insert(user.id, handle) {
                previous.abort();
            }
            info!("⏱️ Countdown started for user {} ({:?})", user.id, total);
        }

        Ok(())
    }

    async fn forward_to_operator(&self, user: &users::Model) {
        let Some(operator) = self.settings.operator_chat_id else {
            warn!("⚠️ Operator chat not configured, request of user {} not forwarded", user.id);
            return;
        };

        match self.send_summary(operator, user).await {
            Ok(()) => info!("Forwarded request of user {} to operator chat {}", user.id, operator),
            Err(e) => error!("Failed to forward request of user {}: {:#}", user.id, e),
        }
    }

    async fn send_summary(&self, operator: i64, user: &users::Model) -> Result<()> {
        let text = summary::request_summary(user);
        let screenshots = &user.payment_screenshot_file_ids;

        if screenshots.is_empty() {
            self.transport.send_text(operator, &text, None).await?;
        } else if summary::fits_caption(&text) {
            self.transport
                .send_photos(operator, screenshots, Some(text.as_str()))
                .await?;
        } else {
            self.transport.send_photos(operator, screenshots, None).await?;
            self.transport.send_text(operator, &text, None).await?;
        }

        if let Some(file_id) = &user.contact_file_id {
            self.transport
                .send_document(operator, file_id, Some(summary::contact_file_caption()))
                .await?;
        }

        self.transport
            .send_text(
                operator,
                summary::actions_prompt(),
                Some(summary::actions_markup(user.id)),
            )
            .await?;

        Ok(())
    }

    /// Operator pressed confirm.
    pub async fn confirm(
        &self,
        actor_chat_id: i64,
        callback_id: &str,
        operator_message_id: Option<i32>,
        user_id: i64,
    ) -> Result<()> {
        if !self.authorize(actor_chat_id, callback_id).await {
            return Ok(());
        }

        let Some(user) = self
            .repo
            .resolve_verification(user_id, Resolution::Confirm)
            .await?
        else {
            answer_quietly(self.transport(), callback_id, Some(summary::already_resolved()), false)
                .await;
            return Ok(());
        };

        self.cancel(user_id).await;
        info!("✅ Payment of user {} confirmed by operator", user_id);

        self.release(&user).await?;
        answer_quietly(self.transport(), callback_id, Some(summary::confirmed_answer()), false)
            .await;
        self.mark_resolved(actor_chat_id, operator_message_id, Resolution::Confirm, user_id)
            .await;

        Ok(())
    }

    /// Operator pressed reject.
    pub async fn reject(
        &self,
        actor_chat_id: i64,
        callback_id: &str,
        operator_message_id: Option<i32>,
        user_id: i64,
    ) -> Result<()> {
        if !self.authorize(actor_chat_id, callback_id).await {
            return Ok(());
        }

        let Some(user) = self
            .repo
            .resolve_verification(user_id, Resolution::Reject)
            .await?
        else {
            answer_quietly(self.transport(), callback_id, Some(summary::already_resolved()), false)
                .await;
            return Ok(());
        };

        self.cancel(user_id).await;
        info!("❌ Payment of user {} rejected by operator", user_id);

        let deleted = self.cleanup(user_id).await;
        debug!("Deleted {} message(s) of user {}", deleted, user_id);
        send_logged(
            &self.repo,
            self.transport(),
            user.id,
            user.id,
            prompts::payment_rejected(),
            Some(prompts::restart_markup()),
        )
        .await?;
        answer_quietly(self.transport(), callback_id, Some(summary::rejected_answer()), false)
            .await;
        self.mark_resolved(actor_chat_id, operator_message_id, Resolution::Reject, user_id)
            .await;

        Ok(())
    }

    /// Countdown ran out: same effects as confirm, plus a note to the operator.
    pub async fn expire(&self, user_id: i64) -> Result<()> {
        let Some(user) = self
            .repo
            .resolve_verification(user_id, Resolution::Expire)
            .await?
        else {
            debug!("Countdown of user {} expired after resolution", user_id);
            return Ok(());
        };

        // Called from inside the countdown task: drop the handle, don't abort it
        self.sessions.lock().await.remove(&user_id);
        info!("⏱️ Request of user {} released by countdown", user_id);

        self.release(&user).await?;

        if let Some(operator) = self.settings.operator_chat_id {
            if let Err(e) = self
                .transport
                .send_text(operator, &summary::completed_note(&user), None)
                .await
            {
                error!("Failed to notify operator about user {}: {:#}", user_id, e);
            }
        }

        Ok(())
    }

    /// User asked to hurry a completed request.
    pub async fn expedite(&self, user: &users::Model, chat_id: i64, callback_id: &str) -> Result<()> {
        let Some(operator) = self.settings.operator_chat_id else {
            warn!("⚠️ Operator chat not configured, expedite of user {} dropped", user.id);
            answer_quietly(self.transport(), callback_id, Some(prompts::expedite_unconfigured()), true)
                .await;
            return Ok(());
        };

        if let Err(e) = self
            .transport
            .send_text(operator, &summary::expedite_note(user), None)
            .await
        {
            error!("Failed to send expedite request of user {}: {:#}", user.id, e);
            answer_quietly(self.transport(), callback_id, Some(prompts::expedite_failed()), true)
                .await;
            return Ok(());
        }

        let deleted = self.cleanup(user.id).await;
        let link = self.download_button(user.id, false).await?;
        send_logged(
            &self.repo,
            self.transport(),
            user.id,
            chat_id,
            prompts::expedited(),
            link.map(Markup::single),
        )
        .await?;
        answer_quietly(self.transport(), callback_id, Some(prompts::expedite_answer()), false).await;

        info!("⚡ Expedite request of user {} sent, {} message(s) cleaned", user.id, deleted);
        Ok(())
    }

    /// Clean the conversation and send the unlock message.
    async fn release(&self, user: &users::Model) -> Result<()> {
        let deleted = self.cleanup(user.id).await;
        debug!("Deleted {} message(s) of user {}", deleted, user.id);

        let link = self.download_button(user.id, true).await?;
        send_logged(
            &self.repo,
            self.transport(),
            user.id,
            user.id,
            prompts::unlock(),
            Some(prompts::unlock_markup(link)),
        )
        .await
        .context("Failed to send unlock message")?;

        Ok(())
    }

    /// Current download link as a button; `advance` moves the counter on.
    async fn download_button(&self, user_id: i64, advance: bool) -> Result<Option<Button>> {
        let links = &self.settings.download_links;
        let current = self.repo.current_link(user_id, links.as_slice()).await?;

        if advance && !links.is_empty() {
            self.repo.rotate_link_counter(user_id, None).await?;
        }

        Ok(current
            .and_then(|link| Url::parse(&link).ok())
            .map(|url| Button::url(prompts::DOWNLOAD_LABEL, url)))
    }

    /// Best-effort deletion of the logged conversation.
    async fn cleanup(&self, user_id: i64) -> usize {
        let messages = match self
            .repo
            .conversation_messages(user_id, self.settings.cleanup_limit)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Failed to load conversation of user {}: {:#}", user_id, e);
                return 0;
            }
        };

        let mut deleted = 0;
        for message in &messages {
            match self
                .transport
                .delete_message(message.chat_id, message.message_id)
                .await
            {
                Ok(()) => deleted += 1,
                Err(e) => debug!("Skip message {}: {:#}", message.message_id, e),
            }
        }

        if let Err(e) = self.repo.forget_messages(user_id).await {
            warn!("Failed to clear conversation log of user {}: {:#}", user_id, e);
        }

        deleted
    }

    async fn authorize(&self, actor_chat_id: i64, callback_id: &str) -> bool {
        if self.settings.operator_chat_id == Some(actor_chat_id) {
            return true;
        }

        info!("Unauthorized approval attempt from chat {}", actor_chat_id);
        answer_quietly(self.transport(), callback_id, Some(summary::not_authorized()), true).await;
        false
    }

    async fn mark_resolved(
        &self,
        operator_chat_id: i64,
        message_id: Option<i32>,
        resolution: Resolution,
        user_id: i64,
    ) {
        let Some(message_id) = message_id else {
            return;
        };

        if let Err(e) = self
            .transport
            .edit_text(
                operator_chat_id,
                message_id,
                &summary::resolved_note(resolution, user_id),
                None,
            )
            .await
        {
            debug!("Failed to edit operator message {}: {:#}", message_id, e);
        }
    }

    async fn cancel(&self, user_id: i64) {
        if let Some(handle) = self.sessions.lock().await.remove(&user_id) {
            handle.abort();
            debug!("Countdown of user {} cancelled", user_id);
        }
    }

    #[cfg(test)]
    pub(crate) async fn has_session(&self, user_id: i64) -> bool {
        self.sessions.lock().await.contains_key(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::transport::testing::{Call, RecordingTransport};
    use crate::db::repo::tests::setup_test_db;
    use crate::db::repo::NewUser;
    use crate::db::types::ConversationState;

    const OPERATOR: i64 = -100;
    const USER: i64 = 42;

    fn links() -> Vec<Url> {
        (0..3)
            .map(|i| Url::parse(&format!("https://dl.example.com/{}", i)).unwrap())
            .collect()
    }

    fn settings(auto_release: Option<Duration>) -> ApprovalSettings {
        ApprovalSettings {
            operator_chat_id: Some(OPERATOR),
            auto_release,
            tick: Duration::from_millis(20),
            cleanup_limit: 100,
            download_links: links(),
        }
    }

    async fn setup(
        settings: ApprovalSettings,
    ) -> (Arc<Repo>, Arc<RecordingTransport>, ApprovalCoordinator) {
        let repo = Arc::new(setup_test_db().await.unwrap());
        let transport = Arc::new(RecordingTransport::new());
        let coordinator = ApprovalCoordinator::new(repo.clone(), transport.clone(), settings);
        (repo, transport, coordinator)
    }

    /// A user who has collected everything and sent the done marker.
    async fn verifying_user(repo: &Repo) -> users::Model {
        repo.create_user(NewUser {
            id: USER,
            first_name: Some("Alice".to_string()),
            username: Some("alice".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
        repo.set_agreed(USER).await.unwrap();
        repo.set_phone_number(USER, "+201234567890").await.unwrap();
        repo.set_contact_file(USER, "contacts-file").await.unwrap();
        repo.set_target_phone(USER, "01012345678").await.unwrap();
        repo.set_user_request(USER, "find the owner").await.unwrap();
        repo.push_payment_screenshot(USER, "shot-1").await.unwrap();
        repo.push_payment_screenshot(USER, "shot-2").await.unwrap();
        for id in 1..=5 {
            repo.record_message(USER, USER, id).await.unwrap();
        }
        repo.set_state(USER, Some(ConversationState::VerifyingPayment))
            .await
            .unwrap()
            .unwrap()
    }

    fn unlock_count(transport: &RecordingTransport) -> usize {
        transport
            .texts_to(USER)
            .iter()
            .filter(|t| t.as_str() == prompts::unlock())
            .count()
    }

    #[tokio::test]
    async fn test_begin_forwards_summary() {
        let (repo, transport, coordinator) = setup(settings(None)).await;
        let user = verifying_user(&repo).await;

        coordinator.begin(&user, USER).await.unwrap();

        let calls = transport.calls();
        assert!(matches!(
            &calls[0],
            Call::Text { chat_id: USER, text, .. } if !text.contains("remaining")
        ));
        match &calls[1] {
            Call::Photos {
                chat_id,
                file_ids,
                caption,
            } => {
                assert_eq!(*chat_id, OPERATOR);
                assert_eq!(file_ids, &vec!["shot-1".to_string(), "shot-2".to_string()]);
                assert!(caption.as_deref().unwrap().contains("find the owner"));
            }
            other => panic!("expected photos, got {:?}", other),
        }
        assert!(matches!(
            &calls[2],
            Call::Document { chat_id: OPERATOR, file_id, .. } if file_id == "contacts-file"
        ));
        match &calls[3] {
            Call::Text {
                chat_id, markup, ..
            } => {
                assert_eq!(*chat_id, OPERATOR);
                assert_eq!(markup.as_ref(), Some(&summary::actions_markup(USER)));
            }
            other => panic!("expected action buttons, got {:?}", other),
        }
        assert!(!coordinator.has_session(USER).await);
    }

    #[tokio::test]
    async fn test_begin_without_screenshots_sends_text() {
        let (repo, transport, coordinator) = setup(settings(None)).await;
        repo.create_user(NewUser {
            id: USER,
            ..Default::default()
        })
        .await
        .unwrap();
        let user = repo
            .set_state(USER, Some(ConversationState::VerifyingPayment))
            .await
            .unwrap()
            .unwrap();

        coordinator.begin(&user, USER).await.unwrap();

        let operator_texts = transport.texts_to(OPERATOR);
        assert_eq!(operator_texts.len(), 2);
        assert!(operator_texts[0].contains("New request"));
        assert!(!transport
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Photos { .. } | Call::Document { .. })));
    }

    #[tokio::test]
    async fn test_begin_without_operator_still_advances() {
        let (repo, transport, coordinator) = setup(ApprovalSettings {
            operator_chat_id: None,
            ..settings(None)
        })
        .await;
        let user = verifying_user(&repo).await;

        coordinator.begin(&user, USER).await.unwrap();

        assert_eq!(transport.calls().len(), 1);
        assert_eq!(transport.texts_to(USER).len(), 1);
    }

    #[tokio::test]
    async fn test_operator_failure_does_not_block_user() {
        let (repo, transport, coordinator) = setup(settings(None)).await;
        let user = verifying_user(&repo).await;
        transport.fail_chat(OPERATOR);

        coordinator.begin(&user, USER).await.unwrap();

        assert_eq!(transport.texts_to(USER).len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_user_chat_still_hands_over() {
        let (repo, transport, coordinator) =
            setup(settings(Some(Duration::from_millis(60)))).await;
        let user = verifying_user(&repo).await;
        transport.fail_chat(USER);

        coordinator.begin(&user, USER).await.unwrap();

        assert_eq!(
            transport.texts_to(OPERATOR).last().map(String::as_str),
            Some(summary::actions_prompt())
        );
        assert!(coordinator.has_session(USER).await);

        tokio::time::sleep(Duration::from_millis(400)).await;

        // No status message to refresh, the countdown still resolves
        assert!(transport.edits().is_empty());
        let user = repo.get_user(USER).await.unwrap().unwrap();
        assert_eq!(user.state, Some(ConversationState::Completed));
        assert!(!coordinator.has_session(USER).await);
    }

    #[test]
    fn test_zero_auto_release_means_manual_only() {
        let mut config = Config::default();
        config.approval.auto_release_secs = 0;

        assert_eq!(ApprovalSettings::from_config(&config).auto_release, None);
    }

    #[tokio::test]
    async fn test_confirm_releases_once() {
        let (repo, transport, coordinator) = setup(settings(None)).await;
        verifying_user(&repo).await;

        coordinator.confirm(OPERATOR, "cb-1", Some(77), USER).await.unwrap();

        let user = repo.get_user(USER).await.unwrap().unwrap();
        assert_eq!(user.state, Some(ConversationState::Completed));
        assert_eq!(user.link_counter, 1);
        assert_eq!(transport.deleted(), vec![1, 2, 3, 4, 5]);
        assert_eq!(unlock_count(&transport), 1);

        let (_, markup) = transport.last_text_to(USER).unwrap();
        assert_eq!(
            markup,
            Some(prompts::unlock_markup(Some(Button::url(
                prompts::DOWNLOAD_LABEL,
                links()[0].clone()
            ))))
        );
        assert_eq!(
            transport.edits(),
            vec![(OPERATOR, 77, summary::resolved_note(Resolution::Confirm, USER))]
        );

        // Duplicate tap
        coordinator.confirm(OPERATOR, "cb-2", Some(77), USER).await.unwrap();

        assert_eq!(unlock_count(&transport), 1);
        assert_eq!(repo.get_user(USER).await.unwrap().unwrap().link_counter, 1);
        assert_eq!(
            transport.answers().last().cloned(),
            Some((Some(summary::already_resolved().to_string()), false))
        );
    }

    #[tokio::test]
    async fn test_unlock_message_is_the_new_conversation_log() {
        let (repo, _transport, coordinator) = setup(settings(None)).await;
        verifying_user(&repo).await;

        coordinator.confirm(OPERATOR, "cb", None, USER).await.unwrap();

        let log = repo.conversation_messages(USER, 100).await.unwrap();
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_delete_failures() {
        let (repo, transport, coordinator) = setup(settings(None)).await;
        verifying_user(&repo).await;
        transport.fail_deletes();

        coordinator.confirm(OPERATOR, "cb", None, USER).await.unwrap();

        assert_eq!(transport.deleted().len(), 5);
        assert_eq!(unlock_count(&transport), 1);
    }

    #[tokio::test]
    async fn test_cleanup_is_bounded() {
        let (repo, transport, coordinator) = setup(ApprovalSettings {
            cleanup_limit: 2,
            ..settings(None)
        })
        .await;
        verifying_user(&repo).await;

        coordinator.confirm(OPERATOR, "cb", None, USER).await.unwrap();

        assert_eq!(transport.deleted(), vec![4, 5]);
    }

    #[tokio::test]
    async fn test_unauthorized_actor() {
        let (repo, transport, coordinator) = setup(settings(None)).await;
        verifying_user(&repo).await;

        coordinator.confirm(USER, "cb", Some(1), USER).await.unwrap();
        coordinator.reject(12345, "cb", Some(1), USER).await.unwrap();

        let user = repo.get_user(USER).await.unwrap().unwrap();
        assert_eq!(user.state, Some(ConversationState::VerifyingPayment));
        assert_eq!(
            transport.answers(),
            vec![
                (Some(summary::not_authorized().to_string()), true),
                (Some(summary::not_authorized().to_string()), true),
            ]
        );
        assert!(transport.texts_to(USER).is_empty());
    }

    #[tokio::test]
    async fn test_reject_clears_and_offers_restart() {
        let (repo, transport, coordinator) = setup(settings(None)).await;
        verifying_user(&repo).await;

        coordinator.reject(OPERATOR, "cb", Some(9), USER).await.unwrap();

        let user = repo.get_user(USER).await.unwrap().unwrap();
        assert_eq!(user.state, None);
        assert_eq!(user.target_phone, None);
        assert_eq!(user.contact_file_id, None);
        assert!(user.payment_screenshot_file_ids.is_empty());
        assert_eq!(user.link_counter, 0);

        let (text, markup) = transport.last_text_to(USER).unwrap();
        assert_eq!(text, prompts::payment_rejected());
        assert_eq!(markup, Some(prompts::restart_markup()));
        // Only the rejection notice stays in the log
        assert_eq!(transport.deleted(), vec![1, 2, 3, 4, 5]);
        assert_eq!(repo.conversation_messages(USER, 100).await.unwrap().len(), 1);

        // A late confirm must not unlock a rejected request
        coordinator.confirm(OPERATOR, "cb-2", Some(9), USER).await.unwrap();
        assert_eq!(unlock_count(&transport), 0);
    }

    #[tokio::test]
    async fn test_countdown_releases_automatically() {
        let (repo, transport, coordinator) =
            setup(settings(Some(Duration::from_millis(60)))).await;
        let user = verifying_user(&repo).await;

        coordinator.begin(&user, USER).await.unwrap();
        assert!(coordinator.has_session(USER).await);

        tokio::time::sleep(Duration::from_millis(400)).await;

        let user = repo.get_user(USER).await.unwrap().unwrap();
        assert_eq!(user.state, Some(ConversationState::Completed));
        assert_eq!(unlock_count(&transport), 1);
        assert!(!transport.edits().is_empty());
        assert!(transport
            .texts_to(OPERATOR)
            .iter()
            .any(|t| t.contains("Request completed")));
        assert!(!coordinator.has_session(USER).await);
    }

    #[tokio::test]
    async fn test_confirm_cancels_countdown() {
        let (repo, transport, coordinator) =
            setup(settings(Some(Duration::from_millis(150)))).await;
        let user = verifying_user(&repo).await;

        coordinator.begin(&user, USER).await.unwrap();
        coordinator.confirm(OPERATOR, "cb", None, USER).await.unwrap();
        assert!(!coordinator.has_session(USER).await);

        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(unlock_count(&transport), 1);
        assert_eq!(repo.get_user(USER).await.unwrap().unwrap().link_counter, 1);
        assert!(!transport
            .texts_to(OPERATOR)
            .iter()
            .any(|t| t.contains("Request completed")));
    }

    #[tokio::test]
    async fn test_expedite_resends_current_link() {
        let (repo, transport, coordinator) = setup(settings(None)).await;
        verifying_user(&repo).await;
        coordinator.confirm(OPERATOR, "cb", None, USER).await.unwrap();
        transport.clear();

        let user = repo.get_user(USER).await.unwrap().unwrap();
        coordinator.expedite(&user, USER, "cb-x").await.unwrap();

        assert!(transport
            .texts_to(OPERATOR)
            .iter()
            .any(|t| t.contains("expedite")));
        let (text, markup) = transport.last_text_to(USER).unwrap();
        assert_eq!(text, prompts::expedited());
        assert_eq!(
            markup,
            Some(Markup::single(Button::url(
                prompts::DOWNLOAD_LABEL,
                links()[1].clone()
            )))
        );
        // The unlock message was cleaned up
        assert_eq!(transport.deleted().len(), 1);
        assert_eq!(repo.get_user(USER).await.unwrap().unwrap().link_counter, 1);
    }

    #[tokio::test]
    async fn test_expedite_without_operator() {
        let (repo, transport, coordinator) = setup(ApprovalSettings {
            operator_chat_id: None,
            ..settings(None)
        })
        .await;
        let user = verifying_user(&repo).await;

        coordinator.expedite(&user, USER, "cb").await.unwrap();

        assert_eq!(
            transport.answers(),
            vec![(Some(prompts::expedite_unconfigured().to_string()), true)]
        );
        assert!(transport.texts_to(USER).is_empty());
    }
}
