use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};
use url::Url;

use super::event::{CallbackAction, InboundEvent, Sender};
use super::machine::{decide, Action, Rules, Snapshot, Step, Transition};
use super::prompts;
use crate::approval::ApprovalCoordinator;
use crate::bot::transport::{Button, Markup, Transport};
use crate::config::{Config, PaymentConfig};
use crate::db::entities::users;
use crate::db::repo::{NewUser, Repo};

/// Send a text to a user and append it to their conversation log.
pub(crate) async fn send_logged(
    repo: &Repo,
    transport: &dyn Transport,
    user_id: i64,
    chat_id: i64,
    text: &str,
    markup: Option<Markup>,
) -> Result<i32> {
    let message_id = transport.send_text(chat_id, text, markup).await?;
    if let Err(e) = repo.record_message(user_id, chat_id, message_id).await {
        warn!(
            "Failed to record message {} of user {}: {:#}",
            message_id, user_id, e
        );
    }
    Ok(message_id)
}

/// Expired callback ids are common; answering is never required.
pub(crate) async fn answer_quietly(
    transport: &dyn Transport,
    callback_id: &str,
    text: Option<&str>,
    alert: bool,
) {
    if let Err(e) = transport.answer_callback(callback_id, text, alert).await {
        debug!("Failed to answer callback {}: {:#}", callback_id, e);
    }
}

#[derive(Debug, Clone, Default)]
pub struct FlowSettings {
    pub rules: Rules,
    pub payment: PaymentConfig,
    pub service_links: Vec<Url>,
}

impl FlowSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            rules: Rules::from_config(config),
            payment: config.payment.clone(),
            service_links: config.links.service.clone(),
        }
    }
}

pub struct FlowEngine {
    repo: Arc<Repo>,
    transport: Arc<dyn Transport>,
    approvals: ApprovalCoordinator,
    settings: FlowSettings,
}

impl FlowEngine {
    pub fn new(
        repo: Arc<Repo>,
        transport: Arc<dyn Transport>,
        approvals: ApprovalCoordinator,
        settings: FlowSettings,
    ) -> Self {
        Self {
            repo,
            transport,
            approvals,
            settings,
        }
    }

    /// Handle one inbound event.
    ///
    /// `message_id` is the id of the inbound message, `None` for callbacks.
    pub async fn handle(
        &self,
        sender: &Sender,
        message_id: Option<i32>,
        event: InboundEvent,
    ) -> Result<()> {
        if let InboundEvent::Callback {
            callback_id,
            action,
            message_id: button_message_id,
        } = &event
        {
            match *action {
                CallbackAction::ConfirmPayment(user_id) => {
                    return self
                        .approvals
                        .confirm(sender.chat_id, callback_id, *button_message_id, user_id)
                        .await;
                }
                CallbackAction::RejectPayment(user_id) => {
                    return self
                        .approvals
                        .reject(sender.chat_id, callback_id, *button_message_id, user_id)
                        .await;
                }
                _ => {}
            }
        }

        let mut user = self.repo.get_user(sender.user_id).await?;
        if user.is_none() && event == InboundEvent::Start {
            user = Some(
                self.repo
                    .create_user(NewUser {
                        id: sender.user_id,
                        first_name: sender.first_name.clone(),
                        last_name: sender.last_name.clone(),
                        username: sender.username.clone(),
                        first_message_id: message_id,
                    })
                    .await?,
            );
            info!("New user created: {}", sender.user_id);
        }

        if let (Some(_), Some(message_id)) = (&user, message_id) {
            if let Err(e) = self
                .repo
                .record_message(sender.user_id, sender.chat_id, message_id)
                .await
            {
                warn!("Failed to record inbound message {}: {:#}", message_id, e);
            }
        }

        let step = decide(&self.settings.rules, &Snapshot::of(user.as_ref()), &event);
        debug!(
            "User {} in {:?}: {:?}",
            sender.user_id,
            user.as_ref().and_then(|u| u.state),
            step
        );

        let user = self.persist(sender.user_id, user, &step).await?;
        self.respond(sender, user, &event, step.action).await
    }

    /// Write artifacts, then the transition.
    async fn persist(
        &self,
        user_id: i64,
        user: Option<users::Model>,
        step: &Step,
    ) -> Result<Option<users::Model>> {
        let repo = &self.repo;
        let mut user = match &step.action {
            Action::Agree { .. } => repo.set_agreed(user_id).await?,
            Action::SavePhone(phone) => repo.set_phone_number(user_id, phone).await?,
            Action::StartCollection => repo.begin_collection(user_id).await?,
            Action::AcceptContactFile { file_id, .. } => {
                repo.set_contact_file(user_id, file_id).await?
            }
            Action::AcceptTargetPhone(phone) => repo.set_target_phone(user_id, phone).await?,
            Action::AcceptRequest(request) => repo.set_user_request(user_id, request).await?,
            Action::AddScreenshot(file_id) => {
                repo.push_payment_screenshot(user_id, file_id).await?
            }
            _ => user,
        };

        if let Transition::To(state) = step.transition {
            user = repo.set_state(user_id, state).await?;
        }

        Ok(user)
    }

    async fn respond(
        &self,
        sender: &Sender,
        user: Option<users::Model>,
        event: &InboundEvent,
        action: Action,
    ) -> Result<()> {
        let (callback_id, button_message_id) = match event {
            InboundEvent::Callback {
                callback_id,
                message_id,
                ..
            } => (Some(callback_id.as_str()), *message_id),
            _ => (None, None),
        };
        let rule = self.settings.rules.target_phone_rule;

        match action {
            Action::RequireStart => {
                self.answer(callback_id, None).await;
                self.send(sender, prompts::require_start(), None).await?;
            }
            Action::ShowTerms => {
                self.send(
                    sender,
                    &prompts::terms(&sender.greeting_name()),
                    Some(prompts::terms_markup()),
                )
                .await?;
            }
            Action::ShowReady => {
                let markup = self.ready_markup(sender.user_id).await;
                self.send(sender, &prompts::ready(&sender.greeting_name()), Some(markup))
                    .await?;
            }
            Action::Agree { needs_phone } => {
                self.answer(callback_id, Some(prompts::agreed_answer())).await;
                info!("User {} accepted the terms", sender.user_id);
                if needs_phone {
                    self.send(sender, prompts::request_phone(), Some(prompts::phone_markup()))
                        .await?;
                } else {
                    let markup = self.ready_markup(sender.user_id).await;
                    self.edit_or_send(sender, button_message_id, prompts::agreed_ready(), markup)
                        .await?;
                }
            }
            Action::AlreadyAgreed => {
                self.answer(callback_id, Some(prompts::already_agreed())).await;
            }
            Action::RequestPhone => {
                self.answer(callback_id, None).await;
                self.send(sender, prompts::request_phone(), Some(prompts::phone_markup()))
                    .await?;
            }
            Action::SavePhone(phone) => {
                self.send(sender, &prompts::phone_saved(&phone), Some(Markup::Remove))
                    .await?;
                let markup = self.ready_markup(sender.user_id).await;
                self.send(sender, prompts::agreed_ready(), Some(markup)).await?;
            }
            Action::RejectPhoto => {
                self.send(sender, prompts::photo_rejected(), None).await?;
            }
            Action::StartCollection => {
                self.answer(callback_id, None).await;
                self.send(
                    sender,
                    prompts::contact_file_prompt(),
                    Some(prompts::contact_file_markup()),
                )
                .await?;
            }
            Action::RepeatPrompt(state) => {
                self.answer(callback_id, None).await;
                let (text, markup) = prompts::step_prompt(state, rule, &self.settings.payment);
                self.send(sender, &text, markup).await?;
            }
            Action::SkipContactFile => {
                self.answer(callback_id, Some(prompts::skipped_answer())).await;
                self.send(sender, &prompts::target_phone_prompt(rule), None)
                    .await?;
                info!("User {} skipped the contact file", sender.user_id);
            }
            Action::AcceptContactFile {
                file_name,
                extension,
                ..
            } => {
                self.send(
                    sender,
                    &prompts::contact_file_received(&file_name, &extension),
                    None,
                )
                .await?;
                self.send(sender, &prompts::target_phone_prompt(rule), None)
                    .await?;
            }
            Action::RejectContactFile {
                file_name,
                extension,
            } => {
                let text =
                    prompts::contact_file_rejected(file_name.as_deref(), extension.as_deref());
                self.send(sender, &text, None).await?;
            }
            Action::ContactFileRequired => {
                self.send(sender, prompts::contact_file_required(), None)
                    .await?;
            }
            Action::AcceptTargetPhone(phone) => {
                self.send(sender, &prompts::target_phone_accepted(&phone), None)
                    .await?;
                self.send(sender, prompts::request_prompt(), None).await?;
            }
            Action::RejectTargetPhone { digits } => {
                self.send(sender, &prompts::target_phone_rejected(digits, rule), None)
                    .await?;
            }
            Action::AcceptRequest(request) => {
                self.send(sender, &prompts::request_received(&request), None)
                    .await?;
                self.send(
                    sender,
                    &prompts::payment_instructions(&self.settings.payment),
                    None,
                )
                .await?;
            }
            Action::RequestRequired => {
                self.send(sender, prompts::request_required(), None).await?;
            }
            Action::AddScreenshot(_) => {
                let count = user
                    .as_ref()
                    .map(|u| u.payment_screenshot_file_ids.len())
                    .unwrap_or_default();
                self.send(sender, &prompts::screenshot_received(count), None)
                    .await?;
            }
            Action::PaymentDone => match user {
                Some(user) => {
                    info!(
                        "User {} signalled payment with {} screenshot(s)",
                        user.id,
                        user.payment_screenshot_file_ids.len()
                    );
                    self.approvals.begin(&user, sender.chat_id).await?;
                }
                None => warn!("User {} vanished before verification", sender.user_id),
            },
            Action::PaymentRequired => {
                self.send(sender, prompts::payment_required(), None).await?;
            }
            Action::VerificationPending => {
                self.answer(callback_id, None).await;
                self.send(sender, prompts::verification_pending(), None)
                    .await?;
            }
            Action::Echo(text) => {
                let markup = prompts::ready_markup(None);
                self.send(sender, &prompts::echo(&text), Some(markup)).await?;
            }
            Action::ShowInfo => {
                self.answer(callback_id, None).await;
                if let Some(user) = &user {
                    self.send(sender, &prompts::profile(user), None).await?;
                }
            }
            Action::Expedite => match (user, callback_id) {
                (Some(user), Some(callback_id)) => {
                    self.approvals
                        .expedite(&user, sender.chat_id, callback_id)
                        .await?;
                }
                _ => self.answer(callback_id, None).await,
            },
            Action::StaleButton => {
                self.answer(callback_id, Some(prompts::stale_button())).await;
            }
            Action::Ignore => {
                self.answer(callback_id, None).await;
            }
        }

        Ok(())
    }

    async fn send(&self, sender: &Sender, text: &str, markup: Option<Markup>) -> Result<i32> {
        send_logged(
            &self.repo,
            self.transport.as_ref(),
            sender.user_id,
            sender.chat_id,
            text,
            markup,
        )
        .await
    }

    async fn answer(&self, callback_id: Option<&str>, text: Option<&str>) {
        if let Some(callback_id) = callback_id {
            answer_quietly(self.transport.as_ref(), callback_id, text, false).await;
        }
    }

    /// Replace the button message when possible, otherwise send a new one.
    async fn edit_or_send(
        &self,
        sender: &Sender,
        message_id: Option<i32>,
        text: &str,
        markup: Markup,
    ) -> Result<()> {
        if let Some(message_id) = message_id {
            match self
                .transport
                .edit_text(sender.chat_id, message_id, text, Some(markup.clone()))
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => debug!("Edit of message {} failed, sending instead: {:#}", message_id, e),
            }
        }

        self.send(sender, text, Some(markup)).await?;
        Ok(())
    }

    /// Ready prompt buttons; advances the service link rotation.
    async fn ready_markup(&self, user_id: i64) -> Markup {
        prompts::ready_markup(self.service_button(user_id).await)
    }

    async fn service_button(&self, user_id: i64) -> Option<Button> {
        let links = &self.settings.service_links;
        if links.is_empty() {
            return None;
        }

        let link = match self.repo.next_service_link(user_id, links.as_slice()).await {
            Ok(link) => link?,
            Err(e) => {
                warn!("Failed to select service link for user {}: {:#}", user_id, e);
                return None;
            }
        };

        Url::parse(&link)
            .ok()
            .map(|url| Button::url(prompts::SERVICE_LABEL, url))
    }
}
