//! # Flow Engine Module
//!
//! Drives profile collection conversations. Every inbound event for a user runs
//! under that user's session lock: the transition is decided by
//! [`next_transition`] and its side effects (messages, persistence, reports) are
//! performed here before the lock is released.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::collaborators::{Messenger, ProfileStore, SelectableOption};
use crate::dialogue::{next_transition, FlowEvent, FlowMode, FlowPurpose, FlowSession, FlowStep, Transition, DONE_SIGNAL};
use crate::errors::{FlowError, InvalidInputError};
use crate::formulas::{compute_report, CalorieReport};
use crate::localization::{Language, Localizer};
use crate::profile::{Field, PhysicalProfile, ProfileDraft};
use crate::report::{format_profile, format_report};
use crate::session_store::{SessionGuard, SessionStore};

/// Result of handling one event, reported back to the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// A new session was created and its first prompt sent
    Started,
    /// Value stored, now asking this field
    Advanced(Field),
    /// Same field asked again
    Reprompted(Field),
    /// Sequential flow finished; `report` is set for calculations
    Completed {
        profile: PhysicalProfile,
        report: Option<CalorieReport>,
    },
    /// Single-attribute editor now waits for this field
    AttributeSelected(Field),
    /// Field saved, back at the attribute hub
    AttributeSaved(Field),
    /// Attribute hub shown again
    AwaitingSelection,
    /// Editor closed by the user
    Finished,
    /// Session dropped after an unrecoverable state
    Terminated,
    /// Account may not edit its profile; session dropped
    NotEntitled,
    /// Final save failed; session already consumed
    CommitFailed,
    /// Collaborator failed, session left where it was
    CollaboratorFailed,
    /// No session for this user; the event belongs to someone else
    NoSession,
}

/// Step sequencer for calorie calculation and profile update conversations
pub struct FlowEngine {
    sessions: Arc<SessionStore>,
    store: Arc<dyn ProfileStore>,
    messenger: Arc<dyn Messenger>,
    localizer: Arc<dyn Localizer>,
}

impl FlowEngine {
    pub fn new(
        sessions: Arc<SessionStore>,
        store: Arc<dyn ProfileStore>,
        messenger: Arc<dyn Messenger>,
        localizer: Arc<dyn Localizer>,
    ) -> Self {
        Self {
            sessions,
            store,
            messenger,
            localizer,
        }
    }

    /// Begin a one-off calculation, replacing any session the user had
    pub async fn start_calculation(&self, chat_id: i64, language: Language) -> StepOutcome {
        let mut guard = self.sessions.lock(chat_id).await;
        if guard.is_some() {
            debug!(user_id = %chat_id, "Replacing active session with a calculation");
        }
        let session = FlowSession::sequential(FlowPurpose::Calculation, ProfileDraft::default(), language);
        let first = first_field(&session);
        *guard = Some(session);

        info!(user_id = %chat_id, "Calorie calculation started");
        self.send_prompt(chat_id, first, language).await;
        StepOutcome::Started
    }

    /// Begin editing the stored profile in the given mode
    pub async fn start_profile_update(&self, chat_id: i64, mode: FlowMode, language: Language) -> StepOutcome {
        let mut guard = self.sessions.lock(chat_id).await;

        match self.store.is_entitled(chat_id).await {
            Ok(true) => {}
            Ok(false) => {
                *guard = None;
                warn!(user_id = %chat_id, "Profile update refused for account without access");
                self.send(chat_id, self.localizer.message("profile-access-paid-only", language))
                    .await;
                return StepOutcome::NotEntitled;
            }
            Err(e) => {
                *guard = None;
                error!(user_id = %chat_id, error = %e, "Failed to check profile access");
                self.send(chat_id, self.localizer.message("error-generic", language)).await;
                return StepOutcome::CollaboratorFailed;
            }
        }

        let draft = match self.store.load_profile(chat_id).await {
            Ok(draft) => draft.unwrap_or_default(),
            Err(e) => {
                *guard = None;
                error!(user_id = %chat_id, error = %e, "Failed to load stored profile");
                self.send(chat_id, self.localizer.message("error-generic", language)).await;
                return StepOutcome::CollaboratorFailed;
            }
        };

        info!(user_id = %chat_id, mode = ?mode, "Profile update started");
        match mode {
            FlowMode::SequentialAll => {
                let session = FlowSession::sequential(FlowPurpose::ProfileUpdate, draft, language);
                let first = first_field(&session);
                *guard = Some(session);
                self.send_prompt(chat_id, first, language).await;
            }
            FlowMode::SingleAttribute => {
                self.send_attribute_menu(chat_id, &draft, language, None).await;
                *guard = Some(FlowSession::single_attribute(draft, language));
            }
        }
        StepOutcome::Started
    }

    /// Feed free text typed by the user into their session
    pub async fn handle_text(&self, chat_id: i64, text: &str) -> StepOutcome {
        self.handle_event(chat_id, FlowEvent::Text(text)).await
    }

    /// Feed a pressed button's signal into the user's session
    pub async fn handle_selection(&self, chat_id: i64, signal: &str) -> StepOutcome {
        self.handle_event(chat_id, FlowEvent::Selection(signal)).await
    }

    /// Drop the user's session; returns whether one existed
    pub async fn cancel(&self, chat_id: i64) -> bool {
        let cancelled = self.sessions.remove(chat_id).await.is_some();
        if cancelled {
            info!(user_id = %chat_id, "Active flow cancelled");
        }
        cancelled
    }

    pub async fn is_active(&self, chat_id: i64) -> bool {
        self.sessions.contains(chat_id).await
    }

    /// Snapshot of the user's session
    pub async fn session(&self, chat_id: i64) -> Option<FlowSession> {
        self.sessions.get(chat_id).await
    }

    async fn handle_event(&self, chat_id: i64, event: FlowEvent<'_>) -> StepOutcome {
        let mut guard = self.sessions.lock(chat_id).await;
        let Some(session) = guard.clone() else {
            return StepOutcome::NoSession;
        };
        let language = session.language;

        if session.purpose == FlowPurpose::ProfileUpdate {
            match self.store.is_entitled(chat_id).await {
                Ok(true) => {}
                Ok(false) => {
                    *guard = None;
                    warn!(user_id = %chat_id, "Account lost profile access mid-flow");
                    self.send(chat_id, self.localizer.message("profile-access-paid-only", language))
                        .await;
                    return StepOutcome::NotEntitled;
                }
                Err(e) => {
                    error!(user_id = %chat_id, error = %e, "Failed to check profile access");
                    self.send(chat_id, self.localizer.message("error-generic", language)).await;
                    return StepOutcome::CollaboratorFailed;
                }
            }
        }

        let transition = next_transition(&session, event);
        debug!(user_id = %chat_id, step = ?session.step, transition = ?transition, "Applying transition");

        match self.apply(&mut guard, session, transition).await {
            Ok(outcome) => outcome,
            Err(err) => self.recover(&mut guard, language, err).await,
        }
    }

    async fn apply(
        &self,
        guard: &mut SessionGuard,
        mut session: FlowSession,
        transition: Transition,
    ) -> Result<StepOutcome, FlowError> {
        let chat_id = guard.chat_id();
        let language = session.language;

        match transition {
            Transition::Advance { value, next } => {
                session.draft.apply(value);
                session.step = FlowStep::Collect(next);
                **guard = Some(session);
                self.send_prompt(chat_id, next, language).await;
                Ok(StepOutcome::Advanced(next))
            }
            Transition::Reprompt { error: Some(invalid), .. } => Err(FlowError::InvalidInput(invalid)),
            Transition::Reprompt { field, error: None } => {
                self.send_prompt(chat_id, field, language).await;
                Ok(StepOutcome::Reprompted(field))
            }
            Transition::Complete { value } => {
                session.draft.apply(value);
                // The session is consumed before any terminal side effect runs
                **guard = None;
                self.complete(chat_id, session).await
            }
            Transition::BeginAttribute(field) => {
                session.step = FlowStep::AwaitingInput(field);
                session.attribute_being_edited = Some(field);
                **guard = Some(session);
                self.send_prompt(chat_id, field, language).await;
                Ok(StepOutcome::AttributeSelected(field))
            }
            Transition::SaveAttribute { value } => {
                let field = value.field();
                let mut updated = session.draft.clone();
                updated.apply(value);

                // On failure the guard still holds the untouched session at the leaf
                self.store.save_profile(chat_id, &updated).await?;

                info!(user_id = %chat_id, field = %field, "Profile attribute saved");
                session.draft = updated;
                session.step = FlowStep::SelectAttribute;
                session.attribute_being_edited = None;
                let notice = self.localizer.message("profile-attribute-saved", language);
                self.send_attribute_menu(chat_id, &session.draft, language, Some(notice))
                    .await;
                **guard = Some(session);
                Ok(StepOutcome::AttributeSaved(field))
            }
            Transition::AwaitSelection(reason) => {
                debug!(user_id = %chat_id, reason = ?reason, "Attribute selection expected");
                let hint = self.localizer.message("error-select-attribute-first", language);
                self.send_selection(chat_id, hint, self.attribute_options(language)).await;
                Ok(StepOutcome::AwaitingSelection)
            }
            Transition::Finish => {
                **guard = None;
                info!(user_id = %chat_id, "Profile update finished");
                self.send(chat_id, self.localizer.message("profile-update-finished", language))
                    .await;
                Ok(StepOutcome::Finished)
            }
            Transition::Unexpected(reason) => Err(FlowError::UnexpectedState(reason)),
        }
    }

    /// Terminal side effects of the sequential flow
    async fn complete(&self, chat_id: i64, session: FlowSession) -> Result<StepOutcome, FlowError> {
        let language = session.language;
        let profile = PhysicalProfile::try_from(&session.draft)?;

        match session.purpose {
            FlowPurpose::Calculation => {
                let report = compute_report(&profile);
                info!(user_id = %chat_id, "Calorie report computed");
                self.send(chat_id, format_report(&report, language, self.localizer.as_ref()))
                    .await;
                Ok(StepOutcome::Completed {
                    profile,
                    report: Some(report),
                })
            }
            FlowPurpose::ProfileUpdate => {
                if let Err(e) = self.store.save_profile(chat_id, &session.draft).await {
                    error!(user_id = %chat_id, error = %e, "Failed to save completed profile");
                    self.send(chat_id, self.localizer.message("error-generic", language)).await;
                    return Ok(StepOutcome::CommitFailed);
                }
                info!(user_id = %chat_id, "Profile saved");
                let summary = format!(
                    "{}\n\n{}",
                    self.localizer.message("profile-saved", language),
                    format_profile(&session.draft, language, self.localizer.as_ref())
                );
                self.send(chat_id, summary).await;
                Ok(StepOutcome::Completed { profile, report: None })
            }
        }
    }

    async fn recover(&self, guard: &mut SessionGuard, language: Language, err: FlowError) -> StepOutcome {
        let chat_id = guard.chat_id();
        match err {
            FlowError::InvalidInput(InvalidInputError { field, reason, .. }) => {
                debug!(user_id = %chat_id, field = %field, reason = ?reason, "Rejected answer");
                self.send(chat_id, self.localizer.field_error(field, language)).await;
                // Option lists live in the question text, show them again
                if field.lists_options() {
                    self.send_prompt(chat_id, field, language).await;
                }
                StepOutcome::Reprompted(field)
            }
            FlowError::IncompleteProfile(e) => {
                **guard = None;
                warn!(user_id = %chat_id, error = %e, "Flow ended with an incomplete profile");
                self.send(chat_id, self.localizer.message("error-profile-not-complete", language))
                    .await;
                StepOutcome::Terminated
            }
            FlowError::UnexpectedState(reason) => {
                **guard = None;
                error!(user_id = %chat_id, reason = %reason, "Session in unexpected state, dropping it");
                self.send(chat_id, self.localizer.message("error-unexpected-state", language))
                    .await;
                StepOutcome::Terminated
            }
            FlowError::Collaborator(e) => {
                error!(user_id = %chat_id, error = %e, "Collaborator failed during transition");
                self.send(chat_id, self.localizer.message("error-generic", language)).await;
                StepOutcome::CollaboratorFailed
            }
        }
    }

    /// Attribute keyboard: one button per field plus the closing button
    pub fn attribute_options(&self, language: Language) -> Vec<SelectableOption> {
        Field::SEQUENCE
            .into_iter()
            .map(|field| {
                SelectableOption::new(self.localizer.field_label(field, language), field.selection_signal())
            })
            .chain(std::iter::once(SelectableOption::new(
                self.localizer.message("button-profile-done", language),
                DONE_SIGNAL,
            )))
            .collect()
    }

    async fn send_attribute_menu(
        &self,
        chat_id: i64,
        draft: &ProfileDraft,
        language: Language,
        notice: Option<String>,
    ) {
        let mut text = String::new();
        if let Some(notice) = notice {
            text.push_str(&notice);
            text.push_str("\n\n");
        }
        text.push_str(&format_profile(draft, language, self.localizer.as_ref()));
        text.push_str("\n\n");
        text.push_str(&self.localizer.message("profile-select-attribute", language));
        self.send_selection(chat_id, text, self.attribute_options(language)).await;
    }

    async fn send_prompt(&self, chat_id: i64, field: Field, language: Language) {
        self.send(chat_id, self.localizer.field_prompt(field, language)).await;
    }

    async fn send(&self, chat_id: i64, text: String) {
        if let Err(e) = self.messenger.send_text(chat_id, text).await {
            error!(user_id = %chat_id, error = %e, "Failed to send message");
        }
    }

    async fn send_selection(&self, chat_id: i64, text: String, options: Vec<SelectableOption>) {
        if let Err(e) = self.messenger.send_selection_prompt(chat_id, text, options).await {
            error!(user_id = %chat_id, error = %e, "Failed to send selection prompt");
        }
    }
}

fn first_field(session: &FlowSession) -> Field {
    match session.step {
        FlowStep::Collect(field) | FlowStep::AwaitingInput(field) => field,
        FlowStep::SelectAttribute => Field::SEQUENCE[0],
    }
}
