//! # Flow Engine Tests
//!
//! Drives [`FlowEngine`] end to end with an in-memory profile store, a recording
//! messenger and the real locale files.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use calorizer::collaborators::{Messenger, ProfileStore, SelectableOption};
use calorizer::dialogue::{FlowMode, FlowPurpose, FlowSession, FlowStep, DONE_SIGNAL};
use calorizer::flow_engine::{FlowEngine, StepOutcome};
use calorizer::formulas::CalorieMethod;
use calorizer::localization::{Language, LocalizationManager, Localizer};
use calorizer::profile::{ActivityLevel, Field, MainGoal, ProfileDraft, Sex};
use calorizer::session_store::SessionStore;

#[derive(Default)]
struct RecordingMessenger {
    texts: Mutex<Vec<(i64, String)>>,
    selections: Mutex<Vec<(i64, Vec<SelectableOption>)>>,
}

impl RecordingMessenger {
    fn texts_for(&self, chat_id: i64) -> Vec<String> {
        self.texts
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    fn last_text(&self, chat_id: i64) -> Option<String> {
        self.texts_for(chat_id).pop()
    }

    fn selection_count(&self) -> usize {
        self.selections.lock().unwrap().len()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, chat_id: i64, text: String) -> Result<()> {
        self.texts.lock().unwrap().push((chat_id, text));
        Ok(())
    }

    async fn send_selection_prompt(
        &self,
        chat_id: i64,
        text: String,
        options: Vec<SelectableOption>,
    ) -> Result<()> {
        self.texts.lock().unwrap().push((chat_id, text));
        self.selections.lock().unwrap().push((chat_id, options));
        Ok(())
    }
}

struct FakeProfileStore {
    profiles: Mutex<HashMap<i64, ProfileDraft>>,
    entitled: AtomicBool,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
    fail_entitlement: AtomicBool,
    saves: AtomicUsize,
}

impl Default for FakeProfileStore {
    fn default() -> Self {
        Self {
            profiles: Mutex::new(HashMap::new()),
            entitled: AtomicBool::new(true),
            fail_saves: AtomicBool::new(false),
            fail_loads: AtomicBool::new(false),
            fail_entitlement: AtomicBool::new(false),
            saves: AtomicUsize::new(0),
        }
    }
}

impl FakeProfileStore {
    fn stored(&self, chat_id: i64) -> Option<ProfileDraft> {
        self.profiles.lock().unwrap().get(&chat_id).cloned()
    }
}

#[async_trait]
impl ProfileStore for FakeProfileStore {
    async fn load_profile(&self, chat_id: i64) -> Result<Option<ProfileDraft>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            bail!("database unavailable");
        }
        Ok(self.stored(chat_id))
    }

    async fn save_profile(&self, chat_id: i64, profile: &ProfileDraft) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            bail!("database unavailable");
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.profiles.lock().unwrap().insert(chat_id, profile.clone());
        Ok(())
    }

    async fn is_entitled(&self, _chat_id: i64) -> Result<bool> {
        if self.fail_entitlement.load(Ordering::SeqCst) {
            bail!("database unavailable");
        }
        Ok(self.entitled.load(Ordering::SeqCst))
    }
}

struct Harness {
    engine: Arc<FlowEngine>,
    sessions: Arc<SessionStore>,
    store: Arc<FakeProfileStore>,
    messenger: Arc<RecordingMessenger>,
    localizer: Arc<LocalizationManager>,
}

fn harness() -> Harness {
    let sessions = Arc::new(SessionStore::new());
    let store = Arc::new(FakeProfileStore::default());
    let messenger = Arc::new(RecordingMessenger::default());
    let localizer = Arc::new(
        LocalizationManager::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("locales"))
            .expect("Failed to load locales"),
    );
    let engine = Arc::new(FlowEngine::new(
        Arc::clone(&sessions),
        store.clone(),
        messenger.clone(),
        localizer.clone(),
    ));
    Harness {
        engine,
        sessions,
        store,
        messenger,
        localizer,
    }
}

fn complete_profile() -> ProfileDraft {
    ProfileDraft {
        sex: Some(Sex::Female),
        height_cm: Some(165.0),
        weight_kg: Some(60.0),
        age_years: Some(28),
        body_fat_percent: Some(22.0),
        activity_level: Some(ActivityLevel::Moderate),
        main_goal: Some(MainGoal::Maintenance),
    }
}

const ANSWERS: [&str; 7] = ["1", "175", "70", "30", "15", "4", "1"];

#[tokio::test]
async fn test_sequential_calculation_produces_report() -> Result<()> {
    let h = harness();
    assert_eq!(h.engine.start_calculation(1, Language::English).await, StepOutcome::Started);
    assert_eq!(
        h.messenger.last_text(1),
        Some(h.localizer.field_prompt(Field::Sex, Language::English))
    );

    for (answer, expected_next) in ANSWERS.iter().zip(Field::SEQUENCE.iter().skip(1)) {
        assert_eq!(
            h.engine.handle_text(1, answer).await,
            StepOutcome::Advanced(*expected_next)
        );
    }

    let (profile, report) = match h.engine.handle_text(1, ANSWERS[6]).await {
        StepOutcome::Completed { profile, report } => (profile, report),
        other => panic!("Expected completion, got {other:?}"),
    };
    let report = report.expect("Calculation must produce a report");

    assert_eq!(profile.sex, Sex::Male);
    assert_eq!(profile.activity_level, ActivityLevel::Active);
    assert_eq!(profile.main_goal, MainGoal::WeightLoss);
    assert_eq!(report.len(), 4);

    let msj = report.get(CalorieMethod::MifflinStJeor).unwrap();
    assert!((msj - 1648.75 * 1.725).abs() < 1e-9);
    let venuto = report.get(CalorieMethod::TomVenuto).unwrap();
    assert!((venuto - msj * 0.8).abs() < 1e-9);

    let text = h.messenger.last_text(1).unwrap();
    assert!(text.starts_with("📊"));
    assert!(text.contains("Mifflin-St Jeor: 2844.09 kcal"));

    // Calculations never touch the stored profile
    assert!(!h.engine.is_active(1).await);
    assert_eq!(h.store.saves.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_invalid_answer_keeps_field() -> Result<()> {
    let h = harness();
    h.engine.start_calculation(2, Language::English).await;
    h.engine.handle_text(2, "1").await;

    assert_eq!(h.engine.handle_text(2, "abc").await, StepOutcome::Reprompted(Field::Height));
    assert_eq!(
        h.messenger.last_text(2),
        Some(h.localizer.field_error(Field::Height, Language::English))
    );

    let session = h.engine.session(2).await.unwrap();
    assert_eq!(session.step, FlowStep::Collect(Field::Height));
    assert_eq!(session.draft.height_cm, None);
    assert_eq!(session.draft.sex, Some(Sex::Male));

    assert_eq!(h.engine.handle_text(2, "300.1").await, StepOutcome::Reprompted(Field::Height));
    assert_eq!(h.engine.handle_text(2, "300").await, StepOutcome::Advanced(Field::Weight));
    Ok(())
}

#[tokio::test]
async fn test_invalid_option_repeats_question() -> Result<()> {
    let h = harness();
    h.engine.start_calculation(3, Language::English).await;
    for answer in &ANSWERS[..5] {
        h.engine.handle_text(3, answer).await;
    }

    let before = h.messenger.texts_for(3).len();
    assert_eq!(
        h.engine.handle_text(3, "6").await,
        StepOutcome::Reprompted(Field::ActivityLevel)
    );

    // Error first, then the option list again
    let texts = h.messenger.texts_for(3);
    assert_eq!(texts.len(), before + 2);
    assert_eq!(texts[before], h.localizer.field_error(Field::ActivityLevel, Language::English));
    assert_eq!(
        texts[before + 1],
        h.localizer.field_prompt(Field::ActivityLevel, Language::English)
    );
    Ok(())
}

#[tokio::test]
async fn test_stale_button_during_questionnaire() -> Result<()> {
    let h = harness();
    h.engine.start_calculation(4, Language::English).await;
    h.engine.handle_text(4, "2").await;

    assert_eq!(
        h.engine.handle_selection(4, "UPDATE_WEIGHT").await,
        StepOutcome::Reprompted(Field::Height)
    );
    assert_eq!(
        h.engine.session(4).await.unwrap().step,
        FlowStep::Collect(Field::Height)
    );
    Ok(())
}

#[tokio::test]
async fn test_single_attribute_update() -> Result<()> {
    let h = harness();
    h.store.profiles.lock().unwrap().insert(5, complete_profile());

    assert_eq!(
        h.engine
            .start_profile_update(5, FlowMode::SingleAttribute, Language::English)
            .await,
        StepOutcome::Started
    );
    assert_eq!(h.messenger.selection_count(), 1);
    assert_eq!(
        h.engine.session(5).await.unwrap().step,
        FlowStep::SelectAttribute
    );

    assert_eq!(
        h.engine.handle_selection(5, "UPDATE_WEIGHT").await,
        StepOutcome::AttributeSelected(Field::Weight)
    );
    let session = h.engine.session(5).await.unwrap();
    assert_eq!(session.step, FlowStep::AwaitingInput(Field::Weight));
    assert_eq!(session.attribute_being_edited, Some(Field::Weight));

    assert_eq!(
        h.engine.handle_text(5, "80").await,
        StepOutcome::AttributeSaved(Field::Weight)
    );

    let expected = ProfileDraft {
        weight_kg: Some(80.0),
        ..complete_profile()
    };
    assert_eq!(h.store.stored(5), Some(expected.clone()));

    let session = h.engine.session(5).await.unwrap();
    assert_eq!(session.step, FlowStep::SelectAttribute);
    assert_eq!(session.attribute_being_edited, None);
    assert_eq!(session.draft, expected);
    assert_eq!(h.messenger.selection_count(), 2);

    assert_eq!(h.engine.handle_selection(5, DONE_SIGNAL).await, StepOutcome::Finished);
    assert!(!h.engine.is_active(5).await);
    Ok(())
}

#[tokio::test]
async fn test_hub_ignores_free_text() -> Result<()> {
    let h = harness();
    h.engine
        .start_profile_update(6, FlowMode::SingleAttribute, Language::English)
        .await;

    assert_eq!(h.engine.handle_text(6, "80").await, StepOutcome::AwaitingSelection);
    assert_eq!(
        h.engine.handle_selection(6, "UPDATE_SHOE_SIZE").await,
        StepOutcome::AwaitingSelection
    );
    assert_eq!(
        h.engine.session(6).await.unwrap().step,
        FlowStep::SelectAttribute
    );
    assert_eq!(h.store.saves.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_sequential_profile_update_saves() -> Result<()> {
    let h = harness();
    h.engine
        .start_profile_update(7, FlowMode::SequentialAll, Language::English)
        .await;
    for answer in &ANSWERS[..6] {
        h.engine.handle_text(7, answer).await;
    }

    let outcome = h.engine.handle_text(7, ANSWERS[6]).await;
    assert!(matches!(outcome, StepOutcome::Completed { report: None, .. }));

    let stored = h.store.stored(7).expect("Profile should be saved");
    assert!(stored.is_complete());
    assert_eq!(stored.height_cm, Some(175.0));
    assert!(h
        .messenger
        .last_text(7)
        .unwrap()
        .starts_with(&h.localizer.message("profile-saved", Language::English)));
    assert!(!h.engine.is_active(7).await);
    Ok(())
}

#[tokio::test]
async fn test_not_entitled_account_is_refused() -> Result<()> {
    let h = harness();
    h.store.entitled.store(false, Ordering::SeqCst);

    assert_eq!(
        h.engine
            .start_profile_update(8, FlowMode::SequentialAll, Language::English)
            .await,
        StepOutcome::NotEntitled
    );
    assert!(!h.engine.is_active(8).await);
    assert_eq!(
        h.messenger.last_text(8),
        Some(h.localizer.message("profile-access-paid-only", Language::English))
    );
    Ok(())
}

#[tokio::test]
async fn test_failed_profile_update_start_drops_previous_session() -> Result<()> {
    let h = harness();

    for failing in [&h.store.fail_entitlement, &h.store.fail_loads] {
        h.engine.start_calculation(40, Language::English).await;
        h.engine.handle_text(40, "1").await;
        assert!(h.engine.is_active(40).await);

        failing.store(true, Ordering::SeqCst);
        assert_eq!(
            h.engine
                .start_profile_update(40, FlowMode::SingleAttribute, Language::English)
                .await,
            StepOutcome::CollaboratorFailed
        );
        failing.store(false, Ordering::SeqCst);

        assert!(!h.engine.is_active(40).await);
        assert_eq!(
            h.messenger.last_text(40),
            Some(h.localizer.message("error-generic", Language::English))
        );
        // The abandoned calculation no longer consumes answers
        assert_eq!(h.engine.handle_text(40, "175").await, StepOutcome::NoSession);
    }
    Ok(())
}

#[tokio::test]
async fn test_entitlement_revoked_mid_flow() -> Result<()> {
    let h = harness();
    h.engine
        .start_profile_update(9, FlowMode::SequentialAll, Language::English)
        .await;
    h.engine.handle_text(9, "1").await;

    h.store.entitled.store(false, Ordering::SeqCst);
    assert_eq!(h.engine.handle_text(9, "175").await, StepOutcome::NotEntitled);
    assert!(!h.engine.is_active(9).await);
    assert_eq!(h.store.stored(9), None);
    Ok(())
}

#[tokio::test]
async fn test_final_save_failure_consumes_session() -> Result<()> {
    let h = harness();
    h.engine
        .start_profile_update(10, FlowMode::SequentialAll, Language::English)
        .await;
    for answer in &ANSWERS[..6] {
        h.engine.handle_text(10, answer).await;
    }

    h.store.fail_saves.store(true, Ordering::SeqCst);
    assert_eq!(h.engine.handle_text(10, ANSWERS[6]).await, StepOutcome::CommitFailed);
    assert!(!h.engine.is_active(10).await);
    assert_eq!(h.store.stored(10), None);
    assert_eq!(
        h.messenger.last_text(10),
        Some(h.localizer.message("error-generic", Language::English))
    );
    Ok(())
}

#[tokio::test]
async fn test_attribute_save_failure_stays_on_field() -> Result<()> {
    let h = harness();
    h.store.profiles.lock().unwrap().insert(11, complete_profile());
    h.engine
        .start_profile_update(11, FlowMode::SingleAttribute, Language::English)
        .await;
    h.engine.handle_selection(11, "UPDATE_AGE").await;

    h.store.fail_saves.store(true, Ordering::SeqCst);
    assert_eq!(h.engine.handle_text(11, "40").await, StepOutcome::CollaboratorFailed);

    let session = h.engine.session(11).await.unwrap();
    assert_eq!(session.step, FlowStep::AwaitingInput(Field::Age));
    assert_eq!(session.draft.age_years, Some(28));
    assert_eq!(h.store.stored(11).unwrap().age_years, Some(28));

    h.store.fail_saves.store(false, Ordering::SeqCst);
    assert_eq!(
        h.engine.handle_text(11, "40").await,
        StepOutcome::AttributeSaved(Field::Age)
    );
    assert_eq!(h.store.stored(11).unwrap().age_years, Some(40));
    Ok(())
}

#[tokio::test]
async fn test_corrupt_session_is_dropped() -> Result<()> {
    let h = harness();
    {
        let mut guard = h.sessions.lock(12).await;
        let mut session =
            FlowSession::sequential(FlowPurpose::Calculation, ProfileDraft::default(), Language::English);
        session.step = FlowStep::SelectAttribute;
        *guard = Some(session);
    }

    assert_eq!(h.engine.handle_text(12, "1").await, StepOutcome::Terminated);
    assert!(!h.engine.is_active(12).await);
    assert_eq!(
        h.messenger.last_text(12),
        Some(h.localizer.message("error-unexpected-state", Language::English))
    );
    Ok(())
}

#[tokio::test]
async fn test_events_without_session() -> Result<()> {
    let h = harness();
    assert_eq!(h.engine.handle_text(13, "175").await, StepOutcome::NoSession);
    assert_eq!(h.engine.handle_selection(13, DONE_SIGNAL).await, StepOutcome::NoSession);
    assert!(h.messenger.texts_for(13).is_empty());
    assert!(h.sessions.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_cancel_and_restart() -> Result<()> {
    let h = harness();
    h.engine.start_calculation(14, Language::German).await;
    h.engine.handle_text(14, "2").await;

    // Starting again discards the half-filled draft
    h.engine.start_calculation(14, Language::German).await;
    let session = h.engine.session(14).await.unwrap();
    assert_eq!(session.step, FlowStep::Collect(Field::Sex));
    assert_eq!(session.draft, ProfileDraft::default());
    assert_eq!(session.language, Language::German);

    assert!(h.engine.cancel(14).await);
    assert!(!h.engine.cancel(14).await);
    assert!(h.sessions.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_final_answers_complete_once() -> Result<()> {
    let h = harness();
    h.engine.start_calculation(15, Language::English).await;
    for answer in &ANSWERS[..6] {
        h.engine.handle_text(15, answer).await;
    }

    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = Arc::clone(&h.engine);
        handles.push(tokio::spawn(async move { engine.handle_text(15, "1").await }));
    }

    let mut completed = 0;
    let mut without_session = 0;
    for handle in handles {
        match handle.await? {
            StepOutcome::Completed { .. } => completed += 1,
            StepOutcome::NoSession => without_session += 1,
            other => panic!("Unexpected outcome: {other:?}"),
        }
    }

    assert_eq!(completed, 1);
    assert_eq!(without_session, 9);
    Ok(())
}

#[tokio::test]
async fn test_users_progress_independently() -> Result<()> {
    let h = harness();
    h.engine.start_calculation(16, Language::English).await;
    h.engine.start_calculation(17, Language::Ukrainian).await;

    h.engine.handle_text(16, "1").await;
    h.engine.handle_text(16, "180").await;
    h.engine.handle_text(17, "2").await;

    assert_eq!(
        h.engine.session(16).await.unwrap().step,
        FlowStep::Collect(Field::Weight)
    );
    assert_eq!(
        h.engine.session(17).await.unwrap().step,
        FlowStep::Collect(Field::Height)
    );
    assert_eq!(
        h.messenger.last_text(17),
        Some(h.localizer.field_prompt(Field::Height, Language::Ukrainian))
    );
    Ok(())
}
