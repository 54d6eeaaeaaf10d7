/// Journey state machine tests driven through the public API
/// Timer behaviour runs on a paused tokio clock
use async_trait::async_trait;
use card_journey::journey::{CompletionOutcome, Journey, DEFAULT_AUTO_ADVANCE_DELAY};
use card_journey::models::{
    CardResult, CategoryKey, Eligibility, EligibilityRequirement, EmploymentStatus, Profile,
    ProfileField, ResultTab,
};
use card_journey::normalizer::fallback_cards;
use card_journey::services::RecommendationSource;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Records every profile it is asked about and answers with the sample list.
#[derive(Default)]
struct RecordingSource {
    profiles: Mutex<Vec<Profile>>,
}

impl RecordingSource {
    fn calls(&self) -> usize {
        self.profiles.lock().unwrap().len()
    }
}

#[async_trait]
impl RecommendationSource for RecordingSource {
    async fn fetch_recommendations(&self, profile: &Profile) -> Vec<CardResult> {
        self.profiles.lock().unwrap().push(*profile);
        fallback_cards()
    }
}

/// Blocks each fetch until released, so tests can act while it is in flight.
#[derive(Default)]
struct GatedSource {
    entered: Notify,
    release: Notify,
    calls: AtomicUsize,
}

#[async_trait]
impl RecommendationSource for GatedSource {
    async fn fetch_recommendations(&self, _profile: &Profile) -> Vec<CardResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        fallback_cards()
    }
}

/// Answers with no cards at all.
struct EmptySource;

#[async_trait]
impl RecommendationSource for EmptySource {
    async fn fetch_recommendations(&self, _profile: &Profile) -> Vec<CardResult> {
        Vec::new()
    }
}

fn recording_journey() -> (Journey, Arc<RecordingSource>) {
    let source = Arc::new(RecordingSource::default());
    (
        Journey::new(source.clone(), DEFAULT_AUTO_ADVANCE_DELAY),
        source,
    )
}

#[tokio::test(start_paused = true)]
async fn test_food_then_travel_end_to_end() {
    let (journey, source) = recording_journey();
    journey
        .select_categories(vec![CategoryKey::Food, CategoryKey::Travel])
        .await
        .unwrap();
    journey
        .update_field(ProfileField::OnlineFoodOrdering, 5_000)
        .await
        .unwrap();

    let outcome = journey.complete_category(CategoryKey::Food).await.unwrap();
    assert!(matches!(
        outcome,
        CompletionOutcome::Recommended {
            advance_scheduled: true,
            ..
        }
    ));

    assert_eq!(source.calls(), 1);
    assert_eq!(source.profiles.lock().unwrap()[0].online_food_ordering, 5_000);

    let snapshot = journey.snapshot().await;
    assert_eq!(snapshot.accuracy, 20);
    assert_eq!(snapshot.cursor, 0);
    assert_eq!(snapshot.active_tab, ResultTab::Eligible);
    assert!(snapshot.banners.nudge.is_some());

    tokio::time::sleep(Duration::from_millis(1_999)).await;
    assert_eq!(journey.snapshot().await.cursor, 0);

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(journey.snapshot().await.cursor, 1);

    // Travel is the last category; nothing moves it further.
    tokio::time::sleep(Duration::from_secs(10)).await;
    let snapshot = journey.snapshot().await;
    assert_eq!(snapshot.cursor, 1);
    assert_eq!(snapshot.current_category, Some(CategoryKey::Travel));
    assert_eq!(source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_manual_advance_cancels_timer() {
    let (journey, _) = recording_journey();
    journey.select_categories(vec![]).await.unwrap();

    journey
        .complete_category(CategoryKey::Shopping)
        .await
        .unwrap();
    assert!(journey.has_pending_advance());

    let snapshot = journey.advance_category().await.unwrap();
    assert_eq!(snapshot.cursor, 1);
    assert!(!journey.has_pending_advance());

    // The cancelled timer must not produce a second move.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(journey.snapshot().await.cursor, 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_completion_replaces_timer() {
    let (journey, source) = recording_journey();
    journey.select_categories(vec![]).await.unwrap();

    journey
        .complete_category(CategoryKey::Shopping)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    journey
        .complete_category(CategoryKey::Shopping)
        .await
        .unwrap();

    // First timer would have fired at 2000ms; the replacement fires at 3500ms.
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(journey.snapshot().await.cursor, 0);

    tokio::time::sleep(Duration::from_millis(1_001)).await;
    assert_eq!(journey.snapshot().await.cursor, 1);
    assert_eq!(source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_cancels_timer() {
    let (journey, _) = recording_journey();
    journey.select_categories(vec![]).await.unwrap();
    journey
        .complete_category(CategoryKey::Shopping)
        .await
        .unwrap();

    journey.teardown().await;
    assert!(!journey.has_pending_advance());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(journey.snapshot().await.cursor, 0);
}

#[tokio::test(start_paused = true)]
async fn test_restart_cancels_timer_and_resets() {
    let (journey, _) = recording_journey();
    journey.select_categories(vec![]).await.unwrap();
    journey
        .update_field(ProfileField::Rent, 20_000)
        .await
        .unwrap();
    journey
        .complete_category(CategoryKey::Shopping)
        .await
        .unwrap();

    let snapshot = journey.restart().await;
    assert!(snapshot.results.is_empty());
    assert_eq!(snapshot.profile, Profile::default());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(journey.snapshot().await.cursor, 0);
}

#[tokio::test]
async fn test_stale_response_is_discarded_after_restart() {
    let source = Arc::new(GatedSource::default());
    let journey = Arc::new(Journey::new(source.clone(), DEFAULT_AUTO_ADVANCE_DELAY));
    journey.select_categories(vec![]).await.unwrap();

    let in_flight = tokio::spawn({
        let journey = journey.clone();
        async move { journey.complete_category(CategoryKey::Shopping).await }
    });

    source.entered.notified().await;
    journey.restart().await;
    source.release.notify_one();

    let outcome = in_flight.await.unwrap().unwrap();
    assert_eq!(outcome, CompletionOutcome::Superseded);

    let snapshot = journey.snapshot().await;
    assert!(snapshot.results.is_empty());
    assert!(snapshot.banners.update.is_none());
    assert!(!journey.has_pending_advance());
}

#[tokio::test]
async fn test_newer_fetch_supersedes_older() {
    let source = Arc::new(GatedSource::default());
    let journey = Arc::new(Journey::new(source.clone(), DEFAULT_AUTO_ADVANCE_DELAY));
    journey.select_categories(vec![]).await.unwrap();

    let first = tokio::spawn({
        let journey = journey.clone();
        async move { journey.complete_category(CategoryKey::Shopping).await }
    });
    source.entered.notified().await;

    let second = tokio::spawn({
        let journey = journey.clone();
        async move { journey.skip_category(CategoryKey::Shopping).await }
    });
    source.entered.notified().await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);

    // Each release wakes exactly one waiting fetch.
    source.release.notify_one();
    source.release.notify_one();

    let outcomes = [first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];
    assert!(outcomes.contains(&CompletionOutcome::Superseded));
    assert!(outcomes
        .iter()
        .any(|outcome| matches!(outcome, CompletionOutcome::Recommended { .. })));
}

#[tokio::test]
async fn test_field_edits_allowed_during_fetch() {
    let source = Arc::new(GatedSource::default());
    let journey = Arc::new(Journey::new(source.clone(), DEFAULT_AUTO_ADVANCE_DELAY));
    journey.select_categories(vec![]).await.unwrap();

    let in_flight = tokio::spawn({
        let journey = journey.clone();
        async move { journey.complete_category(CategoryKey::Shopping).await }
    });
    source.entered.notified().await;

    let snapshot = journey
        .update_field(ProfileField::AmazonSpends, 4_000)
        .await
        .unwrap();
    assert_eq!(snapshot.profile.amazon_spends, 4_000);

    source.release.notify_one();
    let outcome = in_flight.await.unwrap().unwrap();
    assert!(matches!(outcome, CompletionOutcome::Recommended { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_gate_is_positional_after_reordering() {
    let (journey, source) = recording_journey();
    journey
        .select_categories(vec![
            CategoryKey::Bills,
            CategoryKey::Travel,
            CategoryKey::Shopping,
        ])
        .await
        .unwrap();

    // Cursor 0: never gated.
    journey.complete_category(CategoryKey::Bills).await.unwrap();
    journey.advance_category().await.unwrap();

    // Cursor 1: income.
    let outcome = journey.complete_category(CategoryKey::Travel).await.unwrap();
    assert_eq!(
        outcome,
        CompletionOutcome::EligibilityRequired(EligibilityRequirement::Income)
    );
    journey
        .submit_eligibility(Eligibility {
            inhand_income: Some(70_000),
            emp_status: Some(EmploymentStatus::Salaried),
            ..Default::default()
        })
        .await
        .unwrap();
    journey.advance_category().await.unwrap();

    // Cursor 2: pincode, income already known.
    let outcome = journey
        .complete_category(CategoryKey::Shopping)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        CompletionOutcome::EligibilityRequired(EligibilityRequirement::Pincode)
    );

    let err = journey
        .submit_eligibility(Eligibility {
            pincode: Some("000000".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

    journey
        .submit_eligibility(Eligibility {
            pincode: Some("400001".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let snapshot = journey.snapshot().await;
    assert!(snapshot.eligibility.is_complete());
    // No spend answers were given; only the eligibility bonus counts.
    assert_eq!(snapshot.accuracy, 5);
    assert_eq!(source.calls(), 3);
    assert_eq!(snapshot.banners.nudge, None);
}

#[tokio::test(start_paused = true)]
async fn test_empty_results_select_all_tab() {
    let journey = Journey::new(Arc::new(EmptySource), DEFAULT_AUTO_ADVANCE_DELAY);
    journey.select_categories(vec![]).await.unwrap();
    journey.set_active_tab(ResultTab::Eligible).await;

    let outcome = journey
        .complete_category(CategoryKey::Shopping)
        .await
        .unwrap();
    assert!(matches!(outcome, CompletionOutcome::Recommended { ref results, .. } if results.is_empty()));
    assert_eq!(journey.snapshot().await.active_tab, ResultTab::All);
}

#[tokio::test]
async fn test_wrong_step_intents_leave_state_untouched() {
    let (journey, source) = recording_journey();

    let err = journey
        .complete_category(CategoryKey::Shopping)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
    assert!(journey.advance_category().await.is_err());
    assert!(journey
        .update_field_from_slider(ProfileField::Rent, 50)
        .await
        .is_err());

    let snapshot = journey.snapshot().await;
    assert_eq!(snapshot.cursor, 0);
    assert_eq!(snapshot.profile, Profile::default());
    assert_eq!(source.calls(), 0);
}
