//! The per-user journey: category ordering, progressive profile capture,
//! recommendation refresh and the timed auto-advance.
//!
//! State sits behind an async `RwLock` that is released before the
//! recommendation fetch, so edits stay possible while a request is in
//! flight. Each fetch is stamped with a generation and its result is
//! dropped if a newer fetch or a restart happened in the meantime.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::accuracy::{profile_completeness, ScoringTable};
use crate::catalog::{nudge_banner, update_banner, CategoryTable};
use crate::eligibility_gate::EligibilityGate;
use crate::errors::AppError;
use crate::models::{
    is_valid_pincode, Banners, CategoryKey, Eligibility, EligibilityRequirement, JourneySnapshot,
    JourneyStep, PendingEligibility, Profile, ProfileField, Progress, ResultSets, ResultTab,
};
use crate::profile::{accepted_value, set_field, set_field_from_slider};
use crate::services::RecommendationSource;

pub const DEFAULT_AUTO_ADVANCE_DELAY: Duration = Duration::from_millis(2000);

/// Result of asking the journey to complete (or skip) a category.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// Fresh recommendations were applied.
    Recommended {
        results: ResultSets,
        advance_scheduled: bool,
    },
    /// The category waits on eligibility collection first.
    EligibilityRequired(EligibilityRequirement),
    /// A newer fetch or a restart overtook this one; nothing was applied.
    Superseded,
}

#[derive(Debug, Clone)]
struct JourneyState {
    step: JourneyStep,
    order: Vec<CategoryKey>,
    cursor: usize,
    profile: Profile,
    eligibility: Eligibility,
    pending_eligibility: Option<PendingEligibility>,
    /// Cursor positions where collection was submitted or declined.
    gate_resolved: HashSet<usize>,
    results: ResultSets,
    accuracy: u32,
    banners: Banners,
    active_tab: ResultTab,
    generation: u64,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JourneyState {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            step: JourneyStep::CategoryPick,
            order: Vec::new(),
            cursor: 0,
            profile: Profile::default(),
            eligibility: Eligibility::default(),
            pending_eligibility: None,
            gate_resolved: HashSet::new(),
            results: ResultSets::default(),
            accuracy: 0,
            banners: Banners::default(),
            active_tab: ResultTab::default(),
            generation: 0,
            started_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn refresh_accuracy(&mut self, scoring: &ScoringTable) {
        self.accuracy = profile_completeness(&self.profile, &self.eligibility, scoring);
    }

    fn require_inputs(&self, intent: &str) -> Result<(), AppError> {
        if self.step != JourneyStep::CategoryInputs {
            return Err(AppError::InvalidTransition(format!(
                "Cannot {} before categories are selected",
                intent
            )));
        }
        Ok(())
    }

    fn is_last(&self, cursor: usize) -> bool {
        cursor + 1 >= self.order.len()
    }

    fn snapshot(&self, id: Uuid) -> JourneySnapshot {
        let in_inputs = self.step == JourneyStep::CategoryInputs;
        JourneySnapshot {
            id,
            step: self.step,
            order: self.order.clone(),
            cursor: self.cursor,
            current_category: if in_inputs {
                self.order.get(self.cursor).copied()
            } else {
                None
            },
            progress: in_inputs.then(|| Progress {
                position: self.cursor + 1,
                total: self.order.len(),
            }),
            profile: self.profile,
            eligibility: self.eligibility.clone(),
            pending_eligibility: self.pending_eligibility,
            results: self.results.clone(),
            accuracy: self.accuracy,
            banners: self.banners.clone(),
            active_tab: self.active_tab,
            started_at: self.started_at,
            updated_at: self.updated_at,
        }
    }
}

fn validate_eligibility(update: &Eligibility) -> Result<(), AppError> {
    match update.pincode.as_deref().map(str::trim) {
        Some(pincode) if !pincode.is_empty() && !is_valid_pincode(pincode) => Err(
            AppError::BadRequest(format!("'{}' is not a valid 6-digit pincode", pincode)),
        ),
        _ => Ok(()),
    }
}

pub struct Journey {
    id: Uuid,
    state: Arc<RwLock<JourneyState>>,
    recommender: Arc<dyn RecommendationSource>,
    scoring: ScoringTable,
    gate: EligibilityGate,
    auto_advance_delay: Duration,
    pending_advance: Mutex<Option<JoinHandle<()>>>,
    /// Bumped before any cancel or reschedule takes the state lock. A timer
    /// that wakes holding an older epoch does nothing.
    advance_epoch: Arc<AtomicU64>,
}

impl Journey {
    pub fn new(recommender: Arc<dyn RecommendationSource>, auto_advance_delay: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Arc::new(RwLock::new(JourneyState::new())),
            recommender,
            scoring: ScoringTable::default(),
            gate: EligibilityGate::standard(),
            auto_advance_delay,
            pending_advance: Mutex::new(None),
            advance_epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_scoring(mut self, scoring: ScoringTable) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_gate(mut self, gate: EligibilityGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn categories(&self) -> &CategoryTable {
        &self.scoring.categories
    }

    pub async fn snapshot(&self) -> JourneySnapshot {
        self.state.read().await.snapshot(self.id)
    }

    // ============ Category selection ============

    /// Fixes the category order. An empty selection means the canonical
    /// order.
    pub async fn select_categories(
        &self,
        categories: Vec<CategoryKey>,
    ) -> Result<JourneySnapshot, AppError> {
        let order = if categories.is_empty() {
            self.categories().default_order()
        } else {
            categories
        };

        let mut seen = HashSet::new();
        for key in &order {
            if self.categories().get(*key).is_none() {
                return Err(AppError::BadRequest(format!("Unknown category '{}'", key)));
            }
            if !seen.insert(*key) {
                return Err(AppError::BadRequest(format!(
                    "Category '{}' selected more than once",
                    key
                )));
            }
        }

        self.begin(order).await
    }

    /// Canonical order starting at `category`.
    pub async fn start_with(&self, category: CategoryKey) -> Result<JourneySnapshot, AppError> {
        let order = self.categories().order_starting_at(category);
        if order.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Unknown category '{}'",
                category
            )));
        }
        self.begin(order).await
    }

    async fn begin(&self, order: Vec<CategoryKey>) -> Result<JourneySnapshot, AppError> {
        let mut state = self.state.write().await;
        if state.step != JourneyStep::CategoryPick {
            return Err(AppError::InvalidTransition(
                "Categories are already selected".to_string(),
            ));
        }

        tracing::info!("Journey {} starting with order {:?}", self.id, order);
        state.order = order;
        state.cursor = 0;
        state.step = JourneyStep::CategoryInputs;
        state.touch();
        Ok(state.snapshot(self.id))
    }

    // ============ Profile and eligibility ============

    pub async fn update_field(
        &self,
        field: ProfileField,
        value: u64,
    ) -> Result<JourneySnapshot, AppError> {
        let mut state = self.state.write().await;
        state.require_inputs("edit fields")?;

        state.profile = set_field(&state.profile, field, accepted_value(field, value));
        state.refresh_accuracy(&self.scoring);
        state.touch();
        Ok(state.snapshot(self.id))
    }

    pub async fn update_field_from_slider(
        &self,
        field: ProfileField,
        ui_position: u32,
    ) -> Result<JourneySnapshot, AppError> {
        let mut state = self.state.write().await;
        state.require_inputs("edit fields")?;

        state.profile = set_field_from_slider(&state.profile, field, ui_position)?;
        state.refresh_accuracy(&self.scoring);
        state.touch();
        Ok(state.snapshot(self.id))
    }

    /// Merges a partial update; legal in any step.
    pub async fn update_eligibility(
        &self,
        update: Eligibility,
    ) -> Result<JourneySnapshot, AppError> {
        validate_eligibility(&update)?;

        let mut state = self.state.write().await;
        state.eligibility.merge(update);
        state.refresh_accuracy(&self.scoring);
        state.touch();
        Ok(state.snapshot(self.id))
    }

    /// Merges the collected fields and completes the category that was
    /// waiting on them.
    pub async fn submit_eligibility(
        &self,
        update: Eligibility,
    ) -> Result<CompletionOutcome, AppError> {
        validate_eligibility(&update)?;
        let category = self.resolve_pending(Some(update)).await?;
        self.complete_category(category).await
    }

    /// Skips collection; the waiting category still completes.
    pub async fn decline_eligibility(&self) -> Result<CompletionOutcome, AppError> {
        let category = self.resolve_pending(None).await?;
        self.complete_category(category).await
    }

    async fn resolve_pending(&self, update: Option<Eligibility>) -> Result<CategoryKey, AppError> {
        let mut state = self.state.write().await;
        let pending = state.pending_eligibility.take().ok_or_else(|| {
            AppError::InvalidTransition("No eligibility collection is pending".to_string())
        })?;

        if let Some(update) = update {
            state.eligibility.merge(update);
            state.refresh_accuracy(&self.scoring);
        } else {
            tracing::info!("Journey {} declined eligibility collection", self.id);
        }

        let cursor = state.cursor;
        state.gate_resolved.insert(cursor);
        state.touch();
        Ok(pending.category)
    }

    // ============ Completion ============

    pub async fn complete_category(
        &self,
        category: CategoryKey,
    ) -> Result<CompletionOutcome, AppError> {
        let (generation, profile, from_cursor) = {
            let mut state = self.state.write().await;
            state.require_inputs("complete a category")?;
            if !state.order.contains(&category) {
                return Err(AppError::BadRequest(format!(
                    "Category '{}' is not part of this journey",
                    category
                )));
            }

            let cursor = state.cursor;
            if !state.gate_resolved.contains(&cursor) {
                if let Some(requirement) = self.gate.evaluate(cursor, &state.eligibility) {
                    tracing::debug!(
                        "Journey {} needs {:?} before completing '{}'",
                        self.id,
                        requirement,
                        category
                    );
                    state.pending_eligibility = Some(PendingEligibility {
                        category,
                        requirement,
                    });
                    state.touch();
                    return Ok(CompletionOutcome::EligibilityRequired(requirement));
                }
            }

            state.pending_eligibility = None;
            state.generation += 1;
            (state.generation, state.profile, cursor)
        };

        let cards = self.recommender.fetch_recommendations(&profile).await;

        let mut state = self.state.write().await;
        if state.generation != generation {
            tracing::debug!(
                "Journey {} discarded stale recommendations (generation {})",
                self.id,
                generation
            );
            return Ok(CompletionOutcome::Superseded);
        }

        let results = ResultSets::partition(cards);
        state.active_tab = if results.eligible.is_empty() {
            ResultTab::All
        } else {
            ResultTab::Eligible
        };

        let next = state
            .order
            .iter()
            .position(|key| *key == category)
            .and_then(|position| state.order.get(position + 1))
            .copied();
        state.banners = Banners {
            update: Some(update_banner(category).to_string()),
            nudge: next.map(|next| nudge_banner(next).to_string()),
        };
        state.results = results.clone();
        state.touch();

        let advance_scheduled = state.cursor == from_cursor && !state.is_last(from_cursor);
        if advance_scheduled {
            self.schedule_advance(from_cursor);
        }

        tracing::info!(
            "Journey {} completed '{}': {} cards, {} eligible",
            self.id,
            category,
            results.overall.len(),
            results.eligible.len()
        );

        Ok(CompletionOutcome::Recommended {
            results,
            advance_scheduled,
        })
    }

    /// Same as completion: partial answers still produce useful results.
    pub async fn skip_category(
        &self,
        category: CategoryKey,
    ) -> Result<CompletionOutcome, AppError> {
        tracing::info!("Journey {} skipping '{}'", self.id, category);
        self.complete_category(category).await
    }

    // ============ Navigation ============

    /// Moves to the next category now and cancels any pending auto-advance.
    /// A no-op at the last category.
    pub async fn advance_category(&self) -> Result<JourneySnapshot, AppError> {
        self.cancel_advance();

        let mut state = self.state.write().await;
        state.require_inputs("advance")?;

        if !state.is_last(state.cursor) {
            state.cursor += 1;
            tracing::info!("Journey {} advanced to cursor {}", self.id, state.cursor);
        }
        state.pending_eligibility = None;
        state.touch();
        Ok(state.snapshot(self.id))
    }

    pub async fn set_active_tab(&self, tab: ResultTab) -> JourneySnapshot {
        let mut state = self.state.write().await;
        state.active_tab = tab;
        state.touch();
        state.snapshot(self.id)
    }

    /// Back to category selection with an empty profile. In-flight fetches
    /// are discarded when they return.
    pub async fn restart(&self) -> JourneySnapshot {
        self.cancel_advance();

        let mut state = self.state.write().await;
        let generation = state.generation + 1;
        *state = JourneyState::new();
        state.generation = generation;
        tracing::info!("Journey {} restarted", self.id);
        state.snapshot(self.id)
    }

    pub async fn teardown(&self) {
        self.cancel_advance();
        self.state.write().await.generation += 1;
        tracing::debug!("Journey {} torn down", self.id);
    }

    pub fn has_pending_advance(&self) -> bool {
        self.lock_pending_advance()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // ============ Auto-advance timer ============

    fn lock_pending_advance(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending_advance
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule_advance(&self, from_cursor: usize) {
        let state = Arc::downgrade(&self.state);
        let delay = self.auto_advance_delay;
        let id = self.id;
        let current_epoch = self.advance_epoch.clone();
        let epoch = current_epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let Some(state) = state.upgrade() else {
                return;
            };
            let mut state = state.write().await;
            if current_epoch.load(Ordering::SeqCst) != epoch {
                return;
            }
            if state.step == JourneyStep::CategoryInputs
                && state.cursor == from_cursor
                && !state.is_last(from_cursor)
            {
                state.cursor += 1;
                state.pending_eligibility = None;
                state.touch();
                tracing::debug!("Journey {} auto-advanced to cursor {}", id, state.cursor);
            }
        });

        if let Some(previous) = self.lock_pending_advance().replace(handle) {
            previous.abort();
        }
    }

    fn cancel_advance(&self) {
        self.advance_epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.lock_pending_advance().take() {
            handle.abort();
            tracing::debug!("Journey {} cancelled pending auto-advance", self.id);
        }
    }
}

impl Drop for Journey {
    fn drop(&mut self) {
        self.cancel_advance();
    }
}
