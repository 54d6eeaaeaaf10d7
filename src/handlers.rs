use crate::catalog::{CatalogView, CategoryTable};
use crate::config::Config;
use crate::errors::AppError;
use crate::journey::{CompletionOutcome, Journey};
use crate::models::*;
use crate::services::{
    EligibilityService, EligibilityVerdict, PartnerTokenService, RecommendationService,
    RecommendationSource,
};
use axum::{
    extract::{FromRequest, Path, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use uuid::Uuid;

pub const MAX_BODY_BYTES: usize = 64 * 1024;
const MAX_LIVE_JOURNEYS: u64 = 100_000;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Live journeys, evicted after the configured idle period. Eviction
    /// drops the journey, which cancels its pending auto-advance.
    pub journeys: Cache<Uuid, Arc<Journey>>,
    /// Source every new journey fetches recommendations from.
    pub recommender: Arc<dyn RecommendationSource>,
    /// Partner token client with its own TTL cache.
    pub partner_tokens: Arc<PartnerTokenService>,
    /// Partner eligibility client.
    pub eligibility: Arc<EligibilityService>,
    /// Category table served by the catalog endpoint.
    pub categories: CategoryTable,
}

impl AppState {
    /// Builds the upstream clients from `config`. Fails only if an HTTP
    /// client cannot be constructed.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let journeys = Cache::builder()
            .time_to_idle(config.session_idle())
            .max_capacity(MAX_LIVE_JOURNEYS)
            .build();

        Ok(Self {
            recommender: Arc::new(RecommendationService::new(&config)?),
            partner_tokens: Arc::new(PartnerTokenService::new(&config)?),
            eligibility: Arc::new(EligibilityService::new(&config)?),
            categories: CategoryTable::standard(),
            journeys,
            config,
        })
    }

    /// Replaces the recommendation source, e.g. with a stub in tests.
    pub fn with_recommender(mut self, recommender: Arc<dyn RecommendationSource>) -> Self {
        self.recommender = recommender;
        self
    }

    async fn journey(&self, id: Uuid) -> Result<Arc<Journey>, AppError> {
        self.journeys
            .get(&id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Journey {} not found", id)))
    }
}

// ============ Request / response bodies ============

/// JSON request body. Rejections answer with the same `{ "error": ... }`
/// body as every other failure instead of axum's plain-text 422.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Body of `POST /journeys/:id/categories`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectCategoriesRequest {
    /// Chosen order; empty means the canonical order.
    pub categories: Vec<CategoryKey>,
    /// Takes precedence over `categories`.
    pub start_with: Option<CategoryKey>,
}

/// Exactly one of `value` and `slider` must be given.
#[derive(Debug, Deserialize)]
pub struct UpdateFieldRequest {
    /// Wire name of the profile field, e.g. `amazon_spends`.
    pub field: String,
    /// Raw value in the field's unit.
    pub value: Option<u64>,
    /// Slider position 0..=100, mapped through the field's maximum.
    pub slider: Option<u32>,
}

/// Body of the complete and skip endpoints.
#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub category: CategoryKey,
}

#[derive(Debug, Deserialize)]
pub struct TabRequest {
    pub tab: ResultTab,
}

/// Wire form of [`CompletionOutcome`] without its payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Recommended,
    EligibilityRequired,
    Superseded,
}

/// Response of every intent that may fetch recommendations.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    pub outcome: OutcomeKind,
    /// Set when the outcome is `eligibility_required`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement: Option<EligibilityRequirement>,
    /// An auto-advance to the next category is pending.
    pub advance_scheduled: bool,
    /// Journey state after the intent.
    pub journey: JourneySnapshot,
}

async fn completion_response(
    journey: &Journey,
    outcome: CompletionOutcome,
) -> Json<CompletionResponse> {
    let (outcome, requirement, advance_scheduled) = match outcome {
        CompletionOutcome::Recommended {
            advance_scheduled, ..
        } => (OutcomeKind::Recommended, None, advance_scheduled),
        CompletionOutcome::EligibilityRequired(requirement) => {
            (OutcomeKind::EligibilityRequired, Some(requirement), false)
        }
        CompletionOutcome::Superseded => (OutcomeKind::Superseded, None, false),
    };

    Json(CompletionResponse {
        outcome,
        requirement,
        advance_scheduled,
        journey: journey.snapshot().await,
    })
}

// ============ Handlers ============

/// Health check endpoint.
///
/// Returns the service status and version. Exempt from rate limiting.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "card-journey",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/v1/catalog
///
/// Categories, field limits and picker choices for rendering the
/// questionnaire.
pub async fn catalog(State(state): State<Arc<AppState>>) -> Json<CatalogView> {
    Json(CatalogView::from_table(&state.categories))
}

/// POST /api/v1/journeys
///
/// Starts a new journey in category selection and answers 201 with its
/// snapshot.
pub async fn create_journey(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<JourneySnapshot>) {
    let journey = Arc::new(Journey::new(
        state.recommender.clone(),
        state.config.auto_advance_delay(),
    ));
    let snapshot = journey.snapshot().await;
    state.journeys.insert(journey.id(), journey).await;

    tracing::info!("Created journey {}", snapshot.id);
    (StatusCode::CREATED, Json(snapshot))
}

/// GET /api/v1/journeys/:id
pub async fn get_journey(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JourneySnapshot>, AppError> {
    let journey = state.journey(id).await?;
    Ok(Json(journey.snapshot().await))
}

/// DELETE /api/v1/journeys/:id
///
/// Tears the journey down: the pending auto-advance is cancelled and any
/// in-flight fetch is discarded when it returns.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `id` - The journey UUID.
///
/// # Returns
///
/// * `Result<StatusCode, AppError>` - 204 No Content, or 404 if the journey is unknown.
pub async fn delete_journey(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let journey = state
        .journeys
        .remove(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Journey {} not found", id)))?;

    journey.teardown().await;
    tracing::info!("Deleted journey {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/journeys/:id/restart
///
/// Back to category selection with an empty profile.
pub async fn restart_journey(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JourneySnapshot>, AppError> {
    let journey = state.journey(id).await?;
    Ok(Json(journey.restart().await))
}

/// POST /api/v1/journeys/:id/categories
///
/// Fixes the category order, either from an explicit list or from a
/// starting category.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `id` - The journey UUID.
/// * `payload` - Explicit `categories`, or `startWith`.
///
/// # Returns
///
/// * `Result<Json<JourneySnapshot>, AppError>` - The snapshot, 400 on unknown or duplicate categories, 409 if already selected.
pub async fn select_categories(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<SelectCategoriesRequest>,
) -> Result<Json<JourneySnapshot>, AppError> {
    let journey = state.journey(id).await?;
    let snapshot = match payload.start_with {
        Some(category) => journey.start_with(category).await?,
        None => journey.select_categories(payload.categories).await?,
    };
    Ok(Json(snapshot))
}

/// PUT /api/v1/journeys/:id/fields
///
/// Stores one spend answer. Lounge fields snap to the offered choices.
pub async fn update_field(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdateFieldRequest>,
) -> Result<Json<JourneySnapshot>, AppError> {
    let field: ProfileField = payload.field.parse()?;
    let journey = state.journey(id).await?;

    let snapshot = match (payload.value, payload.slider) {
        (Some(value), None) => journey.update_field(field, value).await?,
        (None, Some(slider)) => journey.update_field_from_slider(field, slider).await?,
        _ => {
            return Err(AppError::BadRequest(
                "Provide exactly one of 'value' or 'slider'".to_string(),
            ))
        }
    };
    Ok(Json(snapshot))
}

/// PATCH /api/v1/journeys/:id/eligibility
///
/// Merges eligibility answers in any step. A malformed pincode is a 400.
pub async fn update_eligibility(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<Eligibility>,
) -> Result<Json<JourneySnapshot>, AppError> {
    let journey = state.journey(id).await?;
    Ok(Json(journey.update_eligibility(payload).await?))
}

/// POST /api/v1/journeys/:id/eligibility/submit
///
/// Answers a pending eligibility prompt and completes the waiting category.
pub async fn submit_eligibility(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<Eligibility>,
) -> Result<Json<CompletionResponse>, AppError> {
    let journey = state.journey(id).await?;
    let outcome = journey.submit_eligibility(payload).await?;
    Ok(completion_response(&journey, outcome).await)
}

/// POST /api/v1/journeys/:id/eligibility/decline
///
/// Dismisses the prompt; the waiting category still completes.
pub async fn decline_eligibility(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CompletionResponse>, AppError> {
    let journey = state.journey(id).await?;
    let outcome = journey.decline_eligibility().await?;
    Ok(completion_response(&journey, outcome).await)
}

/// POST /api/v1/journeys/:id/eligibility/check
///
/// Obtains a partner token, stores it on the journey and asks the partner
/// eligibility service about the journey's current answers.
pub async fn check_eligibility(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<EligibilityVerdict>, AppError> {
    let journey = state.journey(id).await?;
    let token = state.partner_tokens.partner_token().await;

    let snapshot = journey
        .update_eligibility(Eligibility {
            token: Some(token.clone()),
            ..Default::default()
        })
        .await?;

    let verdict = state.eligibility.check(&token, &snapshot.eligibility).await;
    Ok(Json(verdict))
}

/// POST /api/v1/journeys/:id/complete
///
/// Completes a category: either fetches recommendations or parks the
/// completion behind an eligibility prompt.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `id` - The journey UUID.
/// * `payload` - The category being completed.
///
/// # Returns
///
/// * `Result<Json<CompletionResponse>, AppError>` - The outcome and the resulting snapshot.
pub async fn complete_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<CategoryRequest>,
) -> Result<Json<CompletionResponse>, AppError> {
    let journey = state.journey(id).await?;
    let outcome = journey.complete_category(payload.category).await?;
    Ok(completion_response(&journey, outcome).await)
}

/// POST /api/v1/journeys/:id/skip
pub async fn skip_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<CategoryRequest>,
) -> Result<Json<CompletionResponse>, AppError> {
    let journey = state.journey(id).await?;
    let outcome = journey.skip_category(payload.category).await?;
    Ok(completion_response(&journey, outcome).await)
}

/// POST /api/v1/journeys/:id/advance
///
/// Moves to the next category now, cancelling any pending auto-advance.
pub async fn advance_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JourneySnapshot>, AppError> {
    let journey = state.journey(id).await?;
    Ok(Json(journey.advance_category().await?))
}

/// PUT /api/v1/journeys/:id/tab
pub async fn set_active_tab(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<TabRequest>,
) -> Result<Json<JourneySnapshot>, AppError> {
    let journey = state.journey(id).await?;
    Ok(Json(journey.set_active_tab(payload.tab).await))
}

// ============ Routing ============

/// Journey API under `/api/v1`, with the body size limit applied.
pub fn api_routes() -> Router<Arc<AppState>> {
    let journeys = Router::new()
        .route("/catalog", get(catalog))
        .route("/journeys", post(create_journey))
        .route("/journeys/:id", get(get_journey).delete(delete_journey))
        .route("/journeys/:id/restart", post(restart_journey))
        .route("/journeys/:id/categories", post(select_categories))
        .route("/journeys/:id/fields", put(update_field))
        .route("/journeys/:id/eligibility", patch(update_eligibility))
        .route("/journeys/:id/eligibility/submit", post(submit_eligibility))
        .route(
            "/journeys/:id/eligibility/decline",
            post(decline_eligibility),
        )
        .route("/journeys/:id/eligibility/check", post(check_eligibility))
        .route("/journeys/:id/complete", post(complete_category))
        .route("/journeys/:id/skip", post(skip_category))
        .route("/journeys/:id/advance", post(advance_category))
        .route("/journeys/:id/tab", put(set_active_tab));

    Router::new()
        .nest("/api/v1", journeys)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
}

/// Full application without rate limiting.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
