use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::models::{CardResult, Eligibility, Profile};
use crate::normalizer::{fallback_cards, ResponseNormalizer, SavingsEstimator};
use async_trait::async_trait;
use moka::future::Cache;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Served when the token endpoint fails; never cached.
pub const PLACEHOLDER_PARTNER_TOKEN: &str = "mock-token-123";

fn build_client(timeout: Duration, name: &str) -> Result<Client, AppError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::InternalError(format!("Failed to create {} client: {}", name, e)))
}

/// POSTs `body` and parses the JSON answer, turning any transport, status
/// or decoding failure into `ExternalApiError`.
async fn post_json(
    client: &Client,
    url: &str,
    body: &impl Serialize,
    headers: &[(&str, &str)],
) -> Result<Value, AppError> {
    let mut request = client.post(url).json(body);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let response = request
        .send()
        .await
        .map_err(|e| AppError::ExternalApiError(format!("Request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(AppError::ExternalApiError(format!(
            "Returned status {}: {}",
            status, error_text
        )));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| AppError::ExternalApiError(format!("Failed to parse response: {}", e)))
}

// ============ Recommendations ============

/// Where a journey gets its ranked cards from.
#[async_trait]
pub trait RecommendationSource: Send + Sync {
    /// Never fails; degraded answers come back as the fallback list.
    async fn fetch_recommendations(&self, profile: &Profile) -> Vec<CardResult>;
}

pub struct RecommendationService {
    client: Client,
    url: String,
    normalizer: ResponseNormalizer,
}

impl RecommendationService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(config.request_timeout(), "recommendation")?,
            url: config.recommendation_api_url.clone(),
            normalizer: ResponseNormalizer::standard(SavingsEstimator::from_flag(
                config.synthetic_savings,
            )),
        })
    }

    /// Swaps the normalizer, e.g. to add an adapter for a new shape.
    pub fn with_normalizer(mut self, normalizer: ResponseNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    async fn request(&self, profile: &Profile) -> Result<Value, AppError> {
        post_json(&self.client, &self.url, profile, &[])
            .await
            .context("Recommendation API")
    }
}

#[async_trait]
impl RecommendationSource for RecommendationService {
    async fn fetch_recommendations(&self, profile: &Profile) -> Vec<CardResult> {
        tracing::debug!("Requesting recommendations from {}", self.url);

        let body = match self.request(profile).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Serving fallback recommendations: {}", e);
                return fallback_cards();
            }
        };

        match self.normalizer.normalize(&body) {
            Some(normalized) => {
                tracing::info!(
                    "Received {} recommendations ({} shape)",
                    normalized.cards.len(),
                    normalized.shape.as_str()
                );
                normalized.cards
            }
            None => {
                tracing::warn!("Unrecognised recommendation response shape, serving fallback");
                fallback_cards()
            }
        }
    }
}

// ============ Partner token ============

pub struct PartnerTokenService {
    client: Client,
    url: String,
    api_key: String,
    cache: Cache<(), String>,
}

impl PartnerTokenService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(config.request_timeout(), "partner token")?,
            url: config.partner_token_url.clone(),
            api_key: config.partner_api_key.clone(),
            cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(config.partner_token_ttl())
                .build(),
        })
    }

    /// Cached partner token, or the placeholder when the endpoint fails.
    pub async fn partner_token(&self) -> String {
        if let Some(token) = self.cache.get(&()).await {
            tracing::debug!("Partner token served from cache");
            return token;
        }

        match self.request_token().await {
            Ok(token) => {
                tracing::info!("Obtained partner token");
                self.cache.insert((), token.clone()).await;
                token
            }
            Err(e) => {
                tracing::warn!("Using placeholder partner token: {}", e);
                PLACEHOLDER_PARTNER_TOKEN.to_string()
            }
        }
    }

    async fn request_token(&self) -> Result<String, AppError> {
        let body = post_json(
            &self.client,
            &self.url,
            &json!({ "x-api-key": self.api_key }),
            &[],
        )
        .await
        .context("Partner token API")?;

        ["token", "partnerToken"]
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_str))
            .filter(|token| !token.is_empty())
            .map(String::from)
            .ok_or_else(|| {
                AppError::ExternalApiError("Token response has no token field".to_string())
            })
    }
}

// ============ Eligibility ============

fn default_eligible() -> bool {
    true
}

/// Partner eligibility answer. Cards are passed through unparsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityVerdict {
    #[serde(default = "default_eligible")]
    pub eligible: bool,
    #[serde(default)]
    pub cards: Vec<Value>,
}

impl Default for EligibilityVerdict {
    fn default() -> Self {
        Self {
            eligible: true,
            cards: Vec::new(),
        }
    }
}

pub struct EligibilityService {
    client: Client,
    url: String,
}

impl EligibilityService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(config.request_timeout(), "eligibility")?,
            url: config.eligibility_api_url.clone(),
        })
    }

    /// Never fails; any error yields the permissive default verdict.
    pub async fn check(&self, token: &str, eligibility: &Eligibility) -> EligibilityVerdict {
        let body = eligibility_request_body(eligibility);

        let result = post_json(&self.client, &self.url, &body, &[("partner-token", token)])
            .await
            .context("Eligibility API")
            .and_then(|value| {
                serde_json::from_value::<EligibilityVerdict>(value).map_err(|e| {
                    AppError::ExternalApiError(format!("Unexpected eligibility body: {}", e))
                })
            });

        match result {
            Ok(verdict) => {
                tracing::info!(
                    "Eligibility verdict: eligible={} ({} cards)",
                    verdict.eligible,
                    verdict.cards.len()
                );
                verdict
            }
            Err(e) => {
                tracing::warn!("Serving default eligibility verdict: {}", e);
                EligibilityVerdict::default()
            }
        }
    }
}

/// `{ pincode, inhandIncome, empStatus }` with absent fields left out.
/// Income travels as a string.
pub fn eligibility_request_body(eligibility: &Eligibility) -> Value {
    let mut body = Map::new();
    if let Some(pincode) = eligibility.pincode.as_deref().filter(|p| !p.is_empty()) {
        body.insert("pincode".to_string(), json!(pincode));
    }
    if let Some(income) = eligibility.inhand_income.filter(|income| *income > 0) {
        body.insert("inhandIncome".to_string(), json!(income.to_string()));
    }
    if let Some(status) = eligibility.emp_status {
        body.insert("empStatus".to_string(), json!(status));
    }
    Value::Object(body)
}
