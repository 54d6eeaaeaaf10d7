use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_RECOMMENDATION_API_URL: &str =
    "https://card-recommendation-api-v2.bankkaro.com/cg/api/pro";
pub const DEFAULT_PARTNER_TOKEN_URL: &str = "https://uat-platform.bankkaro.com/partner/token";
pub const DEFAULT_ELIGIBILITY_API_URL: &str =
    "https://uat-platform.bankkaro.com/partner/cardgenius/eligiblity";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub recommendation_api_url: String,
    pub partner_token_url: String,
    pub eligibility_api_url: String,
    pub partner_api_key: String,
    /// Delay between a category's results landing and the cursor moving on.
    pub auto_advance_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// When false, cards without upstream savings keep a zero estimate.
    pub synthetic_savings: bool,
    pub session_idle_secs: u64,
    pub partner_token_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            recommendation_api_url: DEFAULT_RECOMMENDATION_API_URL.to_string(),
            partner_token_url: DEFAULT_PARTNER_TOKEN_URL.to_string(),
            eligibility_api_url: DEFAULT_ELIGIBILITY_API_URL.to_string(),
            partner_api_key: "test".to_string(),
            auto_advance_delay_ms: 2000,
            request_timeout_secs: 30,
            synthetic_savings: true,
            session_idle_secs: 1800,
            partner_token_ttl_secs: 900,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| defaults.port.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            recommendation_api_url: url_var(
                "RECOMMENDATION_API_URL",
                &defaults.recommendation_api_url,
            )?,
            partner_token_url: url_var("PARTNER_TOKEN_URL", &defaults.partner_token_url)?,
            eligibility_api_url: url_var("ELIGIBILITY_API_URL", &defaults.eligibility_api_url)?,
            partner_api_key: {
                let key = std::env::var("PARTNER_API_KEY")
                    .unwrap_or_else(|_| defaults.partner_api_key.clone());
                if key.trim().is_empty() {
                    anyhow::bail!("PARTNER_API_KEY cannot be empty");
                }
                key
            },
            auto_advance_delay_ms: number_var(
                "AUTO_ADVANCE_DELAY_MS",
                defaults.auto_advance_delay_ms,
                false,
            )?,
            request_timeout_secs: number_var(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
                true,
            )?,
            synthetic_savings: match std::env::var("SYNTHETIC_SAVINGS") {
                Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                    "1" | "true" | "yes" | "on" => true,
                    "0" | "false" | "no" | "off" => false,
                    other => anyhow::bail!("SYNTHETIC_SAVINGS must be a boolean, got '{}'", other),
                },
                Err(_) => defaults.synthetic_savings,
            },
            session_idle_secs: number_var("SESSION_IDLE_SECS", defaults.session_idle_secs, true)?,
            partner_token_ttl_secs: number_var(
                "PARTNER_TOKEN_TTL_SECS",
                defaults.partner_token_ttl_secs,
                true,
            )?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Recommendation API URL: {}", config.recommendation_api_url);
        tracing::debug!("Partner token URL: {}", config.partner_token_url);
        tracing::debug!("Eligibility API URL: {}", config.eligibility_api_url);
        tracing::debug!(
            "Auto-advance delay: {}ms, synthetic savings: {}",
            config.auto_advance_delay_ms,
            config.synthetic_savings
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    pub fn auto_advance_delay(&self) -> Duration {
        Duration::from_millis(self.auto_advance_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    pub fn partner_token_ttl(&self) -> Duration {
        Duration::from_secs(self.partner_token_ttl_secs)
    }
}

fn url_var(name: &str, default: &str) -> anyhow::Result<String> {
    let url = std::env::var(name).unwrap_or_else(|_| default.to_string());
    if url.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url)
}

fn number_var(name: &str, default: u64, positive: bool) -> anyhow::Result<u64> {
    let value = match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer", name))?,
        Err(_) => default,
    };
    if positive && value == 0 {
        anyhow::bail!("{} must be greater than zero", name);
    }
    Ok(value)
}
