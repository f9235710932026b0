//! US-street address API client (Smarty schema)
//!
//! Translates the vendor's JSON candidates into the neutral [`Candidate`]
//! model. Uses the `invalid` match strategy so the provider returns its best
//! guess (with an `N` code) for undeliverable addresses; an empty array then
//! means the input could not be interpreted at all.

use super::{AddressComponents, AddressProvider, Candidate, DeliveryAnalysis, ProviderError};
use crate::classifier::MatchSignal;
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://us-street.api.smarty.com";
const USER_AGENT: &str = concat!("avs-validator/", env!("CARGO_PKG_VERSION"));
const MATCH_STRATEGY: &str = "invalid";

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Connection settings for [`SmartyClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartyConfig {
    pub auth_id: String,
    pub auth_token: String,
    pub base_url: String,
    /// Client-side throttle; `None` leaves rate limiting to the provider
    pub max_requests_per_second: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SmartyCandidate {
    delivery_line_1: String,
    #[serde(default)]
    delivery_line_2: Option<String>,
    last_line: String,
    #[serde(default)]
    components: SmartyComponents,
    #[serde(default)]
    analysis: SmartyAnalysis,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SmartyComponents {
    primary_number: Option<String>,
    street_predirection: Option<String>,
    street_name: Option<String>,
    street_suffix: Option<String>,
    street_postdirection: Option<String>,
    secondary_designator: Option<String>,
    secondary_number: Option<String>,
    city_name: Option<String>,
    state_abbreviation: Option<String>,
    zipcode: Option<String>,
    plus4_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SmartyAnalysis {
    dpv_match_code: Option<String>,
    dpv_vacant: Option<String>,
    active: Option<String>,
    /// Concatenated two-character codes, e.g. "AABB"
    dpv_footnotes: Option<String>,
    /// '#'-terminated codes, e.g. "N#L#"
    footnotes: Option<String>,
}

impl From<SmartyCandidate> for Candidate {
    fn from(raw: SmartyCandidate) -> Self {
        let analysis = raw.analysis;
        let components = raw.components;

        let mut footnotes: Vec<String> = analysis
            .dpv_footnotes
            .as_deref()
            .unwrap_or_default()
            .chars()
            .collect::<Vec<_>>()
            .chunks(2)
            .map(|pair| pair.iter().collect())
            .collect();
        footnotes.extend(
            analysis
                .footnotes
                .as_deref()
                .unwrap_or_default()
                .split('#')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(|code| format!("{}#", code)),
        );

        Candidate {
            delivery_line_1: raw.delivery_line_1,
            delivery_line_2: raw.delivery_line_2,
            last_line: raw.last_line,
            components: AddressComponents {
                primary_number: components.primary_number,
                street_predirection: components.street_predirection,
                street_name: components.street_name,
                street_suffix: components.street_suffix,
                street_postdirection: components.street_postdirection,
                secondary_designator: components.secondary_designator,
                secondary_number: components.secondary_number,
                city: components.city_name,
                state: components.state_abbreviation,
                zipcode: components.zipcode,
                plus4_code: components.plus4_code,
            },
            match_signal: MatchSignal::from_code(analysis.dpv_match_code.as_deref().unwrap_or("")),
            analysis: DeliveryAnalysis {
                vacant: is_yes(analysis.dpv_vacant.as_deref()),
                active: is_yes(analysis.active.as_deref()),
                footnotes,
            },
        }
    }
}

fn is_yes(flag: Option<&str>) -> bool {
    matches!(flag, Some(f) if f.eq_ignore_ascii_case("Y"))
}

/// Smarty US Street API client
pub struct SmartyClient {
    http_client: reqwest::Client,
    config: SmartyConfig,
    rate_limiter: Option<DirectLimiter>,
}

impl SmartyClient {
    pub fn new(config: SmartyConfig) -> Result<Self, ProviderError> {
        // Whole-call timeout is owned by the circuit breaker
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let rate_limiter = config
            .max_requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            http_client,
            config,
            rate_limiter,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/street-address", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl AddressProvider for SmartyClient {
    fn name(&self) -> &'static str {
        "smarty"
    }

    async fn ready(&self) {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }
    }

    async fn lookup(
        &self,
        address: &str,
        max_candidates: u32,
    ) -> Result<Vec<Candidate>, ProviderError> {
        let candidates = max_candidates.to_string();
        let params = [
            ("auth-id", self.config.auth_id.as_str()),
            ("auth-token", self.config.auth_token.as_str()),
            ("street", address),
            ("candidates", candidates.as_str()),
            ("match", MATCH_STRATEGY),
        ];

        tracing::debug!(address = %address, max_candidates, "Querying Smarty US Street API");

        let response = self
            .http_client
            .get(self.endpoint())
            .query(&params)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.without_url().to_string()))?;

        let status = response.status();

        if status == 401 {
            return Err(ProviderError::Unauthorized);
        }

        if status == 402 {
            return Err(ProviderError::PaymentRequired);
        }

        if status == 429 {
            return Err(ProviderError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), error_text));
        }

        let raw: Vec<SmartyCandidate> = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.without_url().to_string()))?;

        tracing::debug!(candidates = raw.len(), "Smarty lookup returned");

        Ok(raw.into_iter().map(Candidate::from).collect())
    }
}
