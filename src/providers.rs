//! Provider adapters for the age, gender and nationality lookup APIs.
//!
//! Each adapter performs one `GET <base_url>?name=<name>` and decodes the provider's JSON shape.
//! Adapters hold nothing but a shared `reqwest::Client` and a base URL, so they can be cloned and
//! called concurrently.

use crate::errors::EnrichmentError;
use crate::scope::Scope;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Age,
    Gender,
    Nationality,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Age => "age",
            Provider::Gender => "gender",
            Provider::Nationality => "nationality",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{"age": 34}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeResult {
    pub age: u32,
}

/// `{"gender": "male"}`. The label is passed through as the provider sent it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderResult {
    pub gender: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryProbability {
    pub country_id: String,
    pub probability: f64,
}

/// `{"country": [{"country_id": "UA", "probability": 0.9}, ...]}`, highest probability first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationalityResult {
    pub country: Vec<CountryProbability>,
}

impl NationalityResult {
    /// Top-ranked candidate. The provider orders candidates, so this is simply the first entry.
    pub fn top(&self) -> Option<&CountryProbability> {
        self.country.first()
    }
}

/// One provider's lookup-by-name capability.
///
/// Implementations must stop promptly once `scope` ends and report
/// [`EnrichmentError::Cancelled`] in that case.
#[async_trait]
pub trait Lookup: Send + Sync + 'static {
    type Output: Send + 'static;

    fn provider(&self) -> Provider;

    async fn lookup(&self, scope: &Scope, name: &str) -> Result<Self::Output, EnrichmentError>;
}

/// Shared GET-and-decode path used by all three HTTP adapters.
#[derive(Debug, Clone)]
struct ProviderEndpoint {
    provider: Provider,
    client: Client,
    base_url: String,
}

impl ProviderEndpoint {
    fn new(provider: Provider, client: Client, base_url: impl Into<String>) -> Self {
        Self {
            provider,
            client,
            base_url: base_url.into(),
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        scope: &Scope,
        name: &str,
    ) -> Result<T, EnrichmentError> {
        let url = Url::parse_with_params(&self.base_url, &[("name", name)]).map_err(|e| {
            EnrichmentError::Internal(format!(
                "invalid {} provider url '{}': {}",
                self.provider, self.base_url, e
            ))
        })?;

        tracing::debug!(provider = %self.provider, %url, "Querying provider");

        // Dropping this future on scope end aborts the in-flight request.
        let exchange = async {
            let response = self.client.get(url).send().await.map_err(|e| {
                EnrichmentError::ProviderUnavailable {
                    provider: self.provider,
                    source: e,
                }
            })?;

            let status = response.status();
            if status != StatusCode::OK {
                tracing::warn!(
                    provider = %self.provider,
                    %status,
                    "Provider returned non-200 status"
                );
                return Err(EnrichmentError::ProviderBadStatus {
                    provider: self.provider,
                    status,
                });
            }

            response
                .bytes()
                .await
                .map_err(|e| EnrichmentError::ProviderUnavailable {
                    provider: self.provider,
                    source: e,
                })
        };

        let body = scope.run(exchange).await??;

        serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(
                provider = %self.provider,
                error = %e,
                "Failed to decode provider response"
            );
            EnrichmentError::ProviderDecodeFailure {
                provider: self.provider,
                source: e,
            }
        })
    }
}

/// Client for the age provider (agify-compatible).
#[derive(Debug, Clone)]
pub struct AgeApiClient {
    endpoint: ProviderEndpoint,
}

impl AgeApiClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            endpoint: ProviderEndpoint::new(Provider::Age, client, base_url),
        }
    }
}

#[async_trait]
impl Lookup for AgeApiClient {
    type Output = AgeResult;

    fn provider(&self) -> Provider {
        Provider::Age
    }

    async fn lookup(&self, scope: &Scope, name: &str) -> Result<AgeResult, EnrichmentError> {
        self.endpoint.fetch(scope, name).await
    }
}

/// Client for the gender provider (genderize-compatible).
#[derive(Debug, Clone)]
pub struct GenderApiClient {
    endpoint: ProviderEndpoint,
}

impl GenderApiClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            endpoint: ProviderEndpoint::new(Provider::Gender, client, base_url),
        }
    }
}

#[async_trait]
impl Lookup for GenderApiClient {
    type Output = GenderResult;

    fn provider(&self) -> Provider {
        Provider::Gender
    }

    async fn lookup(&self, scope: &Scope, name: &str) -> Result<GenderResult, EnrichmentError> {
        self.endpoint.fetch(scope, name).await
    }
}

/// Client for the nationality provider (nationalize-compatible).
#[derive(Debug, Clone)]
pub struct NationalityApiClient {
    endpoint: ProviderEndpoint,
}

impl NationalityApiClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            endpoint: ProviderEndpoint::new(Provider::Nationality, client, base_url),
        }
    }
}

#[async_trait]
impl Lookup for NationalityApiClient {
    type Output = NationalityResult;

    fn provider(&self) -> Provider {
        Provider::Nationality
    }

    /// An empty candidate list is reported as [`EnrichmentError::NoNationality`].
    async fn lookup(
        &self,
        scope: &Scope,
        name: &str,
    ) -> Result<NationalityResult, EnrichmentError> {
        let result: NationalityResult = self.endpoint.fetch(scope, name).await?;
        if result.country.is_empty() {
            tracing::warn!(subject = name, "Nationality provider returned no candidates");
            return Err(EnrichmentError::NoNationality);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EnrichmentErrorKind;

    #[test]
    fn test_top_is_first_candidate() {
        let result: NationalityResult = serde_json::from_str(
            r#"{"country":[{"country_id":"RU","probability":0.7},{"country_id":"US","probability":0.3}]}"#,
        )
        .unwrap();

        assert_eq!(result.top().map(|c| c.country_id.as_str()), Some("RU"));
    }

    #[test]
    fn test_top_of_empty_list_is_none() {
        let result = NationalityResult { country: vec![] };
        assert!(result.top().is_none());
    }

    #[test]
    fn test_extra_provider_fields_are_ignored() {
        let age: AgeResult =
            serde_json::from_str(r#"{"count":1200,"name":"Dmitriy","age":34}"#).unwrap();
        assert_eq!(age.age, 34);
    }

    #[tokio::test]
    async fn test_invalid_base_url_is_internal_error() {
        let client = AgeApiClient::new(Client::new(), "not a url");
        let err = client.lookup(&Scope::new(), "Dmitriy").await.unwrap_err();
        assert_eq!(err.kind(), EnrichmentErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_lookup_on_cancelled_scope_is_cancelled() {
        let scope = Scope::new();
        scope.cancel();

        let client = GenderApiClient::new(Client::new(), "http://127.0.0.1:9/");
        let err = client.lookup(&scope, "Dmitriy").await.unwrap_err();
        assert_eq!(err.kind(), EnrichmentErrorKind::Cancelled);
    }
}
