//! Enrichment coordinator.
//!
//! Fans a single name out to the age, gender and nationality providers and reduces their three
//! outcomes to one result:
//! 1. All three lookups run as independent tokio tasks against a child of the caller's scope
//! 2. The first lookup error wins and is returned immediately
//! 3. The caller's scope ending wins over anything still pending
//! 4. Success is only reported once all three lookups succeeded
//!
//! Once an outcome is picked the child scope is cancelled. Lookups still in flight observe that,
//! drop their HTTP requests and exit on their own; the coordinator does not wait for them.
use crate::config::ProviderUrls;
use crate::errors::{AppError, EnrichmentError};
use crate::providers::{
    AgeApiClient, AgeResult, GenderApiClient, GenderResult, Lookup, NationalityApiClient,
    NationalityResult,
};
use crate::scope::Scope;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::Instrument;
use uuid::Uuid;

pub type AgeLookup = Arc<dyn Lookup<Output = AgeResult>>;
pub type GenderLookup = Arc<dyn Lookup<Output = GenderResult>>;
pub type NationalityLookup = Arc<dyn Lookup<Output = NationalityResult>>;

/// Attributes inferred for one name. Only ever built with all three fields present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedPerson {
    pub age: u32,
    pub gender: String,
    /// Top-ranked country code.
    pub nationality: String,
}

/// Result slot of one finished lookup task.
enum LookupOutcome {
    Age(AgeResult),
    Gender(GenderResult),
    Nationality(NationalityResult),
}

#[derive(Clone)]
pub struct Enricher {
    age: AgeLookup,
    gender: GenderLookup,
    nationality: NationalityLookup,
}

impl Enricher {
    pub fn new(age: AgeLookup, gender: GenderLookup, nationality: NationalityLookup) -> Self {
        Self {
            age,
            gender,
            nationality,
        }
    }

    /// HTTP-backed enricher; all three adapters share `client`.
    pub fn with_client(client: reqwest::Client, urls: &ProviderUrls) -> Self {
        Self::new(
            Arc::new(AgeApiClient::new(client.clone(), urls.age.clone())),
            Arc::new(GenderApiClient::new(client.clone(), urls.gender.clone())),
            Arc::new(NationalityApiClient::new(client, urls.nationality.clone())),
        )
    }

    pub fn from_config(urls: &ProviderUrls) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create provider HTTP client: {}", e))
            })?;

        Ok(Self::with_client(client, urls))
    }

    /// Enriches `name`, returning either a complete person or the first error observed.
    ///
    /// The deadline comes entirely from `scope`; the coordinator adds none of its own.
    pub async fn enrich(
        &self,
        scope: &Scope,
        name: &str,
    ) -> Result<EnrichedPerson, EnrichmentError> {
        let enrichment_id = Uuid::new_v4();
        let span = tracing::info_span!("enrich", %enrichment_id, subject = name);

        async {
            let result = self.fan_out(scope, name).await;
            match &result {
                Ok(person) => tracing::info!(
                    age = person.age,
                    gender = %person.gender,
                    nationality = %person.nationality,
                    "Enrichment succeeded"
                ),
                Err(e) => tracing::warn!(kind = ?e.kind(), error = %e, "Enrichment failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn fan_out(&self, scope: &Scope, name: &str) -> Result<EnrichedPerson, EnrichmentError> {
        let lookup_scope = scope.child();
        let mut lookups = JoinSet::new();

        spawn_lookup(&mut lookups, &self.age, &lookup_scope, name, LookupOutcome::Age);
        spawn_lookup(&mut lookups, &self.gender, &lookup_scope, name, LookupOutcome::Gender);
        spawn_lookup(
            &mut lookups,
            &self.nationality,
            &lookup_scope,
            name,
            LookupOutcome::Nationality,
        );

        let mut age = None;
        let mut gender = None;
        let mut nationality = None;

        let result = loop {
            tokio::select! {
                biased;
                reason = scope.done() => break Err(EnrichmentError::Cancelled(reason)),
                joined = lookups.join_next() => match joined {
                    None => break assemble(age.take(), gender.take(), nationality.take()),
                    Some(Ok(Ok(LookupOutcome::Age(a)))) => age = Some(a),
                    Some(Ok(Ok(LookupOutcome::Gender(g)))) => gender = Some(g),
                    Some(Ok(Ok(LookupOutcome::Nationality(n)))) => nationality = Some(n),
                    Some(Ok(Err(e))) => break Err(e),
                    Some(Err(e)) => {
                        break Err(EnrichmentError::Internal(format!("lookup task failed: {}", e)))
                    }
                },
            }
        };

        lookup_scope.cancel();
        if !lookups.is_empty() {
            tracing::debug!(pending = lookups.len(), "Detaching unfinished lookups");
        }
        lookups.detach_all();

        result
    }
}

fn spawn_lookup<L, F>(
    lookups: &mut JoinSet<Result<LookupOutcome, EnrichmentError>>,
    lookup: &Arc<L>,
    scope: &Scope,
    name: &str,
    wrap: F,
) where
    L: Lookup + ?Sized,
    F: FnOnce(L::Output) -> LookupOutcome + Send + 'static,
{
    let lookup = Arc::clone(lookup);
    let scope = scope.clone();
    let name = name.to_owned();

    lookups.spawn(
        async move {
            let provider = lookup.provider();
            let result = lookup.lookup(&scope, &name).await;
            if let Err(e) = &result {
                tracing::debug!(%provider, error = %e, "Lookup failed");
            }
            result.map(wrap)
        }
        .in_current_span(),
    );
}

fn assemble(
    age: Option<AgeResult>,
    gender: Option<GenderResult>,
    nationality: Option<NationalityResult>,
) -> Result<EnrichedPerson, EnrichmentError> {
    let (Some(age), Some(gender), Some(nationality)) = (age, gender, nationality) else {
        return Err(EnrichmentError::Internal(
            "lookups finished without a result".to_string(),
        ));
    };

    let top = nationality.top().ok_or(EnrichmentError::NoNationality)?;

    Ok(EnrichedPerson {
        age: age.age,
        gender: gender.gender,
        nationality: top.country_id.clone(),
    })
}
