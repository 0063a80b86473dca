use crate::enrichment::{EnrichedPerson, Enricher};
use crate::errors::{AppError, EnrichmentError};
use crate::models::{NewPerson, NewPersonRecord, Person, PersonFilter};
use crate::providers::Provider;
use crate::repository::PersonRepository;
use crate::scope::Scope;
use crate::validator;
use std::sync::Arc;
use std::time::Duration;

/// Person use cases: validation, enrichment on create, and persistence.
///
/// All collaborators are passed once at construction and never change afterwards.
#[derive(Clone)]
pub struct PersonService {
    repository: Arc<dyn PersonRepository>,
    enricher: Enricher,
    enrich_timeout: Duration,
}

impl PersonService {
    pub fn new(
        repository: Arc<dyn PersonRepository>,
        enricher: Enricher,
        enrich_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            enricher,
            enrich_timeout,
        }
    }

    /// Validates, enriches and stores a new person, returning its id.
    ///
    /// Nothing is written when enrichment fails. Dropping the returned future cancels the
    /// in-flight provider lookups.
    pub async fn add_person(&self, data: NewPerson) -> Result<i64, AppError> {
        let operation = "service.add_person";
        validator::validate_new_person(&data)?;

        let scope = Scope::with_timeout(self.enrich_timeout);
        // Cancels lookups if this future is dropped (e.g. the client hung up).
        let _guard = ScopeGuard(scope.clone());

        let enriched = self.enricher.enrich(&scope, &data.name).await?;
        let age = storable_age(&enriched)?;

        let record = NewPersonRecord {
            name: data.name,
            surname: data.surname,
            patronymic: data.patronymic.filter(|p| !p.is_empty()),
            age,
            gender: enriched.gender,
            nationality: enriched.nationality,
        };

        match self.repository.add_person(&record).await {
            Ok(id) => {
                tracing::debug!(operation, id, "Person was successfully added");
                Ok(id)
            }
            Err(e) => {
                tracing::debug!(operation, error = %e, "Failed to add person");
                Err(e)
            }
        }
    }

    pub async fn get_person(&self, id: i64) -> Result<Person, AppError> {
        let operation = "service.get_person";
        validator::validate_id(id)?;

        let person = self.repository.get_person(id).await?;
        tracing::debug!(operation, id, "Person was successfully fetched");
        Ok(person)
    }

    pub async fn get_persons(&self, filter: PersonFilter) -> Result<Vec<Person>, AppError> {
        let operation = "service.get_persons";
        let filter = filter.normalized();
        validator::validate_filter(&filter)?;

        let persons = self.repository.get_persons(&filter).await.map_err(|e| {
            tracing::debug!(operation, error = %e, "Failed to list persons");
            e
        })?;
        tracing::debug!(operation, count = persons.len(), "Persons were successfully listed");
        Ok(persons)
    }

    pub async fn update_person(&self, person: Person) -> Result<(), AppError> {
        let operation = "service.update_person";
        validator::validate_update(&person)?;

        match self.repository.update_person(&person).await {
            Ok(()) => {
                tracing::debug!(operation, id = person.id, "Person was successfully updated");
                Ok(())
            }
            Err(e) => {
                tracing::debug!(operation, id = person.id, error = %e, "Failed to update person");
                Err(e)
            }
        }
    }

    pub async fn delete_person(&self, id: i64) -> Result<(), AppError> {
        let operation = "service.delete_person";
        validator::validate_id(id)?;

        match self.repository.delete_person(id).await {
            Ok(()) => {
                tracing::debug!(operation, id, "Person was successfully deleted");
                Ok(())
            }
            Err(e) => {
                tracing::debug!(operation, id, error = %e, "Failed to delete person");
                Err(e)
            }
        }
    }
}

/// Age as stored, once every enriched value is known to fit the person table.
fn storable_age(enriched: &EnrichedPerson) -> Result<i32, EnrichmentError> {
    let invalid = |provider, value: &str| EnrichmentError::ProviderInvalidValue {
        provider,
        value: value.to_string(),
    };

    if !validator::is_nationality_code(&enriched.nationality) {
        return Err(invalid(Provider::Nationality, enriched.nationality.as_str()));
    }
    if !validator::is_gender(&enriched.gender) {
        return Err(invalid(Provider::Gender, enriched.gender.as_str()));
    }
    i32::try_from(enriched.age)
        .map_err(|_| invalid(Provider::Age, enriched.age.to_string().as_str()))
}

/// Cancels the wrapped scope when dropped.
struct ScopeGuard(Scope);

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
