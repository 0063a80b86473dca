use crate::errors::{AppError, ResultExt};
use crate::models::{NewPersonRecord, Person, PersonFilter};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Persistence of enriched persons.
#[async_trait]
pub trait PersonRepository: Send + Sync + 'static {
    async fn add_person(&self, person: &NewPersonRecord) -> Result<i64, AppError>;

    /// `AppError::NotFound` when no row has this id.
    async fn get_person(&self, id: i64) -> Result<Person, AppError>;

    async fn get_persons(&self, filter: &PersonFilter) -> Result<Vec<Person>, AppError>;

    /// `AppError::NotFound` when no row has `person.id`.
    async fn update_person(&self, person: &Person) -> Result<(), AppError>;

    /// `AppError::NotFound` when no row has this id.
    async fn delete_person(&self, id: i64) -> Result<(), AppError>;
}

const PERSON_COLUMNS: &str = "id, name, surname, patronymic, age, gender, nationality";

/// Postgres-backed repository over the `person` table.
#[derive(Clone)]
pub struct PgPersonRepository {
    pool: PgPool,
}

impl PgPersonRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersonRepository for PgPersonRepository {
    async fn add_person(&self, person: &NewPersonRecord) -> Result<i64, AppError> {
        let mut tx = self.pool.begin().await.context("begin add_person")?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO person (name, surname, patronymic, age, gender, nationality)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&person.name)
        .bind(&person.surname)
        .bind(&person.patronymic)
        .bind(person.age)
        .bind(&person.gender)
        .bind(&person.nationality)
        .fetch_one(&mut *tx)
        .await
        .context("insert person")?;

        tx.commit().await.context("commit add_person")?;

        tracing::debug!("Inserted person {}", id);
        Ok(id)
    }

    async fn get_person(&self, id: i64) -> Result<Person, AppError> {
        let query = format!("SELECT {} FROM person WHERE id = $1", PERSON_COLUMNS);
        sqlx::query_as::<_, Person>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Person with id {} not found", id)))
    }

    async fn get_persons(&self, filter: &PersonFilter) -> Result<Vec<Person>, AppError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM person WHERE TRUE", PERSON_COLUMNS));

        if let Some(name) = &filter.name {
            query.push(" AND name = ").push_bind(name);
        }
        if let Some(surname) = &filter.surname {
            query.push(" AND surname = ").push_bind(surname);
        }
        if let Some(patronymic) = &filter.patronymic {
            query.push(" AND patronymic = ").push_bind(patronymic);
        }
        if let Some(age) = filter.age {
            query.push(" AND age = ").push_bind(age);
        }
        if let Some(gender) = &filter.gender {
            query.push(" AND gender = ").push_bind(gender);
        }
        if let Some(nationality) = &filter.nationality {
            query.push(" AND nationality = ").push_bind(nationality);
        }

        query
            .push(" ORDER BY id LIMIT ")
            .push_bind(filter.effective_limit())
            .push(" OFFSET ")
            .push_bind(filter.effective_offset());

        let persons = query
            .build_query_as::<Person>()
            .fetch_all(&self.pool)
            .await
            .context("list persons")?;

        Ok(persons)
    }

    async fn update_person(&self, person: &Person) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.context("begin update_person")?;

        let result = sqlx::query(
            r#"
            UPDATE person
            SET name = $1, surname = $2, patronymic = $3, age = $4, gender = $5, nationality = $6
            WHERE id = $7
            "#,
        )
        .bind(&person.name)
        .bind(&person.surname)
        .bind(&person.patronymic)
        .bind(person.age)
        .bind(&person.gender)
        .bind(&person.nationality)
        .bind(person.id)
        .execute(&mut *tx)
        .await
        .context("update person")?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Person with id {} not found",
                person.id
            )));
        }

        tx.commit().await.context("commit update_person")?;
        Ok(())
    }

    async fn delete_person(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM person WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete person")?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Person with id {} not found", id)));
        }
        Ok(())
    }
}

/// In-process repository for local runs and tests. Ids start at 1 and are never reused.
#[derive(Default)]
pub struct InMemoryPersonRepository {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    rows: BTreeMap<i64, Person>,
}

impl InMemoryPersonRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PersonRepository for InMemoryPersonRepository {
    async fn add_person(&self, person: &NewPersonRecord) -> Result<i64, AppError> {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let id = state.next_id;
        state.rows.insert(
            id,
            Person {
                id,
                name: person.name.clone(),
                surname: person.surname.clone(),
                patronymic: person.patronymic.clone(),
                age: person.age,
                gender: person.gender.clone(),
                nationality: person.nationality.clone(),
            },
        );
        Ok(id)
    }

    async fn get_person(&self, id: i64) -> Result<Person, AppError> {
        self.state
            .read()
            .await
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Person with id {} not found", id)))
    }

    async fn get_persons(&self, filter: &PersonFilter) -> Result<Vec<Person>, AppError> {
        let state = self.state.read().await;
        let offset = usize::try_from(filter.effective_offset()).unwrap_or(0);
        let limit = usize::try_from(filter.effective_limit()).unwrap_or(0);

        Ok(state
            .rows
            .values()
            .filter(|p| filter.matches(p))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn update_person(&self, person: &Person) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        match state.rows.get_mut(&person.id) {
            Some(row) => {
                *row = person.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!(
                "Person with id {} not found",
                person.id
            ))),
        }
    }

    async fn delete_person(&self, id: i64) -> Result<(), AppError> {
        self.state
            .write()
            .await
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Person with id {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, nationality: &str) -> NewPersonRecord {
        NewPersonRecord {
            name: name.to_string(),
            surname: "Ivanov".to_string(),
            patronymic: None,
            age: 30,
            gender: "male".to_string(),
            nationality: nationality.to_string(),
        }
    }

    #[tokio::test]
    async fn test_memory_repository_crud() {
        let repo = InMemoryPersonRepository::new();

        let id = repo.add_person(&record("Aleks", "RU")).await.unwrap();
        assert_eq!(id, 1);

        let mut person = repo.get_person(id).await.unwrap();
        assert_eq!(person.name, "Aleks");

        person.age = 31;
        repo.update_person(&person).await.unwrap();
        assert_eq!(repo.get_person(id).await.unwrap().age, 31);

        repo.delete_person(id).await.unwrap();
        assert!(matches!(
            repo.get_person(id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_repository_missing_rows_are_not_found() {
        let repo = InMemoryPersonRepository::new();
        assert!(matches!(
            repo.delete_person(9).await,
            Err(AppError::NotFound(_))
        ));

        let ghost = Person {
            id: 9,
            name: "Ghost".to_string(),
            surname: "Ivanov".to_string(),
            patronymic: None,
            age: 1,
            gender: "male".to_string(),
            nationality: "RU".to_string(),
        };
        assert!(matches!(
            repo.update_person(&ghost).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_repository_filters_and_pages() {
        let repo = InMemoryPersonRepository::new();
        for (name, nat) in [("Anna", "RU"), ("Boris", "UA"), ("Vera", "RU"), ("Gleb", "RU")] {
            repo.add_person(&record(name, nat)).await.unwrap();
        }

        let filter = PersonFilter {
            nationality: Some("RU".to_string()),
            limit: Some(2),
            offset: Some(1),
            ..Default::default()
        };
        let names: Vec<_> = repo
            .get_persons(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();

        assert_eq!(names, vec!["Vera", "Gleb"]);
    }
}
