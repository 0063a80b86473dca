use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============ Database Models ============

/// A stored person with the attributes inferred at creation time.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub surname: String,
    pub patronymic: Option<String>,
    pub age: i32,
    pub gender: String,
    /// Two-letter country code.
    pub nationality: String,
}

/// Row to insert: the submitted name plus the enrichment result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPersonRecord {
    pub name: String,
    pub surname: String,
    pub patronymic: Option<String>,
    pub age: i32,
    pub gender: String,
    pub nationality: String,
}

// ============ Request Models ============

/// Body of `POST /persons`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPerson {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub patronymic: Option<String>,
}

/// Query of `GET /persons`. Absent fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonFilter {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub patronymic: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PersonFilter {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 100;

    /// Drops empty strings so `?name=` behaves like an absent parameter.
    pub fn normalized(mut self) -> Self {
        fn clean(field: &mut Option<String>) {
            if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *field = None;
            }
        }
        clean(&mut self.name);
        clean(&mut self.surname);
        clean(&mut self.patronymic);
        clean(&mut self.gender);
        clean(&mut self.nationality);
        self
    }

    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0)
    }

    /// Whether `person` satisfies every present predicate. Mirrors the SQL built by the repository.
    pub fn matches(&self, person: &Person) -> bool {
        self.name.as_deref().map_or(true, |v| person.name == v)
            && self.surname.as_deref().map_or(true, |v| person.surname == v)
            && self
                .patronymic
                .as_deref()
                .map_or(true, |v| person.patronymic.as_deref() == Some(v))
            && self.age.map_or(true, |v| person.age == v)
            && self.gender.as_deref().map_or(true, |v| person.gender == v)
            && self
                .nationality
                .as_deref()
                .map_or(true, |v| person.nationality == v)
    }
}

/// Body of `DELETE /person`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonIdRequest {
    pub id: i64,
}

// ============ Response Models ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdResponse {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}
