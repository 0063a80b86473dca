//! Input validation for the person endpoints.
//!
//! Names are a capital letter followed by lowercase letters, nationality is a two-letter upper-case
//! code and gender is `male` or `female`.

use crate::errors::ValidationError;
use crate::models::{NewPerson, Person, PersonFilter};
use regex::Regex;
use std::sync::LazyLock;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][a-z]+$").expect("name pattern is valid"));
static NATIONALITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}$").expect("nationality pattern is valid"));

const GENDERS: [&str; 2] = ["female", "male"];

pub fn validate_id(id: i64) -> Result<(), ValidationError> {
    if id <= 0 {
        return Err(ValidationError::new("id", "invalid id"));
    }
    Ok(())
}

pub fn validate_new_person(data: &NewPerson) -> Result<(), ValidationError> {
    required_name("name", &data.name)?;
    required_name("surname", &data.surname)?;
    optional_name("patronymic", data.patronymic.as_deref())?;
    Ok(())
}

pub fn validate_filter(filter: &PersonFilter) -> Result<(), ValidationError> {
    optional_name("name", filter.name.as_deref())?;
    optional_name("surname", filter.surname.as_deref())?;
    optional_name("patronymic", filter.patronymic.as_deref())?;
    if let Some(nationality) = filter.nationality.as_deref() {
        nationality_code(nationality)?;
    }
    if let Some(g) = filter.gender.as_deref() {
        gender(g)?;
    }
    if let Some(age) = filter.age {
        non_negative_age(age)?;
    }
    if let Some(limit) = filter.limit {
        if !(1..=PersonFilter::MAX_LIMIT).contains(&limit) {
            return Err(ValidationError::new("limit", ValidationError::VALUE));
        }
    }
    if filter.offset.is_some_and(|offset| offset < 0) {
        return Err(ValidationError::new("offset", ValidationError::VALUE));
    }
    Ok(())
}

pub fn validate_update(data: &Person) -> Result<(), ValidationError> {
    validate_id(data.id)?;
    required_name("name", &data.name)?;
    required_name("surname", &data.surname)?;
    optional_name("patronymic", data.patronymic.as_deref())?;
    if data.nationality.is_empty() {
        return Err(ValidationError::new("nationality", ValidationError::BLANK));
    }
    nationality_code(&data.nationality)?;
    non_negative_age(data.age)?;
    if data.gender.is_empty() {
        return Err(ValidationError::new("gender", ValidationError::BLANK));
    }
    gender(&data.gender)?;
    Ok(())
}

fn required_name(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new(field, ValidationError::BLANK));
    }
    optional_name(field, Some(value))
}

fn optional_name(field: &'static str, value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        // An empty patronymic is the same as none.
        None | Some("") => Ok(()),
        Some(v) if NAME_RE.is_match(v) => Ok(()),
        Some(_) => Err(ValidationError::new(field, ValidationError::FORMAT)),
    }
}

/// Two upper-case ASCII letters.
pub fn is_nationality_code(value: &str) -> bool {
    NATIONALITY_RE.is_match(value)
}

pub fn is_gender(value: &str) -> bool {
    GENDERS.contains(&value)
}

fn nationality_code(value: &str) -> Result<(), ValidationError> {
    if is_nationality_code(value) {
        Ok(())
    } else {
        Err(ValidationError::new("nationality", ValidationError::FORMAT))
    }
}

fn gender(value: &str) -> Result<(), ValidationError> {
    if is_gender(value) {
        Ok(())
    } else {
        Err(ValidationError::new("gender", ValidationError::VALUE))
    }
}

fn non_negative_age(age: i32) -> Result<(), ValidationError> {
    if age < 0 {
        return Err(ValidationError::new("age", ValidationError::VALUE));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_person(name: &str, surname: &str, patronymic: Option<&str>) -> NewPerson {
        NewPerson {
            name: name.to_string(),
            surname: surname.to_string(),
            patronymic: patronymic.map(str::to_string),
        }
    }

    fn stored() -> Person {
        Person {
            id: 7,
            name: "Oleg".to_string(),
            surname: "Dementiev".to_string(),
            patronymic: None,
            age: 60,
            gender: "male".to_string(),
            nationality: "RU".to_string(),
        }
    }

    #[test]
    fn test_id_must_be_positive() {
        assert!(validate_id(1).is_ok());
        assert_eq!(validate_id(0).unwrap_err().field, "id");
        assert!(validate_id(-5).is_err());
    }

    #[test]
    fn test_new_person_cases() {
        struct Case {
            input: NewPerson,
            err: Option<ValidationError>,
        }

        let cases = vec![
            Case {
                input: new_person("Oleg", "Dementiev", None),
                err: None,
            },
            Case {
                input: new_person("Oleg", "Dementiev", Some("Ivanovich")),
                err: None,
            },
            Case {
                input: new_person("Oleg", "Dementiev", Some("")),
                err: None,
            },
            Case {
                input: new_person("", "Dementiev", None),
                err: Some(ValidationError::new("name", ValidationError::BLANK)),
            },
            Case {
                input: new_person("oleg", "Dementiev", None),
                err: Some(ValidationError::new("name", ValidationError::FORMAT)),
            },
            Case {
                input: new_person("Oleg", "", None),
                err: Some(ValidationError::new("surname", ValidationError::BLANK)),
            },
            Case {
                input: new_person("Oleg", "Dementiev", Some("ivanovich")),
                err: Some(ValidationError::new("patronymic", ValidationError::FORMAT)),
            },
            Case {
                input: new_person("Oleg1", "Dementiev", None),
                err: Some(ValidationError::new("name", ValidationError::FORMAT)),
            },
        ];

        for case in cases {
            assert_eq!(
                validate_new_person(&case.input).err(),
                case.err,
                "input: {:?}",
                case.input
            );
        }
    }

    #[test]
    fn test_filter_checks_present_fields_only() {
        assert!(validate_filter(&PersonFilter::default()).is_ok());

        let filter = PersonFilter {
            gender: Some("other".to_string()),
            ..Default::default()
        };
        assert_eq!(validate_filter(&filter).unwrap_err().field, "gender");

        let filter = PersonFilter {
            nationality: Some("ru".to_string()),
            ..Default::default()
        };
        assert_eq!(validate_filter(&filter).unwrap_err().field, "nationality");

        let filter = PersonFilter {
            age: Some(-1),
            ..Default::default()
        };
        assert_eq!(validate_filter(&filter).unwrap_err().field, "age");

        let filter = PersonFilter {
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!(validate_filter(&filter).unwrap_err().field, "limit");
    }

    #[test]
    fn test_update_requires_complete_person() {
        assert!(validate_update(&stored()).is_ok());

        let mut p = stored();
        p.nationality = String::new();
        assert_eq!(
            validate_update(&p).unwrap_err(),
            ValidationError::new("nationality", ValidationError::BLANK)
        );

        let mut p = stored();
        p.gender = "unknown".to_string();
        assert_eq!(
            validate_update(&p).unwrap_err(),
            ValidationError::new("gender", ValidationError::VALUE)
        );

        let mut p = stored();
        p.id = 0;
        assert_eq!(validate_update(&p).unwrap_err().field, "id");
    }
}
