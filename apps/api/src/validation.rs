//! Field checks shared by the request handlers. Every failure is an
//! `AppError::Validation` naming the offending field.

use std::str::FromStr;

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::{header, HeaderMap},
};
use bytes::Bytes;
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};

use crate::errors::AppError;

/// Trims `value` and rejects it when blank or longer than `max_chars`.
pub fn required(field: &str, value: &str, max_chars: usize) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    max_len(field, trimmed, max_chars)?;
    Ok(trimmed.to_string())
}

/// Like `required`, but `None` passes through untouched.
pub fn optional(
    field: &str,
    value: Option<&str>,
    max_chars: usize,
) -> Result<Option<String>, AppError> {
    value.map(|v| required(field, v, max_chars)).transpose()
}

pub fn max_len(field: &str, value: &str, max_chars: usize) -> Result<(), AppError> {
    if value.chars().count() > max_chars {
        return Err(AppError::Validation(format!(
            "{field} must be at most {max_chars} characters"
        )));
    }
    Ok(())
}

/// Accepts `local@domain.tld` shaped addresses without whitespace.
pub fn email(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim().to_lowercase();
    let invalid = || AppError::Validation(format!("{field} is not a valid e-mail address"));

    if value.chars().any(char::is_whitespace) || value.len() > 254 {
        return Err(invalid());
    }
    let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let (host, tld) = domain.rsplit_once('.').ok_or_else(invalid)?;
    if host.is_empty() || tld.len() < 2 {
        return Err(invalid());
    }
    Ok(value)
}

pub fn password(field: &str, value: &str) -> Result<(), AppError> {
    if value.chars().count() < 8 {
        return Err(AppError::Validation(format!(
            "{field} must be at least 8 characters"
        )));
    }
    max_len(field, value, 128)
}

/// Parses a TEXT-column enum, listing allowed values on failure.
pub fn parse_enum<T>(field: &str, value: &str) -> Result<T, AppError>
where
    T: FromStr<Err = String>,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| AppError::Validation(format!("{field}: {e}")))
}

pub fn date_range(start: NaiveDate, end: Option<NaiveDate>) -> Result<(), AppError> {
    match end {
        Some(end) if end < start => Err(AppError::Validation(
            "due_date cannot be before start_date".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Lets PATCH bodies tell "absent" (`None`) from explicit `null` (`Some(None)`).
/// Use with `#[serde(default, deserialize_with = "validation::double_option")]`.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// JSON body that may be left out entirely. An empty body yields `None`;
/// anything else must be well-formed JSON of type `T` or the request is a 400.
#[derive(Debug)]
pub struct OptionalJson<T>(pub Option<T>);

impl<T: Default> OptionalJson<T> {
    pub fn or_default(self) -> T {
        self.0.unwrap_or_default()
    }
}

#[async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, AppError> {
        let is_json = has_json_content_type(req.headers());
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        parse_optional_body(is_json, &bytes).map(OptionalJson)
    }
}

fn has_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with("application/json"))
        .unwrap_or(false)
}

fn parse_optional_body<T: DeserializeOwned>(
    is_json: bool,
    bytes: &[u8],
) -> Result<Option<T>, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    if !is_json {
        return Err(AppError::Validation(
            "Expected request with `Content-Type: application/json`".to_string(),
        ));
    }
    serde_json::from_slice(bytes)
        .map(Some)
        .map_err(|e| AppError::Validation(format!("Invalid JSON body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;

    #[test]
    fn test_required_trims_and_rejects_blank() {
        assert_eq!(required("name", "  Ada ", 10).unwrap(), "Ada");
        assert!(matches!(
            required("name", "   ", 10),
            Err(AppError::Validation(msg)) if msg.contains("name")
        ));
    }

    #[test]
    fn test_required_enforces_length() {
        assert!(required("title", "abcdef", 5).is_err());
        assert!(required("title", "abcde", 5).is_ok());
    }

    #[test]
    fn test_optional_passes_none() {
        assert_eq!(optional("phone", None, 5).unwrap(), None);
        assert!(optional("phone", Some(" "), 5).is_err());
    }

    #[test]
    fn test_email_shapes() {
        assert_eq!(email("email", " Ada@Example.org ").unwrap(), "ada@example.org");
        for bad in ["ada", "@example.org", "ada@org", "ada@.org", "a b@c.de", "a@b@c.de", "ada@example.c"] {
            assert!(email("email", bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_password_length() {
        assert!(password("password", "short").is_err());
        assert!(password("password", "long enough").is_ok());
    }

    #[test]
    fn test_parse_enum() {
        let role: Role = parse_enum("role", " pm ").unwrap();
        assert_eq!(role, Role::Pm);
        let err = parse_enum::<Role>("role", "ceo").unwrap_err();
        assert!(err.to_string().contains("role"));
    }

    #[test]
    fn test_date_range() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert!(date_range(start, None).is_ok());
        assert!(date_range(start, Some(start)).is_ok());
        assert!(date_range(start, NaiveDate::from_ymd_opt(2024, 1, 9)).is_err());
    }

    #[derive(Debug, serde::Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        phone: Option<Option<String>>,
    }

    #[test]
    fn test_double_option_distinguishes_null_from_absent() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.phone, None);
        let null: Patch = serde_json::from_str(r#"{"phone": null}"#).unwrap();
        assert_eq!(null.phone, Some(None));
        let set: Patch = serde_json::from_str(r#"{"phone": "123"}"#).unwrap();
        assert_eq!(set.phone, Some(Some("123".to_string())));
    }

    #[derive(Debug, Default, serde::Deserialize)]
    struct Body {
        day: Option<NaiveDate>,
    }

    #[test]
    fn test_optional_body_empty_is_none() {
        assert!(parse_optional_body::<Body>(false, b"").unwrap().is_none());
        assert!(parse_optional_body::<Body>(true, b"  \n").unwrap().is_none());
    }

    #[test]
    fn test_optional_body_rejects_bad_json() {
        assert!(matches!(
            parse_optional_body::<Body>(true, br#"{"day":"2024-13-45"}"#),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            parse_optional_body::<Body>(true, b"{not json"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            parse_optional_body::<Body>(false, br#"{"day":"2024-01-02"}"#),
            Err(AppError::Validation(_))
        ));
        let parsed = parse_optional_body::<Body>(true, br#"{"day":"2024-01-02"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(parsed.day, NaiveDate::from_ymd_opt(2024, 1, 2));
    }
}
