//! 핸들러용 커스텀 추출기.

use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{api_error, ApiError};

/// JSON 본문을 역직렬화하고 `validator` 규칙으로 검증하는 추출기.
///
/// - JSON 형식 오류 → 400 `BAD_FORMAT`
/// - 검증 실패 → 422 `VALIDATION_ERROR`
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, "BAD_FORMAT", e.body_text()))?;

        value.validate().map_err(|errors| {
            api_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                validation_message(&errors),
            )
        })?;

        Ok(ValidatedJson(value))
    }
}

/// 공백만 있는 문자열을 거부합니다.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank")
            .with_message("공백만으로 된 값은 사용할 수 없습니다".into()));
    }
    Ok(())
}

/// 키 누락과 `null`을 구분합니다. 누락 → `None`, `null` → `Some(None)`.
///
/// `#[serde(default)]`와 함께 써야 누락된 키가 `None`이 됩니다.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// 필드 에러 메시지를 하나의 문자열로 합칩니다.
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: 유효하지 않은 값", field))
            })
        })
        .collect();
    messages.sort();
    messages.join(", ")
}
