//! Validation utilities for Web API DTOs.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::auth::validation::{validate_display_name, validate_username};
use crate::web::error::ApiError;

/// A JSON extractor that validates the request body.
///
/// Malformed JSON is rejected with 400, and a body that parses but fails
/// validation is rejected with 422 and per-field details.
///
/// # Example
///
/// ```ignore
/// use kinship::web::dto::ValidatedJson;
///
/// async fn register(
///     ValidatedJson(payload): ValidatedJson<RegisterRequest>,
/// ) -> Result<Json<AuthResponse>, ApiError> {
///     // payload is already validated
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e)))?;

        value.validate().map_err(ApiError::from_validation_errors)?;

        Ok(ValidatedJson(value))
    }
}

fn to_field_error(err: crate::auth::ValidationError) -> validator::ValidationError {
    validator::ValidationError::new(err.code()).with_message(err.to_string().into())
}

/// Username rules as a `validator` custom function.
pub fn username_field(value: &str) -> Result<(), validator::ValidationError> {
    validate_username(value).map_err(to_field_error)
}

/// Display name rules as a `validator` custom function.
pub fn display_name_field(value: &str) -> Result<(), validator::ValidationError> {
    validate_display_name(value).map_err(to_field_error)
}
