use axum::{
    Form, Json,
    extract::{FromRequest, FromRequestParts, Path, Query, Request, rejection::JsonRejection},
    http::{StatusCode, header::CONTENT_TYPE, request::Parts},
};
use serde::de::DeserializeOwned;

use crate::error::StoreError;

/// Max accepted body on public form endpoints.
pub const FORM_BODY_LIMIT: usize = 64 * 1024;

/// `Json<T>` whose rejections use the API error envelope.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = StoreError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(v)) => Ok(ApiJson(v)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> StoreError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return StoreError::PayloadTooLarge;
    }
    StoreError::BadRequest(rejection.body_text())
}

/// Accepts either a JSON body or an urlencoded form, picked by `Content-Type`.
/// Payment gateways post callbacks as forms; the browser checkout posts JSON.
pub struct JsonOrForm<T>(pub T);

impl<S, T> FromRequest<S> for JsonOrForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = StoreError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(v) = Form::<T>::from_request(req, state).await.map_err(|rejection| {
                if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    StoreError::PayloadTooLarge
                } else {
                    StoreError::BadRequest(rejection.body_text())
                }
            })?;
            return Ok(JsonOrForm(v));
        }
        let ApiJson(v) = ApiJson::<T>::from_request(req, state).await?;
        Ok(JsonOrForm(v))
    }
}

/// `Query<T>` whose rejections use the API error envelope.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = StoreError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(v) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| StoreError::BadRequest(rejection.body_text()))?;
        Ok(ApiQuery(v))
    }
}

/// `Path<T>` whose rejections use the API error envelope.
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = StoreError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(v) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| StoreError::BadRequest(rejection.body_text()))?;
        Ok(ApiPath(v))
    }
}
