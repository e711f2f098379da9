use crate::error::AppError;
use axum::{
    Json, async_trait,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;

/// `Json<T>` whose rejections surface as [`AppError::BadRequest`] instead of
/// axum's plain-text 400/415/422 responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::INVALID_BODY_MESSAGE;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{StatusCode, header},
        routing::post,
    };
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Deserialize)]
    struct Payload {
        name: String,
    }

    fn app() -> Router {
        Router::new().route(
            "/",
            post(|JsonBody(payload): JsonBody<Payload>| async move { payload.name }),
        )
    }

    fn request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn well_formed_body_is_extracted() {
        let response = app().oneshot(request(r#"{"name":"focus"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_field_and_malformed_body_are_bad_requests() {
        for body in [r#"{"other":1}"#, "not json"] {
            let response = app().oneshot(request(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);

            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(json["error"], INVALID_BODY_MESSAGE);
        }
    }
}
