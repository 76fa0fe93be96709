/// Request extractors
///
/// [`ValidatedJson`] deserializes a JSON body and runs its `validator` rules,
/// so malformed bodies and failed rules both surface as `400` in the common
/// error shape instead of axum's plain-text `422`.
///
/// [`FormOrJson`] accepts either `application/x-www-form-urlencoded` or
/// JSON, for callers such as SMS providers that post forms.

use crate::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

pub struct FormOrJson<T>(pub T);

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

#[async_trait]
impl<T, S> FromRequest<S> for FormOrJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(&req) {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
            return Ok(FormOrJson(value));
        }

        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(FormOrJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, response::IntoResponse, routing::post, Router};
    use serde::Deserialize;
    use tower::Service as _;

    #[derive(Debug, Deserialize, Validate)]
    struct Payload {
        #[validate(email(message = "Invalid email format"))]
        email: String,
    }

    async fn handler(ValidatedJson(payload): ValidatedJson<Payload>) -> impl IntoResponse {
        payload.email
    }

    async fn post_json(body: &'static str) -> StatusCode {
        let mut app = Router::new().route("/", post(handler));
        app.call(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn test_valid_body_passes() {
        assert_eq!(post_json(r#"{"email":"kim@example.com"}"#).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rule_failure_is_400() {
        assert_eq!(post_json(r#"{"email":"not-an-email"}"#).await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        assert_eq!(post_json(r#"{"mail":1}"#).await, StatusCode::BAD_REQUEST);
        assert_eq!(post_json("{").await, StatusCode::BAD_REQUEST);
    }

    #[derive(Debug, Deserialize)]
    struct Reply {
        #[serde(alias = "From")]
        from: String,
    }

    async fn reply_handler(FormOrJson(reply): FormOrJson<Reply>) -> impl IntoResponse {
        reply.from
    }

    async fn post_reply(content_type: &'static str, body: &'static str) -> (StatusCode, String) {
        let mut app = Router::new().route("/", post(reply_handler));
        let response = app
            .call(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("content-type", content_type)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn test_form_and_json_both_accepted() {
        let (status, from) =
            post_reply("application/x-www-form-urlencoded", "From=%2B447700900123&Body=yes").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(from, "+447700900123");

        let (status, from) = post_reply("application/json", r#"{"from":"07700900123"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(from, "07700900123");
    }

    #[tokio::test]
    async fn test_bad_form_or_json_is_400_envelope() {
        let (status, body) = post_reply("application/x-www-form-urlencoded", "Body=yes").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("bad_request"));

        let (status, body) = post_reply("application/json", "{").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("bad_request"));

        let (status, _) = post_reply("text/plain", "From=x").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
