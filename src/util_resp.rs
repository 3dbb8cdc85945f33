use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::PrivateCookieJar;
use hypertext::{Rendered, prelude::*};

use crate::{error::BackendError, template::Page, widgets::alert::ErrorAlert};

pub fn see_other_ok(r: Redirect) -> StandardResponse {
    Ok(SuccessResponse::SeeOther(Box::new(r)))
}

pub fn err_not_found() -> StandardResponse {
    Err(FailureResponse::NotFound(()))
}

pub fn success(html: Rendered<String>) -> StandardResponse {
    Ok(SuccessResponse::Success(html))
}

pub type StandardResponse = Result<SuccessResponse, FailureResponse>;

pub enum SuccessResponse {
    Success(Rendered<String>),
    SeeOther(Box<Redirect>),
}

#[derive(Debug)]
pub enum FailureResponse {
    BadRequest(Rendered<String>),
    NotFound(()),
    Conflict(Rendered<String>),
    Unavailable(Rendered<String>),
    ServerError(()),
}

impl IntoResponse for SuccessResponse {
    fn into_response(self) -> Response {
        match self {
            SuccessResponse::Success(html) => {
                Html(html.into_inner()).into_response()
            }
            SuccessResponse::SeeOther(redirect) => redirect.into_response(),
        }
    }
}

impl IntoResponse for FailureResponse {
    fn into_response(self) -> Response {
        match self {
            FailureResponse::BadRequest(html) => {
                (StatusCode::BAD_REQUEST, Html(html.into_inner()))
                    .into_response()
            }
            FailureResponse::NotFound(()) => (
                StatusCode::NOT_FOUND,
                Html(
                    alert_page(
                        "The page or record you asked for does not exist."
                            .to_string(),
                    )
                    .into_inner(),
                ),
            )
                .into_response(),
            FailureResponse::Conflict(html) => {
                (StatusCode::CONFLICT, Html(html.into_inner())).into_response()
            }
            FailureResponse::Unavailable(html) => {
                (StatusCode::SERVICE_UNAVAILABLE, Html(html.into_inner()))
                    .into_response()
            }
            FailureResponse::ServerError(()) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(
                    alert_page(
                        "Something went wrong and nothing was saved. Please \
                         try again."
                            .to_string(),
                    )
                    .into_inner(),
                ),
            )
                .into_response(),
        }
    }
}

fn alert_page(msg: String) -> Rendered<String> {
    Page::new()
        .body(maud! {
            div class="container py-4" {
                ErrorAlert msg=(&msg);
                a href="javascript:history.back()" class="btn btn-secondary" {
                    "Go back"
                }
            }
        })
        .render()
}

impl From<BackendError> for FailureResponse {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::NotFound => FailureResponse::NotFound(()),
            BackendError::Validation(msg) => {
                FailureResponse::BadRequest(alert_page(msg))
            }
            BackendError::Conflict(msg) => {
                FailureResponse::Conflict(alert_page(msg))
            }
            BackendError::Transient(msg) => {
                tracing::error!("Transient store error: {msg}");
                FailureResponse::Unavailable(alert_page(
                    "The database is busy. Please try again.".to_string(),
                ))
            }
            BackendError::Unknown(msg) => {
                tracing::error!("Store error: {msg}");
                FailureResponse::ServerError(())
            }
        }
    }
}

impl From<diesel::result::Error> for FailureResponse {
    fn from(error: diesel::result::Error) -> Self {
        BackendError::from(error).into()
    }
}

/// For handlers which also need to update the cookie jar.
pub type JarResponse =
    Result<(PrivateCookieJar, SuccessResponse), FailureResponse>;

#[cfg(test)]
mod tests {
    use axum::{
        body::to_bytes,
        http::{StatusCode, header},
        response::IntoResponse,
    };

    use super::FailureResponse;
    use crate::error::BackendError;

    async fn page(error: BackendError) -> (StatusCode, String, String) {
        let res = FailureResponse::from(error).into_response();
        let status = res.status();
        let content_type = res
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn store_errors_render_an_alert_page() {
        let (status, content_type, body) =
            page(BackendError::Unknown("disk I/O error".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(content_type.starts_with("text/html"));
        assert!(body.contains("alert-danger"));
        assert!(!body.contains("disk I/O error"));

        let (status, content_type, body) = page(BackendError::NotFound).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(content_type.starts_with("text/html"));
        assert!(body.contains("alert-danger"));
    }

    #[tokio::test]
    async fn conflicts_keep_their_message() {
        let (status, _, body) =
            page(BackendError::Conflict("already taken".to_string())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.contains("already taken"));
    }

    #[tokio::test]
    async fn transient_errors_ask_for_a_retry() {
        let (status, _, body) =
            page(BackendError::Transient("database is locked".to_string())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("Please try again."));
        assert!(!body.contains("locked"));
    }
}
