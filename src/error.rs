//! Unified error type.

use http::StatusCode;

use crate::response::{IntoResponse, Response};

/// The error type returned by formgate's fallible operations.
///
/// Validation failures are not `Error`s: they travel as a ready-made
/// [`Response`] inside [`Abort::Respond`](crate::Abort::Respond). This type
/// covers everything else: infrastructure failures, undecodable bodies,
/// redirect targets that cannot be generated, and denied authorization.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("http: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("invalid json body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid form body: {0}")]
    Form(#[from] serde_urlencoded::de::Error),

    #[error("invalid multipart body: {0}")]
    Multipart(#[from] multer::Error),

    #[error("route `{0}` is not defined")]
    UnknownRoute(String),

    #[error("action `{0}` is not defined")]
    UnknownAction(String),

    #[error("`{0}` needs route parameters to generate a url")]
    MissingParameters(String),

    /// The form request's authorization check returned `false`.
    #[error("this action is unauthorized")]
    PermissionDenied,
}

impl Error {
    /// `true` for errors caused by a request body the client got wrong.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::Json(_) | Self::Form(_) | Self::Multipart(_))
    }
}

/// The default rendering used by [`Router`](crate::Router) when no recovery
/// handler is installed.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Self::PermissionDenied => Response::builder()
                .status(StatusCode::FORBIDDEN)
                .text("Forbidden"),
            e if e.is_bad_request() => Response::status(StatusCode::BAD_REQUEST),
            _ => Response::status(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_renders_forbidden() {
        let res = Error::PermissionDenied.into_response();
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(res.body(), b"Forbidden");
    }

    #[test]
    fn undecodable_body_renders_bad_request() {
        let err = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let res = Error::from(err).into_response();
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unknown_route_renders_server_error() {
        let res = Error::UnknownRoute("users.show".into()).into_response();
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
