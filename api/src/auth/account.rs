//! Account header middleware

use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::domain::entities::Account;
use crate::error::AppError;

pub const ACCOUNT_HEADER: &str = "X-Account";

/// Extract the account from the gateway header
fn extract_account(request: &Request<Body>) -> Result<Account, AppError> {
    let raw = request
        .headers()
        .get(ACCOUNT_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    Account::new(raw).map_err(|_| AppError::Unauthorized)
}

/// Authentication middleware
///
/// Injects the caller's `Account` into request extensions. Routes that act
/// on behalf of a user sit behind this layer.
pub async fn account_middleware(
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let account = extract_account(&request)?;
    request.extensions_mut().insert(account);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(value: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/v1/softwarepkg");
        if let Some(v) = value {
            builder = builder.header(ACCOUNT_HEADER, v);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn reads_account_header() {
        let account = extract_account(&request_with(Some("alice"))).unwrap();
        assert_eq!(account.as_str(), "alice");
    }

    #[test]
    fn missing_or_invalid_header_is_unauthorized() {
        assert!(matches!(
            extract_account(&request_with(None)),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            extract_account(&request_with(Some(""))),
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn middleware_gates_routes() {
        use axum::{http::StatusCode, middleware, routing::get, Extension, Router};
        use tower::ServiceExt;

        async fn whoami(Extension(account): Extension<Account>) -> String {
            account.to_string()
        }

        let app = Router::new()
            .route("/v1/softwarepkg", get(whoami))
            .layer(middleware::from_fn(account_middleware));

        let ok = app.clone().oneshot(request_with(Some("alice"))).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        let denied = app.oneshot(request_with(None)).await.unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
    }
}
