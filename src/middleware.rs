use axum::{extract::Request, middleware::Next, response::Response};

use crate::app_error::AppError;

/// Shared-secret guard for the admin surface. The dashboard sends the
/// token in `x-admin-token`; requests without a matching token never
/// reach the handlers.
pub async fn admin_authorization(req: Request, next: Next) -> Result<Response, AppError> {
    let expected = std::env::var("ADMIN_TOKEN")
        .map_err(|_| AppError::Forbidden("Admin access is not configured".into()))?;

    let provided = req
        .headers()
        .get("x-admin-token")
        .and_then(|value| value.to_str().ok());

    if provided != Some(expected.as_str()) {
        return Err(AppError::Forbidden("Invalid admin token".into()));
    }

    Ok(next.run(req).await)
}
