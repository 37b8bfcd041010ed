use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::AppState;

/// Identity of the verifier behind an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verifier(pub String);

/// Accepts `Authorization: Bearer <key>` for a configured verifier key and
/// exposes the verifier's identity to the handler as an extension.
pub async fn verifier_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let verifier = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .and_then(|key| state.verifier_keys.get(key))
        .cloned();

    match verifier {
        Some(name) => {
            req.extensions_mut().insert(Verifier(name));
            Ok(next.run(req).await)
        }
        None => {
            tracing::warn!(
                method = %req.method(),
                uri = %req.uri(),
                "Rejected request without a valid verifier key"
            );
            Err(AppError::Unauthorized(
                "a valid verifier key is required".to_string(),
            ))
        }
    }
}
