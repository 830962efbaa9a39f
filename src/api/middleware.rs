use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::{
    error::AppError,
    services::sessions::SessionService,
    AppState,
};

pub use crate::services::sessions::AuthUser;

/// Browsers cannot set headers on a WebSocket handshake, so the socket
/// route also accepts `?token=`.
fn query_token(request: &Request) -> Option<String> {
    request.uri().query()?.split('&').find_map(|pair| {
        pair.strip_prefix("token=")
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}

/// Where a route may take its token from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenSource {
    Header,
    HeaderOrQuery,
}

fn request_token(
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    request: &Request,
    source: TokenSource,
) -> Option<String> {
    let header = bearer.map(|TypedHeader(Authorization(b))| b.token().to_string());
    match source {
        TokenSource::Header => header,
        TokenSource::HeaderOrQuery => header.or_else(|| query_token(request)),
    }
}

/// Resolves a token to the signed-in landlord and stores it in the request
/// extensions as [`AuthUser`].
async fn authorize(
    state: &AppState,
    token: Option<String>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = token.ok_or(AppError::Unauthorized)?;

    let sessions = SessionService::new(state.auth_store.clone(), state.config.jwt.clone());
    let user = sessions.authenticate(&token).await?;

    if !user.role.may_use_dashboard() {
        return Err(AppError::RoleNotAllowed);
    }

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Bearer header only.
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request_token(bearer, &request, TokenSource::Header);
    authorize(&state, token, request, next).await
}

/// Bearer header, or `?token=` for browser sockets. Only mounted on `/ws`.
pub async fn socket_auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request_token(bearer, &request, TokenSource::HeaderOrQuery);
    authorize(&state, token, request, next).await
}
