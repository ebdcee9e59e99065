use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use tracing::{instrument, trace};

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session::{self, TokenUse},
    errors::{Error, Result},
};

/// Extract the bearer token from the Authorization header, if present.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<Result<&str>> {
    let auth_header = headers.get(axum::http::header::AUTHORIZATION)?;

    let auth_str = match auth_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }));
        }
    };

    match auth_str.strip_prefix("Bearer ") {
        Some(token) => Some(Ok(token)),
        None => None,
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = match bearer_token(&parts.headers) {
            Some(token) => token?,
            None => {
                trace!("No bearer token present in request");
                return Err(Error::Unauthenticated { message: None });
            }
        };

        // Refresh tokens are only accepted by the dedicated refresh endpoint.
        let claims = session::verify_token(token, TokenUse::Access, &state.config)?;
        Ok(CurrentUser::from(claims))
    }
}
