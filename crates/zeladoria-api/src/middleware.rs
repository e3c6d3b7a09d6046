use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use zeladoria_types::api::Claims;
use zeladoria_types::models::Role;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// Extract and validate JWT from Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Token ausente".into()))?;

    let claims = decode_token(&state.jwt_secret, token).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        ApiError::Unauthorized("Token inválido ou expirado".into())
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub fn decode_token(secret: &str, token: &str) -> jsonwebtoken::errors::Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Fails with 403 unless the caller holds one of `allowed`.
pub fn require_role(claims: &Claims, allowed: &[Role]) -> ApiResult<()> {
    if allowed.contains(&claims.role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "Perfil '{}' sem permissão para esta operação",
            claims.role
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: Role) -> Claims {
        Claims {
            sub: "ana@example.com".into(),
            role,
            user_id: 7,
            exp: 0,
        }
    }

    #[test]
    fn role_gate() {
        assert!(require_role(&claims(Role::Admin), &[Role::Admin]).is_ok());
        assert!(require_role(&claims(Role::Authority), &[Role::Authority, Role::Admin]).is_ok());
        assert!(matches!(
            require_role(&claims(Role::Citizen), &[Role::Authority, Role::Admin]),
            Err(ApiError::Forbidden(_))
        ));
    }
}
