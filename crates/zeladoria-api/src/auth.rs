use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::{Rng, distr::Alphanumeric};
use tracing::{info, warn};

use zeladoria_db::models::UserRow;
use zeladoria_db::{Database, is_unique_violation};
use zeladoria_types::api::{Claims, LoginRequest, RegisterRequest, TokenResponse, UserResponse};
use zeladoria_types::models::Role;

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::require_role;
use crate::social::{FacebookClient, PLACEHOLDER_EMAIL_DOMAIN};

/// Session tokens expire this long after issuance.
pub const TOKEN_TTL_HOURS: i64 = 24;

const MIN_PASSWORD_LEN: usize = 6;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub facebook: FacebookClient,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = normalize_email(&req.email)?;
    if email.ends_with(&format!("@{}", PLACEHOLDER_EMAIL_DOMAIN)) {
        return Err(ApiError::BadRequest("Domínio de email reservado".into()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "A senha deve ter pelo menos {} caracteres",
            MIN_PASSWORD_LEN
        )));
    }

    let role = match req.role.as_deref() {
        None => Role::Citizen,
        Some(raw) => raw.parse::<Role>()?,
    };
    if role == Role::Admin {
        return Err(ApiError::BadRequest("Contas admin não podem ser criadas por cadastro".into()));
    }

    // Check if email is taken
    if state.db.get_user_by_email(&email)?.is_some() {
        return Err(ApiError::BadRequest("Email já cadastrado".into()));
    }

    let password_hash = hash_password(&req.password)?;
    let active = role.active_on_signup();

    let id = state
        .db
        .create_user(&email, &password_hash, role.as_str(), active)
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::BadRequest("Email já cadastrado".into())
            } else {
                e.into()
            }
        })?;

    info!("Registered user {} ({}) as {}", id, email, role);

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id,
            email,
            role,
            active,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let email = req.email.trim().to_lowercase();
    let invalid = || ApiError::Unauthorized("Email ou senha inválidos".into());

    let user = state.db.get_user_by_email(&email)?.ok_or_else(invalid)?;

    if !verify_password(&req.password, &user.password_hash)? {
        warn!("Failed login for {}", email);
        return Err(invalid());
    }
    if !user.active {
        return Err(ApiError::Forbidden("Conta ainda não ativada".into()));
    }

    Ok(Json(token_response(&state.jwt_secret, &user)?))
}

/// GET /auth/verificar/{id}: activates an account (admin only).
pub async fn verify_account(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<UserResponse>> {
    require_role(&claims, &[Role::Admin])?;

    if !state.db.set_user_active(id, true)? {
        return Err(ApiError::NotFound("Usuário não encontrado".into()));
    }
    let user = state
        .db
        .get_user_by_id(id)?
        .ok_or_else(|| ApiError::NotFound("Usuário não encontrado".into()))?;

    info!("User {} activated by {}", id, claims.sub);

    Ok(Json(UserResponse {
        id: user.id,
        role: stored_role(&user)?,
        email: user.email,
        active: user.active,
    }))
}

/// The account behind `claims`. A token outliving its user is rejected like a bad token.
pub(crate) fn current_user(db: &Database, claims: &Claims) -> ApiResult<UserRow> {
    db.get_user_by_id(claims.user_id)?
        .ok_or_else(|| ApiError::Unauthorized("Usuário do token não existe".into()))
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("Corrupt password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn random_password(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn create_token(secret: &str, user_id: i64, email: &str, role: Role) -> anyhow::Result<String> {
    let claims = Claims {
        sub: email.to_string(),
        role,
        user_id,
        exp: (chrono::Utc::now() + chrono::Duration::hours(TOKEN_TTL_HOURS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub(crate) fn token_response(secret: &str, user: &UserRow) -> ApiResult<TokenResponse> {
    let role = stored_role(user)?;
    let access_token = create_token(secret, user.id, &user.email, role)?;
    Ok(TokenResponse {
        access_token,
        token_type: "bearer".into(),
        user_id: user.id,
        role,
    })
}

pub(crate) fn stored_role(user: &UserRow) -> ApiResult<Role> {
    user.role
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("User {} has {}", user.id, e)))
}

/// Trimmed, lowercased, and shaped like `local@domain`.
pub fn normalize_email(raw: &str) -> ApiResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(ApiError::BadRequest("Email inválido".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::decode_token;

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("segredo123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("segredo123", &hash).unwrap());
        assert!(!verify_password("segredo124", &hash).unwrap());
    }

    #[test]
    fn corrupt_hash_is_an_error() {
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }

    #[test]
    fn token_carries_identity_and_expires_in_a_day() {
        let token = create_token("test-secret", 42, "fiscal@prefeitura.gov", Role::Authority).unwrap();
        let claims = decode_token("test-secret", &token).unwrap();

        assert_eq!(claims.sub, "fiscal@prefeitura.gov");
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.role, Role::Authority);

        let ttl = claims.exp as i64 - chrono::Utc::now().timestamp();
        assert!(ttl > 23 * 3600 && ttl <= 24 * 3600);

        assert!(decode_token("other-secret", &token).is_err());
    }

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  Ana@Example.COM ").unwrap(), "ana@example.com");
        for bad in ["", "ana", "@example.com", "ana@example", "ana@.com", "a b@example.com", "a@b@c.com"] {
            assert!(normalize_email(bad).is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn random_passwords_differ() {
        let a = random_password(20);
        assert_eq!(a.len(), 20);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, random_password(20));
    }
}
