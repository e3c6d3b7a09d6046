use std::time::Duration;

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::{info, warn};

use zeladoria_db::models::UserRow;
use zeladoria_db::{Database, is_unique_violation};
use zeladoria_types::api::{SocialLoginRequest, TokenResponse};
use zeladoria_types::models::Role;

use crate::auth::{AppState, hash_password, random_password, token_response};
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;

pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com";

/// Domain used for shadow accounts whose provider profile has no email.
pub(crate) const PLACEHOLDER_EMAIL_DOMAIN: &str = "facebook.local";

#[derive(Debug, Clone, Deserialize)]
pub struct FacebookProfile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl FacebookProfile {
    /// The provider email, or `{id}@facebook.local` when none was shared.
    pub fn local_email(&self) -> String {
        match self.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            Some(email) => email.to_lowercase(),
            None => format!("{}@{}", self.id, PLACEHOLDER_EMAIL_DOMAIN),
        }
    }
}

/// Graph API client for the `/me` profile lookup.
#[derive(Clone)]
pub struct FacebookClient {
    http: reqwest::Client,
    graph_url: String,
}

impl FacebookClient {
    pub fn new(graph_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("zeladoria/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            graph_url: graph_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn fetch_profile(&self, access_token: &str) -> ApiResult<FacebookProfile> {
        let url = format!("{}/me", self.graph_url);

        let response = self
            .http
            .get(&url)
            .query(&[("fields", "id,name,email"), ("access_token", access_token)])
            .send()
            .await
            .map_err(|e| {
                warn!("Facebook request failed: {}", e);
                ApiError::Upstream("Falha ao contatar o Facebook".into())
            })?;

        if !response.status().is_success() {
            warn!("Facebook rejected token with status {}", response.status());
            return Err(ApiError::BadRequest("Token do Facebook inválido".into()));
        }

        let profile: FacebookProfile = response.json().await.map_err(|e| {
            warn!("Unreadable Facebook profile: {}", e);
            ApiError::Upstream("Resposta inválida do Facebook".into())
        })?;

        if profile.id.trim().is_empty() {
            return Err(ApiError::BadRequest("Token do Facebook inválido".into()));
        }
        Ok(profile)
    }
}

/// POST /auth/facebook
pub async fn facebook_login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SocialLoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    if req.access_token.trim().is_empty() {
        return Err(ApiError::BadRequest("Token do Facebook ausente".into()));
    }

    let profile = state.facebook.fetch_profile(req.access_token.trim()).await?;
    if let Some(claimed) = req.provider_user_id.as_deref() {
        if claimed.trim() != profile.id {
            warn!("Facebook token belongs to {}, client claimed {}", profile.id, claimed);
            return Err(ApiError::BadRequest("Token do Facebook inválido".into()));
        }
    }
    let user = find_or_create_social_user(&state.db, &profile)?;

    if !user.active {
        return Err(ApiError::Forbidden("Conta ainda não ativada".into()));
    }

    Ok(Json(token_response(&state.jwt_secret, &user)?))
}

/// Looks the profile up by email, creating an active citizen on first sight.
/// Shadow accounts get a random password nobody knows.
pub fn find_or_create_social_user(db: &Database, profile: &FacebookProfile) -> ApiResult<UserRow> {
    let email = profile.local_email();

    if let Some(user) = db.get_user_by_email(&email)? {
        return Ok(user);
    }

    let password_hash = hash_password(&random_password(32))?;
    let created = db.create_user(&email, &password_hash, Role::Citizen.as_str(), true);

    match created {
        Ok(id) => info!("Created shadow user {} for Facebook id {}", id, profile.id),
        // Lost a race with a concurrent first login; the row exists now.
        Err(e) if is_unique_violation(&e) => {}
        Err(e) => return Err(e.into()),
    }

    db.get_user_by_email(&email)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("Shadow user {} vanished", email)))
}
