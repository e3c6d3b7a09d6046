use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{IssueStatus, Role};

// -- JWT Claims --

/// Session token claims. `sub` carries the account email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub user_id: i64,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    #[serde(rename = "senha")]
    pub password: String,
    /// Wire name of the requested role; citizens when omitted.
    #[serde(rename = "perfil", default)]
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    #[serde(rename = "perfil")]
    pub role: Role,
    #[serde(rename = "ativo")]
    pub active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    #[serde(rename = "senha")]
    pub password: String,
}

/// Body the Facebook JS SDK hands back after `FB.login`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SocialLoginRequest {
    #[serde(rename = "accessToken", alias = "access_token")]
    pub access_token: String,
    /// Provider user id as the client saw it; must match the token's profile when sent.
    #[serde(rename = "userID", default)]
    pub provider_user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user_id: i64,
    #[serde(rename = "perfil")]
    pub role: Role,
}

// -- Issue types --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateIssueTypeRequest {
    #[serde(rename = "chave")]
    pub key: String,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "icone", default)]
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueTypeResponse {
    pub id: i64,
    #[serde(rename = "chave")]
    pub key: String,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "icone")]
    pub icon: String,
}

// -- Issues --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateIssueRequest {
    #[serde(rename = "tipo")]
    pub type_key: String,
    #[serde(rename = "descricao")]
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    /// Photo URLs stored alongside the issue.
    #[serde(rename = "fotos", default)]
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoResponse {
    pub id: i64,
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddPhotoRequest {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueResponse {
    pub id: i64,
    #[serde(rename = "tipo")]
    pub type_key: String,
    #[serde(rename = "descricao")]
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    pub status: IssueStatus,
    #[serde(rename = "confirmacoes")]
    pub confirmations: i64,
    #[serde(rename = "validacoes_cidadao")]
    pub citizen_validations: i64,
    #[serde(rename = "nota_prefeitura")]
    pub authority_note: Option<String>,
    #[serde(rename = "data_criacao")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "fotos")]
    pub photos: Vec<PhotoResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    pub msg: String,
    pub total: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub msg: String,
    #[serde(rename = "validacoes")]
    pub validations: i64,
    pub status: IssueStatus,
}

/// Query string of `PATCH /problemas/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    /// Parsed against [`IssueStatus`] by the handler so unknown values become a 400.
    pub status: String,
    #[serde(rename = "nota", default)]
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusUpdateResponse {
    pub msg: String,
    pub status: IssueStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub msg: String,
}

impl MessageBody {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn auth_bodies_use_portuguese_field_names() {
        let req: RegisterRequest =
            serde_json::from_value(json!({ "email": "a@b.com", "senha": "segredo", "perfil": "prefeitura" })).unwrap();
        assert_eq!(req.password, "segredo");
        assert_eq!(req.role.as_deref(), Some("prefeitura"));
        assert!(serde_json::from_value::<LoginRequest>(json!({ "email": "a@b.com", "password": "x" })).is_err());

        let token = TokenResponse {
            access_token: "t".into(),
            token_type: "bearer".into(),
            user_id: 1,
            role: Role::Authority,
        };
        assert_eq!(serde_json::to_value(&token).unwrap()["perfil"], "prefeitura");
    }

    #[test]
    fn social_login_takes_the_sdk_shape() {
        let req: SocialLoginRequest =
            serde_json::from_value(json!({ "accessToken": "abc", "userID": "42" })).unwrap();
        assert_eq!(req.access_token, "abc");
        assert_eq!(req.provider_user_id.as_deref(), Some("42"));

        let req: SocialLoginRequest = serde_json::from_value(json!({ "access_token": "abc" })).unwrap();
        assert_eq!(req.provider_user_id, None);
    }
}
