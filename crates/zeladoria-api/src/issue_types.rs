use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use zeladoria_db::is_unique_violation;
use zeladoria_db::models::{IssueTypeRow, NewIssueType};
use zeladoria_types::api::{Claims, CreateIssueTypeRequest, IssueTypeResponse, MessageBody};
use zeladoria_types::models::Role;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::require_role;

const MAX_KEY_LEN: usize = 40;

pub async fn list_issue_types(State(state): State<AppState>) -> ApiResult<Json<Vec<IssueTypeResponse>>> {
    let rows = state.db.list_issue_types()?;
    Ok(Json(rows.into_iter().map(to_response).collect()))
}

/// POST /admin/tipos
pub async fn create_issue_type(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateIssueTypeRequest>,
) -> ApiResult<impl IntoResponse> {
    require_role(&claims, &[Role::Admin])?;

    let key = req.key.trim();
    if key.is_empty()
        || key.len() > MAX_KEY_LEN
        || !key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(ApiError::BadRequest(
            "Chave deve usar apenas letras minúsculas, dígitos e '_'".into(),
        ));
    }
    let title = req.title.trim();
    let category = req.category.trim();
    if title.is_empty() || category.is_empty() {
        return Err(ApiError::BadRequest("Título e categoria são obrigatórios".into()));
    }

    let new = NewIssueType {
        key,
        title,
        category,
        icon: req.icon.trim(),
    };
    let id = state.db.create_issue_type(&new).map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::BadRequest(format!("Tipo '{}' já existe", key))
        } else {
            e.into()
        }
    })?;

    info!("Issue type '{}' ({}) added by {}", key, id, claims.sub);

    Ok((
        StatusCode::CREATED,
        Json(IssueTypeResponse {
            id,
            key: new.key.to_string(),
            title: new.title.to_string(),
            category: new.category.to_string(),
            icon: new.icon.to_string(),
        }),
    ))
}

/// DELETE /admin/tipos/{id}
pub async fn delete_issue_type(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<MessageBody>> {
    require_role(&claims, &[Role::Admin])?;

    if !state.db.delete_issue_type(id)? {
        return Err(ApiError::NotFound("Tipo não encontrado".into()));
    }
    info!("Issue type {} removed by {}", id, claims.sub);
    Ok(Json(MessageBody::new("Tipo removido")))
}

fn to_response(row: IssueTypeRow) -> IssueTypeResponse {
    IssueTypeResponse {
        id: row.id,
        key: row.key,
        title: row.title,
        category: row.category,
        icon: row.icon,
    }
}
