use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{error, info, warn};

use zeladoria_db::models::{Ballot, IssueRow, NewIssue, PhotoRow};
use zeladoria_types::api::{
    AddPhotoRequest, Claims, CreateIssueRequest, IssueResponse, MessageBody, PhotoResponse,
    StatusUpdateRequest, StatusUpdateResponse, ValidateResponse, VoteResponse,
};
use zeladoria_types::models::{IssueStatus, Role};

use crate::auth::{AppState, current_user};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::require_role;

const MAX_DESCRIPTION_LEN: usize = 2000;
const MAX_PHOTOS_PER_ISSUE: usize = 10;
const MAX_URL_LEN: usize = 2048;

#[derive(Debug, Deserialize)]
pub struct IssueQuery {
    pub status: Option<String>,
    pub tipo: Option<String>,
}

pub async fn list_issues(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<IssueQuery>,
) -> ApiResult<Json<Vec<IssueResponse>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<IssueStatus>)
        .transpose()?;
    let type_key = query.tipo;

    // Run blocking DB queries off the async runtime
    let db = state.clone();
    let (rows, photos) = tokio::task::spawn_blocking(move || {
        let rows = db
            .db
            .list_issues(status.map(IssueStatus::as_str), type_key.as_deref())?;
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let photos = db.db.get_photos_for_issues(&ids)?;
        Ok::<_, anyhow::Error>((rows, photos))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!("list task failed"))
    })??;

    let mut by_issue: HashMap<i64, Vec<PhotoResponse>> = HashMap::new();
    for photo in photos {
        by_issue.entry(photo.issue_id).or_default().push(to_photo(photo));
    }

    let issues = rows
        .into_iter()
        .map(|row| {
            let photos = by_issue.remove(&row.id).unwrap_or_default();
            to_response(row, photos)
        })
        .collect();

    Ok(Json(issues))
}

pub async fn get_issue(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<IssueResponse>> {
    Ok(Json(load_issue(&state, id)?))
}

/// POST /problemas
pub async fn create_issue(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateIssueRequest>,
) -> ApiResult<impl IntoResponse> {
    require_role(&claims, &[Role::Citizen])?;
    current_user(&state.db, &claims)?;

    let description = req.description.trim();
    if description.is_empty() {
        return Err(ApiError::BadRequest("Descrição é obrigatória".into()));
    }
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ApiError::BadRequest(format!(
            "Descrição excede {} caracteres",
            MAX_DESCRIPTION_LEN
        )));
    }
    check_coordinates(req.lat, req.lng)?;

    if req.photos.len() > MAX_PHOTOS_PER_ISSUE {
        return Err(ApiError::BadRequest(format!(
            "No máximo {} fotos por problema",
            MAX_PHOTOS_PER_ISSUE
        )));
    }
    let photo_urls = req
        .photos
        .iter()
        .map(String::as_str)
        .map(check_photo_url)
        .collect::<ApiResult<Vec<String>>>()?;

    let type_key = req.type_key.trim();
    if state.db.get_issue_type_by_key(type_key)?.is_none() {
        return Err(ApiError::BadRequest(format!("Tipo '{}' desconhecido", type_key)));
    }

    let id = state.db.create_issue(&NewIssue {
        type_key,
        description,
        lat: req.lat,
        lng: req.lng,
        reporter_id: claims.user_id,
        photo_urls: &photo_urls,
    })?;

    info!("Issue {} ({}) reported by {}", id, type_key, claims.sub);

    Ok((StatusCode::CREATED, Json(load_issue(&state, id)?)))
}

/// POST /problemas/{id}/fotos
pub async fn add_photo(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<AddPhotoRequest>,
) -> ApiResult<impl IntoResponse> {
    require_role(&claims, &[Role::Citizen])?;
    current_user(&state.db, &claims)?;

    let url = check_photo_url(&req.url)?;
    let photo_id = state
        .db
        .add_photo(id, &url)?
        .ok_or_else(not_found)?;

    Ok((StatusCode::CREATED, Json(PhotoResponse { id: photo_id, url })))
}

/// POST /problemas/{id}/votar
pub async fn vote(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<VoteResponse>> {
    require_role(&claims, &[Role::Citizen])?;
    current_user(&state.db, &claims)?;

    match state.db.record_vote(id, claims.user_id)? {
        Ballot::Missing => Err(not_found()),
        Ballot::Duplicate => Err(ApiError::Conflict("Você já votou neste problema".into())),
        Ballot::Counted { total, .. } => Ok(Json(VoteResponse {
            msg: "Voto computado".into(),
            total,
        })),
    }
}

/// POST /problemas/{id}/validar
pub async fn validate(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ValidateResponse>> {
    require_role(&claims, &[Role::Citizen])?;
    current_user(&state.db, &claims)?;

    match state.db.record_validation(id, claims.user_id)? {
        Ballot::Missing => Err(not_found()),
        Ballot::Duplicate => Err(ApiError::Conflict("Você já validou este problema".into())),
        Ballot::Counted { total, status } => Ok(Json(ValidateResponse {
            msg: "Validado".into(),
            validations: total,
            status: stored_status(id, &status),
        })),
    }
}

/// PATCH /problemas/{id}/status?status=..&nota=..
pub async fn update_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    Extension(claims): Extension<Claims>,
    ApiQuery(req): ApiQuery<StatusUpdateRequest>,
) -> ApiResult<Json<StatusUpdateResponse>> {
    require_role(&claims, &[Role::Authority, Role::Admin])?;

    let status: IssueStatus = req.status.trim().parse()?;
    let note = req.note.as_deref().map(str::trim).filter(|n| !n.is_empty());

    if !state.db.update_issue_status(id, status, note)? {
        return Err(not_found());
    }
    info!("Issue {} set to {} by {}", id, status, claims.sub);

    Ok(Json(StatusUpdateResponse {
        msg: "Status atualizado".into(),
        status,
    }))
}

/// DELETE /problemas/{id}
pub async fn delete_issue(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<MessageBody>> {
    require_role(&claims, &[Role::Admin])?;

    if !state.db.delete_issue(id)? {
        return Err(not_found());
    }
    info!("Issue {} deleted by {}", id, claims.sub);
    Ok(Json(MessageBody::new("Deletado")))
}

fn not_found() -> ApiError {
    ApiError::NotFound("Problema não encontrado".into())
}

fn load_issue(state: &AppState, id: i64) -> ApiResult<IssueResponse> {
    let row = state.db.get_issue(id)?.ok_or_else(not_found)?;
    let photos = state
        .db
        .get_photos_for_issues(&[id])?
        .into_iter()
        .map(to_photo)
        .collect();
    Ok(to_response(row, photos))
}

fn check_coordinates(lat: f64, lng: f64) -> ApiResult<()> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(ApiError::BadRequest("Coordenadas fora do intervalo válido".into()));
    }
    Ok(())
}

fn check_photo_url(raw: &str) -> ApiResult<String> {
    let url = raw.trim();
    if url.is_empty() || url.len() > MAX_URL_LEN {
        return Err(ApiError::BadRequest("URL de foto inválida".into()));
    }
    Ok(url.to_string())
}

fn to_photo(row: PhotoRow) -> PhotoResponse {
    PhotoResponse {
        id: row.id,
        url: row.url,
    }
}

fn stored_status(issue_id: i64, raw: &str) -> IssueStatus {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt status on issue {}: {}", issue_id, e);
        IssueStatus::default()
    })
}

fn to_response(row: IssueRow, photos: Vec<PhotoResponse>) -> IssueResponse {
    IssueResponse {
        status: stored_status(row.id, &row.status),
        created_at: parse_timestamp(&row.created_at).unwrap_or_else(|| {
            warn!("Corrupt created_at '{}' on issue {}", row.created_at, row.id);
            DateTime::default()
        }),
        id: row.id,
        type_key: row.type_key,
        description: row.description,
        lat: row.lat,
        lng: row.lng,
        confirmations: row.confirmations,
        citizen_validations: row.citizen_validations,
        authority_note: row.authority_note,
        photos,
    }
}

/// SQLite `datetime('now')` yields "YYYY-MM-DD HH:MM:SS" in UTC without an offset.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|ndt| ndt.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn sqlite_timestamps_parse_as_utc() {
        let ts = parse_timestamp("2024-03-09 14:05:30").unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2024, 3, 9));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (14, 5, 30));

        assert!(parse_timestamp("2024-03-09T14:05:30Z").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn coordinate_bounds() {
        assert!(check_coordinates(-23.55, -46.63).is_ok());
        assert!(check_coordinates(90.0, 180.0).is_ok());
        assert!(check_coordinates(90.1, 0.0).is_err());
        assert!(check_coordinates(0.0, -180.5).is_err());
        assert!(check_coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn corrupt_status_falls_back_to_open() {
        assert_eq!(stored_status(1, "analise"), IssueStatus::InReview);
        assert_eq!(stored_status(1, "???"), IssueStatus::Open);
    }
}
