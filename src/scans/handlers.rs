use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream, StreamExt};
use serde_json::json;
use time::OffsetDateTime;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::{
    dto::{SaveScanRequest, ScanListQuery, ScanStats, StreamQuery},
    hub::ScanEvent,
    record::{decode_nutrition, decode_rows, encode_nutrition, ScanRecord},
    repo,
    services::{
        food_name_or_default, generate_daily_tips, nutrient_averages, start_of_day_utc, stored_condition,
    },
};
use crate::{
    analysis::{
        model::{AnalyzeFoodRequest, HealthPrediction, NutritionData},
        services::analyze_for_profile,
    },
    audit::{self, AuditAction, NewAuditEntry},
    auth::{services::bearer_token, AuthUser},
    error::AppError,
    profile::{gate::check_profile, handlers::load_user, repo::update_tips},
    state::AppState,
};

pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route("/scans", post(save_scan).get(list_scans))
        .route("/scans/analyze", post(analyze))
        .route("/scans/stats", get(stats))
        .route("/scans/stream", get(stream))
        .route("/scans/:id", get(get_scan).delete(delete_scan))
}

#[instrument(skip(state, payload))]
pub async fn analyze(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<AnalyzeFoodRequest>,
) -> Result<Json<HealthPrediction>, AppError> {
    payload.validate().map_err(|e| AppError::validation(&e))?;
    let user = load_user(&state, user_id).await?;

    let prediction = match analyze_for_profile(state.llm.as_ref(), &state.config.llm, &payload, &user.profile).await {
        Ok(p) => p,
        Err(e @ AppError::ProfileIncomplete { .. }) => {
            warn!(%user_id, "analysis blocked: profile incomplete");
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    audit::record(
        &state.db,
        NewAuditEntry::new(user_id, AuditAction::ScanAnalyzed, "Food analyzed").details(json!({
            "foodName": payload.food_name,
            "condition": payload.condition,
            "prediction": prediction.prediction,
        })),
    )
    .await;
    info!(%user_id, verdict = prediction.prediction.as_str(), "analysis complete");
    Ok(Json(prediction))
}

#[instrument(skip(state, payload))]
pub async fn save_scan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<SaveScanRequest>,
) -> Result<(StatusCode, Json<ScanRecord>), AppError> {
    payload.validate().map_err(|e| AppError::validation(&e))?;
    payload.prediction.validate_shape().map_err(AppError::BadRequest)?;

    let food_name = food_name_or_default(payload.food_name.as_deref());
    let condition = stored_condition(payload.condition);
    let nutrition = encode_nutrition(&payload.nutrition_data)?;

    let saved = repo::insert(&state.db, user_id, &food_name, &nutrition, condition, &payload.prediction)
        .await
        .and_then(ScanRecord::try_from);
    let record = match saved {
        Ok(record) => record,
        Err(e) => {
            error!(error = %e, %user_id, "saving scan failed");
            audit::record(
                &state.db,
                NewAuditEntry::new(user_id, AuditAction::ScanSaved, "Failed to save scan")
                    .details(json!({ "foodName": food_name }))
                    .failed(&e),
            )
            .await;
            return Err(e.into());
        }
    };

    if let Err(e) = update_tips(&state.db, user_id, &record.prediction.health_tip).await {
        warn!(error = %e, %user_id, "copying prediction tips to user failed");
    }

    audit::record(
        &state.db,
        NewAuditEntry::new(user_id, AuditAction::ScanSaved, "Scan saved").details(json!({
            "scanId": record.id,
            "foodName": record.food_name,
            "condition": record.condition,
            "prediction": record.prediction.prediction,
        })),
    )
    .await;

    state
        .hub
        .publish(user_id, ScanEvent::ScanCreated { record: record.clone() })
        .await;

    // Tip regeneration needs a complete profile; skip it otherwise.
    match load_user(&state, user_id).await.map(|u| check_profile(&u.profile)) {
        Ok(Ok(profile)) => {
            tokio::spawn(generate_daily_tips(state.clone(), user_id, profile));
        }
        Ok(Err(missing)) => warn!(?missing, "skipping daily tips: profile incomplete"),
        Err(e) => warn!(error = %e, "skipping daily tips"),
    }

    info!(%user_id, scan_id = %record.id, "scan saved");
    Ok((StatusCode::CREATED, Json(record)))
}

#[instrument(skip(state))]
pub async fn list_scans(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ScanListQuery>,
) -> Result<Json<Vec<ScanRecord>>, AppError> {
    let (limit, offset) = q.bounds();
    let rows = repo::list_by_user(&state.db, user_id, q.condition, limit, offset).await?;
    Ok(Json(decode_rows(rows)))
}

#[instrument(skip(state))]
pub async fn get_scan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ScanRecord>, AppError> {
    let row = repo::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Scan not found".into()))?;
    Ok(Json(ScanRecord::try_from(row)?))
}

#[instrument(skip(state))]
pub async fn delete_scan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !repo::delete(&state.db, user_id, id).await? {
        return Err(AppError::NotFound("Scan not found".into()));
    }
    audit::record(
        &state.db,
        NewAuditEntry::new(user_id, AuditAction::ScanDeleted, "Scan deleted").details(json!({ "scanId": id })),
    )
    .await;
    state.hub.publish(user_id, ScanEvent::ScanDeleted { scan_id: id }).await;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn stats(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ScanStats>, AppError> {
    let since = start_of_day_utc(OffsetDateTime::now_utc());
    let counts = repo::counts(&state.db, user_id, since).await?;
    let labels: Vec<NutritionData> = repo::nutrition_docs(&state.db, user_id)
        .await?
        .into_iter()
        .filter_map(|doc| decode_nutrition(doc).ok())
        .collect();
    Ok(Json(ScanStats::new(counts, nutrient_averages(&labels))))
}

fn to_sse(item: Result<ScanEvent, BroadcastStreamRecvError>) -> Option<Event> {
    match item {
        Ok(event) => Event::default().event(event.name()).json_data(&event).ok(),
        Err(BroadcastStreamRecvError::Lagged(missed)) => Event::default()
            .event("lagged")
            .json_data(json!({ "missed": missed }))
            .ok(),
    }
}

/// EventSource cannot set headers, so a non-empty `?token=` wins over the
/// Authorization header.
fn stream_token<'a>(query: Option<&'a str>, headers: &'a HeaderMap) -> Option<&'a str> {
    query.filter(|t| !t.is_empty()).or_else(|| bearer_token(headers))
}

/// Live feed of the caller's scan changes.
#[instrument(skip(state, query, headers))]
pub async fn stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let token = stream_token(query.token.as_deref(), &headers)
        .ok_or_else(|| AppError::Unauthorized("Missing access token".into()))?;
    let user_id = AuthUser::resolve(&state, token).await?.id;

    let rx = state.hub.subscribe(user_id).await;
    info!(%user_id, "scan stream opened");

    let connected = stream::once(async { Ok::<_, Infallible>(Event::default().event("connected").data("ok")) });
    let events = BroadcastStream::new(rx).filter_map(|item| async move { to_sse(item).map(Ok) });

    Ok(Sse::new(connected.chain(events)).keep_alive(KeepAlive::default()))
}
