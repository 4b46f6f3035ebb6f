use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use lawbrief_core::{
    chart::{clause_chart, obligation_chart, risk_level_chart, BarChart},
    detect::{clause_context, obligation_context},
    extract::{extract_text, ExtractError},
    mail::{send_report, SendOutcome},
    pipeline::analyze_document,
    qa::answer_question,
    report::{build_report, summary_pdf, ReportInput},
    session::Session,
    summarize, Detections, FeedEntry, RegulatoryUpdate, RiskFinding, RiskLevel, StoreReport,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_stream::StreamExt;
use tracing::{info, warn};

use crate::{logging::log_stream, AppState};

// ── Error helper ──────────────────────────────────────────────────────────

/// Handler error rendered as `{ "error": message }` with a matching status.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn session_not_found(id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("session {id} not found"))
    }

    fn upstream(e: anyhow::Error) -> Self {
        warn!("upstream failure: {e:#}");
        Self::new(StatusCode::BAD_GATEWAY, format!("{e:#}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub(crate) fn internal(e: impl std::fmt::Display) -> ApiError {
    tracing::error!("internal error: {e}");
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Unreadable uploads are the client's problem; anything else came from the model.
fn analysis_error(e: anyhow::Error) -> ApiError {
    match e.downcast_ref::<ExtractError>() {
        Some(extract) => ApiError::bad_request(extract.to_string()),
        None => ApiError::upstream(e),
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ── Request body types ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(crate) struct EmailBody {
    pub recipient: String,
}

#[derive(Deserialize)]
pub(crate) struct AskBody {
    pub question: String,
}

// ── Serializable views ────────────────────────────────────────────────────

#[derive(Serialize)]
pub(crate) struct DetectionJson {
    name: String,
    context: &'static str,
    matches: Vec<String>,
}

fn detection_json(detections: &Detections, context: fn(&str) -> &'static str) -> Vec<DetectionJson> {
    detections
        .iter()
        .map(|(name, matches)| DetectionJson {
            name: name.clone(),
            context: context(name),
            matches: matches.iter().cloned().collect(),
        })
        .collect()
}

#[derive(Serialize)]
pub(crate) struct RiskJson {
    phrase: String,
    level: RiskLevel,
    explanation: String,
    context: String,
    short_context: String,
}

impl From<&RiskFinding> for RiskJson {
    fn from(r: &RiskFinding) -> Self {
        Self {
            phrase: r.phrase.clone(),
            level: r.level,
            explanation: r.explanation.clone(),
            context: r.context.clone(),
            short_context: r.short_context(),
        }
    }
}

/// Caption data for one of the session's chart images.
#[derive(Serialize)]
pub(crate) struct ChartJson {
    kind: &'static str,
    title: String,
    legend: String,
}

const CHART_KINDS: [&str; 3] = ["clauses", "obligations", "risks"];

fn session_chart(session: &Session, kind: &str) -> Option<BarChart> {
    match kind {
        "clauses" => Some(clause_chart(&session.clauses)),
        "obligations" => Some(obligation_chart(&session.obligations)),
        "risks" => Some(risk_level_chart(&session.risks)),
        _ => None,
    }
}

fn chart_json(session: &Session) -> Vec<ChartJson> {
    CHART_KINDS
        .iter()
        .filter_map(|&kind| {
            session_chart(session, kind).map(|chart| ChartJson {
                kind,
                legend: chart.legend(),
                title: chart.title,
            })
        })
        .collect()
}

#[derive(Serialize)]
pub(crate) struct SessionJson {
    id: String,
    file_name: String,
    page_count: usize,
    chunk_count: usize,
    chunks_failed: usize,
    text: String,
    summary: String,
    clauses: Vec<DetectionJson>,
    obligations: Vec<DetectionJson>,
    risks: Vec<RiskJson>,
    risk_score: u32,
    charts: Vec<ChartJson>,
    updates: Vec<RegulatoryUpdate>,
    created_at: String,
}

impl From<&Session> for SessionJson {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id.clone(),
            file_name: s.file_name.clone(),
            page_count: s.page_count,
            chunk_count: s.chunk_count,
            chunks_failed: s.chunks_failed,
            text: s.text.clone(),
            summary: s.summary.clone(),
            clauses: detection_json(&s.clauses, clause_context),
            obligations: detection_json(&s.obligations, obligation_context),
            risks: s.risks.iter().map(RiskJson::from).collect(),
            risk_score: s.risk_score,
            charts: chart_json(s),
            updates: s.updates.clone(),
            created_at: s.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub(crate) struct UpdatesJson {
    updates: Vec<RegulatoryUpdate>,
    headlines: Vec<FeedEntry>,
    /// `None` when no spreadsheet is configured.
    stored: Option<StoreReport>,
    store_error: Option<String>,
}

// ── Helpers ───────────────────────────────────────────────────────────────

fn session(state: &AppState, id: &str) -> ApiResult<Session> {
    state
        .sessions
        .get(id)
        .ok_or_else(|| ApiError::session_not_found(id))
}

/// Pull the `file` field out of a multipart upload.
async fn read_upload(mut multipart: Multipart) -> ApiResult<(String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed upload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("document.pdf").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("malformed upload: {e}")))?;
        if bytes.is_empty() {
            return Err(ApiError::bad_request("uploaded file is empty"));
        }
        return Ok((file_name, bytes.to_vec()));
    }
    Err(ApiError::bad_request("missing multipart field `file`"))
}

fn pdf_response(file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn report_for(session: &Session) -> anyhow::Result<Vec<u8>> {
    build_report(&ReportInput {
        summary: &session.summary,
        clauses: &session.clauses,
        obligations: &session.obligations,
        risks: &session.risks,
        risk_score: session.risk_score,
        updates: &session.updates,
    })
}

// ── Handlers ──────────────────────────────────────────────────────────────

pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn upload_document(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<SessionJson>)> {
    let (file_name, bytes) = read_upload(multipart).await?;
    let session = analyze_document(
        state.backend.as_ref(),
        &file_name,
        &bytes,
        state.config.chunk_max_tokens,
    )
    .await
    .map_err(analysis_error)?;

    let body = SessionJson::from(&session);
    let id = state.sessions.insert(session);
    info!(session = %id, file = %file_name, "session created");
    Ok((StatusCode::CREATED, Json(body)))
}

pub(crate) async fn quick_summary(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let (file_name, bytes) = read_upload(multipart).await?;
    let doc = extract_text(&bytes).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let summary = summarize::quick_summary(state.backend.as_ref(), &doc.text)
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(json!({
        "file_name": file_name,
        "page_count": doc.page_count(),
        "summary": summary,
    })))
}

pub(crate) async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionJson>> {
    let session = session(&state, &id)?;
    Ok(Json(SessionJson::from(&session)))
}

pub(crate) async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .sessions
        .remove(&id)
        .ok_or_else(|| ApiError::session_not_found(&id))?;
    info!(session = %id, "session deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn get_chart(
    State(state): State<Arc<AppState>>,
    Path((id, kind)): Path<(String, String)>,
) -> ApiResult<Response> {
    let session = session(&state, &id)?;
    let chart = session_chart(&session, &kind).ok_or_else(|| {
        ApiError::bad_request(format!(
            "unknown chart {kind:?}, expected {}",
            CHART_KINDS.join(", ")
        ))
    })?;
    let png = chart.render_png().map_err(internal)?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

pub(crate) async fn get_summary_pdf(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let session = session(&state, &id)?;
    let bytes = summary_pdf(&session.summary).map_err(internal)?;
    Ok(pdf_response("summary.pdf", bytes))
}

pub(crate) async fn get_report_pdf(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let session = session(&state, &id)?;
    let bytes = report_for(&session).map_err(internal)?;
    Ok(pdf_response("report.pdf", bytes))
}

pub(crate) async fn fetch_updates(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<UpdatesJson>> {
    session(&state, &id)?;
    let limit = state.config.updates_limit;

    let updates = state
        .recitals
        .fetch_recent(limit)
        .await
        .map_err(ApiError::upstream)?;

    let headlines = match state.headlines.latest(limit).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("feed fetch failed: {e:#}");
            Vec::new()
        },
    };

    // Sheet failures are reported but never lose the fetched updates.
    let (stored, store_error) = match &state.sink {
        Some(sink) => match sink.store(&updates).await {
            Ok(report) => (Some(report), None),
            Err(e) => {
                warn!("storing updates failed: {e:#}");
                (None, Some(format!("{e:#}")))
            },
        },
        None => (None, None),
    };

    state
        .sessions
        .update(&id, |s| s.updates = updates.clone())
        .ok_or_else(|| ApiError::session_not_found(&id))?;
    info!(session = %id, updates = updates.len(), "regulatory updates cached");

    Ok(Json(UpdatesJson {
        updates,
        headlines,
        stored,
        store_error,
    }))
}

pub(crate) async fn email_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<EmailBody>,
) -> ApiResult<Json<SendOutcome>> {
    let session = session(&state, &id)?;
    let recipient = body.recipient.trim();
    if recipient.is_empty() {
        return Err(ApiError::bad_request("recipient is required"));
    }
    let Some(mailer) = &state.mailer else {
        return Ok(Json(SendOutcome::failed("email is not configured")));
    };

    let pdf = report_for(&session).map_err(internal)?;
    let outcome = send_report(mailer.as_ref(), &state.config.sender_email, recipient, pdf).await;
    Ok(Json(outcome))
}

pub(crate) async fn ask_question(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<AskBody>,
) -> ApiResult<Json<Value>> {
    let session = session(&state, &id)?;
    if body.question.trim().is_empty() {
        return Err(ApiError::bad_request("question is required"));
    }
    let answer = answer_question(state.backend.as_ref(), &session.text, &body.question)
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(json!({ "answer": answer })))
}

// SSE logs: replays ring buffer history then streams live events

pub(crate) async fn sse_logs(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let stream = log_stream(&state.log_tx, &state.log_ring)
        .map(|line| Ok::<_, std::convert::Infallible>(Event::default().data(line)));
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("ping"),
    )
}
