mod logging;
mod routes;
#[cfg(test)]
mod tests;

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use lawbrief_agent::GroqBackend;
use lawbrief_core::{
    config::Config,
    llm::CompletionBackend,
    mail::{MailTransport, SmtpMailer},
    regulatory::{HeadlineSource, RegulatorySource, UpdateSink},
    session::SessionStore,
};
use lawbrief_domains::{GdprFeedSource, GdprRecitalsSource, GoogleSheetsSink};
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::logging::BroadcastLayer;

// ── AppState ──────────────────────────────────────────────────────────────

pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionStore,
    pub backend: Arc<dyn CompletionBackend>,
    /// Absent when no sender credentials are configured.
    pub mailer: Option<Arc<dyn MailTransport>>,
    pub recitals: Arc<dyn RegulatorySource>,
    pub headlines: Arc<dyn HeadlineSource>,
    /// Absent when no spreadsheet is configured.
    pub sink: Option<Arc<dyn UpdateSink>>,
    pub log_tx: broadcast::Sender<String>,
    pub log_ring: Arc<Mutex<VecDeque<String>>>,
}

// ── Router ────────────────────────────────────────────────────────────────

pub fn build_router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();
    let serve_dir = ServeDir::new(&static_dir).fallback(tower_http::services::ServeFile::new(
        format!("{static_dir}/index.html"),
    ));
    let body_limit = state.config.max_upload_mb.saturating_mul(1024 * 1024);

    Router::new()
        // Health
        .route("/api/health", get(routes::health))
        // Analysis
        .route("/api/documents", post(routes::upload_document))
        .route("/api/summary", post(routes::quick_summary))
        // Sessions
        .route(
            "/api/sessions/:id",
            get(routes::get_session).delete(routes::delete_session),
        )
        .route("/api/sessions/:id/charts/:kind", get(routes::get_chart))
        .route("/api/sessions/:id/summary.pdf", get(routes::get_summary_pdf))
        .route("/api/sessions/:id/report.pdf", get(routes::get_report_pdf))
        .route("/api/sessions/:id/updates", post(routes::fetch_updates))
        .route("/api/sessions/:id/email", post(routes::email_report))
        .route("/api/sessions/:id/ask", post(routes::ask_question))
        // SSE logs
        .route("/api/logs", get(routes::sse_logs))
        // Static UI
        .fallback_service(serve_dir)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── main ──────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (log_tx, _) = broadcast::channel::<String>(1024);
    let log_ring = Arc::new(Mutex::new(VecDeque::with_capacity(logging::RING_CAPACITY)));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lawbrief_server=info,lawbrief_core=info,lawbrief_agent=info,lawbrief_domains=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(BroadcastLayer {
            tx: log_tx.clone(),
            ring: Arc::clone(&log_ring),
        })
        .init();

    let config = Arc::new(Config::from_env()?);
    info!(config = ?config, "configuration loaded");

    let backend: Arc<dyn CompletionBackend> = Arc::new(
        GroqBackend::new(&config.llm_base_url, &config.groq_api_key, &config.model)
            .with_timeout(config.llm_timeout_s),
    );

    let mailer: Option<Arc<dyn MailTransport>> = match config.mail() {
        Some(mail) => Some(Arc::new(SmtpMailer::new(&mail)?)),
        None => {
            warn!("SENDER_EMAIL/SENDER_PASSWORD not set, report email disabled");
            None
        },
    };

    let sink: Option<Arc<dyn UpdateSink>> = match config.sheets() {
        Some(sheets) => match GoogleSheetsSink::new(&sheets) {
            Ok(sink) => Some(Arc::new(sink)),
            Err(e) => {
                warn!("spreadsheet sink disabled: {e:#}");
                None
            },
        },
        None => {
            warn!("GOOGLE_CREDENTIALS_PATH/SHEET_ID not set, spreadsheet sink disabled");
            None
        },
    };

    let state = Arc::new(AppState {
        sessions: SessionStore::new(),
        backend,
        mailer,
        recitals: Arc::new(GdprRecitalsSource::new(&config.recitals_url)?),
        headlines: Arc::new(GdprFeedSource::new(&config.feed_url)?),
        sink,
        log_tx,
        log_ring,
        config: Arc::clone(&config),
    });

    let app = build_router(state);

    let addr = format!("{}:{}", config.web_bind, config.web_port);
    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
