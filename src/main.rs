//! Quiz Arena Back binary entrypoint wiring REST, SSE, and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quiz_arena_back::{
    config::AppConfig,
    dao::{MemoryStore, QuizStore, models::QuestionEntity, storage::StorageError},
    services::{sse_events, storage_supervisor},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    let question_bank_path = env::var("QUESTION_BANK_PATH").ok();
    tokio::spawn(storage_supervisor::run(app_state.clone(), move || {
        connect_memory_store(question_bank_path.clone())
    }));
    tokio::spawn(watch_degraded(app_state.clone()));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Build the in-process store, seeding the question bank from disk when a
/// path is configured.
async fn connect_memory_store(
    question_bank_path: Option<String>,
) -> Result<Arc<dyn QuizStore>, StorageError> {
    let store = MemoryStore::new();

    if let Some(path) = question_bank_path {
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| StorageError::unavailable_with(format!("reading {path}"), err))?;
        let questions: Vec<QuestionEntity> = serde_json::from_str(&raw)
            .map_err(|err| StorageError::unavailable_with(format!("parsing {path}"), err))?;
        info!(path, count = questions.len(), "seeding question bank");
        store.insert_questions(questions).await?;
    } else {
        warn!("QUESTION_BANK_PATH not set; question bank starts empty");
    }

    Ok(Arc::new(store))
}

/// Forward degraded-mode flips onto the event stream.
async fn watch_degraded(state: SharedState) {
    let mut watcher = state.degraded_watcher();
    while watcher.changed().await.is_ok() {
        let degraded = *watcher.borrow_and_update();
        sse_events::broadcast_system_status(&state, degraded);
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    quiz_arena_back::routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
