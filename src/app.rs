use axum::{
    Json, Router,
    body::Body,
    extract::{Multipart, State},
    http::header,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::codec::{self, Row};
use crate::error::UploadError;
use crate::export;
use crate::pipeline::{self, TokenRecord};
use crate::store::DocumentStore;

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Shared server state: the store client plus the single upload session.
pub struct AppState<S> {
    store: S,
    session: Mutex<Session>,
    uploading: AtomicBool,
}

impl<S> AppState<S> {
    pub fn new(store: S) -> Self {
        AppState {
            store,
            session: Mutex::new(Session::default()),
            uploading: AtomicBool::new(false),
        }
    }
}

/// The state behind the page: decoded rows, tokens from the last successful
/// run, and whatever should currently be shown to the user. Selecting a new
/// file replaces the whole thing.
#[derive(Default)]
struct Session {
    rows: Vec<Row>,
    tokens: Vec<TokenRecord>,
    warnings: Vec<String>,
    success: Option<String>,
}

#[derive(Deserialize)]
struct UploadRequest {
    collection: String,
    base_url: String,
}

#[derive(Serialize)]
struct FileResponse {
    rows: usize,
    preview: Vec<Row>,
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct WarningsResponse {
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct StateResponse {
    rows: usize,
    tokens: usize,
    uploading: bool,
    warnings: Vec<String>,
    success: Option<String>,
}

/// Build the application router around an already-constructed state.
pub fn router<S: DocumentStore + 'static>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/", get(serve_page))
        .route("/api/file", post(load_file::<S>))
        .route("/api/upload", post(upload::<S>))
        .route("/api/state", get(get_state::<S>))
        .nest_service("/static", ServeDir::new("static"))
        .with_state(state)
}

/// Run the server until killed.
pub async fn run<S: DocumentStore + 'static>(
    store: S,
    bind_addr: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::new(store));
    let app = router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    info!("listening on http://{bind_addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_page() -> Html<&'static str> {
    Html(include_str!("./static/upload.html"))
}

/// Accept a new spreadsheet. This unconditionally resets the session:
/// tokens, warnings and success state from any earlier run are dropped
/// before the new rows are shown.
async fn load_file<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
    mut multipart: Multipart,
) -> Json<FileResponse> {
    let mut file_data = Vec::new();

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("spreadsheet") {
            file_data = field.bytes().await.unwrap_or_default().to_vec();
        }
    }

    let mut session = state.session.lock().unwrap();
    *session = Session::default();

    if file_data.is_empty() {
        session.warnings.push("No file data received".to_string());
        return Json(FileResponse {
            rows: 0,
            preview: Vec::new(),
            warnings: session.warnings.clone(),
        });
    }

    match codec::decode(&file_data) {
        Ok(rows) if !rows.is_empty() => {
            session.rows = rows;
        }
        Ok(_) => {
            session
                .warnings
                .push("Spreadsheet file is empty or unreadable".to_string());
        }
        Err(err) => {
            // A parse failure renders exactly like an empty file; the
            // detail goes to the log.
            warn!("spreadsheet decode failed: {err}");
            session
                .warnings
                .push("Spreadsheet file is empty or unreadable".to_string());
        }
    }

    Json(FileResponse {
        rows: session.rows.len(),
        preview: session.rows.clone(),
        warnings: session.warnings.clone(),
    })
}

/// Run the upload pipeline over the current session rows. At most one run
/// is active at a time; the busy flag is released on every exit path.
async fn upload<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(request): Json<UploadRequest>,
) -> Response {
    if state.uploading.swap(true, Ordering::SeqCst) {
        return record_warning(&state, "An upload is already in progress".to_string());
    }

    let response = run_upload(&state, &request).await;
    state.uploading.store(false, Ordering::SeqCst);
    response
}

async fn run_upload<S: DocumentStore>(
    state: &AppState<S>,
    request: &UploadRequest,
) -> Response {
    let rows = {
        let mut session = state.session.lock().unwrap();
        session.tokens.clear();
        session.warnings.clear();
        session.success = None;
        session.rows.clone()
    };

    let tokens = match pipeline::run(
        &state.store,
        &request.collection,
        &request.base_url,
        &rows,
    )
    .await
    {
        Ok(tokens) => tokens,
        Err(err) => return failed_upload(state, err),
    };

    let collection = request.collection.trim().to_string();
    let bytes = match export::to_xlsx(&rows, &tokens, &request.base_url) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("export encode failed after upload: {err}");
            return record_warning(state, format!("Upload failed: {err}"));
        }
    };

    let success = format!(
        "Uploaded {} records to \"{}\" successfully!",
        tokens.len(),
        collection
    );
    info!("{success}");

    {
        let mut session = state.session.lock().unwrap();
        session.tokens = tokens;
        session.success = Some(success);
    }

    download_response(bytes, &export::filename(&collection))
}

fn failed_upload<S>(state: &AppState<S>, err: UploadError) -> Response {
    let message = match err {
        UploadError::Validation(message) => message.to_string(),
        UploadError::Store(err) => format!("Upload failed: {err}"),
    };
    record_warning(state, message)
}

fn record_warning<S>(state: &AppState<S>, message: String) -> Response {
    let mut session = state.session.lock().unwrap();
    session.warnings.push(message);
    warnings_response(session.warnings.clone())
}

fn warnings_response(warnings: Vec<String>) -> Response {
    Json(WarningsResponse { warnings }).into_response()
}

fn download_response(bytes: Vec<u8>, filename: &str) -> Response {
    let disposition = format!("attachment; filename=\"{filename}\"");

    match Response::builder()
        .header(header::CONTENT_TYPE, XLSX_CONTENT_TYPE)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from(bytes))
    {
        Ok(response) => response,
        Err(err) => {
            // Collection names with characters illegal in headers end here.
            warn!("could not build download response: {err}");
            warnings_response(vec![format!("Upload failed: {err}")])
        }
    }
}

async fn get_state<S: DocumentStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<StateResponse> {
    let session = state.session.lock().unwrap();
    Json(StateResponse {
        rows: session.rows.len(),
        tokens: session.tokens.len(),
        uploading: state.uploading.load(Ordering::SeqCst),
        warnings: session.warnings.clone(),
        success: session.success.clone(),
    })
}
