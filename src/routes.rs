use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::diagnosis::Diagnoser;
use crate::error::{AppError, DiagnosisError};
use crate::intake;
use crate::render::render_page;
use crate::state::{Controller, Snapshot};

#[derive(Clone)]
pub struct AppState {
    controller: Arc<Mutex<Controller>>,
    diagnoser: Arc<dyn Diagnoser>,
}

impl AppState {
    pub fn new(diagnoser: Arc<dyn Diagnoser>) -> Self {
        Self {
            controller: Arc::new(Mutex::new(Controller::new())),
            diagnoser,
        }
    }

    fn controller(&self) -> MutexGuard<'_, Controller> {
        self.controller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.controller().snapshot()
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload_image))
        .route("/analyze", post(analyze))
        .route("/preview", get(preview))
        .route("/api/state", get(current_state))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_page(&state.snapshot()))
}

async fn current_state(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.snapshot())
}

async fn preview(State(state): State<AppState>) -> Response {
    match state.controller().image() {
        Some(image) => (
            [(header::CONTENT_TYPE, image.mime_type.clone())],
            image.bytes.clone(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

struct UploadedPart {
    file_name: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

async fn next_image_part(
    multipart: &mut Multipart,
) -> Result<Option<UploadedPart>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_none() && field.name() != Some("image") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?;
        return Ok(Some(UploadedPart {
            file_name,
            content_type,
            data,
        }));
    }
    Ok(None)
}

async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    let busy = state.controller().is_analyzing();
    if busy {
        tracing::debug!("Upload ignored: a request is in flight");
        return Ok(Redirect::to("/"));
    }

    let outcome = match next_image_part(&mut multipart).await {
        Ok(Some(part)) => {
            // An untouched file input still submits an empty, unnamed part.
            if part.data.is_empty() && part.file_name.as_deref().map_or(true, str::is_empty) {
                tracing::debug!("Upload submitted without a file");
                return Ok(Redirect::to("/"));
            }
            intake::select_file(
                part.file_name.as_deref(),
                part.content_type.as_deref(),
                part.data.to_vec(),
            )
        }
        Ok(None) => return Err(AppError::MissingFile),
        Err(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => Err(
            DiagnosisError::Encoding("the file is larger than the upload limit".to_string()),
        ),
        Err(err) => Err(DiagnosisError::Encoding(err.body_text())),
    };

    let mut controller = state.controller();
    let applied = match outcome {
        Ok(image) => controller.select_file(image),
        Err(err) => controller.fail_selection(&err),
    };
    if let Err(rejected) = applied {
        tracing::debug!(?rejected, "Upload not applied");
    }
    Ok(Redirect::to("/"))
}

async fn analyze(State(state): State<AppState>) -> Redirect {
    let ticket = match state.controller().begin_analysis() {
        Ok(ticket) => ticket,
        Err(rejected) => {
            tracing::debug!(?rejected, "Analyze trigger not started");
            return Redirect::to("/");
        }
    };

    let diagnoser = Arc::clone(&state.diagnoser);
    tokio::spawn(async move {
        let outcome = diagnoser
            .analyze(ticket.image.encoded_payload(), &ticket.image.mime_type)
            .await;
        state.controller().complete(&ticket, outcome);
    });

    Redirect::to("/")
}
