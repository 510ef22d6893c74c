use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use taskbox_core::{CreateTask, UpdateTask};
use taskbox_service::{ServiceError, TaskService, UploadedFile};
use tracing::error;

use super::AppState;

// Per-request upload constraints, enforced here before the lifecycle
// controller ever sees the files. The messages are fixed so clients can
// tell an upload violation from the per-task cardinality rejection.
const MAX_FILES_PER_REQUEST: usize = 3;
const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;
const ALLOWED_MIME_TYPES: &[&str] =
    &["image/jpeg", "image/png", "image/gif", "application/pdf"];

const FILE_TYPE_MESSAGE: &str =
    "file type not allowed: only JPEG, PNG, GIF images and PDFs are accepted";
const FILE_COUNT_MESSAGE: &str = "no more than 3 files may be uploaded per request";
const FILE_SIZE_MESSAGE: &str = "uploaded files may not exceed 10 MiB";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tareas", get(list_tasks).post(create_task))
        .route(
            "/tareas/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/tareas/{id}/archivos", get(list_attachments))
        .route("/tareas/{id}/archivos/{filename}", get(download_attachment))
}

async fn list_tasks(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .service
        .list_tasks()
        .await
        .map(|t| Json(json!(t)))
        .map_err(to_error)
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .service
        .get_task(&id)
        .await
        .map(|t| Json(json!(t)))
        .map_err(to_error)
}

async fn create_task(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let form = read_form(multipart).await?;
    let input = CreateTask {
        title: form.title.unwrap_or_default(),
        description: form.description.unwrap_or_default(),
        due_at: form.due_at,
    };
    let task = state
        .service
        .create_task(&input, form.files)
        .await
        .map_err(to_error)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": task.id,
            "message": format!("task created with id {}", task.id),
        })),
    ))
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let form = read_form(multipart).await?;
    let update = UpdateTask {
        title: form.title,
        description: form.description,
        done: form.done,
        due_at: form.due_at,
        keep_attachments: form.file_names,
    };
    state
        .service
        .update_task(&id, &update, form.files)
        .await
        .map(|t| Json(json!(t)))
        .map_err(to_error)
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    state
        .service
        .delete_task(&id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(to_error)
}

async fn list_attachments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .service
        .list_attachments(&id)
        .await
        .map(|names| Json(json!(names)))
        .map_err(to_error)
}

async fn download_attachment(
    State(state): State<AppState>,
    Path((id, filename)): Path<(String, String)>,
) -> Result<Response, (StatusCode, Json<Value>)> {
    let url = state
        .service
        .download_attachment(&id, &filename)
        .await
        .map_err(to_error)?;
    Ok((StatusCode::FOUND, [(header::LOCATION, url)]).into_response())
}

// -- Multipart decoding --

#[derive(Debug, Default)]
struct TaskForm {
    title: Option<String>,
    description: Option<String>,
    done: Option<bool>,
    due_at: Option<DateTime<Utc>>,
    /// Repeated `fileNames` fields: the keep-set on update.
    file_names: Vec<String>,
    files: Vec<UploadedFile>,
}

async fn read_form(mut multipart: Multipart) -> Result<TaskForm, (StatusCode, Json<Value>)> {
    let mut form = TaskForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(&format!("malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "files" => form.files.push(read_file(field, form.files.len()).await?),
            "title" => form.title = Some(text(field).await?),
            "description" => form.description = Some(text(field).await?),
            "done" => {
                let value = text(field).await?;
                form.done = Some(value == "true" || value == "1");
            }
            "dueAt" => {
                let value = text(field).await?;
                let parsed = DateTime::parse_from_rfc3339(&value)
                    .map_err(|e| bad_request(&format!("invalid dueAt: {e}")))?;
                form.due_at = Some(parsed.with_timezone(&Utc));
            }
            "fileNames" => form.file_names.push(text(field).await?),
            _ => {}
        }
    }
    Ok(form)
}

async fn read_file(
    field: Field<'_>,
    already_received: usize,
) -> Result<UploadedFile, (StatusCode, Json<Value>)> {
    if already_received == MAX_FILES_PER_REQUEST {
        return Err(bad_request(FILE_COUNT_MESSAGE));
    }
    let name = field.file_name().unwrap_or_default().to_string();
    if name.is_empty() {
        return Err(bad_request("uploaded file is missing a filename"));
    }
    // Object keys are raw filenames; keep them flat.
    if name.contains('/') || name.contains('\\') || name == ".." {
        return Err(bad_request("invalid filename"));
    }
    let content_type = field.content_type().unwrap_or_default().to_string();
    if !ALLOWED_MIME_TYPES.contains(&content_type.as_str()) {
        return Err(bad_request(FILE_TYPE_MESSAGE));
    }
    let data = field
        .bytes()
        .await
        .map_err(|e| bad_request(&format!("read upload: {e}")))?;
    if data.len() > MAX_FILE_BYTES {
        return Err(bad_request(FILE_SIZE_MESSAGE));
    }
    Ok(UploadedFile {
        name,
        content_type,
        data,
    })
}

async fn text(field: Field<'_>) -> Result<String, (StatusCode, Json<Value>)> {
    field
        .text()
        .await
        .map_err(|e| bad_request(&format!("read field: {e}")))
}

// -- Error mapping --

fn bad_request(msg: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg })))
}

/// The only place service failures become status codes. Store detail is
/// logged server-side and never echoed to the client.
fn to_error(e: ServiceError) -> (StatusCode, Json<Value>) {
    let (status, msg) = match &e {
        ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        ServiceError::InvalidInput(_) => (StatusCode::BAD_REQUEST, e.to_string()),
        ServiceError::Internal(detail) => {
            error!("request failed: {detail}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            )
        }
    };
    (status, Json(json!({ "error": msg })))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::test_helpers::test_router;

    #[tokio::test]
    async fn list_starts_empty() {
        let app = test_router();
        let resp = app
            .oneshot(Request::builder().uri("/tareas").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let v: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(v.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_unknown_task_is_404() {
        let app = test_router();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/tareas/no-such-id")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let v: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(v["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn attachment_listing_of_unknown_task_is_404() {
        let app = test_router();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/tareas/no-such-id/archivos")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn download_from_unknown_task_is_404() {
        let app = test_router();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/tareas/no-such-id/archivos/f1.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_is_204_even_for_unknown_ids() {
        let app = test_router();
        for _ in 0..2 {
            let resp = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(Method::DELETE)
                        .uri("/tareas/no-such-id")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        }
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = test_router();
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
