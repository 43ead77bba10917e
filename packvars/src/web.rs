//! HTTP host for browser front ends.
//!
//! Every browser tab sends its own session id in the
//! `x-packvars-session` header and gets its own [`Editor`] with an
//! in-memory store, created on first use.
//!
//! A session lives until `DELETE /api/session` or until the server holds
//! [`AppState::with_session_limit`] sessions and a new one arrives; the
//! least recently used session is then dropped.

use std::{
    collections::{HashMap, hash_map::Entry},
    net::SocketAddr,
    sync::Arc,
};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post},
};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::{
    data::{Schema, VarState},
    editor::{Edit, EditError, Editor, Status},
    serialize::DOWNLOAD_FILE_NAME,
    source::Location,
    store::MemoryStore,
};

/// Header carrying the browser session id.
pub const SESSION_HEADER: &str = "x-packvars-session";

const DEFAULT_SESSION: &str = "default";

/// Default number of sessions kept in memory.
pub const DEFAULT_SESSION_LIMIT: usize = 64;

struct SessionSlot {
    last_used: u64,
    editor: Editor<MemoryStore>,
}

#[derive(Default)]
struct Sessions {
    slots: HashMap<String, SessionSlot>,
    clock: u64,
}

impl Sessions {
    fn evict_least_recent(&mut self) {
        let oldest = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(id, _)| id.clone());
        let Some(id) = oldest else {
            return;
        };
        if let Some(mut slot) = self.slots.remove(&id) {
            slot.editor.end_session();
            info!("Dropped idle session {id}");
        }
    }
}

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    schema: Arc<Schema>,
    example: Arc<Option<Location>>,
    sessions: Arc<Mutex<Sessions>>,
    session_limit: usize,
}

impl AppState {
    /// State serving `schema`, seeding new sessions from `example`.
    pub fn new(schema: Schema, example: Option<Location>) -> Self {
        Self {
            schema: Arc::new(schema),
            example: Arc::new(example),
            sessions: Arc::new(Mutex::new(Sessions::default())),
            session_limit: DEFAULT_SESSION_LIMIT,
        }
    }

    /// Keep at most `limit` sessions (at least one).
    pub fn with_session_limit(mut self, limit: usize) -> Self {
        self.session_limit = limit.max(1);
        self
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

#[derive(Debug, Deserialize)]
struct EditRequest {
    key: String,
    value: Option<Value>,
    text: Option<String>,
    index: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct KeyRequest {
    key: String,
}

#[derive(Debug, Serialize)]
struct EditResponse {
    preview: String,
    modified: bool,
    pending: bool,
}

#[derive(Debug, Serialize)]
struct StateResponse<'a> {
    page_name: &'a str,
    state: &'a VarState,
    defaults: &'a VarState,
    modified: Vec<&'a str>,
    preview: &'a str,
    status: Status,
}

#[derive(Debug, Serialize)]
struct SchemaResponse<'a> {
    page_name: &'a str,
    variables: Vec<VariableSummary<'a>>,
}

#[derive(Debug, Serialize)]
struct VariableSummary<'a> {
    key: &'a str,
    kind: Option<&'a str>,
    label: Option<&'a str>,
    help: Option<&'a str>,
    readonly: bool,
    choices: &'a [String],
    count: Option<usize>,
    min: Option<f64>,
    max: Option<f64>,
    step: Option<f64>,
    #[serde(rename = "previewURL")]
    preview_url: Option<&'a str>,
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/schema", get(get_schema))
        .route("/api/state", get(get_state))
        .route("/api/edit", post(post_edit))
        .route("/api/commit", post(post_commit))
        .route("/api/reset", post(post_reset))
        .route("/api/example", post(post_example))
        .route("/api/import", post(post_import))
        .route("/api/download", get(get_download))
        .route("/api/session", delete(delete_session))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API on `listen` until the process stops.
pub async fn serve(state: AppState, listen: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!("Serving packvars API on http://{listen}");
    axum::serve(listener, router(state)).await
}

fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_SESSION)
        .to_string()
}

async fn editor_for<'s>(
    sessions: &'s mut Sessions,
    app: &AppState,
    id: String,
) -> &'s mut Editor<MemoryStore> {
    sessions.clock += 1;
    let now = sessions.clock;
    if !sessions.slots.contains_key(&id) && sessions.slots.len() >= app.session_limit {
        sessions.evict_least_recent();
    }

    match sessions.slots.entry(id) {
        Entry::Occupied(entry) => {
            let slot = entry.into_mut();
            slot.last_used = now;
            &mut slot.editor
        }
        Entry::Vacant(entry) => {
            let mut editor = Editor::new((*app.schema).clone(), MemoryStore::default());
            editor.initialize(&*app.example).await;
            info!("Opened session {}", entry.key());
            &mut entry
                .insert(SessionSlot {
                    last_used: now,
                    editor,
                })
                .editor
        }
    }
}

fn state_response(editor: &Editor<MemoryStore>) -> StateResponse<'_> {
    StateResponse {
        page_name: &editor.schema().page_name,
        state: editor.state(),
        defaults: editor.defaults(),
        modified: editor.modified_keys(),
        preview: editor.preview(),
        status: editor.status(),
    }
}

fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            code: code.to_string(),
            message: message.into(),
        }),
    )
}

fn map_edit_error(err: EditError) -> ApiError {
    let (status, code) = match &err {
        EditError::UnknownKey(_) => (StatusCode::NOT_FOUND, "unknown_key"),
        EditError::ReadOnly(_) => (StatusCode::FORBIDDEN, "read_only"),
        EditError::NotAnArray(_) => (StatusCode::BAD_REQUEST, "not_an_array"),
        EditError::IndexOutOfRange { .. } => (StatusCode::BAD_REQUEST, "index_out_of_range"),
        EditError::InvalidText { .. } => (StatusCode::BAD_REQUEST, "invalid_text"),
    };
    api_error(status, code, err.to_string())
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn get_schema(State(app): State<AppState>) -> impl IntoResponse {
    let schema = app.schema.as_ref();
    let variables = schema
        .entries()
        .map(|(key, d)| VariableSummary {
            key,
            kind: d.kind.tag(),
            label: d.label.as_deref(),
            help: d.help.as_deref(),
            readonly: d.readonly,
            choices: &d.choices,
            count: d.count,
            min: d.min,
            max: d.max,
            step: d.step,
            preview_url: d.preview_url.as_deref(),
        })
        .collect();
    let body = SchemaResponse {
        page_name: &schema.page_name,
        variables,
    };
    Json(serde_json::to_value(&body).unwrap_or(Value::Null))
}

async fn get_state(State(app): State<AppState>, headers: HeaderMap) -> Json<Value> {
    let mut sessions = app.sessions.lock().await;
    let editor = editor_for(&mut sessions, &app, session_id(&headers)).await;
    Json(serde_json::to_value(state_response(editor)).unwrap_or(Value::Null))
}

async fn post_edit(
    State(app): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<EditRequest>,
) -> Result<Json<EditResponse>, ApiError> {
    let edit = match (req.index, req.text, req.value) {
        (Some(index), Some(text), _) => Edit::Element { index, text },
        (Some(index), None, Some(value)) => Edit::ElementValue { index, value },
        (None, Some(text), _) => Edit::Text(text),
        (None, None, Some(value)) => Edit::Value(value),
        (_, None, None) => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "invalid_argument",
                "edit needs either `value` or `text`",
            ));
        }
    };

    let mut sessions = app.sessions.lock().await;
    let editor = editor_for(&mut sessions, &app, session_id(&headers)).await;
    let outcome = editor.apply_edit(&req.key, edit).map_err(map_edit_error)?;
    Ok(Json(EditResponse {
        preview: outcome.preview,
        modified: outcome.modified,
        pending: outcome.pending,
    }))
}

async fn post_commit(
    State(app): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<KeyRequest>,
) -> Result<Json<EditResponse>, ApiError> {
    let mut sessions = app.sessions.lock().await;
    let editor = editor_for(&mut sessions, &app, session_id(&headers)).await;
    let outcome = editor.commit(&req.key).map_err(map_edit_error)?;
    Ok(Json(EditResponse {
        preview: outcome.preview,
        modified: outcome.modified,
        pending: outcome.pending,
    }))
}

async fn post_reset(State(app): State<AppState>, headers: HeaderMap) -> Json<Value> {
    let mut sessions = app.sessions.lock().await;
    let editor = editor_for(&mut sessions, &app, session_id(&headers)).await;
    editor.reset();
    Json(serde_json::to_value(state_response(editor)).unwrap_or(Value::Null))
}

async fn post_example(State(app): State<AppState>, headers: HeaderMap) -> Json<Value> {
    let mut sessions = app.sessions.lock().await;
    let editor = editor_for(&mut sessions, &app, session_id(&headers)).await;
    editor.load_example(&*app.example).await;
    Json(serde_json::to_value(state_response(editor)).unwrap_or(Value::Null))
}

async fn post_import(
    State(app): State<AppState>,
    headers: HeaderMap,
    Json(doc): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let mut sessions = app.sessions.lock().await;
    let editor = editor_for(&mut sessions, &app, session_id(&headers)).await;
    editor
        .import_document(&doc)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, "invalid_document", e.to_string()))?;
    Ok(Json(
        serde_json::to_value(state_response(editor)).unwrap_or(Value::Null),
    ))
}

async fn get_download(State(app): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let mut sessions = app.sessions.lock().await;
    let editor = editor_for(&mut sessions, &app, session_id(&headers)).await;
    let disposition = format!("attachment; filename=\"{DOWNLOAD_FILE_NAME}\"");
    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json; charset=utf-8"),
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response_headers.insert(header::CONTENT_DISPOSITION, value);
    }
    (response_headers, editor.download_bytes())
}

async fn delete_session(State(app): State<AppState>, headers: HeaderMap) -> StatusCode {
    let mut sessions = app.sessions.lock().await;
    if let Some(mut slot) = sessions.slots.remove(&session_id(&headers)) {
        slot.editor.end_session();
    }
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn app() -> AppState {
        AppState::new(
            Schema::from_value(&json!({
                "variables": {
                    "n": {"type": "number"},
                    "pos": {"type": "number_array", "count": 2},
                    "locked": {"type": "string", "readonly": true}
                }
            })),
            None,
        )
    }

    async fn edit(
        app: &AppState,
        id: &str,
        key: &str,
        value: Option<Value>,
        text: Option<&str>,
        index: Option<usize>,
    ) -> Result<EditResponse, ApiError> {
        let req = EditRequest {
            key: key.into(),
            value,
            text: text.map(str::to_string),
            index,
        };
        post_edit(State(app.clone()), headers(id), Json(req))
            .await
            .map(|Json(resp)| resp)
    }

    async fn state_of(app: &AppState, id: &str) -> Value {
        let Json(body) = get_state(State(app.clone()), headers(id)).await;
        body
    }

    fn headers(id: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(SESSION_HEADER, HeaderValue::from_str(id).unwrap());
        h
    }

    #[test]
    fn session_id_defaults() {
        assert_eq!(session_id(&HeaderMap::new()), DEFAULT_SESSION);
        assert_eq!(session_id(&headers("tab-1")), "tab-1");
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let app = app();
        let req = EditRequest {
            key: "n".into(),
            value: Some(json!(3)),
            text: None,
            index: None,
        };
        let Json(resp) = post_edit(State(app.clone()), headers("a"), Json(req))
            .await
            .unwrap();
        assert!(resp.modified);

        let Json(a) = get_state(State(app.clone()), headers("a")).await;
        let Json(b) = get_state(State(app.clone()), headers("b")).await;
        assert_eq!(a["state"]["n"], json!(3));
        assert_eq!(b["state"]["n"], json!(0));
        assert_eq!(b["status"], json!("type_defaults"));
    }

    #[tokio::test]
    async fn readonly_edit_is_forbidden() {
        let app = app();
        let req = EditRequest {
            key: "locked".into(),
            value: Some(json!("x")),
            text: None,
            index: None,
        };
        let err = post_edit(State(app), headers("a"), Json(req))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn blank_text_snaps_to_default_on_commit() {
        let app = app();
        edit(&app, "a", "n", Some(json!(4)), None, None).await.unwrap();

        let resp = edit(&app, "a", "n", None, Some(""), None).await.unwrap();
        assert!(resp.pending);
        assert_eq!(state_of(&app, "a").await["state"]["n"], json!(4));

        let req = KeyRequest { key: "n".into() };
        let Json(resp) = post_commit(State(app.clone()), headers("a"), Json(req))
            .await
            .unwrap();
        assert!(!resp.pending);
        assert!(!resp.modified);
        assert_eq!(state_of(&app, "a").await["state"]["n"], json!(0));
    }

    #[tokio::test]
    async fn element_text_edit_and_bounds() {
        let app = app();
        let resp = edit(&app, "a", "pos", None, Some("5"), Some(1)).await.unwrap();
        assert!(resp.modified);
        assert!(resp.preview.contains("\"pos\": [0, 5]"));

        let err = edit(&app, "a", "pos", None, Some("1"), Some(2)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert_eq!(err.1.code, "index_out_of_range");

        let err = edit(&app, "a", "pos", Some(json!(1)), None, Some(usize::MAX))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert_eq!(state_of(&app, "a").await["state"]["pos"], json!([0, 5]));
    }

    #[tokio::test]
    async fn import_replaces_state_and_rejects_non_objects() {
        let app = app();
        let Json(body) = post_import(
            State(app.clone()),
            headers("a"),
            Json(json!({"n": 7, "stray": true})),
        )
        .await
        .unwrap();
        assert_eq!(body["status"], json!("imported"));
        assert_eq!(body["state"], json!({"n": 7, "pos": [0, 0], "locked": ""}));

        let err = post_import(State(app.clone()), headers("a"), Json(json!([1, 2])))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert_eq!(state_of(&app, "a").await["state"]["n"], json!(7));
    }

    #[tokio::test]
    async fn download_is_an_attachment() {
        let app = app();
        edit(&app, "a", "n", Some(json!(2)), None, None).await.unwrap();

        let response = get_download(State(app.clone()), headers("a"))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"_global_variables.json\""
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.ends_with("}\n"));
        assert!(text.contains("\"n\": 2"));
    }

    #[tokio::test]
    async fn reset_restores_last_state_of_the_session() {
        let app = app();
        edit(&app, "a", "n", Some(json!(3)), None, None).await.unwrap();

        let Json(body) = post_reset(State(app.clone()), headers("a")).await;
        assert_eq!(body["status"], json!("restored"));
        assert_eq!(body["state"]["n"], json!(3));
        assert_eq!(body["modified"], json!(["n"]));
    }

    #[tokio::test]
    async fn deleted_session_is_recreated_fresh() {
        let app = app();
        edit(&app, "a", "n", Some(json!(3)), None, None).await.unwrap();

        let status = delete_session(State(app.clone()), headers("a")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(app.sessions.lock().await.slots.is_empty());

        let body = state_of(&app, "a").await;
        assert_eq!(body["state"]["n"], json!(0));
        assert_eq!(body["status"], json!("type_defaults"));
    }

    #[tokio::test]
    async fn least_recently_used_session_is_dropped_at_limit() {
        let app = app().with_session_limit(2);
        edit(&app, "a", "n", Some(json!(1)), None, None).await.unwrap();
        edit(&app, "b", "n", Some(json!(2)), None, None).await.unwrap();
        state_of(&app, "a").await;
        state_of(&app, "c").await;

        {
            let sessions = app.sessions.lock().await;
            assert_eq!(sessions.slots.len(), 2);
            assert!(sessions.slots.contains_key("a"));
            assert!(sessions.slots.contains_key("c"));
        }
        assert_eq!(state_of(&app, "a").await["state"]["n"], json!(1));
        assert_eq!(state_of(&app, "b").await["state"]["n"], json!(0));
    }
}
