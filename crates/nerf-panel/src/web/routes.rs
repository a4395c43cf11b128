use std::sync::{Mutex, MutexGuard};

use axum::extract::{Path, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::AppState;
use super::error::{ApiError, ApiResult};
use crate::error::Error;
use crate::form::FormLayout;
use crate::methods::VISUALIZERS;
use crate::supervisor::{JobState, PollOutcome};
use crate::tabs::{self, ProcessRequest, TrainForm, trainer};

const INDEX_HTML: &str = include_str!("index.html");

fn lock<T>(m: &Mutex<T>) -> ApiResult<MutexGuard<'_, T>> {
    m.lock()
        .map_err(|_| ApiError::Panel(Error::msg("tab state poisoned by an earlier panic")))
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: String,
}

impl StatusBody {
    fn new(status: String) -> Json<Self> {
        Json(Self { status })
    }
}

/// Tick result as the browser consumes it.
#[derive(Debug, Serialize)]
struct TickBody {
    status: String,
    state: JobState,
    continue_polling: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_s: Option<u64>,
}

impl From<PollOutcome> for TickBody {
    fn from(out: PollOutcome) -> Self {
        Self {
            status: out.display_text(),
            state: out.state,
            continue_polling: out.continue_polling,
            elapsed_s: out.elapsed_s,
        }
    }
}

#[derive(Debug, Serialize)]
struct FormBody<'a> {
    methods: Vec<String>,
    layout: &'a FormLayout,
}

#[derive(Debug, Deserialize)]
struct SelectMethod {
    #[serde(default)]
    method: String,
}

#[derive(Debug, Deserialize)]
struct SelectDataparser {
    #[serde(default)]
    dataparser: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PathInput {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct SubmitPath {
    path: PathInput,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/config", get(config))
        .route("/api/path/submit", post(submit_path))
        .route("/api/process/form", get(process_form))
        .route("/api/process/select", post(process_select))
        .route("/api/process/run", post(process_run))
        .route("/api/process/command", post(process_command))
        .route("/api/process/stop", post(process_stop))
        .route("/api/process/tick", post(process_tick))
        .route("/api/train/form", get(train_form))
        .route("/api/train/select", post(train_select))
        .route("/api/train/dataparser", post(train_dataparser))
        .route("/api/train/description/{method}", get(train_description))
        .route("/api/train/run", post(train_run))
        .route("/api/train/command", post(train_command))
        .route("/api/train/stop", post(train_stop))
        .route("/api/train/pause", post(train_pause))
        .route("/api/train/tick", post(train_tick))
        .route("/api/train/viewer", get(train_viewer))
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn config(State(state): State<AppState>) -> Json<Value> {
    let cfg = &state.config;
    Json(json!({
        "tabs": {
            "trainer": state.trainer.is_some(),
            "processor": state.processor.is_some(),
        },
        "tick_ms": cfg.tick_ms,
        "root_dir": cfg.root_dir,
        "run_in_new_terminal": cfg.run_in_new_terminal,
    }))
}

async fn submit_path(Json(req): Json<SubmitPath>) -> ApiResult<Json<Value>> {
    let raw = match req.path {
        PathInput::One(p) => p,
        PathInput::Many(ps) => tabs::first_selected(&ps),
    };
    let path = tabs::submit_path(&raw)?;
    Ok(Json(json!({ "path": path })))
}

// --- data processor ---

async fn process_form(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let tab = state.processor()?;
    let tab = lock(&tab)?;
    let body = FormBody {
        methods: tab.registry().names(),
        layout: tab.layout(),
    };
    Ok(Json(serde_json::to_value(&body).map_err(Error::from)?))
}

async fn process_select(
    State(state): State<AppState>,
    Json(req): Json<SelectMethod>,
) -> ApiResult<Json<Value>> {
    let tab = state.processor()?;
    let visible = lock(&tab)?.select_method(&req.method);
    Ok(Json(json!({ "visible": visible })))
}

async fn process_run(
    State(state): State<AppState>,
    Json(req): Json<ProcessRequest>,
) -> ApiResult<Json<StatusBody>> {
    let tab = state.processor()?;
    let status = lock(&tab)?.run(&req)?;
    Ok(StatusBody::new(status))
}

async fn process_command(
    State(state): State<AppState>,
    Json(req): Json<ProcessRequest>,
) -> ApiResult<Json<Value>> {
    let tab = state.processor()?;
    let command = lock(&tab)?.show_command(&req)?;
    Ok(Json(json!({ "command": command })))
}

async fn process_stop(State(state): State<AppState>) -> ApiResult<Json<StatusBody>> {
    let tab = state.processor()?;
    let status = lock(&tab)?.stop();
    Ok(StatusBody::new(status))
}

async fn process_tick(State(state): State<AppState>) -> ApiResult<Json<TickBody>> {
    let tab = state.processor()?;
    let out = lock(&tab)?.tick();
    Ok(Json(out.into()))
}

// --- trainer ---

async fn train_form(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let tab = state.trainer()?;
    let tab = lock(&tab)?;
    Ok(Json(json!({
        "methods": tab.trainers().names(),
        "dataparsers": tab.dataparser_choices(),
        "visualizers": VISUALIZERS,
        "model_layout": tab.model_layout(),
        "dataparser_layout": tab.dataparser_layout(),
        "max_num_iterations": {
            "default": trainer::DEFAULT_MAX_ITERATIONS,
            "max": trainer::MAX_ITERATIONS_LIMIT,
            "step": trainer::SLIDER_STEP,
        },
        "steps_per_save": {
            "default": trainer::DEFAULT_STEPS_PER_SAVE,
            "max": trainer::STEPS_PER_SAVE_LIMIT,
            "step": trainer::SLIDER_STEP,
        },
    })))
}

async fn train_select(
    State(state): State<AppState>,
    Json(req): Json<SelectMethod>,
) -> ApiResult<Json<Value>> {
    let tab = state.trainer()?;
    let tab = lock(&tab)?;
    let visible = tab.select_method(&req.method);
    let description = tab.description(&req.method).unwrap_or_default();
    Ok(Json(json!({ "visible": visible, "description": description })))
}

async fn train_dataparser(
    State(state): State<AppState>,
    Json(req): Json<SelectDataparser>,
) -> ApiResult<Json<Value>> {
    let tab = state.trainer()?;
    let visible = lock(&tab)?.select_dataparser(&req.dataparser);
    Ok(Json(json!({ "visible": visible })))
}

async fn train_description(
    State(state): State<AppState>,
    Path(method): Path<String>,
) -> ApiResult<Json<Value>> {
    let tab = state.trainer()?;
    let description = lock(&tab)?.description(&method)?;
    Ok(Json(json!({ "method": method, "description": description })))
}

async fn train_run(
    State(state): State<AppState>,
    Json(form): Json<TrainForm>,
) -> ApiResult<Json<StatusBody>> {
    let tab = state.trainer()?;
    let status = lock(&tab)?.run(&form)?;
    Ok(StatusBody::new(status))
}

async fn train_command(
    State(state): State<AppState>,
    Json(form): Json<TrainForm>,
) -> ApiResult<Json<Value>> {
    let tab = state.trainer()?;
    let command = lock(&tab)?.show_command(&form)?;
    Ok(Json(json!({ "command": command })))
}

async fn train_stop(State(state): State<AppState>) -> ApiResult<Json<StatusBody>> {
    let tab = state.trainer()?;
    let status = lock(&tab)?.stop();
    Ok(StatusBody::new(status))
}

async fn train_pause(State(state): State<AppState>) -> ApiResult<Json<StatusBody>> {
    let tab = state.trainer()?;
    let status = lock(&tab)?.pause()?;
    Ok(StatusBody::new(status))
}

async fn train_tick(State(state): State<AppState>) -> ApiResult<Json<TickBody>> {
    let tab = state.trainer()?;
    let out = lock(&tab)?.tick();
    Ok(Json(out.into()))
}

async fn train_viewer(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let tab = state.trainer()?;
    let url = lock(&tab)?.viewer_url()?;
    Ok(Json(json!({ "url": url })))
}
