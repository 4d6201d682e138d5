//! Main [axum::Router] for the web UI and JSON API.

use axum::{
    extract::{DefaultBodyLimit, Multipart},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::app::pipeline::{run_fit_bytes, run_fit_columns};
use crate::domain::FitFile;
use crate::error::AppError;
use crate::io::export::{fitted_workbook, DEFAULT_DOWNLOAD_NAME, XLSX_MIME};
use crate::io::fit_json::build_fit_file;
use crate::io::ingest::load_columns_from_bytes;
use crate::plot::{render_data_svg, render_fit_svg};
use crate::server::form::{FitForm, FormAction, Upload};
use crate::server::page::{render_page, FitView, Message, PageView, MSG_UPLOAD_PROMPT};

/// Chart size in the page (pixels).
const CHART_WIDTH: u32 = 760;
const CHART_HEIGHT: u32 = 480;

/// Router configuration.
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Request body limit for uploads.
    pub max_upload_bytes: usize,
}

/// Setup main router for application.
pub fn setup_app_router(config: RouterConfig) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/fit", post(fit_page))
        .route("/api/fit", post(api_fit))
        .route("/api/fit/xlsx", post(api_fit_xlsx))
        .route("/healthcheck", get(healthcheck))
        .fallback(notfound_404)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}

async fn index() -> Html<String> {
    let view = PageView {
        messages: vec![Message::info(MSG_UPLOAD_PROMPT)],
        ..PageView::default()
    };
    Html(render_page(&FitForm::default(), &view))
}

/// Form submission: always answers with the page, errors shown inline.
async fn fit_page(multipart: Multipart) -> Response {
    let form = match FitForm::from_multipart(multipart).await {
        Ok(form) => form,
        Err(err) => {
            let view = PageView {
                messages: vec![Message::error(err.message())],
                ..PageView::default()
            };
            return (StatusCode::BAD_REQUEST, Html(render_page(&FitForm::default(), &view))).into_response();
        }
    };

    let outcome = tokio::task::spawn_blocking(move || {
        let view = build_page_view(&form);
        (form, view)
    })
    .await;

    match outcome {
        Ok((form, view)) => Html(render_page(&form, &view)).into_response(),
        Err(e) => AppError::new(4, format!("Fit task failed: {e}")).into_response(),
    }
}

/// Read, plot and (optionally) fit the uploaded data for the HTML page.
fn build_page_view(form: &FitForm) -> PageView {
    let mut view = PageView::default();

    let Some(upload) = &form.upload else {
        view.messages.push(Message::info(MSG_UPLOAD_PROMPT));
        return view;
    };

    let columns = match load_columns_from_bytes(&upload.name, &upload.bytes, &form.read_options()) {
        Ok(columns) => columns,
        Err(err) => {
            tracing::info!(upload = %upload.name, error = %err, "upload rejected");
            view.messages.push(Message::error(err.message()));
            return view;
        }
    };

    let data_chart = |view: &mut PageView| match render_data_svg(&columns.t, &columns.y, CHART_WIDTH, CHART_HEIGHT) {
        Ok(svg) => view.chart = Some(svg),
        Err(err) => view.messages.push(Message::error(err.message())),
    };

    if form.action == FormAction::Preview {
        data_chart(&mut view);
        return view;
    }

    let fitted = form
        .fit_config()
        .and_then(|config| run_fit_columns(upload.name.clone(), columns.clone(), &config))
        .and_then(|run| {
            let svg = render_fit_svg(&run.result, CHART_WIDTH, CHART_HEIGHT)?;
            let workbook = fitted_workbook(&run.result)?;
            Ok((svg, FitView::new(&run.result, workbook)))
        });

    match fitted {
        Ok((svg, fit)) => {
            view.chart = Some(svg);
            view.fit = Some(fit);
        }
        Err(err) => {
            tracing::info!(upload = %upload.name, error = %err, "fit failed");
            view.messages.push(Message::error(format!("Fit failed: {err}")));
            data_chart(&mut view);
        }
    }

    view
}

/// JSON API: fit an upload and return the fit document.
async fn api_fit(multipart: Multipart) -> Result<Json<FitFile>, AppError> {
    let (form, upload) = form_with_upload(multipart).await?;
    let fit = run_blocking(move || {
        let run = run_fit_bytes(&upload.name, &upload.bytes, &form.read_options(), &form.fit_config()?)?;
        Ok(build_fit_file(&run.result, &run.source))
    })
    .await?;
    Ok(Json(fit))
}

/// JSON API: fit an upload and return the fitted workbook.
async fn api_fit_xlsx(multipart: Multipart) -> Result<Response, AppError> {
    let (form, upload) = form_with_upload(multipart).await?;
    let bytes = run_blocking(move || {
        let run = run_fit_bytes(&upload.name, &upload.bytes, &form.read_options(), &form.fit_config()?)?;
        fitted_workbook(&run.result)
    })
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DEFAULT_DOWNLOAD_NAME}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn form_with_upload(multipart: Multipart) -> Result<(FitForm, Upload), AppError> {
    let mut form = FitForm::from_multipart(multipart).await?;
    let upload = form
        .upload
        .take()
        .ok_or_else(|| AppError::new(2, "No file uploaded: send the data as multipart field 'file'."))?;
    Ok((form, upload))
}

/// Run CPU-bound work off the async executor.
async fn run_blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::new(4, format!("Fit task failed: {e}")))?
}

/// GET handler for checking service health.
async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn notfound_404() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": 404, "error": "Route not found" })),
    )
}
