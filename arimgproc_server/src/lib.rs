//! HTTP routes over the arimgproc core. Every route processes the same
//! decoded source image with fixed parameters and answers with the result
//! encoded in the source's format.

use arimgproc_rust::colconv::{grayscale, yuv_round_trip};
use arimgproc_rust::exam::{greenscale, zoom};
use arimgproc_rust::{resample, segment, Interpolation, ProcessError, Region, SegmentParams, SourceImage, RED};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use image::RgbaImage;
use log::{info, warn};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

pub mod routes {
    use arimgproc_rust::RED;

    pub const UPSCALE_FACTOR: f64 = 2.0;
    pub const DOWNSCALE_FACTOR: f64 = 0.5;
    pub const NEAREST_FACTOR: f64 = 2.0;
    pub const ZOOM_FACTOR: f64 = 2.0;

    pub const SEGMENT_K: usize = 6;
    pub const SEGMENT_PRESCALE: Option<f64> = Some(0.5);
    pub const COARSE_K: usize = 3;
    pub const FINE_K: usize = 15;
    pub const FINE_PRESCALE: Option<f64> = Some(0.5);
    pub const BOUNDARY_K: usize = 5;
    pub const BOUNDARY_COLOR: [u8; 3] = RED;
}

/// The decoded source image and where it was loaded from. Immutable once
/// built; a reload swaps in a whole new context.
#[derive(Debug)]
pub struct ImageContext {
    pub path: PathBuf,
    pub source: SourceImage,
}

impl ImageContext {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProcessError> {
        let path = path.as_ref().to_path_buf();
        let source = SourceImage::load(&path)?;
        Ok(Self { path, source })
    }
}

#[derive(Clone)]
pub struct AppState {
    context: Arc<RwLock<Arc<ImageContext>>>,
    threads: usize,
}

impl AppState {
    pub fn new(context: ImageContext, threads: usize) -> Self {
        Self { context: Arc::new(RwLock::new(Arc::new(context))), threads: threads.max(1) }
    }

    /// The current context. Requests keep their snapshot even if a reload
    /// lands while they run.
    pub fn snapshot(&self) -> Arc<ImageContext> { self.context.read().clone() }

    /// Re-read the image from disk. The current context is only replaced if
    /// loading succeeds.
    pub fn reload(&self) -> Result<Arc<ImageContext>, ProcessError> {
        let path = self.snapshot().path.clone();
        let fresh = Arc::new(ImageContext::load(path)?);
        *self.context.write() = fresh.clone();
        Ok(fresh)
    }

    fn segment_params(&self, k: usize, prescale: Option<f64>, highlight: Option<[u8; 3]>) -> SegmentParams {
        let mut params = SegmentParams::new(k);
        params.config.num_threads = self.threads;
        params.prescale = prescale;
        params.highlight = highlight;
        params
    }
}

#[derive(Debug)]
pub enum AppError {
    Process(ProcessError),
    Join(tokio::task::JoinError),
}

impl From<ProcessError> for AppError {
    fn from(e: ProcessError) -> Self { Self::Process(e) }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self { Self::Join(e) }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            Self::Process(e) if e.is_invalid_input() => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Process(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::Join(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("processing task failed: {e}")),
        };
        warn!("request failed: {}", msg);
        (status, msg).into_response()
    }
}

/// Run `f` on the current source image off the async executor and encode
/// the result like the source.
async fn render<F>(state: &AppState, route: &'static str, f: F) -> Result<Response, AppError>
where
    F: FnOnce(&RgbaImage) -> Result<RgbaImage, ProcessError> + Send + 'static,
{
    let ctx = state.snapshot();
    let t = Instant::now();
    let (bytes, content_type) = tokio::task::spawn_blocking(move || {
        let out = f(&ctx.source.image)?;
        let bytes = ctx.source.encode(&out)?;
        Ok::<_, ProcessError>((bytes, ctx.source.content_type()))
    })
    .await??;
    info!("{} rendered in {:?} ({} bytes)", route, t.elapsed(), bytes.len());
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn original(State(state): State<AppState>) -> Result<Response, AppError> {
    render(&state, "/original", |img| Ok(img.clone())).await
}

pub async fn gray(State(state): State<AppState>) -> Result<Response, AppError> {
    render(&state, "/gray", |img| Ok(grayscale(img))).await
}

pub async fn yuv(State(state): State<AppState>) -> Result<Response, AppError> {
    render(&state, "/yuv", |img| Ok(yuv_round_trip(img))).await
}

pub async fn green(State(state): State<AppState>) -> Result<Response, AppError> {
    render(&state, "/greenscale", |img| Ok(greenscale(img))).await
}

pub async fn zoom_quarter(State(state): State<AppState>) -> Result<Response, AppError> {
    render(&state, "/zoom", |img| {
        zoom(img, Region::new(0, 0, img.width() / 2, img.height() / 2), routes::ZOOM_FACTOR)
    })
    .await
}

pub async fn upscale(State(state): State<AppState>) -> Result<Response, AppError> {
    render(&state, "/upscale", |img| resample(img, routes::UPSCALE_FACTOR, Interpolation::Bilinear)).await
}

pub async fn downscale(State(state): State<AppState>) -> Result<Response, AppError> {
    render(&state, "/downscale", |img| resample(img, routes::DOWNSCALE_FACTOR, Interpolation::Bilinear)).await
}

pub async fn nearest(State(state): State<AppState>) -> Result<Response, AppError> {
    render(&state, "/nearest", |img| resample(img, routes::NEAREST_FACTOR, Interpolation::NearestNeighbor)).await
}

pub async fn segment_default(State(state): State<AppState>) -> Result<Response, AppError> {
    let params = state.segment_params(routes::SEGMENT_K, routes::SEGMENT_PRESCALE, None);
    render(&state, "/segment", move |img| Ok(segment(img, &params)?.image)).await
}

pub async fn segment_coarse(State(state): State<AppState>) -> Result<Response, AppError> {
    let params = state.segment_params(routes::COARSE_K, None, None);
    render(&state, "/segment/coarse", move |img| Ok(segment(img, &params)?.image)).await
}

pub async fn segment_fine(State(state): State<AppState>) -> Result<Response, AppError> {
    let params = state.segment_params(routes::FINE_K, routes::FINE_PRESCALE, None);
    render(&state, "/segment/fine", move |img| Ok(segment(img, &params)?.image)).await
}

pub async fn segment_boundaries(State(state): State<AppState>) -> Result<Response, AppError> {
    let params = state.segment_params(routes::BOUNDARY_K, None, Some(routes::BOUNDARY_COLOR));
    render(&state, "/segment/boundaries", move |img| Ok(segment(img, &params)?.image)).await
}

pub async fn reload(State(state): State<AppState>) -> Result<String, AppError> {
    let reloader = state.clone();
    let ctx = tokio::task::spawn_blocking(move || reloader.reload()).await??;
    info!("Reloaded {}", ctx.path.display());
    Ok(format!("reloaded {}x{}\n", ctx.source.width(), ctx.source.height()))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/original", get(original))
        .route("/gray", get(gray))
        .route("/yuv", get(yuv))
        .route("/greenscale", get(green))
        .route("/zoom", get(zoom_quarter))
        .route("/upscale", get(upscale))
        .route("/downscale", get(downscale))
        .route("/nearest", get(nearest))
        .route("/segment", get(segment_default))
        .route("/segment/coarse", get(segment_coarse))
        .route("/segment/fine", get(segment_fine))
        .route("/segment/boundaries", get(segment_boundaries))
        .route("/reload", post(reload))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};

    fn state() -> AppState {
        let image = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        let ctx = ImageContext {
            path: PathBuf::from("unused.png"),
            source: SourceImage { image, format: ImageFormat::Png },
        };
        AppState::new(ctx, 0)
    }

    #[test]
    fn threads_are_at_least_one() {
        assert_eq!(state().threads, 1);
    }

    #[test]
    fn invalid_input_maps_to_bad_request() {
        let resp = AppError::from(ProcessError::InvalidScaleFactor(-1.0)).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp = AppError::from(ProcessError::WorkerPanicked).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn failed_reload_keeps_the_old_context() {
        let state = state();
        assert!(state.reload().is_err());
        assert_eq!(state.snapshot().source.width(), 4);
    }
}
