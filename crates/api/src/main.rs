mod pages;
mod visitors;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use raithu_core::advisor::Advisor;
use raithu_core::domain::contract::LlmMarketRecommendation;
use raithu_core::domain::query::{ImagePayload, MarketQuery, Unit, MAX_IMAGE_BYTES};
use raithu_core::domain::recommendation::GroundingSource;
use raithu_core::render::{self, FailureNotice, RecommendationCard};
use raithu_core::session::View;

use crate::visitors::{VisitorStore, MAX_VISITORS};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = raithu_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let advisor = match Advisor::from_settings(&settings) {
        Ok(advisor) => advisor,
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %format!("{e:#}"), "cannot start without model credentials");
            return Err(e);
        }
    };
    tracing::info!(speech = settings.speech_enabled, "advisor ready");

    let state = AppState {
        advisor: Arc::new(advisor),
        visitors: Arc::new(VisitorStore::new(MAX_VISITORS)),
    };

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(index))
        .route("/advice", post(submit_advice))
        .route("/chat", post(submit_chat))
        .route("/api/advice", post(api_advice))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

/// Each browser gets its own session; submissions within one session run one at a time.
#[derive(Clone)]
struct AppState {
    advisor: Arc<Advisor>,
    visitors: Arc<VisitorStore>,
}

#[derive(Debug, Deserialize)]
struct ViewParams {
    view: Option<String>,
}

async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ViewParams>,
) -> Response {
    let (id, visitor) = state.visitors.visitor(visitors::session_id(&headers)).await;
    let mut visitor = visitor.lock().await;
    if let Some(raw) = params.view.as_deref() {
        match raw.parse::<View>() {
            Ok(view) => visitor.session.view = view,
            Err(e) => tracing::debug!(error = %e, "ignoring view parameter"),
        }
    }
    let audio = visitor.pending_audio.take();
    let page = pages::page(&visitor.session, audio.as_ref(), None);
    with_cookie(id, Html(page))
}

fn with_cookie(id: uuid::Uuid, response: impl IntoResponse) -> Response {
    ([(header::SET_COOKIE, visitors::set_cookie(id))], response).into_response()
}

/// Raw multipart fields before validation. The form page sends the structured
/// fields; the chat box sends `message`. Both may carry `image`.
#[derive(Debug, Default)]
struct AdviceForm {
    crop: Option<String>,
    location: Option<String>,
    quantity: Option<String>,
    unit: Option<String>,
    message: Option<String>,
    image_type: Option<String>,
    image: Vec<u8>,
}

impl AdviceForm {
    async fn read(mut multipart: Multipart) -> anyhow::Result<Self> {
        let mut form = AdviceForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "image" => {
                    form.image_type = field.content_type().map(str::to_string);
                    form.image = field.bytes().await?.to_vec();
                }
                "crop" => form.crop = Some(field.text().await?),
                "location" => form.location = Some(field.text().await?),
                "quantity" => form.quantity = Some(field.text().await?),
                "unit" => form.unit = Some(field.text().await?),
                "message" => form.message = Some(field.text().await?),
                other => tracing::debug!(field = other, "ignoring unknown form field"),
            }
        }
        Ok(form)
    }

    /// An empty file input arrives as an empty part and means "no image".
    fn take_image(&mut self) -> anyhow::Result<Option<ImagePayload>> {
        let bytes = std::mem::take(&mut self.image);
        if bytes.is_empty() {
            return Ok(None);
        }
        ImagePayload::new(self.image_type.as_deref(), bytes).map(Some)
    }

    fn into_query(mut self) -> anyhow::Result<MarketQuery> {
        let image = self.take_image()?;
        AdviceRequest {
            crop: required(self.crop, "crop")?,
            location: required(self.location, "location")?,
            quantity: required(self.quantity, "quantity")?
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("quantity must be a whole number"))?,
            unit: self.unit.filter(|u| !u.trim().is_empty()),
        }
        .into_query(image)
    }
}

fn required(value: Option<String>, name: &str) -> anyhow::Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => anyhow::bail!("{name} is required"),
    }
}

/// Re-renders `view` with a validation message and status 400.
async fn rejected(
    state: &AppState,
    headers: &HeaderMap,
    view: View,
    err: anyhow::Error,
) -> Response {
    let message = format!("{err:#}");
    tracing::info!(error = %message, "rejected submission");
    let (id, visitor) = state.visitors.visitor(visitors::session_id(headers)).await;
    let mut visitor = visitor.lock().await;
    visitor.session.view = view;
    let page = pages::page(&visitor.session, None, Some(&message));
    with_cookie(id, (StatusCode::BAD_REQUEST, Html(page)))
}

/// Result pages are reached by redirect so a reload does not repeat the model call.
fn show_chat(id: uuid::Uuid) -> Response {
    with_cookie(id, Redirect::to("/?view=chat"))
}

async fn submit_advice(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let query = match AdviceForm::read(multipart).await.and_then(AdviceForm::into_query) {
        Ok(query) => query,
        Err(e) => return rejected(&state, &headers, View::Form, e).await,
    };

    let (id, visitor) = state.visitors.visitor(visitors::session_id(&headers)).await;
    let mut visitor = visitor.lock().await;
    let interaction = state.advisor.respond(&mut visitor.session, query).await;
    visitor.pending_audio = interaction.audio;
    show_chat(id)
}

async fn submit_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let parsed = AdviceForm::read(multipart)
        .await
        .and_then(|mut form| Ok((form.message.take().unwrap_or_default(), form.take_image()?)));
    let (message, image) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => return rejected(&state, &headers, View::Chat, e).await,
    };

    let (id, visitor) = state.visitors.visitor(visitors::session_id(&headers)).await;
    if message.trim().is_empty() && image.is_none() {
        return show_chat(id);
    }

    let mut visitor = visitor.lock().await;
    let visitor = &mut *visitor;
    let interaction = state
        .advisor
        .respond_to_chat(&mut visitor.session, &message, image)
        .await;
    visitor.pending_audio = interaction.and_then(|i| i.audio);
    show_chat(id)
}

#[derive(Debug, Deserialize)]
struct AdviceRequest {
    crop: String,
    quantity: u32,
    unit: Option<String>,
    location: String,
}

impl AdviceRequest {
    fn into_query(self, image: Option<ImagePayload>) -> anyhow::Result<MarketQuery> {
        let unit = match self.unit.as_deref() {
            Some(u) => u.parse()?,
            None => Unit::Quintal,
        };
        MarketQuery::new(
            self.crop.parse()?,
            self.quantity,
            unit,
            self.location.parse()?,
            image,
        )
    }
}

#[derive(Debug, Serialize)]
struct ApiAdvice {
    recommendation: LlmMarketRecommendation,
    sources: Vec<GroundingSource>,
    card: RecommendationCard,
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
}

#[derive(Debug, Serialize)]
struct ApiFailure {
    error: FailureNotice,
}

async fn api_advice(State(state): State<AppState>, Json(req): Json<AdviceRequest>) -> Response {
    let query = match req.into_query(None) {
        Ok(query) => query,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiError {
                    error: format!("{e:#}"),
                }),
            )
                .into_response();
        }
    };

    match state.advisor.advise(&query).await {
        Some(analysis) => {
            let card = render::render_card(&analysis.recommendation, &analysis.sources, &query);
            Json(ApiAdvice {
                recommendation: LlmMarketRecommendation::from(&analysis.recommendation),
                sources: analysis.sources,
                card,
            })
            .into_response()
        }
        None => (
            StatusCode::BAD_GATEWAY,
            Json(ApiFailure {
                error: FailureNotice::default(),
            }),
        )
            .into_response(),
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &raithu_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use raithu_core::domain::query::{Crop, Location};

    fn form() -> AdviceForm {
        AdviceForm {
            crop: Some("Tomato".to_string()),
            location: Some("Warangal".to_string()),
            quantity: Some("10".to_string()),
            unit: Some("KG".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn form_builds_query() {
        let query = form().into_query().unwrap();
        assert_eq!(query.crop(), Crop::Tomato);
        assert_eq!(query.location(), Location::Warangal);
        assert_eq!(query.quantity(), 10);
        assert_eq!(query.unit(), Unit::Kilogram);
        assert!(query.image().is_none());
    }

    #[test]
    fn form_rejects_bad_quantity() {
        for q in ["0", "-3", "ten", ""] {
            let mut f = form();
            f.quantity = Some(q.to_string());
            assert!(f.into_query().is_err(), "{q:?} accepted");
        }
    }

    #[test]
    fn form_requires_crop_and_location() {
        let mut f = form();
        f.crop = None;
        assert!(f.into_query().is_err());

        let mut f = form();
        f.location = Some("  ".to_string());
        assert!(f.into_query().is_err());
    }

    #[test]
    fn form_accepts_png_and_rejects_other_images() {
        let mut f = form();
        f.image = b"\x89PNG\r\n\x1a\n0000".to_vec();
        let query = f.into_query().unwrap();
        assert!(query.image().is_some());

        let mut f = form();
        f.image_type = Some("image/gif".to_string());
        f.image = b"GIF89a".to_vec();
        assert!(f.into_query().is_err());
    }

    #[test]
    fn api_request_defaults_unit() {
        let req: AdviceRequest = serde_json::from_str(
            r#"{"crop":"Cotton","quantity":20,"location":"Nizamabad"}"#,
        )
        .unwrap();
        let query = req.into_query(None).unwrap();
        assert_eq!(query.unit(), Unit::Quintal);
    }

    #[test]
    fn empty_file_part_means_no_image() {
        let mut f = form();
        f.image_type = Some("application/octet-stream".to_string());
        assert!(f.take_image().unwrap().is_none());
        assert!(f.into_query().unwrap().image().is_none());
    }

    #[test]
    fn chat_message_is_kept_apart_from_form_fields() {
        let mut f = AdviceForm {
            message: Some("Price for 10 KG of Tomato in Warangal".to_string()),
            image: vec![0xFF, 0xD8, 0xFF, 0xE0],
            ..Default::default()
        };
        let image = f.take_image().unwrap().unwrap();
        assert_eq!(image.media_type().mime(), "image/jpeg");
        assert!(f.image.is_empty());
        assert!(f.into_query().is_err());
    }

    #[test]
    fn results_are_served_by_redirect() {
        let id = uuid::Uuid::new_v4();
        let res = show_chat(id);
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/?view=chat");
        let cookie = res.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.contains(&id.to_string()));
    }
}
