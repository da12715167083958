use crate::{
    app::{errors::AppError, App},
    bookmarks::{Bookmark, BookmarkCreate, BookmarkStatus, BookmarkUpdate, ListQuery, OrderUpdate},
    collections::{Collection, CollectionCreate, CollectionUpdate},
    company::{CompanyBookmark, CompanyBookmarkInput, CompanyBookmarkView},
    metadata::MetadataResult,
    tags::{Tag, TagCreate, TagUpdate},
};
use axum::{
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Query, Request, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

/// Header set by the authentication layer in front of this service
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
struct SharedState {
    app: Arc<App>,
}

pub fn router(app: Arc<App>) -> Router {
    let shared_state = Arc::new(SharedState { app });

    Router::new()
        .route("/bookmarks", get(list).post(create))
        .route("/bookmarks/interrogate-url", post(interrogate_url))
        .route("/bookmarks/reorder", post(reorder))
        .route("/bookmarks/company", get(company_list))
        .route("/bookmarks/company/:id/favorite", post(company_toggle_favorite))
        .route("/bookmarks/:id", put(update).delete(delete))
        .route("/bookmarks/:id/archive", post(archive))
        .route("/bookmarks/:id/unarchive", post(unarchive))
        .route("/bookmarks/:id/trash", post(trash))
        .route("/bookmarks/:id/restore", post(restore))
        .route("/collections", get(collection_list).post(collection_create))
        .route(
            "/collections/:id",
            put(collection_update).delete(collection_delete),
        )
        .route("/tags", get(tag_list).post(tag_create))
        .route("/tags/:id", put(tag_update).delete(tag_delete))
        .route("/admin/interrogate-url", post(interrogate_url))
        .route(
            "/admin/company-bookmarks",
            get(admin_company_list).put(admin_company_update),
        )
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                log::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutting down");
}

async fn start_app(app: App, listen: String) -> anyhow::Result<()> {
    let router = router(Arc::new(app));

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    log::info!("listening on {listen}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon(app: App, listen: String) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(app, listen))
}

// Make our own error that wraps `AppError`.
#[derive(Debug)]
pub struct HttpError(AppError);

// Tell axum how to convert `AppError` into a response.
impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match &self.0 {
            AppError::NotFound => (StatusCode::NOT_FOUND, json!({"error": self.0.to_string()})),
            AppError::Forbidden => (StatusCode::FORBIDDEN, json!({"error": self.0.to_string()})),
            AppError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, json!({"error": self.0.to_string()}))
            }
            AppError::Validation(message) => {
                (StatusCode::UNPROCESSABLE_ENTITY, json!({"error": message}))
            }
            AppError::Resolve(err) => {
                // provider or network detail never reaches the client
                log::warn!("{err}");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({"error": "Could not fetch URL info"}),
                )
            }
            AppError::IO(_) | AppError::Csv(_) | AppError::Other(_) => {
                log::error!("{:?}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "internal server error"}),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

// This enables using `?` on functions that return `Result<_, AppError>`.
impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// `Json` whose rejection is a 422 in our error shape instead of axum's plain text
#[derive(Debug, Clone, Copy, Default)]
pub struct AppJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => {
                log::debug!("rejected request body: {}", rejection.body_text());

                let message = match rejection {
                    JsonRejection::MissingJsonContentType(_) => "The request body must be JSON.",
                    _ => "The request body is invalid.",
                };
                Err(HttpError(AppError::Validation(message.into())))
            }
        }
    }
}

/// The acting user, as asserted by the authentication layer
#[derive(Debug, Clone, Copy)]
pub struct Owner(pub u64);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Owner)
            .ok_or(HttpError(AppError::Unauthorized))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterrogateRequest {
    #[serde(default)]
    pub url: Option<String>,
}

async fn interrogate_url(
    State(state): State<Arc<SharedState>>,
    AppJson(payload): AppJson<InterrogateRequest>,
) -> Result<Json<MetadataResult>, HttpError> {
    log::debug!("payload: {payload:?}");

    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        app.interrogate_url(payload.url.as_deref())
            .map(Into::into)
            .map_err(Into::into)
    })
}

async fn list(
    State(state): State<Arc<SharedState>>,
    Owner(owner): Owner,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Bookmark>>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        app.bookmarks()
            .list(owner, query)
            .map(Into::into)
            .map_err(Into::into)
    })
}

async fn create(
    State(state): State<Arc<SharedState>>,
    Owner(owner): Owner,
    AppJson(payload): AppJson<BookmarkCreate>,
) -> Result<(StatusCode, Json<Bookmark>), HttpError> {
    log::debug!("payload: {payload:?}");

    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let bmark = app.create_bookmark(owner, payload)?;
        Ok((StatusCode::CREATED, bmark.into()))
    })
}

async fn update(
    State(state): State<Arc<SharedState>>,
    Owner(owner): Owner,
    Path(id): Path<u64>,
    AppJson(payload): AppJson<BookmarkUpdate>,
) -> Result<Json<Bookmark>, HttpError> {
    log::debug!("payload: {payload:?}");

    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        app.update_bookmark(owner, id, payload)
            .map(Into::into)
            .map_err(Into::into)
    })
}

async fn delete(
    State(state): State<Arc<SharedState>>,
    Owner(owner): Owner,
    Path(id): Path<u64>,
) -> Result<StatusCode, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        app.bookmarks().delete(owner, id)?;
        Ok(StatusCode::NO_CONTENT)
    })
}

fn transition(
    state: Arc<SharedState>,
    owner: u64,
    id: u64,
    status: BookmarkStatus,
) -> Result<Json<Bookmark>, HttpError> {
    tokio::task::block_in_place(move || {
        state
            .app
            .bookmarks()
            .set_status(owner, id, status)
            .map(Into::into)
            .map_err(Into::into)
    })
}

async fn archive(
    State(state): State<Arc<SharedState>>,
    Owner(owner): Owner,
    Path(id): Path<u64>,
) -> Result<Json<Bookmark>, HttpError> {
    transition(state, owner, id, BookmarkStatus::Archived)
}

async fn unarchive(
    State(state): State<Arc<SharedState>>,
    Owner(owner): Owner,
    Path(id): Path<u64>,
) -> Result<Json<Bookmark>, HttpError> {
    transition(state, owner, id, BookmarkStatus::Active)
}

async fn trash(
    State(state): State<Arc<SharedState>>,
    Owner(owner): Owner,
    Path(id): Path<u64>,
) -> Result<Json<Bookmark>, HttpError> {
    transition(state, owner, id, BookmarkStatus::Trashed)
}

async fn restore(
    State(state): State<Arc<SharedState>>,
    Owner(owner): Owner,
    Path(id): Path<u64>,
) -> Result<Json<Bookmark>, HttpError> {
    transition(state, owner, id, BookmarkStatus::Active)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReorderRequest {
    #[serde(default)]
    pub updates: Vec<OrderUpdate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderResponse {
    pub updated: usize,
}

async fn reorder(
    State(state): State<Arc<SharedState>>,
    Owner(owner): Owner,
    AppJson(payload): AppJson<ReorderRequest>,
) -> Result<Json<ReorderResponse>, HttpError> {
    log::debug!("payload: {payload:?}");

    if payload.updates.is_empty() {
        return Err(AppError::Validation("The updates field is required.".into()).into());
    }

    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        app.bookmarks()
            .reorder(owner, payload.updates)
            .map(|updated| ReorderResponse { updated }.into())
            .map_err(Into::into)
    })
}

async fn collection_list(
    State(state): State<Arc<SharedState>>,
    Owner(owner): Owner,
) -> Json<Vec<Collection>> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || app.collections().list(owner).into())
}

async fn collection_create(
    State(state): State<Arc<SharedState>>,
    Owner(owner): Owner,
    AppJson(payload): AppJson<CollectionCreate>,
) -> Result<(StatusCode, Json<Collection>), HttpError> {
    log::debug!("payload: {payload:?}");

    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let collection = app.collections().create(owner, payload)?;
        Ok((StatusCode::CREATED, collection.into()))
    })
}

async fn collection_update(
    State(state): State<Arc<SharedState>>,
    Owner(owner): Owner,
    Path(id): Path<u64>,
    AppJson(payload): AppJson<CollectionUpdate>,
) -> Result<Json<Collection>, HttpError> {
    log::debug!("payload: {payload:?}");

    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        app.collections()
            .update(owner, id, payload)
            .map(Into::into)
            .map_err(Into::into)
    })
}

async fn collection_delete(
    State(state): State<Arc<SharedState>>,
    Owner(owner): Owner,
    Path(id): Path<u64>,
) -> Result<StatusCode, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        app.delete_collection(owner, id)?;
        Ok(StatusCode::NO_CONTENT)
    })
}

async fn tag_list(
    State(state): State<Arc<SharedState>>,
    Owner(owner): Owner,
) -> Json<Vec<Tag>> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || app.tags().list(owner).into())
}

async fn tag_create(
    State(state): State<Arc<SharedState>>,
    Owner(owner): Owner,
    AppJson(payload): AppJson<TagCreate>,
) -> Result<(StatusCode, Json<Tag>), HttpError> {
    log::debug!("payload: {payload:?}");

    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        let tag = app.tags().create(owner, payload)?;
        Ok((StatusCode::CREATED, tag.into()))
    })
}

async fn tag_update(
    State(state): State<Arc<SharedState>>,
    Owner(owner): Owner,
    Path(id): Path<u64>,
    AppJson(payload): AppJson<TagUpdate>,
) -> Result<Json<Tag>, HttpError> {
    log::debug!("payload: {payload:?}");

    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        app.tags()
            .update(owner, id, payload)
            .map(Into::into)
            .map_err(Into::into)
    })
}

async fn tag_delete(
    State(state): State<Arc<SharedState>>,
    Owner(owner): Owner,
    Path(id): Path<u64>,
) -> Result<StatusCode, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        app.delete_tag(owner, id)?;
        Ok(StatusCode::NO_CONTENT)
    })
}

async fn company_list(
    State(state): State<Arc<SharedState>>,
    Owner(owner): Owner,
) -> Json<Vec<CompanyBookmarkView>> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || app.company().list_for(owner).into())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteResponse {
    pub is_favorite: bool,
}

async fn company_toggle_favorite(
    State(state): State<Arc<SharedState>>,
    Owner(owner): Owner,
    Path(id): Path<u64>,
) -> Result<Json<FavoriteResponse>, HttpError> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        app.company()
            .toggle_favorite(owner, id)
            .map(|is_favorite| FavoriteResponse { is_favorite }.into())
            .map_err(Into::into)
    })
}

async fn admin_company_list(
    State(state): State<Arc<SharedState>>,
) -> Json<Vec<CompanyBookmark>> {
    let app = state.app.clone();

    tokio::task::block_in_place(move || app.company().list().into())
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompanyBookmarksRequest {
    pub bookmarks: Vec<CompanyBookmarkInput>,
}

async fn admin_company_update(
    State(state): State<Arc<SharedState>>,
    AppJson(payload): AppJson<CompanyBookmarksRequest>,
) -> Result<Json<Vec<CompanyBookmark>>, HttpError> {
    log::debug!("payload: {payload:?}");

    let app = state.app.clone();

    tokio::task::block_in_place(move || {
        app.company()
            .replace_all(payload.bookmarks)
            .map(Into::into)
            .map_err(Into::into)
    })
}
