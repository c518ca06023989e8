use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Extension, Router,
};
use tower_http::trace::TraceLayer;

use crate::{controllers, session::load_session, AppState};

/// Limite per gli upload delle foto
const MAX_PHOTO_SIZE: usize = 10 * 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/:conversation_id/sendMessage", post(controllers::send_message))
        .route(
            "/:conversation_id/sendImage",
            post(controllers::send_image).layer(DefaultBodyLimit::max(MAX_PHOTO_SIZE)),
        )
        .route("/:conversation_id/removeMessage", post(controllers::remove_message))
        .route("/signout", post(controllers::signout))
        .route("/login", post(controllers::login))
        .route("/signup", post(controllers::signup))
        // la sessione serve solo alle rotte sopra, /health non tocca il backend
        .route_layer(middleware::from_fn(load_session))
        .route("/health", get(controllers::health))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}
