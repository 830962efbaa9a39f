use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

use super::{
    handlers,
    middleware::{auth_middleware, socket_auth_middleware},
    websocket::handle_websocket,
};
use crate::AppState;

pub fn create_router(state: AppState) -> Router<AppState> {
    // Public auth routes
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/new-verification", post(handlers::auth::new_verification));

    // Protected auth routes
    let auth_protected = Router::new()
        .route("/logout", post(handlers::auth::logout))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let user_routes = Router::new()
        .route(
            "/me",
            get(handlers::users::get_current_user).put(handlers::users::update_current_user),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Conversation requests and their messages
    let chat_routes = Router::new()
        .route("/pending", get(handlers::chats::list_pending))
        .route("/approved", get(handlers::chats::list_approved))
        .route("/refused", get(handlers::chats::list_refused))
        .route("/:id/status", post(handlers::chats::update_status))
        .route(
            "/:id/messages",
            get(handlers::messages::get_messages).post(handlers::messages::send_message),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let room_routes = Router::new()
        .route(
            "/",
            get(handlers::rooms::list_rooms).post(handlers::rooms::create_room),
        )
        .route("/catalog", get(handlers::rooms::get_catalog))
        .route(
            "/:id",
            get(handlers::rooms::get_room)
                .put(handlers::rooms::update_room)
                .delete(handlers::rooms::delete_room),
        )
        .route("/:id/status", post(handlers::rooms::set_room_status))
        .route(
            "/:id/media",
            post(handlers::rooms::upload_media)
                .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes)),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let hiring_routes = Router::new()
        .route("/", get(handlers::hirings::list_hirings))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let dashboard_routes = Router::new()
        .route("/stats", get(handlers::dashboard::get_stats))
        .route("/month-summary", get(handlers::dashboard::get_month_summary))
        .route("/week-summary", get(handlers::dashboard::get_week_summary))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let geocode_routes = Router::new()
        .route("/reverse", get(handlers::geocode::reverse))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // WebSocket route (protected; the only one taking `?token=`)
    let ws_route = Router::new()
        .route("/ws", get(handle_websocket))
        .layer(middleware::from_fn_with_state(state.clone(), socket_auth_middleware));

    Router::new()
        .nest("/auth", auth_routes.merge(auth_protected))
        .nest("/users", user_routes)
        .nest("/chats", chat_routes)
        .nest("/rooms", room_routes)
        .nest("/hirings", hiring_routes)
        .nest("/dashboard", dashboard_routes)
        .nest("/geocode", geocode_routes)
        .merge(ws_route)
        .with_state(state)
}
