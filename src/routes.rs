use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    routing::{delete, get, patch, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::handlers::{applications, auth, payments, scholarships, system, users};
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.security);

    Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .merge(auth_routes())
        .merge(user_routes())
        .merge(scholarship_routes())
        .merge(application_routes())
        .merge(payment_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    tracing::info_span!(
                        "request",
                        id = %Uuid::new_v4(),
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                }))
                .layer(cors),
        )
        .with_state(state)
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/jwt", post(auth::issue_token))
        .route("/logOut", get(auth::logout))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(users::list_users))
        .route("/users/role/:email", get(users::get_role))
        .route("/users/:email", post(users::upsert_user))
        .route("/update-role/:id", patch(users::update_role))
        .route("/users/delete/:id", delete(users::delete_user))
}

fn scholarship_routes() -> Router<AppState> {
    Router::new()
        .route("/scholarship", post(scholarships::create).get(scholarships::list))
        .route("/scholarship/:id", get(scholarships::get))
        .route("/scholarship/update/:id", put(scholarships::update))
        .route("/delete/scholarship/:id", delete(scholarships::delete))
}

fn application_routes() -> Router<AppState> {
    Router::new()
        .route("/applied-scholarship", post(applications::apply))
        // GET takes the user's email, DELETE the application id
        .route(
            "/applied-scholarship/:id",
            get(applications::applied_scholarships).delete(applications::cancel),
        )
}

fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/enroll/payments", post(payments::record_payment))
        .route("/api/create-payment-intent", post(payments::create_payment_intent))
}

/// Credentialed CORS for the configured browser origins.
fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
