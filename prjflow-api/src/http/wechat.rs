//! WeChat authorization URLs and provider callbacks

use axum::{
    extract::{Query, RawQuery, State},
    response::Html,
    Json,
};
use prjflow_core::{
    callback::{AuthorizationGrant, CallbackQuery, CallbackRoute},
    models::UserId,
};
use serde::Deserialize;

use super::{middleware::AuthUser, AppResult, AppState};

/// Optional client-chosen ticket; one is generated when absent
#[derive(Debug, Default, Deserialize)]
pub struct TicketQuery {
    pub ticket: Option<String>,
}

async fn grant(
    state: &AppState,
    route: CallbackRoute,
    query: TicketQuery,
    acting_user: Option<UserId>,
) -> AppResult<Json<AuthorizationGrant>> {
    let grant = state
        .orchestrator
        .build_authorization_url(route, query.ticket.as_deref(), acting_user)
        .await?;
    Ok(Json(grant))
}

pub async fn init_qrcode(
    State(state): State<AppState>,
    Query(query): Query<TicketQuery>,
) -> AppResult<Json<AuthorizationGrant>> {
    grant(&state, CallbackRoute::Init, query, None).await
}

pub async fn login_qrcode(
    State(state): State<AppState>,
    Query(query): Query<TicketQuery>,
) -> AppResult<Json<AuthorizationGrant>> {
    grant(&state, CallbackRoute::Login, query, None).await
}

pub async fn bind_qrcode(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<TicketQuery>,
) -> AppResult<Json<AuthorizationGrant>> {
    grant(&state, CallbackRoute::Bind, query, Some(auth.user_id)).await
}

pub async fn add_user_qrcode(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<TicketQuery>,
) -> AppResult<Json<AuthorizationGrant>> {
    grant(&state, CallbackRoute::AddUser, query, Some(auth.user_id)).await
}

// Callbacks always answer with a page; failures are rendered, not returned.
// The raw query is parsed leniently; a repeated key keeps its first value.

pub async fn init_callback(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Html<String> {
    let query = CallbackQuery::from_query_string(raw.as_deref().unwrap_or_default());
    Html(state.orchestrator.handle_callback(CallbackRoute::Init, &query).await)
}

pub async fn login_callback(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Html<String> {
    let query = CallbackQuery::from_query_string(raw.as_deref().unwrap_or_default());
    Html(state.orchestrator.handle_callback(CallbackRoute::Login, &query).await)
}

pub async fn bind_callback(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Html<String> {
    let query = CallbackQuery::from_query_string(raw.as_deref().unwrap_or_default());
    Html(state.orchestrator.handle_callback(CallbackRoute::Bind, &query).await)
}

pub async fn add_user_callback(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Html<String> {
    let query = CallbackQuery::from_query_string(raw.as_deref().unwrap_or_default());
    Html(state.orchestrator.handle_callback(CallbackRoute::AddUser, &query).await)
}
