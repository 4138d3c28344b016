//! JSON API for the shop grid, the assistant tool contract and the session.
//!
//! - `GET    /api/catalog?category=&search=`  browse grid
//! - `GET    /api/cart`                       cart snapshot
//! - `POST   /api/cart/items`                 add `{itemId, quantity?}`
//! - `PUT    /api/cart/items/{item_id}`       set `{quantity}`
//! - `DELETE /api/cart/items/{item_id}`       remove a line
//! - `DELETE /api/cart`                       clear
//! - `GET    /api/tools`                      tool signatures
//! - `POST   /api/tools/{name}`               invoke a tool with a JSON input
//! - `POST   /api/chat`                       one assistant turn `{message}`
//! - `POST   /api/session/visit`              record a surface visit `{surface}`
//! - `POST   /api/checkout`                   stop the timer and score the cart
//! - `POST   /api/session/reset`              start over
//!
//! Bodies and path ids are decoded by hand so every rejection renders as [`ErrorBody`].

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use epicerie_agent::conversation::{ChatMessage, Conversation};
use epicerie_agent::runtime::AssistantRuntime;
use epicerie_agent::tools::{tool_specs, ToolCall, ToolError, ToolSettings, ToolSpec};
use epicerie_core::cart::{CartEngine, CartSummary};
use epicerie_core::catalog::ALL_CATEGORIES;
use epicerie_core::domain::product::{CatalogItem, ItemId};
use epicerie_core::errors::{ApplicationError, DomainError, InterfaceError};
use epicerie_core::session::{SessionState, Surface};
use epicerie_core::storefront::{CheckoutSummary, VisitOutcome};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bootstrap::SharedStorefront;

/// The assistant runtime plus the single conversation it drives.
#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<AssistantRuntime>,
    conversation: Arc<Mutex<Conversation>>,
}

impl ChatState {
    pub fn new(runtime: Arc<AssistantRuntime>) -> Self {
        Self { runtime, conversation: Arc::new(Mutex::new(Conversation::new())) }
    }
}

#[derive(Clone)]
pub struct ApiState {
    storefront: SharedStorefront,
    tool_settings: ToolSettings,
    chat: Option<ChatState>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogParams {
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub categories: Vec<String>,
    pub products: Vec<CatalogItem>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    #[serde(flatten)]
    pub summary: CartSummary,
    pub total_quantity: u64,
}

impl CartResponse {
    fn from_cart(cart: &CartEngine) -> Self {
        Self { summary: cart.summary(), total_quantity: cart.total_quantity() }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddItemRequest {
    pub item_id: u32,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct VisitRequest {
    pub surface: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: ChatMessage,
    pub cart: CartResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub tool: String,
    pub mutates_cart: bool,
    pub output: Value,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub session: SessionState,
    pub cart: CartResponse,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub correlation_id: String,
}

/// HTTP rendering of an [`InterfaceError`].
#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl From<InterfaceError> for ApiError {
    fn from(value: InterfaceError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            InterfaceError::BadRequest { .. } => (StatusCode::BAD_REQUEST, "bad_request"),
            InterfaceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            InterfaceError::ServiceUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
            InterfaceError::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        let message = match &self.0 {
            InterfaceError::BadRequest { .. }
            | InterfaceError::NotFound { .. }
            | InterfaceError::ServiceUnavailable { .. } => self.0.message().to_string(),
            InterfaceError::Internal { .. } => self.0.user_message().to_string(),
        };
        let body = ErrorBody {
            error: code,
            message,
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// `assistant` is optional; without it `POST /api/chat` answers 503.
pub fn router(
    storefront: SharedStorefront,
    tool_settings: ToolSettings,
    assistant: Option<Arc<AssistantRuntime>>,
) -> Router {
    Router::new()
        .route("/api/catalog", get(browse_catalog))
        .route("/api/cart", get(get_cart).delete(clear_cart))
        .route("/api/cart/items", post(add_cart_item))
        .route("/api/cart/items/{item_id}", put(update_cart_item).delete(remove_cart_item))
        .route("/api/tools", get(list_tools))
        .route("/api/tools/{name}", post(invoke_tool))
        .route("/api/chat", post(chat))
        .route("/api/session/visit", post(visit_surface))
        .route("/api/session/reset", post(reset_session))
        .route("/api/checkout", post(checkout))
        .with_state(ApiState { storefront, tool_settings, chat: assistant.map(ChatState::new) })
}

async fn browse_catalog(
    State(state): State<ApiState>,
    Query(params): Query<CatalogParams>,
) -> Json<CatalogResponse> {
    let storefront = state.storefront.lock().await;
    let catalog = storefront.catalog();
    let products = catalog
        .browse(params.category.as_deref(), params.search.as_deref())
        .into_iter()
        .cloned()
        .collect::<Vec<_>>();

    let mut categories = vec![ALL_CATEGORIES.to_string()];
    categories.extend(catalog.categories());

    Json(CatalogResponse { categories, total: products.len(), products })
}

async fn get_cart(State(state): State<ApiState>) -> Json<CartResponse> {
    let storefront = state.storefront.lock().await;
    Json(CartResponse::from_cart(storefront.cart()))
}

async fn add_cart_item(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<CartResponse>, ApiError> {
    let correlation_id = correlation_id();
    let request = decode_body::<AddItemRequest>(&body, &correlation_id)?;
    let item_id = positive_item_id(request.item_id, &correlation_id)?;

    let mut storefront = state.storefront.lock().await;
    storefront.cart_mut().add_item(item_id, request.quantity);
    Ok(Json(CartResponse::from_cart(storefront.cart())))
}

async fn update_cart_item(
    State(state): State<ApiState>,
    Path(raw_item_id): Path<String>,
    body: Bytes,
) -> Result<Json<CartResponse>, ApiError> {
    let correlation_id = correlation_id();
    let item_id = parse_item_id(&raw_item_id, &correlation_id)?;
    let request = decode_body::<UpdateQuantityRequest>(&body, &correlation_id)?;

    let mut storefront = state.storefront.lock().await;
    storefront.cart_mut().update_quantity(item_id, request.quantity);
    Ok(Json(CartResponse::from_cart(storefront.cart())))
}

async fn remove_cart_item(
    State(state): State<ApiState>,
    Path(raw_item_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let item_id = parse_item_id(&raw_item_id, &correlation_id())?;
    let mut storefront = state.storefront.lock().await;
    storefront.cart_mut().remove_item(item_id);
    Ok(Json(CartResponse::from_cart(storefront.cart())))
}

async fn clear_cart(State(state): State<ApiState>) -> Json<CartResponse> {
    let mut storefront = state.storefront.lock().await;
    storefront.cart_mut().clear();
    Json(CartResponse::from_cart(storefront.cart()))
}

async fn list_tools() -> Json<Vec<ToolSpec>> {
    Json(tool_specs())
}

async fn invoke_tool(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<ToolResponse>, ApiError> {
    let correlation_id = correlation_id();
    let input = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        decode_body::<Value>(&body, &correlation_id)?
    };

    let call = ToolCall::parse(&name, input).map_err(|error| {
        warn!(
            event_name = "api.tool.rejected",
            correlation_id = %correlation_id,
            tool = %name,
            error = %error,
            "tool call rejected"
        );
        tool_error(error, &correlation_id)
    })?;

    let mutates_cart = call.name().mutates_cart();
    let mut storefront = state.storefront.lock().await;
    let output = call.execute(storefront.cart_mut(), &state.tool_settings);
    info!(
        event_name = "api.tool.executed",
        correlation_id = %correlation_id,
        tool = %name,
        mutates_cart,
        "tool call executed"
    );

    Ok(Json(ToolResponse { tool: name, mutates_cart, output: output.to_value() }))
}

async fn chat(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<ChatResponse>, ApiError> {
    let correlation_id = correlation_id();
    let Some(chat) = state.chat.clone() else {
        return Err(ApplicationError::AssistantUnavailable.into_interface(correlation_id).into());
    };

    let request = decode_body::<ChatRequest>(&body, &correlation_id)?;
    let message = request.message.trim();
    if message.is_empty() {
        return Err(invariant_violation("message must not be empty", &correlation_id));
    }

    let mut storefront = state.storefront.lock().await;
    let mut conversation = chat.conversation.lock().await;
    let reply =
        chat.runtime.handle_user_message(storefront.cart_mut(), &mut conversation, message).await;
    info!(
        event_name = "api.chat.replied",
        correlation_id = %correlation_id,
        tool_results = reply.tool_results().count(),
        "assistant turn completed"
    );

    Ok(Json(ChatResponse { reply, cart: CartResponse::from_cart(storefront.cart()) }))
}

async fn visit_surface(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<VisitOutcome>, ApiError> {
    let correlation_id = correlation_id();
    let request = decode_body::<VisitRequest>(&body, &correlation_id)?;
    let surface = request.surface.parse::<Surface>().map_err(|error| {
        ApiError::from(ApplicationError::from(error).into_interface(&correlation_id))
    })?;

    let mut storefront = state.storefront.lock().await;
    let outcome = storefront.visit(surface);
    info!(
        event_name = "session.visit",
        correlation_id = %correlation_id,
        surface = ?outcome.surface,
        elapsed = %outcome.elapsed,
        "surface visited"
    );
    Ok(Json(outcome))
}

async fn checkout(State(state): State<ApiState>) -> Json<CheckoutSummary> {
    let mut storefront = state.storefront.lock().await;
    let summary = storefront.checkout();
    info!(
        event_name = "session.checkout",
        completed_in = %summary.completed_in,
        percentage = summary.score.percentage,
        grade = %summary.score.grade,
        "checkout completed"
    );
    Json(summary)
}

/// Start over also forgets the assistant conversation.
async fn reset_session(State(state): State<ApiState>) -> Json<ResetResponse> {
    let mut storefront = state.storefront.lock().await;
    storefront.start_over();
    if let Some(chat) = &state.chat {
        chat.conversation.lock().await.clear();
    }
    info!(event_name = "session.reset", "storefront reset");
    Json(ResetResponse {
        session: storefront.session().state(),
        cart: CartResponse::from_cart(storefront.cart()),
    })
}

fn decode_body<T: DeserializeOwned>(body: &Bytes, correlation_id: &str) -> Result<T, ApiError> {
    serde_json::from_slice::<T>(body).map_err(|error| {
        ApiError(InterfaceError::bad_request(format!("invalid JSON body: {error}"), correlation_id))
    })
}

fn parse_item_id(raw: &str, correlation_id: &str) -> Result<ItemId, ApiError> {
    match raw.parse::<u32>() {
        Ok(item_id) => positive_item_id(item_id, correlation_id),
        Err(_) => Err(invariant_violation(
            &format!("itemId must be a positive integer, got `{raw}`"),
            correlation_id,
        )),
    }
}

fn positive_item_id(raw: u32, correlation_id: &str) -> Result<ItemId, ApiError> {
    if raw == 0 {
        return Err(invariant_violation("itemId must be a positive integer", correlation_id));
    }
    Ok(ItemId(raw))
}

fn invariant_violation(message: &str, correlation_id: &str) -> ApiError {
    let error = DomainError::InvariantViolation(message.to_string());
    ApiError(ApplicationError::from(error).into_interface(correlation_id))
}

fn tool_error(error: ToolError, correlation_id: &str) -> ApiError {
    let interface = match error {
        ToolError::UnknownTool(_) => InterfaceError::not_found(error.to_string(), correlation_id),
        ToolError::MalformedInput { .. } => {
            InterfaceError::bad_request(error.to_string(), correlation_id)
        }
    };
    ApiError(interface)
}

fn default_quantity() -> i64 {
    1
}

fn correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}
