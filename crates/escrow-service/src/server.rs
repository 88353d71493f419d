//! HTTP server for the escrow API.
//!
//! This module wires the escrow state machine to its HTTP surface: one
//! route per transition operation plus snapshot and list reads. Handlers
//! parse the acting identity from headers (authentication itself happens
//! upstream), call the corresponding `EscrowService` operation, and map
//! typed rejections onto machine-readable 4xx/5xx responses. A response is
//! only sent after the storage write behind the transition has succeeded.

use axum::{
	extract::{Path, Query, State},
	http::{HeaderMap, StatusCode},
	response::Json,
	routing::{get, post},
	Router,
};
use escrow_config::ApiConfig;
use escrow_core::EscrowService;
use escrow_types::{
	Actor, ActorRole, ApiError, ApproveWorkRequest, CreateOrderRequest, Order, OrderListQuery,
	RequestRevisionRequest, ResolveDisputeRequest, SubmitWorkRequest,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

/// Header carrying the pre-authenticated actor id.
const ACTOR_ID_HEADER: &str = "x-actor-id";
/// Header carrying the pre-authenticated actor role.
const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the escrow state machine for processing requests.
	pub escrow: Arc<EscrowService>,
}

/// Starts the HTTP server for the API.
///
/// This function creates and configures the HTTP server with routing,
/// middleware, and error handling for the escrow endpoints.
pub async fn start_server(
	api_config: ApiConfig,
	escrow: Arc<EscrowService>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app_state = AppState { escrow };

	// Build the router with /api base path and order endpoints
	let app = Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(handle_create_order).get(handle_list_orders))
				.route("/orders/{id}", get(handle_get_order))
				.route("/orders/{id}/confirm-funding", post(handle_confirm_funding))
				.route("/orders/{id}/submit-work", post(handle_submit_work))
				.route(
					"/orders/{id}/request-revision",
					post(handle_request_revision),
				)
				.route("/orders/{id}/approve", post(handle_approve_work))
				.route("/orders/{id}/resolve-dispute", post(handle_resolve_dispute)),
		)
		.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
		.with_state(app_state);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Escrow API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(async {
			let _ = tokio::signal::ctrl_c().await;
			tracing::info!("Shutdown signal received");
		})
		.await?;

	Ok(())
}

/// Parses the acting identity from request headers.
///
/// The auth layer in front of this service is expected to have verified
/// the identity and stamped these headers.
fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
	let id = headers
		.get(ACTOR_ID_HEADER)
		.and_then(|v| v.to_str().ok())
		.filter(|v| !v.is_empty())
		.ok_or_else(|| ApiError::BadRequest {
			error_type: "MISSING_ACTOR".into(),
			message: format!("{} header is required", ACTOR_ID_HEADER),
			details: None,
		})?;

	let role = headers
		.get(ACTOR_ROLE_HEADER)
		.and_then(|v| v.to_str().ok())
		.ok_or_else(|| ApiError::BadRequest {
			error_type: "MISSING_ACTOR".into(),
			message: format!("{} header is required", ACTOR_ROLE_HEADER),
			details: None,
		})?;

	let role: ActorRole = role.parse().map_err(|_| ApiError::BadRequest {
		error_type: "UNKNOWN_ROLE".into(),
		message: format!("Unknown actor role: {}", role),
		details: None,
	})?;

	Ok(Actor::new(id, role))
}

fn reject(err: escrow_core::EscrowError) -> ApiError {
	tracing::warn!("Request rejected: {}", err);
	ApiError::from(err)
}

/// Handles POST /api/orders requests.
async fn handle_create_order(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
	let actor = actor_from_headers(&headers)?;
	let order = state
		.escrow
		.initiate_payment(&actor, request)
		.await
		.map_err(reject)?;
	Ok((StatusCode::CREATED, Json(order)))
}

/// Handles GET /api/orders requests with optional party filters.
async fn handle_list_orders(
	State(state): State<AppState>,
	Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
	let orders = state.escrow.list_orders(&query).await.map_err(reject)?;
	Ok(Json(orders))
}

/// Handles GET /api/orders/{id} requests.
async fn handle_get_order(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
	let order = state.escrow.get_order(&id).await.map_err(reject)?;
	Ok(Json(order))
}

/// Handles POST /api/orders/{id}/confirm-funding requests (admin).
async fn handle_confirm_funding(
	State(state): State<AppState>,
	Path(id): Path<String>,
	headers: HeaderMap,
) -> Result<Json<Order>, ApiError> {
	let actor = actor_from_headers(&headers)?;
	let order = state
		.escrow
		.confirm_funding(&id, &actor)
		.await
		.map_err(reject)?;
	Ok(Json(order))
}

/// Handles POST /api/orders/{id}/submit-work requests (seller).
async fn handle_submit_work(
	State(state): State<AppState>,
	Path(id): Path<String>,
	headers: HeaderMap,
	Json(request): Json<SubmitWorkRequest>,
) -> Result<Json<Order>, ApiError> {
	let actor = actor_from_headers(&headers)?;
	let order = state
		.escrow
		.submit_work(&id, &actor, request)
		.await
		.map_err(reject)?;
	Ok(Json(order))
}

/// Handles POST /api/orders/{id}/request-revision requests (buyer).
async fn handle_request_revision(
	State(state): State<AppState>,
	Path(id): Path<String>,
	headers: HeaderMap,
	Json(request): Json<RequestRevisionRequest>,
) -> Result<Json<Order>, ApiError> {
	let actor = actor_from_headers(&headers)?;
	let order = state
		.escrow
		.request_revision(&id, &actor, request)
		.await
		.map_err(reject)?;
	Ok(Json(order))
}

/// Handles POST /api/orders/{id}/approve requests (buyer or admin).
async fn handle_approve_work(
	State(state): State<AppState>,
	Path(id): Path<String>,
	headers: HeaderMap,
	Json(request): Json<ApproveWorkRequest>,
) -> Result<Json<Order>, ApiError> {
	let actor = actor_from_headers(&headers)?;
	let order = state
		.escrow
		.approve_work(&id, &actor, request)
		.await
		.map_err(reject)?;
	Ok(Json(order))
}

/// Handles POST /api/orders/{id}/resolve-dispute requests (admin).
async fn handle_resolve_dispute(
	State(state): State<AppState>,
	Path(id): Path<String>,
	headers: HeaderMap,
	Json(request): Json<ResolveDisputeRequest>,
) -> Result<Json<Order>, ApiError> {
	let actor = actor_from_headers(&headers)?;
	let order = state
		.escrow
		.resolve_dispute(&id, &actor, request)
		.await
		.map_err(reject)?;
	Ok(Json(order))
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::http::HeaderValue;

	fn headers(id: &str, role: &str) -> HeaderMap {
		let mut headers = HeaderMap::new();
		headers.insert(ACTOR_ID_HEADER, HeaderValue::from_str(id).unwrap());
		headers.insert(ACTOR_ROLE_HEADER, HeaderValue::from_str(role).unwrap());
		headers
	}

	#[test]
	fn parses_actor_headers() {
		let actor = actor_from_headers(&headers("user-1", "buyer")).unwrap();
		assert_eq!(actor.id, "user-1");
		assert_eq!(actor.role, ActorRole::Buyer);

		// Marketplace aliases are accepted
		let actor = actor_from_headers(&headers("user-2", "student")).unwrap();
		assert_eq!(actor.role, ActorRole::Seller);
	}

	#[test]
	fn rejects_missing_or_unknown_actor_headers() {
		let err = actor_from_headers(&HeaderMap::new()).unwrap_err();
		assert_eq!(err.status_code(), 400);

		let err = actor_from_headers(&headers("user-1", "superuser")).unwrap_err();
		assert_eq!(err.status_code(), 400);
		assert_eq!(err.to_error_response().error, "UNKNOWN_ROLE");
	}
}
