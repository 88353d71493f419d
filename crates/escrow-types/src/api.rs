//! API types for the escrow HTTP API.
//!
//! This module defines the request payloads accepted by the transition
//! endpoints and the error envelope returned when a request is rejected.
//! Responses for successful transitions are order snapshots serialized
//! directly from [`crate::Order`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::DisputeResolution;

/// Request body for creating an order (payment intent).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
	/// Seller the buyer is hiring.
	pub seller_id: String,
	/// Optional gig listing reference.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub gig_id: Option<String>,
	/// Short title for the purchase.
	pub title: String,
	/// Longer description of the work.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Monetary amount, fixed for the lifetime of the order.
	pub amount: Decimal,
	/// Display name of the buyer, if known to the caller.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub buyer_name: Option<String>,
	/// Display name of the seller, if known to the caller.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub seller_name: Option<String>,
}

/// Request body for submitting (or resubmitting) work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitWorkRequest {
	/// Free-form deliverables payload (file reference, link, text).
	pub deliverables: String,
	/// Optional notes accompanying the submission.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
}

/// Request body for requesting a revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRevisionRequest {
	/// What the buyer wants changed.
	pub revision_notes: String,
}

/// Request body for approving submitted work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveWorkRequest {
	/// Rating 1-5; defaults to 5 when omitted.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub rating: Option<u8>,
	/// Optional review text.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub review: Option<String>,
}

/// Request body for an admin dispute resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveDisputeRequest {
	/// Which party the held funds go to.
	pub resolution: DisputeResolution,
}

/// Query parameters for listing orders.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
	/// Restrict to orders placed by this buyer.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub buyer_id: Option<String>,
	/// Restrict to orders assigned to this seller.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub seller_id: Option<String>,
}

/// API error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Machine-readable error code.
	pub error: String,
	/// Human-readable description.
	pub message: String,
	/// Additional error context, e.g. current vs. expected states.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum ApiError {
	/// Bad request with validation errors (400).
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Actor role not permitted to perform the operation (403).
	Forbidden {
		error_type: String,
		message: String,
	},
	/// Referenced order does not exist (404).
	NotFound {
		error_type: String,
		message: String,
	},
	/// Request conflicts with the order's current state (409).
	Conflict {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Internal server error (500).
	InternalServerError {
		error_type: String,
		message: String,
	},
}

impl ApiError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			ApiError::BadRequest { .. } => 400,
			ApiError::Forbidden { .. } => 403,
			ApiError::NotFound { .. } => 404,
			ApiError::Conflict { .. } => 409,
			ApiError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			ApiError::BadRequest {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
			},
			ApiError::Forbidden {
				error_type,
				message,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
			},
			ApiError::NotFound {
				error_type,
				message,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
			},
			ApiError::Conflict {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
			},
			ApiError::InternalServerError {
				error_type,
				message,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
			},
		}
	}
}

impl fmt::Display for ApiError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ApiError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			ApiError::Forbidden { message, .. } => write!(f, "Forbidden: {}", message),
			ApiError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			ApiError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
			ApiError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for ApiError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ApiError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

		let error_response = self.to_error_response();
		(status, Json(error_response)).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	#[test]
	fn create_order_request_round_trips_camel_case() {
		let json = r#"{"sellerId":"s-1","title":"Logo Design","amount":"50"}"#;
		let req: CreateOrderRequest = serde_json::from_str(json).unwrap();
		assert_eq!(req.seller_id, "s-1");
		assert_eq!(req.amount, dec!(50));
		assert!(req.gig_id.is_none());
	}

	#[test]
	fn api_error_status_codes() {
		let err = ApiError::Conflict {
			error_type: "INVALID_TRANSITION".into(),
			message: "nope".into(),
			details: None,
		};
		assert_eq!(err.status_code(), 409);
		assert_eq!(err.to_error_response().error, "INVALID_TRANSITION");
	}
}
