//! Error taxonomy for the escrow state machine.
//!
//! Every operation either applies its transition or fails with one of these
//! typed errors; an illegal transition is never silently turned into a
//! no-op. The `From<EscrowError> for ApiError` impl defines the single
//! mapping the HTTP boundary uses to turn rejections into machine-readable
//! 4xx/5xx responses.

use crate::state::Operation;
use escrow_types::{ApiError, OrderStatus};
use thiserror::Error;

/// Errors that can occur during escrow operations.
#[derive(Debug, Error)]
pub enum EscrowError {
	/// The referenced order id does not exist.
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	/// The operation is illegal from the order's current state.
	#[error("{operation} is not allowed while the order is {current}; requires one of {allowed:?}")]
	InvalidTransition {
		operation: Operation,
		current: OrderStatus,
		allowed: &'static [OrderStatus],
	},
	/// A required payload field is missing or malformed.
	#[error("Validation error: {0}")]
	Validation(String),
	/// The actor is not permitted to perform this transition.
	#[error("Not authorized to perform {operation}: {message}")]
	Unauthorized {
		operation: Operation,
		message: String,
	},
	/// The configured funding window has elapsed for this order.
	#[error("Funding window expired for order {order_id}")]
	FundingExpired { order_id: String },
	/// The durability write failed; the transition did not happen.
	#[error("Storage error: {0}")]
	Storage(String),
	/// System clock error.
	#[error("Time error: {0}")]
	Time(String),
}

impl From<EscrowError> for ApiError {
	fn from(err: EscrowError) -> Self {
		match &err {
			EscrowError::OrderNotFound(_) => ApiError::NotFound {
				error_type: "ORDER_NOT_FOUND".into(),
				message: err.to_string(),
			},
			EscrowError::InvalidTransition {
				operation,
				current,
				allowed,
			} => ApiError::Conflict {
				error_type: "INVALID_TRANSITION".into(),
				message: err.to_string(),
				details: Some(serde_json::json!({
					"operation": operation.as_str(),
					"currentStatus": current.to_string(),
					"allowedStatuses": allowed
						.iter()
						.map(|s| s.to_string())
						.collect::<Vec<_>>(),
				})),
			},
			EscrowError::Validation(_) => ApiError::BadRequest {
				error_type: "VALIDATION_ERROR".into(),
				message: err.to_string(),
				details: None,
			},
			EscrowError::Unauthorized { .. } => ApiError::Forbidden {
				error_type: "UNAUTHORIZED".into(),
				message: err.to_string(),
			},
			EscrowError::FundingExpired { .. } => ApiError::Conflict {
				error_type: "FUNDING_EXPIRED".into(),
				message: err.to_string(),
				details: None,
			},
			EscrowError::Storage(_) | EscrowError::Time(_) => ApiError::InternalServerError {
				error_type: "STORAGE_ERROR".into(),
				message: err.to_string(),
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn invalid_transition_maps_to_conflict_with_details() {
		let err = EscrowError::InvalidTransition {
			operation: Operation::SubmitWork,
			current: OrderStatus::AwaitingFunding,
			allowed: Operation::SubmitWork.allowed_sources(),
		};
		let api: ApiError = err.into();
		assert_eq!(api.status_code(), 409);

		let response = api.to_error_response();
		assert_eq!(response.error, "INVALID_TRANSITION");
		let details = response.details.unwrap();
		assert_eq!(details["currentStatus"], "AWAITING_FUNDING");
		assert_eq!(details["operation"], "submit_work");
	}

	#[test]
	fn not_found_maps_to_404() {
		let api: ApiError = EscrowError::OrderNotFound("abc".into()).into();
		assert_eq!(api.status_code(), 404);
	}

	#[test]
	fn unauthorized_maps_to_403() {
		let api: ApiError = EscrowError::Unauthorized {
			operation: Operation::ApproveWork,
			message: "requires the buyer on this order".into(),
		}
		.into();
		assert_eq!(api.status_code(), 403);
	}
}
