//! Order lifecycle types for the escrow service.
//!
//! This module defines the order entity and the closed set of lifecycle
//! states it moves through. The status enum is the invariant-bearing field:
//! every mutation of an order happens through a guarded status transition.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single buyer-seller purchase transaction and its lifecycle record.
///
/// An order is created when a buyer hires a seller and carries all state
/// accumulated over the escrow lifecycle: funding confirmation, work
/// submission, revision notes, the final review and the settlement split.
/// Orders are never physically deleted; terminal orders are retained for
/// audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	/// Unique identifier for this order, assigned at creation.
	pub id: String,
	/// Identity reference of the buyer who initiated the purchase.
	pub buyer_id: String,
	/// Identity reference of the seller delivering the work.
	pub seller_id: String,
	/// Optional reference to the gig listing this order was placed against.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub gig_id: Option<String>,
	/// Short human-readable title, fixed at creation.
	pub title: String,
	/// Longer description of the purchased work.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Display name of the buyer, attached from the profile collaborator.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub buyer_name: Option<String>,
	/// Display name of the seller, attached from the profile collaborator.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub seller_name: Option<String>,
	/// Monetary amount of the purchase, fixed at creation.
	pub amount: Decimal,
	/// Current lifecycle status.
	pub status: OrderStatus,
	/// Timestamp when this order was created (Unix seconds).
	pub created_at: u64,
	/// Timestamp when this order was last updated (Unix seconds).
	pub updated_at: u64,
	/// Set once, when funding is confirmed by an admin.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub funding_confirmed_at: Option<u64>,
	/// Set on work submission; overwritten on resubmission.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub submitted_at: Option<u64>,
	/// Set once, the first time a revision is requested.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub revision_requested_at: Option<u64>,
	/// Set once, when the buyer approves the work.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub completed_at: Option<u64>,
	/// Set once, when an admin resolves a dispute.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub resolved_at: Option<u64>,
	/// Free-form deliverables payload attached on submission.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub deliverables: Option<String>,
	/// Notes accompanying the most recent submission.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub submission_notes: Option<String>,
	/// Notes attached by the buyer when requesting a revision.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub revision_notes: Option<String>,
	/// Rating (1-5) given by the buyer on approval.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub rating: Option<u8>,
	/// Review text given by the buyer on approval.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub review: Option<String>,
	/// Fee split computed at settlement, present once completed.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub settlement: Option<Settlement>,
	/// Dispute outcome, present once resolved by an admin.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub resolution: Option<DisputeResolution>,
}

/// Status of an order in the escrow lifecycle.
///
/// Transitions only move forward along the graph
/// `AwaitingFunding -> FundsHeld -> SubmittedForReview -> Completed`,
/// with the single loop `SubmittedForReview <-> RevisionRequested` and an
/// admin escape hatch from any non-terminal state to `DisputeResolved`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
	/// Order has been created; the buyer's payment is not yet confirmed.
	AwaitingFunding,
	/// Payment confirmed; funds are considered locked in escrow.
	FundsHeld,
	/// Seller has submitted work and is waiting on the buyer's review.
	SubmittedForReview,
	/// Buyer asked for changes; funds remain held.
	RevisionRequested,
	/// Work approved and funds released to the seller (terminal).
	Completed,
	/// Closed by an admin dispute decision (terminal).
	DisputeResolved,
}

impl OrderStatus {
	/// Returns true for states from which no further transition is legal.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Completed | OrderStatus::DisputeResolved)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderStatus::AwaitingFunding => write!(f, "AWAITING_FUNDING"),
			OrderStatus::FundsHeld => write!(f, "FUNDS_HELD"),
			OrderStatus::SubmittedForReview => write!(f, "SUBMITTED_FOR_REVIEW"),
			OrderStatus::RevisionRequested => write!(f, "REVISION_REQUESTED"),
			OrderStatus::Completed => write!(f, "COMPLETED"),
			OrderStatus::DisputeResolved => write!(f, "DISPUTE_RESOLVED"),
		}
	}
}

/// Fee split recorded on an order at settlement.
///
/// The invariant `payout + platform_fee == amount` holds exactly; both
/// values are computed by the fee calculator in `escrow-core`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
	/// Amount released to the seller.
	pub payout: Decimal,
	/// Amount retained by the platform.
	pub platform_fee: Decimal,
}

/// Outcome of an admin dispute resolution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeResolution {
	/// Funds conceptually released to the seller.
	ReleaseToSeller,
	/// Funds conceptually refunded to the buyer.
	RefundToBuyer,
}

impl fmt::Display for DisputeResolution {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DisputeResolution::ReleaseToSeller => write!(f, "RELEASE_TO_SELLER"),
			DisputeResolution::RefundToBuyer => write!(f, "REFUND_TO_BUYER"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_serializes_to_screaming_snake_case() {
		let json = serde_json::to_string(&OrderStatus::SubmittedForReview).unwrap();
		assert_eq!(json, "\"SUBMITTED_FOR_REVIEW\"");

		let back: OrderStatus = serde_json::from_str("\"AWAITING_FUNDING\"").unwrap();
		assert_eq!(back, OrderStatus::AwaitingFunding);
	}

	#[test]
	fn terminal_states() {
		assert!(OrderStatus::Completed.is_terminal());
		assert!(OrderStatus::DisputeResolved.is_terminal());
		assert!(!OrderStatus::AwaitingFunding.is_terminal());
		assert!(!OrderStatus::RevisionRequested.is_terminal());
	}
}
