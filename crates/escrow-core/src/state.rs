//! Transition rules for the order lifecycle.
//!
//! The legal state graph is encoded twice over: a static transition table
//! mapping each status to the set of statuses it may move to, and an
//! [`Operation`] enum mapping each public operation to the source states it
//! requires. The table is the single source of truth for the graph shape;
//! the per-operation view is what the service checks on every request so
//! that a rejection can name the attempted operation.

use escrow_types::OrderStatus;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Static transition table - each state maps to allowed next states.
static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(
		OrderStatus::AwaitingFunding,
		HashSet::from([OrderStatus::FundsHeld, OrderStatus::DisputeResolved]),
	);
	m.insert(
		OrderStatus::FundsHeld,
		HashSet::from([
			OrderStatus::SubmittedForReview,
			OrderStatus::DisputeResolved,
		]),
	);
	m.insert(
		OrderStatus::SubmittedForReview,
		HashSet::from([
			OrderStatus::Completed,
			OrderStatus::RevisionRequested,
			OrderStatus::DisputeResolved,
		]),
	);
	m.insert(
		OrderStatus::RevisionRequested,
		HashSet::from([
			OrderStatus::SubmittedForReview,
			OrderStatus::DisputeResolved,
		]),
	);
	m.insert(OrderStatus::Completed, HashSet::new()); // terminal
	m.insert(OrderStatus::DisputeResolved, HashSet::new()); // terminal
	m
});

/// Checks if a state transition is valid.
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
	TRANSITIONS
		.get(&from)
		.is_some_and(|set| set.contains(&to))
}

/// Every non-terminal state; the legal sources for a dispute resolution.
const NON_TERMINAL: &[OrderStatus] = &[
	OrderStatus::AwaitingFunding,
	OrderStatus::FundsHeld,
	OrderStatus::SubmittedForReview,
	OrderStatus::RevisionRequested,
];

/// The public operations of the state machine.
///
/// Carried inside errors so a rejected request can report exactly which
/// operation was attempted against which state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
	InitiatePayment,
	ConfirmFunding,
	SubmitWork,
	RequestRevision,
	ApproveWork,
	ResolveDispute,
}

impl Operation {
	/// Wire name of the operation, matching the HTTP endpoint it backs.
	pub fn as_str(&self) -> &'static str {
		match self {
			Operation::InitiatePayment => "initiate_payment",
			Operation::ConfirmFunding => "confirm_funding",
			Operation::SubmitWork => "submit_work",
			Operation::RequestRevision => "request_revision",
			Operation::ApproveWork => "approve_work",
			Operation::ResolveDispute => "resolve_dispute",
		}
	}

	/// The source states from which this operation is legal.
	///
	/// `InitiatePayment` creates the order and has no source state.
	pub fn allowed_sources(&self) -> &'static [OrderStatus] {
		match self {
			Operation::InitiatePayment => &[],
			Operation::ConfirmFunding => &[OrderStatus::AwaitingFunding],
			Operation::SubmitWork => {
				&[OrderStatus::FundsHeld, OrderStatus::RevisionRequested]
			},
			Operation::RequestRevision => &[OrderStatus::SubmittedForReview],
			Operation::ApproveWork => &[OrderStatus::SubmittedForReview],
			Operation::ResolveDispute => NON_TERMINAL,
		}
	}

	/// The state this operation moves the order to.
	pub fn target(&self) -> Option<OrderStatus> {
		match self {
			Operation::InitiatePayment => Some(OrderStatus::AwaitingFunding),
			Operation::ConfirmFunding => Some(OrderStatus::FundsHeld),
			Operation::SubmitWork => Some(OrderStatus::SubmittedForReview),
			Operation::RequestRevision => Some(OrderStatus::RevisionRequested),
			Operation::ApproveWork => Some(OrderStatus::Completed),
			Operation::ResolveDispute => Some(OrderStatus::DisputeResolved),
		}
	}
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn terminal_states_have_no_outgoing_edges() {
		for to in [
			OrderStatus::AwaitingFunding,
			OrderStatus::FundsHeld,
			OrderStatus::SubmittedForReview,
			OrderStatus::RevisionRequested,
			OrderStatus::Completed,
			OrderStatus::DisputeResolved,
		] {
			assert!(!is_valid_transition(OrderStatus::Completed, to));
			assert!(!is_valid_transition(OrderStatus::DisputeResolved, to));
		}
	}

	#[test]
	fn no_backward_edges() {
		assert!(!is_valid_transition(
			OrderStatus::FundsHeld,
			OrderStatus::AwaitingFunding
		));
		assert!(!is_valid_transition(
			OrderStatus::SubmittedForReview,
			OrderStatus::FundsHeld
		));
		assert!(!is_valid_transition(
			OrderStatus::RevisionRequested,
			OrderStatus::FundsHeld
		));
	}

	#[test]
	fn revision_loop_is_the_only_cycle() {
		assert!(is_valid_transition(
			OrderStatus::SubmittedForReview,
			OrderStatus::RevisionRequested
		));
		assert!(is_valid_transition(
			OrderStatus::RevisionRequested,
			OrderStatus::SubmittedForReview
		));
	}

	#[test]
	fn dispute_reachable_from_every_non_terminal_state() {
		for from in NON_TERMINAL {
			assert!(is_valid_transition(*from, OrderStatus::DisputeResolved));
		}
	}

	#[test]
	fn operation_sources_agree_with_transition_table() {
		for op in [
			Operation::ConfirmFunding,
			Operation::SubmitWork,
			Operation::RequestRevision,
			Operation::ApproveWork,
			Operation::ResolveDispute,
		] {
			let target = op.target().unwrap();
			for source in op.allowed_sources() {
				assert!(
					is_valid_transition(*source, target),
					"{} allows source {} with no table edge",
					op,
					source
				);
			}
		}
	}
}
