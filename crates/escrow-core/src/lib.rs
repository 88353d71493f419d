//! Escrow state machine for the Micro-Job marketplace.
//!
//! This crate owns the funds-and-delivery lifecycle of an order: payment
//! intent, funding confirmation, work submission, review and settlement.
//! Every mutation goes through a guarded status transition validated
//! against the state graph in [`state`], serialized per order id, and
//! persisted before the new snapshot is returned. A failed persistence
//! write means the transition did not happen.

use dashmap::DashMap;
use escrow_storage::{StorageError, StorageService};
use escrow_types::{
	Actor, ActorRole, ApproveWorkRequest, CreateOrderRequest, Order, OrderListQuery, OrderStatus,
	RequestRevisionRequest, ResolveDisputeRequest, SubmitWorkRequest,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

pub mod error;
pub mod fees;
pub mod state;

pub use error::EscrowError;
pub use fees::{split_amount, FeeSplit, PLATFORM_FEE_RATE};
pub use state::Operation;

/// Storage namespace under which orders are persisted.
const ORDERS_NAMESPACE: &str = "orders";

/// Returns the current Unix timestamp in seconds.
fn now_secs() -> Result<u64, EscrowError> {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.map_err(|e| EscrowError::Time(e.to_string()))
}

fn map_storage_err(order_id: &str, err: StorageError) -> EscrowError {
	match err {
		StorageError::NotFound => EscrowError::OrderNotFound(order_id.to_string()),
		other => EscrowError::Storage(other.to_string()),
	}
}

/// The order/escrow state machine.
///
/// All operations on the same order id are serialized through a per-id
/// mutex, so at most one transition is in flight per order at any instant.
/// Two racing transitions resolve deterministically: one applies, the other
/// observes the post-transition state and fails with `InvalidTransition`.
pub struct EscrowService {
	storage: Arc<StorageService>,
	/// Per-order-id locks; entries are created lazily and dropped once the
	/// order reaches a terminal state.
	locks: DashMap<String, Arc<Mutex<()>>>,
	/// Optional window after creation during which funding may be confirmed.
	funding_expiry: Option<Duration>,
	fee_rate: Decimal,
}

impl EscrowService {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self {
			storage,
			locks: DashMap::new(),
			funding_expiry: None,
			fee_rate: PLATFORM_FEE_RATE,
		}
	}

	/// Sets the optional funding expiry window.
	pub fn with_funding_expiry(mut self, expiry: Option<Duration>) -> Self {
		self.funding_expiry = expiry;
		self
	}

	fn lock_for(&self, order_id: &str) -> Arc<Mutex<()>> {
		self.locks
			.entry(order_id.to_string())
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone()
	}

	/// Loads the order, validates the transition and applies `mutate`,
	/// persisting the result before returning it.
	///
	/// Holds the per-id lock for the whole read-validate-write so no other
	/// transition can interleave. The closure mutates a copy loaded from
	/// storage; if the update write fails the stored order is unchanged.
	async fn apply_transition<F>(
		&self,
		order_id: &str,
		op: Operation,
		mutate: F,
	) -> Result<Order, EscrowError>
	where
		F: FnOnce(&mut Order, u64) -> Result<(), EscrowError>,
	{
		let lock = self.lock_for(order_id);
		let _guard = lock.lock().await;

		let mut order: Order = self
			.storage
			.retrieve(ORDERS_NAMESPACE, order_id)
			.await
			.map_err(|e| map_storage_err(order_id, e))?;

		if !op.allowed_sources().contains(&order.status) {
			if order.status.is_terminal() {
				self.locks.remove(order_id);
			}
			return Err(EscrowError::InvalidTransition {
				operation: op,
				current: order.status,
				allowed: op.allowed_sources(),
			});
		}

		let now = now_secs()?;
		mutate(&mut order, now)?;
		order.updated_at = now;

		self.storage
			.update(ORDERS_NAMESPACE, order_id, &order)
			.await
			.map_err(|e| EscrowError::Storage(e.to_string()))?;

		tracing::info!(
			order_id = %order.id,
			status = %order.status,
			operation = %op,
			"Applied order transition"
		);

		// Terminal orders accept no further transitions, so their lock
		// entry is dead weight. Racers still holding the Arc just see an
		// InvalidTransition after reloading.
		if order.status.is_terminal() {
			self.locks.remove(order_id);
		}

		Ok(order)
	}

	/// Creates a new order in `AwaitingFunding`.
	///
	/// The buyer is taken from the acting identity; the amount and display
	/// metadata are fixed here for the lifetime of the order.
	#[instrument(skip_all, fields(buyer_id = %actor.id))]
	pub async fn initiate_payment(
		&self,
		actor: &Actor,
		request: CreateOrderRequest,
	) -> Result<Order, EscrowError> {
		if actor.role != ActorRole::Buyer {
			return Err(EscrowError::Unauthorized {
				operation: Operation::InitiatePayment,
				message: format!("requires the buyer role, got {}", actor.role),
			});
		}
		if actor.id.is_empty() {
			return Err(EscrowError::Validation("Buyer id cannot be empty".into()));
		}
		if request.seller_id.is_empty() {
			return Err(EscrowError::Validation("Seller id cannot be empty".into()));
		}
		if request.title.trim().is_empty() {
			return Err(EscrowError::Validation("Title cannot be empty".into()));
		}
		if request.amount <= Decimal::ZERO {
			return Err(EscrowError::Validation(format!(
				"Amount must be positive, got {}",
				request.amount
			)));
		}

		let now = now_secs()?;
		let order = Order {
			id: Uuid::new_v4().to_string(),
			buyer_id: actor.id.clone(),
			seller_id: request.seller_id,
			gig_id: request.gig_id,
			title: request.title,
			description: request.description,
			buyer_name: request.buyer_name,
			seller_name: request.seller_name,
			amount: request.amount,
			status: OrderStatus::AwaitingFunding,
			created_at: now,
			updated_at: now,
			funding_confirmed_at: None,
			submitted_at: None,
			revision_requested_at: None,
			completed_at: None,
			resolved_at: None,
			deliverables: None,
			submission_notes: None,
			revision_notes: None,
			rating: None,
			review: None,
			settlement: None,
			resolution: None,
		};

		self.storage
			.store(ORDERS_NAMESPACE, &order.id, &order)
			.await
			.map_err(|e| EscrowError::Storage(e.to_string()))?;

		tracing::info!(order_id = %order.id, amount = %order.amount, "Created order");

		Ok(order)
	}

	/// Confirms the buyer's payment; funds are considered locked from here.
	///
	/// Admin only: in this marketplace an operator verifies the bank
	/// transfer out of band before confirming.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn confirm_funding(
		&self,
		order_id: &str,
		actor: &Actor,
	) -> Result<Order, EscrowError> {
		require_admin(actor, Operation::ConfirmFunding)?;

		let funding_expiry = self.funding_expiry;
		self.apply_transition(order_id, Operation::ConfirmFunding, |order, now| {
			if let Some(expiry) = funding_expiry {
				if now > order.created_at.saturating_add(expiry.as_secs()) {
					return Err(EscrowError::FundingExpired {
						order_id: order.id.clone(),
					});
				}
			}
			order.status = OrderStatus::FundsHeld;
			order.funding_confirmed_at = Some(now);
			Ok(())
		})
		.await
	}

	/// Submits (or resubmits) work for review.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn submit_work(
		&self,
		order_id: &str,
		actor: &Actor,
		request: SubmitWorkRequest,
	) -> Result<Order, EscrowError> {
		if actor.role != ActorRole::Seller {
			return Err(EscrowError::Unauthorized {
				operation: Operation::SubmitWork,
				message: format!("requires the seller role, got {}", actor.role),
			});
		}
		if request.deliverables.trim().is_empty() {
			return Err(EscrowError::Validation(
				"Deliverables cannot be empty".into(),
			));
		}

		let actor_id = actor.id.clone();
		self.apply_transition(order_id, Operation::SubmitWork, |order, now| {
			if order.seller_id != actor_id {
				return Err(EscrowError::Unauthorized {
					operation: Operation::SubmitWork,
					message: "actor is not the seller on this order".into(),
				});
			}
			order.status = OrderStatus::SubmittedForReview;
			order.deliverables = Some(request.deliverables);
			order.submission_notes = request.notes;
			// Overwritten on resubmission
			order.submitted_at = Some(now);
			Ok(())
		})
		.await
	}

	/// Asks the seller for changes; funds remain held.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn request_revision(
		&self,
		order_id: &str,
		actor: &Actor,
		request: RequestRevisionRequest,
	) -> Result<Order, EscrowError> {
		if actor.role != ActorRole::Buyer {
			return Err(EscrowError::Unauthorized {
				operation: Operation::RequestRevision,
				message: format!("requires the buyer role, got {}", actor.role),
			});
		}
		if request.revision_notes.trim().is_empty() {
			return Err(EscrowError::Validation(
				"Revision notes cannot be empty".into(),
			));
		}

		let actor_id = actor.id.clone();
		self.apply_transition(order_id, Operation::RequestRevision, |order, now| {
			if order.buyer_id != actor_id {
				return Err(EscrowError::Unauthorized {
					operation: Operation::RequestRevision,
					message: "actor is not the buyer on this order".into(),
				});
			}
			order.status = OrderStatus::RevisionRequested;
			order.revision_notes = Some(request.revision_notes);
			// Set once, the first time a revision is requested
			if order.revision_requested_at.is_none() {
				order.revision_requested_at = Some(now);
			}
			Ok(())
		})
		.await
	}

	/// Approves submitted work: computes the fee split, records the review
	/// and releases funds to the seller (terminal).
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn approve_work(
		&self,
		order_id: &str,
		actor: &Actor,
		request: ApproveWorkRequest,
	) -> Result<Order, EscrowError> {
		if actor.role == ActorRole::Seller {
			return Err(EscrowError::Unauthorized {
				operation: Operation::ApproveWork,
				message: "sellers cannot approve their own work".into(),
			});
		}
		// Defaults to 5, matching the marketplace's approve flow
		let rating = request.rating.unwrap_or(5);
		if !(1..=5).contains(&rating) {
			return Err(EscrowError::Validation(format!(
				"Rating must be between 1 and 5, got {}",
				rating
			)));
		}

		let actor_id = actor.id.clone();
		let actor_role = actor.role;
		let fee_rate = self.fee_rate;
		self.apply_transition(order_id, Operation::ApproveWork, |order, now| {
			if actor_role == ActorRole::Buyer && order.buyer_id != actor_id {
				return Err(EscrowError::Unauthorized {
					operation: Operation::ApproveWork,
					message: "actor is not the buyer on this order".into(),
				});
			}
			let split = split_amount(order.amount, fee_rate);
			order.status = OrderStatus::Completed;
			order.completed_at = Some(now);
			order.rating = Some(rating);
			order.review = request.review;
			order.settlement = Some(escrow_types::Settlement {
				payout: split.payout,
				platform_fee: split.fee,
			});
			Ok(())
		})
		.await
	}

	/// Closes the order by admin decision from any non-terminal state.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn resolve_dispute(
		&self,
		order_id: &str,
		actor: &Actor,
		request: ResolveDisputeRequest,
	) -> Result<Order, EscrowError> {
		require_admin(actor, Operation::ResolveDispute)?;

		self.apply_transition(order_id, Operation::ResolveDispute, |order, now| {
			order.status = OrderStatus::DisputeResolved;
			order.resolution = Some(request.resolution);
			order.resolved_at = Some(now);
			Ok(())
		})
		.await
	}

	/// Returns a snapshot of an order. Never mutates state.
	pub async fn get_order(&self, order_id: &str) -> Result<Order, EscrowError> {
		self.storage
			.retrieve(ORDERS_NAMESPACE, order_id)
			.await
			.map_err(|e| map_storage_err(order_id, e))
	}

	/// Lists orders, optionally filtered by buyer and/or seller.
	///
	/// Results are sorted newest first.
	pub async fn list_orders(&self, query: &OrderListQuery) -> Result<Vec<Order>, EscrowError> {
		let mut orders: Vec<Order> = self
			.storage
			.retrieve_all(ORDERS_NAMESPACE)
			.await
			.map_err(|e| EscrowError::Storage(e.to_string()))?;

		if let Some(buyer_id) = &query.buyer_id {
			orders.retain(|o| &o.buyer_id == buyer_id);
		}
		if let Some(seller_id) = &query.seller_id {
			orders.retain(|o| &o.seller_id == seller_id);
		}

		orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
		Ok(orders)
	}
}

fn require_admin(actor: &Actor, op: Operation) -> Result<(), EscrowError> {
	if actor.role != ActorRole::Admin {
		return Err(EscrowError::Unauthorized {
			operation: op,
			message: format!("requires the admin role, got {}", actor.role),
		});
	}
	Ok(())
}
