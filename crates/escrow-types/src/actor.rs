//! Actor identity and role types.
//!
//! Every transition request arrives with the identity of the actor making
//! it. Authentication itself is handled upstream of this service; by the
//! time a request reaches the state machine the id and role are trusted,
//! and the machine only checks that the role (and, for buyer/seller
//! operations, the id) is permitted to perform the transition.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The party making a transition request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
	/// Opaque identity reference, matched against the order's
	/// `buyer_id`/`seller_id` for party-bound operations.
	pub id: String,
	/// Role the actor holds for this request.
	pub role: ActorRole,
}

impl Actor {
	pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
		Self {
			id: id.into(),
			role,
		}
	}
}

/// Role of an actor in the marketplace.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
	/// A client purchasing a gig.
	Buyer,
	/// A student delivering a gig.
	Seller,
	/// Platform staff; confirms funding and resolves disputes.
	Admin,
}

impl fmt::Display for ActorRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ActorRole::Buyer => write!(f, "buyer"),
			ActorRole::Seller => write!(f, "seller"),
			ActorRole::Admin => write!(f, "admin"),
		}
	}
}

/// Error returned when parsing an unknown role string.
#[derive(Debug, thiserror::Error)]
#[error("Unknown actor role: {0}")]
pub struct ParseActorRoleError(String);

impl FromStr for ActorRole {
	type Err = ParseActorRoleError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"buyer" | "client" => Ok(ActorRole::Buyer),
			"seller" | "student" => Ok(ActorRole::Seller),
			"admin" => Ok(ActorRole::Admin),
			other => Err(ParseActorRoleError(other.to_string())),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_roles_including_marketplace_aliases() {
		assert_eq!("buyer".parse::<ActorRole>().unwrap(), ActorRole::Buyer);
		assert_eq!("client".parse::<ActorRole>().unwrap(), ActorRole::Buyer);
		assert_eq!("student".parse::<ActorRole>().unwrap(), ActorRole::Seller);
		assert_eq!("Admin".parse::<ActorRole>().unwrap(), ActorRole::Admin);
		assert!("superuser".parse::<ActorRole>().is_err());
	}
}
