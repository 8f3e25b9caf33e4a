//! Client-side preconditions checked before a lifecycle call is submitted.
//!
//! The ledger enforces the same rules; these guards only spare the caller a
//! doomed submission and its gas.

use crate::types::{Address, ObjectId, ObjectSnapshot, Owner};
use crate::views::TicketView;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardViolation {
    RefundWithBadges { ticket: ObjectId, badges: usize },
    EvolveWithoutBadges { ticket: ObjectId },
    NotOwner {
        object: ObjectId,
        caller: Address,
        owner: Option<Owner>,
    },
}

impl fmt::Display for GuardViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RefundWithBadges { ticket, badges } => write!(
                f,
                "ticket {ticket} holds {badges} badge(s); only unstamped tickets can be refunded"
            ),
            Self::EvolveWithoutBadges { ticket } => write!(
                f,
                "ticket {ticket} has no badges; collect at least one before evolving"
            ),
            Self::NotOwner {
                object,
                caller,
                owner,
            } => match owner {
                Some(owner) => write!(f, "object {object} is owned by {owner:?}, not {caller}"),
                None => write!(f, "object {object} has no reported owner; caller is {caller}"),
            },
        }
    }
}

pub fn check_refund(ticket: &TicketView) -> Result<(), GuardViolation> {
    match ticket.badges.len() {
        0 => Ok(()),
        badges => Err(GuardViolation::RefundWithBadges {
            ticket: ticket.id,
            badges,
        }),
    }
}

pub fn check_evolve(ticket: &TicketView) -> Result<(), GuardViolation> {
    if ticket.badges.is_empty() {
        Err(GuardViolation::EvolveWithoutBadges { ticket: ticket.id })
    } else {
        Ok(())
    }
}

/// Owned objects (tickets, caps) must belong to the caller.
pub fn check_owner(
    object: ObjectId,
    owner: Option<&Owner>,
    caller: &Address,
) -> Result<(), GuardViolation> {
    match owner {
        Some(owner) if owner.is_owned_by(caller) => Ok(()),
        other => Err(GuardViolation::NotOwner {
            object,
            caller: *caller,
            owner: other.cloned(),
        }),
    }
}

pub fn check_snapshot_owner(
    snapshot: &ObjectSnapshot,
    caller: &Address,
) -> Result<(), GuardViolation> {
    check_owner(snapshot.object_id, snapshot.owner.as_ref(), caller)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(badges: &[&str]) -> TicketView {
        TicketView {
            id: "0x71".parse().unwrap(),
            name: "Sui Summit".into(),
            url: String::new(),
            badges: badges.iter().map(|b| b.to_string()).collect(),
            owner: None,
        }
    }

    #[test]
    fn unstamped_tickets_are_refundable_not_evolvable() {
        let fresh = ticket(&[]);
        assert!(check_refund(&fresh).is_ok());
        assert_eq!(
            check_evolve(&fresh),
            Err(GuardViolation::EvolveWithoutBadges { ticket: fresh.id })
        );
    }

    #[test]
    fn stamped_tickets_are_evolvable_not_refundable() {
        let stamped = ticket(&["Main Gate", "VIP Gate"]);
        assert!(check_evolve(&stamped).is_ok());
        assert_eq!(
            check_refund(&stamped),
            Err(GuardViolation::RefundWithBadges {
                ticket: stamped.id,
                badges: 2
            })
        );
    }

    #[test]
    fn ownership_requires_matching_address() {
        let me: Address = "0x1".parse().unwrap();
        let other: Address = "0x2".parse().unwrap();
        let object: ObjectId = "0xc1".parse().unwrap();
        assert!(check_owner(object, Some(&Owner::Address(me)), &me).is_ok());
        assert!(check_owner(object, Some(&Owner::Address(other)), &me).is_err());
        let shared = Owner::Shared {
            initial_shared_version: 1,
        };
        assert!(check_owner(object, Some(&shared), &me).is_err());
        let err = check_owner(object, None, &me).unwrap_err();
        assert!(err.to_string().contains("no reported owner"));
    }
}
