//! Recovers ledger-assigned object ids from a transaction's effect list.

use crate::types::{ChangeKind, ObjectChange, ObjectId};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no {kinds} object of type {predicate} in {changes} reported changes")]
    NotFound {
        predicate: String,
        kinds: String,
        changes: usize,
    },

    #[error("object {0} was not reported as deleted")]
    NotDeleted(ObjectId),
}

/// Struct name of a fully qualified Move type, without type parameters.
///
/// `0x2::coin::Coin<0x2::sui::SUI>` yields `Coin`.
pub fn struct_name(object_type: &str) -> &str {
    let base = object_type
        .split_once('<')
        .map(|(base, _)| base)
        .unwrap_or(object_type);
    base.rsplit("::").next().unwrap_or(base)
}

/// Module path (`package::module`) of a fully qualified Move type.
pub fn module_path(object_type: &str) -> Option<&str> {
    let base = object_type
        .split_once('<')
        .map(|(base, _)| base)
        .unwrap_or(object_type);
    base.rsplit_once("::").map(|(module, _)| module)
}

/// Type predicate over effect entries.
///
/// Matching compares whole struct names, so `Ticket` never matches
/// `TicketMachine` regardless of the order effects are reported in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPredicate {
    struct_names: Vec<String>,
    module: Option<String>,
    kinds: Vec<ChangeKind>,
}

impl ObjectPredicate {
    /// Created or mutated objects whose struct is named `name`.
    pub fn struct_named(name: impl Into<String>) -> Self {
        Self {
            struct_names: vec![name.into()],
            module: None,
            kinds: vec![ChangeKind::Created, ChangeKind::Mutated],
        }
    }

    /// Accept an alternative struct name.
    pub fn or_named(mut self, name: impl Into<String>) -> Self {
        self.struct_names.push(name.into());
        self
    }

    /// Restrict to types declared in `package::module`.
    pub fn in_module(mut self, package: ObjectId, module: &str) -> Self {
        self.module = Some(format!("{package}::{module}"));
        self
    }

    pub fn with_kinds(mut self, kinds: &[ChangeKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    pub fn matches_type(&self, object_type: &str) -> bool {
        let name = struct_name(object_type);
        if !self.struct_names.iter().any(|wanted| wanted == name) {
            return false;
        }
        match (&self.module, module_path(object_type)) {
            (None, _) => true,
            (Some(wanted), Some(actual)) => same_module(wanted, actual),
            (Some(_), None) => false,
        }
    }

    pub fn matches(&self, change: &ObjectChange) -> bool {
        self.kinds.contains(&change.kind)
            && change
                .object_type
                .as_deref()
                .is_some_and(|object_type| self.matches_type(object_type))
    }

    fn not_found(&self, changes: &[ObjectChange]) -> ResolveError {
        ResolveError::NotFound {
            predicate: self.to_string(),
            kinds: self
                .kinds
                .iter()
                .map(|kind| kind.as_str())
                .collect::<Vec<_>>()
                .join("|"),
            changes: changes.len(),
        }
    }
}

impl fmt::Display for ObjectPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(module) = &self.module {
            write!(f, "{module}::")?;
        }
        f.write_str(&self.struct_names.join("|"))
    }
}

/// Compares module paths, tolerating short and long address forms.
fn same_module(left: &str, right: &str) -> bool {
    let normalize = |path: &str| -> Option<(ObjectId, String)> {
        let (address, module) = path.split_once("::")?;
        Some((address.parse().ok()?, module.to_string()))
    };
    match (normalize(left), normalize(right)) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

/// First id whose entry satisfies `predicate`.
pub fn resolve_first(
    changes: &[ObjectChange],
    predicate: &ObjectPredicate,
) -> Result<ObjectId, ResolveError> {
    changes
        .iter()
        .find(|change| predicate.matches(change))
        .map(|change| change.object_id)
        .ok_or_else(|| predicate.not_found(changes))
}

/// Like [`resolve_first`], but absence is not an error.
pub fn resolve_optional(changes: &[ObjectChange], predicate: &ObjectPredicate) -> Option<ObjectId> {
    changes
        .iter()
        .find(|change| predicate.matches(change))
        .map(|change| change.object_id)
}

pub fn resolve_all(changes: &[ObjectChange], predicate: &ObjectPredicate) -> Vec<ObjectId> {
    changes
        .iter()
        .filter(|change| predicate.matches(change))
        .map(|change| change.object_id)
        .collect()
}

/// Confirms that `id` is reported as deleted (burned) or wrapped.
pub fn resolve_deleted(changes: &[ObjectChange], id: ObjectId) -> Result<(), ResolveError> {
    changes
        .iter()
        .any(|change| {
            change.object_id == id
                && matches!(change.kind, ChangeKind::Deleted | ChangeKind::Wrapped)
        })
        .then_some(())
        .ok_or(ResolveError::NotDeleted(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PKG: &str = "0xd847b4aa993d7e027ace4351f7467037313966156e499829e167e2ef1ae48da2";

    fn change(kind: ChangeKind, id: &str, name: &str) -> ObjectChange {
        ObjectChange {
            kind,
            object_id: id.parse().unwrap(),
            object_type: Some(format!("{PKG}::event_manager::{name}")),
            owner: None,
            version: Some(1),
        }
    }

    #[test]
    fn machine_predicate_never_matches_organizer_cap() {
        let changes = vec![
            change(ChangeKind::Created, "0xa1", "TicketMachine"),
            change(ChangeKind::Created, "0xc1", "OrganizerCap"),
        ];
        let machine = resolve_first(&changes, &ObjectPredicate::struct_named("TicketMachine"));
        assert_eq!(machine.unwrap(), "0xa1".parse().unwrap());
        let cap = resolve_first(&changes, &ObjectPredicate::struct_named("OrganizerCap"));
        assert_eq!(cap.unwrap(), "0xc1".parse().unwrap());
    }

    #[test]
    fn ticket_is_distinguished_from_ticket_machine_in_any_order() {
        let changes = vec![
            change(ChangeKind::Mutated, "0xa1", "TicketMachine"),
            change(ChangeKind::Created, "0x71", "Ticket"),
        ];
        let ticket = resolve_first(&changes, &ObjectPredicate::struct_named("Ticket")).unwrap();
        assert_eq!(ticket, "0x71".parse().unwrap());
    }

    #[test]
    fn missing_type_is_not_found() {
        let changes = vec![change(ChangeKind::Created, "0xa1", "TicketMachine")];
        let err = resolve_first(&changes, &ObjectPredicate::struct_named("RewardConfig"))
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { changes: 1, .. }));
        assert!(
            resolve_optional(&changes, &ObjectPredicate::struct_named("RewardConfig")).is_none()
        );
    }

    #[test]
    fn module_restriction_accepts_short_addresses() {
        let pkg: ObjectId = PKG.parse().unwrap();
        let predicate = ObjectPredicate::struct_named("Souvenir").in_module(pkg, "event_manager");
        assert!(predicate.matches_type(&format!("{PKG}::event_manager::Souvenir")));
        assert!(!predicate.matches_type("0x2::other::Souvenir"));
        let short = ObjectPredicate::struct_named("Coin").in_module("0x2".parse().unwrap(), "coin");
        assert!(short.matches_type("0x2::coin::Coin<0x2::sui::SUI>"));
    }

    #[test]
    fn deletion_is_confirmed_from_effects() {
        let changes = vec![
            change(ChangeKind::Deleted, "0x71", "Ticket"),
            change(ChangeKind::Created, "0x51", "Souvenir"),
        ];
        assert!(resolve_deleted(&changes, "0x71".parse().unwrap()).is_ok());
        assert_eq!(
            resolve_deleted(&changes, "0x51".parse().unwrap()),
            Err(ResolveError::NotDeleted("0x51".parse().unwrap()))
        );
        let kinds = ObjectPredicate::struct_named("Ticket").with_kinds(&[ChangeKind::Deleted]);
        assert_eq!(resolve_all(&changes, &kinds).len(), 1);
    }

    #[test]
    fn alternative_names_match_booth_shapes() {
        let changes = vec![change(ChangeKind::Created, "0xb1", "BoothCap")];
        let predicate = ObjectPredicate::struct_named("Booth").or_named("BoothCap");
        assert_eq!(resolve_first(&changes, &predicate).unwrap(), "0xb1".parse().unwrap());
    }

    proptest! {
        #[test]
        fn prefix_names_never_collide(suffix in "[A-Z][a-zA-Z]{0,12}") {
            let longer = format!("Ticket{suffix}");
            let predicate = ObjectPredicate::struct_named("Ticket");
            let object_type = format!("{PKG}::event_manager::{longer}");
            prop_assert!(!predicate.matches_type(&object_type));
            prop_assert!(ObjectPredicate::struct_named(longer.clone()).matches_type(&object_type));
        }
    }
}
