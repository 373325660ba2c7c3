//! Resource-set canonicalization.
//!
//! A resource set is a non-empty, order-insensitive collection of opaque
//! string identifiers. Its canonical form is the sorted, comma-joined
//! concatenation of its members; two acquisitions refer to the same
//! resources iff their canonical forms are byte-equal.

use crate::error::EmptyResourcesSnafu;
use crate::error::LockError;

/// Sort and deduplicate a caller-supplied resource set.
///
/// Rejects empty sets; lock semantics over zero resources are undefined.
pub(crate) fn canonical_members<R: AsRef<str>>(resources: &[R]) -> Result<Vec<String>, LockError> {
    if resources.is_empty() {
        return EmptyResourcesSnafu.fail();
    }
    let mut members: Vec<String> = resources.iter().map(|r| r.as_ref().to_string()).collect();
    members.sort();
    members.dedup();
    Ok(members)
}

/// The canonical form of already-sorted members.
pub(crate) fn canonical_form(members: &[String]) -> String {
    members.join(",")
}

/// Store keys for `members` under the `name` namespace.
///
/// Distinct lock names partition the keyspace: `(name, resource)` pairs
/// that differ in either coordinate never collide.
pub(crate) fn lease_keys(name: &str, members: &[String]) -> Vec<String> {
    members.iter().map(|member| format!("{name}:{member}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn members_are_sorted_and_deduplicated() {
        let members = canonical_members(&["b", "a", "c", "a"]).unwrap();
        assert_eq!(members, vec!["a", "b", "c"]);
        assert_eq!(canonical_form(&members), "a,b,c");
    }

    #[test]
    fn input_order_does_not_change_canonical_form() {
        let forward = canonical_members(&["r1", "r2"]).unwrap();
        let reverse = canonical_members(&["r2", "r1"]).unwrap();
        assert_eq!(canonical_form(&forward), canonical_form(&reverse));
    }

    #[test]
    fn empty_set_rejected() {
        let empty: &[&str] = &[];
        assert!(matches!(canonical_members(empty), Err(LockError::EmptyResources)));
    }

    #[test]
    fn keys_are_namespaced_by_lock_name() {
        let members = canonical_members(&["r"]).unwrap();
        assert_eq!(lease_keys("engine", &members), vec!["engine:r"]);
        assert_ne!(lease_keys("a", &members), lease_keys("b", &members));
    }
}
