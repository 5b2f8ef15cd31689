//! Sibling resolution shared by every value stored with allow_multi enabled.

use serde::de::DeserializeOwned;

/// A value that can be reconciled with a concurrent version of itself.
///
/// `Default` must be the identity of `merge`, and `merge` must be commutative,
/// associative and idempotent so that siblings can be folded in any order.
pub trait Mergeable: Default {
    fn merge(&mut self, other: &Self);
}

/// Folds `merge` over all siblings starting from an empty value.
/// Returns `None` when there is nothing to resolve (the key does not exist).
pub fn resolve_siblings<T: Mergeable>(siblings: impl IntoIterator<Item = T>) -> Option<T> {
    let mut siblings = siblings.into_iter().peekable();
    siblings.peek()?;

    let mut resolved = T::default();
    for sibling in siblings {
        resolved.merge(&sibling);
    }
    Some(resolved)
}

/// Decodes every sibling. One undecodable sibling fails the whole read.
pub fn decode_siblings<T: DeserializeOwned>(
    values: &[Vec<u8>],
) -> Result<Vec<T>, serde_json::Error> {
    values
        .iter()
        .map(|value| serde_json::from_slice(value))
        .collect()
}
