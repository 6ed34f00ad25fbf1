//! Ordered multimap from owning id to child rows.
//!
//! Junction and child tables come back as flat row sets; every
//! materialization step needs them bucketed by parent id with the store's
//! row order preserved inside each bucket.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct OwnerGroups<T> {
    groups: HashMap<i64, Vec<T>>,
}

impl<T> Default for OwnerGroups<T> {
    fn default() -> Self {
        Self {
            groups: HashMap::new(),
        }
    }
}

impl<T> OwnerGroups<T> {
    /// Group `(owner_id, row)` pairs, as produced by keyed join queries
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (i64, T)>,
    {
        let mut groups: HashMap<i64, Vec<T>> = HashMap::new();
        for (owner, row) in pairs {
            groups.entry(owner).or_default().push(row);
        }
        Self { groups }
    }

    /// Group rows that carry their own owner id
    pub fn group_by<I, F>(rows: I, owner: F) -> Self
    where
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> i64,
    {
        Self::from_pairs(rows.into_iter().map(|row| (owner(&row), row)))
    }

    /// Rows for `owner` in input order; empty when the owner has none
    pub fn get(&self, owner: i64) -> &[T] {
        self.groups.get(&owner).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Shorthand for [`OwnerGroups::group_by`]
pub fn group_by_owner<T, I, F>(rows: I, owner: F) -> OwnerGroups<T>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> i64,
{
    OwnerGroups::group_by(rows, owner)
}
