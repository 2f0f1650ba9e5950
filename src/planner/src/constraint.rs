// Copyright 2026 The Joinflip Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Column sets that become available as lookup keys to a connection once
//! bound from an outer stream.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A set of column names bound from an outer (driving) row. `merge` unions
/// two optional constraints the way the join's constraint propagation rules
/// require.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerConstraint(BTreeSet<String>);

impl PlannerConstraint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(column: impl Into<String>) -> Self {
        let mut set = BTreeSet::new();
        set.insert(column.into());
        Self(set)
    }

    pub fn from_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(columns.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    fn union_with(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0).cloned().collect())
    }

    /// Union of two optional constraints; either (or both) may be absent.
    pub fn merge(a: Option<&Self>, b: Option<&Self>) -> Option<Self> {
        match (a, b) {
            (None, None) => None,
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (Some(a), Some(b)) => Some(a.union_with(b)),
        }
    }
}

impl fmt::Display for PlannerConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.0.iter().cloned().collect::<Vec<_>>().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_union() {
        let a = PlannerConstraint::single("user_id");
        let b = PlannerConstraint::single("tenant_id");
        let merged = PlannerConstraint::merge(Some(&a), Some(&b)).unwrap();
        assert!(merged.contains("user_id"));
        assert!(merged.contains("tenant_id"));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_with_absent_operand() {
        let a = PlannerConstraint::single("user_id");
        assert_eq!(PlannerConstraint::merge(Some(&a), None), Some(a.clone()));
        assert_eq!(PlannerConstraint::merge(None, Some(&a)), Some(a));
        assert_eq!(PlannerConstraint::merge(None, None), None);
    }
}
