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

//! The query AST the planner consumes and rewrites.
//!
//! This tree is owned by an external collaborator (the parser/binder). The
//! planner never constructs it from scratch; it only reads it (to build a
//! [`crate::graph::PlannerGraph`]) and, on success, produces a fresh copy
//! with `flip` set on every correlated subquery condition.

use serde::{Deserialize, Serialize};

/// A stable identifier stamped onto a [`CorrelatedSubquery`] by the builder
/// and carried through to the rewriter. Unique within one plan graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlanId(pub u32);

/// One column of a `ORDER BY` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderKey {
    pub column: String,
    pub desc: bool,
}

impl OrderKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            desc: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            desc: true,
        }
    }
}

/// The parent-field/child-field pair a correlation is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCorrelation {
    pub parent_field: String,
    pub child_field: String,
}

/// `EXISTS` or `NOT EXISTS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelatedOp {
    Exists,
    NotExists,
}

/// The user-supplied, three-valued override on a correlated subquery's flip
/// state. Distinct from the boolean `flip` the rewriter ultimately emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlipPin {
    #[default]
    Unset,
    ForceTrue,
    ForceFalse,
}

/// An opaque, uninterpreted row predicate. The planner never inspects its
/// contents; it is passed through verbatim to the cost-model callback and
/// copied unchanged by the rewriter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplePredicate {
    pub text: String,
}

impl SimplePredicate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A filter condition attached to a query node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    Simple(SimplePredicate),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    CorrelatedSubquery(Box<CorrelatedSubquery>),
}

impl Condition {
    /// Whether this condition (or any conjunct/disjunct nested in it)
    /// contains a correlated subquery. Used by the builder to decide
    /// whether an `OR` branch needs structural handling (FanOut/FanIn) or
    /// is a plain row predicate left to the filter layer.
    pub fn contains_correlated_subquery(&self) -> bool {
        match self {
            Condition::Simple(_) => false,
            Condition::And(cs) | Condition::Or(cs) => {
                cs.iter().any(Condition::contains_correlated_subquery)
            }
            Condition::CorrelatedSubquery(_) => true,
        }
    }
}

/// A `WHERE EXISTS (...)` / `WHERE NOT EXISTS (...)` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedSubquery {
    /// Stamped by the builder; `None` on a freshly parsed AST.
    pub plan_id: Option<PlanId>,
    pub op: CorrelatedOp,
    pub flip_pin: FlipPin,
    /// Output slot. Meaningless on input except that it mirrors a pinned
    /// `flip_pin`; the rewriter always emits a concrete value here.
    pub flip: bool,
    pub correlation: FieldCorrelation,
    pub query: Box<Query>,
}

impl CorrelatedSubquery {
    pub fn new(op: CorrelatedOp, correlation: FieldCorrelation, query: Query) -> Self {
        Self {
            plan_id: None,
            op,
            flip_pin: FlipPin::Unset,
            flip: false,
            correlation,
            query: Box::new(query),
        }
    }

    pub fn with_flip_pin(mut self, pin: FlipPin) -> Self {
        self.flip_pin = pin;
        self.flip = matches!(pin, FlipPin::ForceTrue);
        self
    }
}

/// A "related" (nested, non-correlated-filter) subquery of a query node,
/// e.g. a field that itself resolves to a sub-relation. Each gets its own
/// plan graph, scoped independently from its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedSubquery {
    pub alias: String,
    pub correlation: FieldCorrelation,
    pub query: Box<Query>,
}

/// One query node: a table scan plus ordering, filter, limit, and any
/// related (nested) subqueries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub table: String,
    #[serde(default)]
    pub ordering: Vec<OrderKey>,
    #[serde(default)]
    pub filter: Option<Condition>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub related: Vec<RelatedSubquery>,
}

impl Query {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ordering: Vec::new(),
            filter: None,
            limit: None,
            related: Vec::new(),
        }
    }

    pub fn with_ordering(mut self, ordering: Vec<OrderKey>) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_filter(mut self, filter: Condition) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_related(mut self, related: Vec<RelatedSubquery>) -> Self {
        self.related = related;
        self
    }
}
