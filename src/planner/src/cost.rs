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

//! The cost-model collaborator interface and the `CostEstimate` record
//! nodes pass up the graph.

use serde::{Deserialize, Serialize};

use crate::ast::{Condition, OrderKey};
use crate::constraint::PlannerConstraint;

/// One node's cost estimate, as defined in the data model. `cost` and
/// `startup_cost` compose additively as estimates flow upward from leaves;
/// `selectivity` is a `[0, 1]` fraction of input rows surviving predicates
/// at or below this node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub startup_cost: f64,
    pub scan_est: f64,
    pub cost: f64,
    pub returned_rows: f64,
    pub selectivity: f64,
    pub limit: Option<f64>,
}

impl CostEstimate {
    /// The total cost of the plan rooted at this node: the quantity the
    /// search loop minimizes.
    pub fn total(&self) -> f64 {
        self.cost + self.startup_cost
    }
}

/// The external cost-model callback: `(table, ordering, filters,
/// constraint) -> (startup_cost, rows)`. Must be pure given its inputs and
/// must return non-negative values; the planner calls it many times per
/// enumeration attempt so it should be cheap.
pub trait CostModel {
    fn cost(
        &self,
        table: &str,
        ordering: &[OrderKey],
        filters: Option<&Condition>,
        constraint: Option<&PlannerConstraint>,
    ) -> anyhow::Result<(f64, f64)>;
}

impl<F> CostModel for F
where
    F: Fn(&str, &[OrderKey], Option<&Condition>, Option<&PlannerConstraint>) -> anyhow::Result<(f64, f64)>,
{
    fn cost(
        &self,
        table: &str,
        ordering: &[OrderKey],
        filters: Option<&Condition>,
        constraint: Option<&PlannerConstraint>,
    ) -> anyhow::Result<(f64, f64)> {
        (self)(table, ordering, filters, constraint)
    }
}
