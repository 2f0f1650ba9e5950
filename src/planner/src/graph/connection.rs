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

//! The leaf node of a plan graph: a single table scan.

use std::collections::BTreeMap;

use crate::ast::{Condition, OrderKey};
use crate::branch::BranchPattern;
use crate::constraint::PlannerConstraint;
use crate::cost::{CostEstimate, CostModel};
use crate::graph::CostQuery;

#[derive(Debug)]
pub struct Connection {
    table: String,
    ordering: Vec<OrderKey>,
    filter: Option<Condition>,
    /// The constraint fixed at build time: correlation fields for a child
    /// scope, or absent for a scope root.
    base_constraints: Option<PlannerConstraint>,
    initial_limit: Option<f64>,

    limit: Option<f64>,
    /// One entry per distinct branch pattern that reached this connection
    /// during the current attempt's constraint propagation.
    constraints: BTreeMap<BranchPattern, Option<PlannerConstraint>>,
    bucket_cache: BTreeMap<BranchPattern, CostEstimate>,
    total_cache: Option<CostEstimate>,
}

impl Connection {
    pub(crate) fn new(
        table: impl Into<String>,
        ordering: Vec<OrderKey>,
        filter: Option<Condition>,
        base_constraints: Option<PlannerConstraint>,
        initial_limit: Option<f64>,
    ) -> Self {
        Self {
            table: table.into(),
            ordering,
            filter,
            base_constraints,
            initial_limit,
            limit: initial_limit,
            constraints: BTreeMap::new(),
            bucket_cache: BTreeMap::new(),
            total_cache: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn ordering(&self) -> &[OrderKey] {
        &self.ordering
    }

    pub fn filter(&self) -> Option<&Condition> {
        self.filter.as_ref()
    }

    pub fn limit(&self) -> Option<f64> {
        self.limit
    }

    pub(crate) fn reset(&mut self) {
        self.limit = self.initial_limit;
        self.constraints.clear();
        self.invalidate_caches();
    }

    /// A flipped join upstream removes the bound that would otherwise let
    /// this scan stop early.
    pub(crate) fn unlimit(&mut self) {
        self.limit = None;
    }

    pub(crate) fn propagate_constraints(&mut self, pattern: BranchPattern, incoming: Option<PlannerConstraint>) {
        self.constraints.insert(pattern, incoming);
        self.invalidate_caches();
    }

    fn invalidate_caches(&mut self) {
        self.bucket_cache.clear();
        self.total_cache = None;
    }

    pub(crate) fn capture_constraints(&self) -> Vec<(BranchPattern, Option<PlannerConstraint>)> {
        self.constraints
            .iter()
            .map(|(p, c)| (p.clone(), c.clone()))
            .collect()
    }

    pub(crate) fn restore_constraints(&mut self, constraints: Vec<(BranchPattern, Option<PlannerConstraint>)>) {
        self.constraints = constraints.into_iter().collect();
        self.invalidate_caches();
    }

    pub(crate) fn restore_limit(&mut self, limit: Option<f64>) {
        self.limit = limit;
    }

    /// `selectivity = rows(table, merged constraint) / rows(table, no
    /// constraint)`: the fraction of the unconstrained scan that
    /// survives the propagated correlation constraint. A connection with
    /// no propagated constraint (neither base nor incoming) has
    /// selectivity `1.0` by definition, and costs the model only once.
    fn compute_bucket(
        &self,
        pattern: &BranchPattern,
        _downstream_selectivity: f64,
        cost_model: &dyn CostModel,
    ) -> anyhow::Result<CostEstimate> {
        let propagated = self.constraints.get(pattern).cloned().flatten();
        let merged = PlannerConstraint::merge(self.base_constraints.as_ref(), propagated.as_ref());
        let (startup_cost, rows) = cost_model.cost(&self.table, &self.ordering, self.filter.as_ref(), merged.as_ref())?;

        let selectivity = match &merged {
            None => 1.0,
            Some(c) if c.is_empty() => 1.0,
            Some(_) => {
                let (_, baseline_rows) = cost_model.cost(&self.table, &self.ordering, self.filter.as_ref(), None)?;
                if baseline_rows > 0.0 {
                    (rows / baseline_rows).clamp(0.0, 1.0)
                } else {
                    0.0
                }
            }
        };

        Ok(CostEstimate {
            startup_cost,
            scan_est: rows,
            cost: rows,
            returned_rows: rows,
            selectivity,
            limit: self.limit,
        })
    }

    pub(crate) fn estimate_cost(
        &mut self,
        query: CostQuery,
        downstream_selectivity: f64,
        cost_model: &dyn CostModel,
    ) -> anyhow::Result<CostEstimate> {
        match query {
            CostQuery::Pattern(pattern) => {
                if let Some(cached) = self.bucket_cache.get(&pattern) {
                    return Ok(*cached);
                }
                let estimate = self.compute_bucket(&pattern, downstream_selectivity, cost_model)?;
                self.bucket_cache.insert(pattern, estimate);
                Ok(estimate)
            }
            CostQuery::All => {
                if let Some(cached) = self.total_cache {
                    return Ok(cached);
                }
                let patterns: Vec<BranchPattern> = self.constraints.keys().cloned().collect();
                let patterns = if patterns.is_empty() {
                    vec![BranchPattern::root()]
                } else {
                    patterns
                };
                let mut acc = CostEstimate {
                    startup_cost: 0.0,
                    scan_est: 0.0,
                    cost: 0.0,
                    returned_rows: 0.0,
                    selectivity: 0.0,
                    limit: self.limit,
                };
                let mut first_selectivity = None;
                for pattern in patterns {
                    let estimate = self.estimate_cost(CostQuery::Pattern(pattern), downstream_selectivity, cost_model)?;
                    acc.startup_cost += estimate.startup_cost;
                    acc.scan_est += estimate.scan_est;
                    acc.cost += estimate.cost;
                    acc.returned_rows += estimate.returned_rows;
                    first_selectivity.get_or_insert(estimate.selectivity);
                }
                acc.selectivity = first_selectivity.unwrap_or(1.0);
                self.total_cache = Some(acc);
                Ok(acc)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::PlannerConstraint;

    fn toy_model(base_rows: f64, selective_rows: f64) -> impl CostModel {
        move |_table: &str, _ordering: &[OrderKey], _filters: Option<&Condition>, constraint: Option<&PlannerConstraint>| {
            let rows = if constraint.map(|c| !c.is_empty()).unwrap_or(false) {
                selective_rows
            } else {
                base_rows
            };
            Ok((1.0, rows))
        }
    }

    #[test]
    fn unconstrained_connection_has_full_selectivity() {
        let mut connection = Connection::new("t", vec![], None, None, None);
        let model = toy_model(1000.0, 10.0);
        let estimate = connection
            .estimate_cost(CostQuery::Pattern(BranchPattern::root()), 1.0, &model)
            .unwrap();
        assert_eq!(estimate.selectivity, 1.0);
        assert_eq!(estimate.scan_est, 1000.0);
    }

    #[test]
    fn propagated_constraint_narrows_selectivity() {
        let mut connection = Connection::new("t", vec![], None, None, None);
        connection.propagate_constraints(BranchPattern::root(), Some(PlannerConstraint::single("id")));
        let model = toy_model(1000.0, 10.0);
        let estimate = connection
            .estimate_cost(CostQuery::Pattern(BranchPattern::root()), 1.0, &model)
            .unwrap();
        assert_eq!(estimate.selectivity, 0.01);
        assert_eq!(estimate.scan_est, 10.0);
    }

    #[test]
    fn distinct_patterns_sum_under_all() {
        let mut connection = Connection::new("t", vec![], None, None, None);
        connection.propagate_constraints(BranchPattern::root().prepend_branch(0), None);
        connection.propagate_constraints(BranchPattern::root().prepend_branch(1), Some(PlannerConstraint::single("id")));
        let model = toy_model(1000.0, 10.0);
        let total = connection.estimate_cost(CostQuery::All, 1.0, &model).unwrap();
        assert_eq!(total.scan_est, 1010.0);
    }

    #[test]
    fn reset_clears_constraints_and_limit() {
        let mut connection = Connection::new("t", vec![], None, None, Some(5.0));
        connection.unlimit();
        connection.propagate_constraints(BranchPattern::root(), Some(PlannerConstraint::single("id")));
        connection.reset();
        assert_eq!(connection.limit(), Some(5.0));
        assert!(connection.capture_constraints().is_empty());
    }
}
