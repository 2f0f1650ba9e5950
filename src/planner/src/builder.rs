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

//! Recursive-descent construction of plan graphs from a query AST.
//!
//! A single [`ScopePlan`] corresponds to one plan graph: the top-level
//! query, or one related subquery. A correlated (`EXISTS`/`NOT EXISTS`)
//! subquery is built *inline* into its parent's graph (a Join, not a new
//! graph); a *related* subquery always gets its own fresh graph, recorded
//! under the alias it was declared with.

use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use crate::ast::{Condition, PlanId, Query};
use crate::constraint::PlannerConstraint;
use crate::cost::CostModel;
use crate::graph::{Connection, FanIn, FanOut, Join, NodeRef, PlannerGraph};

/// One plan graph plus the related-subquery plans anchored inside it.
///
/// `related` is keyed by the `plan_id` of the correlated-subquery condition
/// whose nested query declared the related subqueries, or `None` for the
/// graph's own root query. Each inner map is then keyed by alias, matching
/// how the rewriter looks related subqueries back up while walking the AST.
pub struct ScopePlan {
    pub graph: PlannerGraph,
    pub related: BTreeMap<Option<PlanId>, BTreeMap<String, ScopePlan>>,
}

/// Build the plan graph (and all nested related-subquery graphs) for a
/// query AST, stamping a fresh `plan_id` onto every correlated-subquery
/// condition as it goes.
pub fn build(query: &mut Query, cost_model: Rc<dyn CostModel>) -> ScopePlan {
    let base_limit = query.limit.map(|l| l as f64);
    build_scope(query, None, base_limit, cost_model)
}

fn build_scope(
    query: &mut Query,
    base_constraints: Option<PlannerConstraint>,
    base_limit: Option<f64>,
    cost_model: Rc<dyn CostModel>,
) -> ScopePlan {
    let mut graph = PlannerGraph::new(Rc::clone(&cost_model));
    let mut related: BTreeMap<Option<PlanId>, BTreeMap<String, ScopePlan>> = BTreeMap::new();
    let mut next_plan_id = 0u32;

    let root_connection = graph.push_connection(Connection::new(
        query.table.clone(),
        query.ordering.clone(),
        query.filter.clone(),
        base_constraints,
        base_limit,
    ));
    let mut end = NodeRef::Connection(root_connection);

    if let Some(filter) = query.filter.as_mut() {
        end = process_condition(&mut graph, filter, end, &cost_model, &mut next_plan_id, &mut related);
    }

    let mut root_related = BTreeMap::new();
    for rel in query.related.iter_mut() {
        let child_base = Some(PlannerConstraint::single(rel.correlation.child_field.clone()));
        let rel_limit = rel.query.limit.map(|l| l as f64);
        let sub_plan = build_scope(&mut rel.query, child_base, rel_limit, Rc::clone(&cost_model));
        root_related.insert(rel.alias.clone(), sub_plan);
    }
    related.insert(None, root_related);

    graph.set_terminus_input(end);
    ScopePlan { graph, related }
}

fn process_condition(
    graph: &mut PlannerGraph,
    condition: &mut Condition,
    end: NodeRef,
    cost_model: &Rc<dyn CostModel>,
    next_plan_id: &mut u32,
    related: &mut BTreeMap<Option<PlanId>, BTreeMap<String, ScopePlan>>,
) -> NodeRef {
    match condition {
        // The predicate text is already carried on the connection from
        // construction; no structural change needed.
        Condition::Simple(_) => end,

        Condition::And(parts) => {
            let mut current = end;
            for part in parts.iter_mut() {
                current = process_condition(graph, part, current, cost_model, next_plan_id, related);
            }
            current
        }

        Condition::Or(parts) => {
            let branch_indices: Vec<usize> = parts
                .iter()
                .enumerate()
                .filter(|(_, c)| c.contains_correlated_subquery())
                .map(|(i, _)| i)
                .collect();
            if branch_indices.is_empty() {
                return end;
            }

            let fan_out_id = graph.push_fan_out(FanOut::new(end));

            let joins_before = graph.join_ids().count();
            let mut tails = Vec::with_capacity(branch_indices.len());
            for i in branch_indices {
                let tail = process_condition(
                    graph,
                    &mut parts[i],
                    NodeRef::FanOut(fan_out_id),
                    cost_model,
                    next_plan_id,
                    related,
                );
                tails.push(tail);
            }
            let joins_after = graph.join_ids().count();

            let fan_in_id = graph.push_fan_in(FanIn::new(tails.clone()));

            let joins_between = (joins_before..joins_after)
                .map(crate::graph::JoinId::from_index)
                .collect();
            graph.record_fan_pair(fan_out_id, fan_in_id, joins_between);

            NodeRef::FanIn(fan_in_id)
        }

        Condition::CorrelatedSubquery(sub) => {
            let plan_id = PlanId(*next_plan_id);
            *next_plan_id += 1;
            sub.plan_id = Some(plan_id);
            debug!(?plan_id, table = %sub.query.table, op = ?sub.op, "stamped correlated subquery");

            // Correlation lives in the join itself, so the child
            // connection gets no base constraint; its limit is 1 for an
            // EXISTS probe and absent for NOT_EXISTS.
            let child_limit = match sub.op {
                crate::ast::CorrelatedOp::Exists => Some(1.0),
                crate::ast::CorrelatedOp::NotExists => None,
            };
            let child_connection_id = graph.push_connection(Connection::new(
                sub.query.table.clone(),
                sub.query.ordering.clone(),
                sub.query.filter.clone(),
                None,
                child_limit,
            ));
            let mut child_end = NodeRef::Connection(child_connection_id);
            if let Some(child_filter) = sub.query.filter.as_mut() {
                child_end = process_condition(graph, child_filter, child_end, cost_model, next_plan_id, related);
            }

            let mut child_related = BTreeMap::new();
            for rel in sub.query.related.iter_mut() {
                let child_base = Some(PlannerConstraint::single(rel.correlation.child_field.clone()));
                let rel_limit = rel.query.limit.map(|l| l as f64);
                let sub_plan = build_scope(&mut rel.query, child_base, rel_limit, Rc::clone(cost_model));
                child_related.insert(rel.alias.clone(), sub_plan);
            }
            related.insert(Some(plan_id), child_related);

            let join_id = graph.push_join(Join::new(plan_id, sub.op, sub.flip_pin, end, child_end, &sub.correlation));

            NodeRef::Join(join_id)
        }
    }
}
