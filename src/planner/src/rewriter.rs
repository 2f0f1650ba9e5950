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

//! Functional AST rewrite: copy the tree, setting `flip` on every
//! correlated-subquery condition according to the planner's chosen masks.
//! Nothing here mutates its input.

use std::collections::BTreeSet;

use crate::ast::{Condition, PlanId, Query, RelatedSubquery};
use crate::builder::ScopePlan;
use crate::graph::JoinType;

/// Collect the `plan_id` of every join whose final type is `flipped` in
/// this graph (not its related sub-plans).
fn flipped_set(scope: &ScopePlan) -> BTreeSet<PlanId> {
    scope
        .graph
        .join_ids()
        .filter(|&id| scope.graph.join(id).join_type() == JoinType::Flipped)
        .map(|id| scope.graph.join(id).plan_id())
        .collect()
}

/// Rewrite `query` using `scope`'s planning result, recursing into related
/// subqueries (and correlated subqueries' nested queries) with their own
/// sub-plans.
pub fn rewrite(query: &Query, scope: &ScopePlan) -> Query {
    let flipped = flipped_set(scope);
    rewrite_query(query, scope, &flipped, None)
}

fn rewrite_query(query: &Query, scope: &ScopePlan, flipped: &BTreeSet<PlanId>, owner: Option<PlanId>) -> Query {
    let filter = query.filter.as_ref().map(|c| rewrite_condition(c, scope, flipped));

    let empty = std::collections::BTreeMap::new();
    let related_plans = scope.related.get(&owner).unwrap_or(&empty);
    let related = query
        .related
        .iter()
        .map(|rel| rewrite_related(rel, related_plans))
        .collect();

    Query {
        table: query.table.clone(),
        ordering: query.ordering.clone(),
        filter,
        limit: query.limit,
        related,
    }
}

fn rewrite_related(rel: &RelatedSubquery, related_plans: &std::collections::BTreeMap<String, ScopePlan>) -> RelatedSubquery {
    let query = match related_plans.get(&rel.alias) {
        Some(sub_plan) => rewrite(&rel.query, sub_plan),
        None => (*rel.query).clone(),
    };
    RelatedSubquery {
        alias: rel.alias.clone(),
        correlation: rel.correlation.clone(),
        query: Box::new(query),
    }
}

fn rewrite_condition(condition: &Condition, scope: &ScopePlan, flipped: &BTreeSet<PlanId>) -> Condition {
    match condition {
        Condition::Simple(predicate) => Condition::Simple(predicate.clone()),
        Condition::And(parts) => Condition::And(parts.iter().map(|c| rewrite_condition(c, scope, flipped)).collect()),
        Condition::Or(parts) => Condition::Or(parts.iter().map(|c| rewrite_condition(c, scope, flipped)).collect()),
        Condition::CorrelatedSubquery(sub) => {
            let plan_id = sub.plan_id.expect("builder stamps every correlated subquery");
            let flip = flipped.contains(&plan_id);
            let nested = rewrite_query(&sub.query, scope, flipped, Some(plan_id));
            Condition::CorrelatedSubquery(Box::new(crate::ast::CorrelatedSubquery {
                plan_id: sub.plan_id,
                op: sub.op,
                flip_pin: sub.flip_pin,
                flip,
                correlation: sub.correlation.clone(),
                query: Box::new(nested),
            }))
        }
    }
}
