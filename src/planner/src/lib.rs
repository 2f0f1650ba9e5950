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

//! `joinflip` decides, for each `EXISTS`/`NOT EXISTS` correlation in a
//! query AST, whether to run it as a semi-join or a flipped join.
//!
//! The entry points are [`plan`] and [`plan_verbose`]: both take an
//! immutable query AST and a cost-model callback, and return a copy of the
//! AST with every correlated subquery's `flip` set. Planning never fails
//! the caller's query — an internal search failure propagates as an
//! error, but an oversized search (too many flippable joins) degrades to
//! returning the query unoptimized rather than refusing to plan at all.

pub mod ast;
pub mod branch;
pub mod builder;
pub mod constraint;
pub mod cost;
pub mod debug;
pub mod error;
pub mod graph;
pub mod planner;
pub mod rewriter;

use std::rc::Rc;

use tracing::instrument;

use crate::ast::Query;
use crate::builder::ScopePlan;
use crate::cost::CostModel;
use crate::debug::DebugSink;
use crate::error::Result;
use crate::planner::PlanOutcome;

/// The result of planning one query: the rewritten AST plus the root
/// graph's enumeration outcome. Nested related/correlated scopes are
/// planned too but their individual outcomes aren't surfaced here — a
/// safety-gate trip in a nested scope only degrades that scope.
#[derive(Debug, Clone)]
pub struct PlanResult {
    pub query: Query,
    pub root_outcome: PlanOutcome,
}

/// Plan `query` against `cost_model`, discarding debug events.
pub fn plan(query: &Query, cost_model: impl CostModel + 'static) -> Result<Query> {
    Ok(plan_verbose(query, cost_model, &mut ())?.query)
}

/// Plan `query` against `cost_model`, emitting a full debug-event stream
/// to `debug_sink`.
pub fn plan_verbose(
    query: &Query,
    cost_model: impl CostModel + 'static,
    debug_sink: &mut dyn DebugSink,
) -> Result<PlanResult> {
    plan_verbose_with_limit(query, cost_model, debug_sink, planner::MAX_FLIPPABLE_JOINS)
}

/// As [`plan_verbose`], but overriding the per-graph safety-gate bound
/// (the CLI's `--max-flippable-joins`).
#[instrument(skip_all)]
pub fn plan_verbose_with_limit(
    query: &Query,
    cost_model: impl CostModel + 'static,
    debug_sink: &mut dyn DebugSink,
    max_flippable_joins: usize,
) -> Result<PlanResult> {
    let cost_model: Rc<dyn CostModel> = Rc::new(cost_model);
    let mut stamped = query.clone();
    let mut scope = builder::build(&mut stamped, cost_model);

    let root_outcome = plan_scope(&mut scope, debug_sink, max_flippable_joins)?;
    let rewritten = rewriter::rewrite(&stamped, &scope);

    Ok(PlanResult {
        query: rewritten,
        root_outcome,
    })
}

/// Plan every related sub-scope before the scope that owns them: graphs
/// are planned independently, leaves-first. Independence means the order
/// has no effect on any individual outcome; this just keeps the traversal
/// predictable.
fn plan_scope(scope: &mut ScopePlan, debug_sink: &mut dyn DebugSink, max_flippable_joins: usize) -> Result<PlanOutcome> {
    for nested in scope.related.values_mut() {
        for sub_plan in nested.values_mut() {
            plan_scope(sub_plan, debug_sink, max_flippable_joins)?;
        }
    }
    planner::plan_with_limit(&mut scope.graph, debug_sink, max_flippable_joins)
}
