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

//! The enumeration loop over flip patterns.

use tracing::{debug, warn};

use crate::branch::BranchPattern;
use crate::debug::{ConnectionConstraints, DebugEvent, DebugSink, JoinStateEntry, JoinTypeTag, NodeKind};
use crate::error::Result;
use crate::graph::{CostQuery, JoinType, PlannerGraph};

/// Safety-gate bound on the number of flippable joins a single graph may
/// enumerate over. `2^MAX_FLIPPABLE_JOINS` attempts is the worst case.
pub const MAX_FLIPPABLE_JOINS: usize = 9;

/// What came out of [`plan`] for one graph.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    /// Enumeration ran to completion; the graph is left with the best
    /// mask's state restored.
    Planned {
        best_mask: u32,
        best_cost: f64,
        attempts: usize,
    },
    /// The safety gate tripped: `flippable` exceeded [`MAX_FLIPPABLE_JOINS`].
    /// No attempt ran; the graph is left in its freshly-reset (all-semi,
    /// modulo pinned joins) state, so the caller should treat every join
    /// in this graph as unflipped.
    TooManyFlippableJoins { flippable: usize },
}

/// Run the full enumeration loop for one plan graph, using the
/// default [`MAX_FLIPPABLE_JOINS`] safety gate.
pub fn plan(graph: &mut PlannerGraph, debug_sink: &mut dyn DebugSink) -> Result<PlanOutcome> {
    plan_with_limit(graph, debug_sink, MAX_FLIPPABLE_JOINS)
}

/// As [`plan`], but with an overridden safety-gate bound. The CLI exposes
/// this via `--max-flippable-joins`; library callers should normally just
/// use [`plan`].
pub fn plan_with_limit(graph: &mut PlannerGraph, debug_sink: &mut dyn DebugSink, max_flippable_joins: usize) -> Result<PlanOutcome> {
    let flippable = graph.flippable_joins().len();
    if flippable > max_flippable_joins {
        warn!(flippable, max = max_flippable_joins, "too many flippable joins; running unoptimized");
        graph.reset_planning_state();
        return Ok(PlanOutcome::TooManyFlippableJoins { flippable });
    }

    let total_attempts = 1usize << flippable;
    let mut best_mask = 0u32;
    let mut best_cost = f64::INFINITY;
    let mut best_snapshot = None;

    for mask in 0..total_attempts as u32 {
        debug_sink.emit(DebugEvent::AttemptStart {
            attempt_number: mask as usize,
            total_attempts,
        });

        graph.reset_planning_state();
        graph.apply_flip_pattern(mask)?;
        graph.derive_fan_variants();
        graph.propagate_all_unlimits();
        graph.propagate_constraints()?;

        emit_constraint_snapshot(graph, debug_sink, mask as usize);

        match graph.total_cost() {
            Ok(total) => {
                debug!(mask, total, "attempt complete");
                emit_node_costs(graph, debug_sink);
                let join_states = join_state_entries(graph);
                debug_sink.emit(DebugEvent::PlanComplete {
                    attempt_number: mask as usize,
                    total_cost: total,
                    flip_pattern_mask: mask,
                    join_states,
                });
                if total < best_cost {
                    best_cost = total;
                    best_mask = mask;
                    best_snapshot = Some(graph.capture_planning_snapshot());
                }
            }
            Err(err) => {
                debug_sink.emit(DebugEvent::PlanFailed {
                    attempt_number: mask as usize,
                    reason: err.to_string(),
                });
                return Err(err);
            }
        }
    }

    if let Some(snapshot) = best_snapshot {
        graph.restore_planning_snapshot(&snapshot)?;
        graph.propagate_constraints()?;
        let join_states = join_state_entries(graph);
        debug_sink.emit(DebugEvent::BestPlanSelected {
            best_attempt_number: best_mask as usize,
            total_cost: best_cost,
            flip_pattern_mask: best_mask,
            join_states,
        });
    }

    Ok(PlanOutcome::Planned {
        best_mask,
        best_cost,
        attempts: total_attempts,
    })
}

fn join_state_entries(graph: &PlannerGraph) -> Vec<JoinStateEntry> {
    graph
        .join_ids()
        .map(|id| {
            let join = graph.join(id);
            JoinStateEntry {
                plan_id: join.plan_id(),
                flipped: join.join_type() == JoinType::Flipped,
            }
        })
        .collect()
}

fn emit_constraint_snapshot(graph: &PlannerGraph, debug_sink: &mut dyn DebugSink, attempt_number: usize) {
    let per_connection_constraints = graph
        .connection_ids()
        .map(|id| {
            let connection = graph.connection(id);
            let buckets = connection
                .capture_constraints()
                .into_iter()
                .filter_map(|(pattern, constraint)| constraint.map(|c| (pattern, c)))
                .collect();
            ConnectionConstraints {
                node_name: format!("connection#{}", id.index()),
                buckets,
            }
        })
        .collect();
    debug_sink.emit(DebugEvent::ConstraintsPropagated {
        attempt_number,
        per_connection_constraints,
    });
}

/// One `node_cost` event per node per attempt, using the aggregate
/// (`ALL`-pattern) cost for connections: this trace is for humans
/// inspecting a single attempt, not for the planning math itself, which
/// always queries specific branch patterns.
fn emit_node_costs(graph: &mut PlannerGraph, debug_sink: &mut dyn DebugSink) {
    for id in graph.connection_ids() {
        if let Ok(cost_estimate) = graph.dispatch_cost(crate::graph::NodeRef::Connection(id), CostQuery::All, 1.0) {
            let connection = graph.connection(id);
            debug_sink.emit(DebugEvent::NodeCost {
                node_kind: NodeKind::Connection,
                node_name: format!("connection#{}", id.index()),
                branch_pattern: BranchPattern::root(),
                downstream_selectivity: 1.0,
                cost_estimate,
                filters: connection.filter().cloned(),
                ordering: Some(connection.ordering().to_vec()),
                join_type: None,
            });
        }
    }
    for id in graph.join_ids() {
        let join_type = graph.join(id).join_type();
        if let Ok(cost_estimate) = graph.dispatch_cost(crate::graph::NodeRef::Join(id), CostQuery::Pattern(BranchPattern::root()), 1.0) {
            debug_sink.emit(DebugEvent::NodeCost {
                node_kind: NodeKind::Join,
                node_name: format!("join#{}", id.index()),
                branch_pattern: BranchPattern::root(),
                downstream_selectivity: 1.0,
                cost_estimate,
                filters: None,
                ordering: None,
                join_type: Some(match join_type {
                    JoinType::Semi => JoinTypeTag::Semi,
                    JoinType::Flipped => JoinTypeTag::Flipped,
                }),
            });
        }
    }
}
