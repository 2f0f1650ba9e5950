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

//! The optional debug-event stream. The sink is passive: it never
//! back-pressures the planner, and it absorbs events synchronously on the
//! calling thread, the way `risingwave_frontend`'s `ctx.trace(...)` explain
//! accumulator does for its own (differently shaped) trace stream.

use serde::{Deserialize, Serialize};

use crate::ast::{Condition, OrderKey, PlanId};
use crate::branch::BranchPattern;
use crate::constraint::PlannerConstraint;
use crate::cost::CostEstimate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Connection,
    Join,
    FanOut,
    FanIn,
    Terminus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinTypeTag {
    Semi,
    Flipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinStateEntry {
    pub plan_id: PlanId,
    pub flipped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConstraints {
    pub node_name: String,
    pub buckets: Vec<(BranchPattern, PlannerConstraint)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum DebugEvent {
    AttemptStart {
        attempt_number: usize,
        total_attempts: usize,
    },
    NodeCost {
        node_kind: NodeKind,
        node_name: String,
        branch_pattern: BranchPattern,
        downstream_selectivity: f64,
        cost_estimate: CostEstimate,
        filters: Option<Condition>,
        ordering: Option<Vec<OrderKey>>,
        join_type: Option<JoinTypeTag>,
    },
    NodeConstraint {
        node_kind: NodeKind,
        node_name: String,
        branch_pattern: BranchPattern,
        constraint: Option<PlannerConstraint>,
        from: String,
    },
    ConstraintsPropagated {
        attempt_number: usize,
        per_connection_constraints: Vec<ConnectionConstraints>,
    },
    PlanComplete {
        attempt_number: usize,
        total_cost: f64,
        flip_pattern_mask: u32,
        join_states: Vec<JoinStateEntry>,
    },
    PlanFailed {
        attempt_number: usize,
        reason: String,
    },
    BestPlanSelected {
        best_attempt_number: usize,
        total_cost: f64,
        flip_pattern_mask: u32,
        join_states: Vec<JoinStateEntry>,
    },
}

/// A passive sink for debug events. The default `()` implementation drops
/// everything, so attaching a sink is opt-in and free when unused.
pub trait DebugSink {
    fn emit(&mut self, event: DebugEvent);
}

impl DebugSink for () {
    fn emit(&mut self, _event: DebugEvent) {}
}

/// A sink that just accumulates every event in order, useful for tests and
/// for the CLI's `--trace` flag.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub events: Vec<DebugEvent>,
}

impl DebugSink for CollectingSink {
    fn emit(&mut self, event: DebugEvent) {
        self.events.push(event);
    }
}
