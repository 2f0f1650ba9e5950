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

//! The binary node modeling one `EXISTS`/`NOT EXISTS` correlation. A
//! Join routes constraints and combines costs; it never touches rows.

use serde::{Deserialize, Serialize};

use crate::ast::{CorrelatedOp, FieldCorrelation, FlipPin, PlanId};
use crate::constraint::PlannerConstraint;
use crate::cost::CostEstimate;
use crate::graph::NodeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Semi,
    Flipped,
}

/// Returned by `flip()` when the join may not transition; callers map this
/// into [`crate::error::PlannerError::NotFlippable`].
#[derive(Debug)]
pub(crate) struct NotFlippable;

#[derive(Debug)]
pub struct Join {
    plan_id: PlanId,
    parent: NodeRef,
    child: NodeRef,
    /// Constraint applied to the parent subgraph when this join is
    /// `flipped`: the parent-side correlation field set.
    parent_constraint: PlannerConstraint,
    /// Constraint applied to the child subgraph when this join is `semi`:
    /// the child-side correlation field set.
    child_constraint: PlannerConstraint,
    flippable: bool,
    initial_type: JoinType,

    join_type: JoinType,
}

/// A cheap, owned copy of a join's structural fields, taken before
/// recursive `&mut PlannerGraph` dispatch so the borrow on the join arena
/// doesn't outlive the call that reads it.
pub(crate) struct JoinSnapshot {
    pub(crate) join_type: JoinType,
    pub(crate) parent: NodeRef,
    pub(crate) child: NodeRef,
    pub(crate) parent_constraint: PlannerConstraint,
    pub(crate) child_constraint: PlannerConstraint,
}

impl Join {
    pub(crate) fn new(
        plan_id: PlanId,
        op: CorrelatedOp,
        flip_pin: FlipPin,
        parent: NodeRef,
        child: NodeRef,
        correlation: &FieldCorrelation,
    ) -> Self {
        let parent_constraint = PlannerConstraint::single(correlation.parent_field.clone());
        let child_constraint = PlannerConstraint::single(correlation.child_field.clone());

        // NOT_EXISTS is never flippable; a pinned flip also fixes the type
        // and removes it from enumeration.
        let (initial_type, flippable) = match (op, flip_pin) {
            (CorrelatedOp::NotExists, _) => (JoinType::Semi, false),
            (CorrelatedOp::Exists, FlipPin::ForceTrue) => (JoinType::Flipped, false),
            (CorrelatedOp::Exists, FlipPin::ForceFalse) => (JoinType::Semi, false),
            (CorrelatedOp::Exists, FlipPin::Unset) => (JoinType::Semi, true),
        };

        Self {
            plan_id,
            parent,
            child,
            parent_constraint,
            child_constraint,
            flippable,
            initial_type,
            join_type: initial_type,
        }
    }

    pub fn plan_id(&self) -> PlanId {
        self.plan_id
    }

    pub fn parent(&self) -> NodeRef {
        self.parent
    }

    pub fn child(&self) -> NodeRef {
        self.child
    }

    pub fn flippable(&self) -> bool {
        self.flippable
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    pub(crate) fn flip(&mut self) -> Result<(), NotFlippable> {
        if !self.flippable || self.join_type == JoinType::Flipped {
            return Err(NotFlippable);
        }
        self.join_type = JoinType::Flipped;
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.join_type = self.initial_type;
    }

    pub(crate) fn restore_type(&mut self, join_type: JoinType) {
        self.join_type = join_type;
    }

    pub(crate) fn clone_structure_for_propagation(&self) -> JoinSnapshot {
        JoinSnapshot {
            join_type: self.join_type,
            parent: self.parent,
            child: self.child,
            parent_constraint: self.parent_constraint.clone(),
            child_constraint: self.child_constraint.clone(),
        }
    }
}

/// The join cost formula. `is_pipeline` is whether the parent's
/// closest ancestor-in-cost-chain is itself a join (vs. a bare source).
pub(crate) fn combine(
    join_type: JoinType,
    parent: &CostEstimate,
    child: &CostEstimate,
    is_pipeline: bool,
) -> CostEstimate {
    let mut scan = parent.scan_est;
    if join_type == JoinType::Semi {
        if let Some(limit) = parent.limit {
            if child.selectivity > 0.0 {
                scan = scan.min(limit / child.selectivity);
            }
        }
    }

    let cost = match (join_type, is_pipeline) {
        (JoinType::Semi, true) => parent.cost + scan * (child.startup_cost + child.cost),
        (JoinType::Semi, false) => scan * (child.startup_cost + child.cost),
        (JoinType::Flipped, true) => child.startup_cost + child.cost * (parent.startup_cost + scan),
        (JoinType::Flipped, false) => child.cost * (parent.startup_cost + scan),
    };

    CostEstimate {
        startup_cost: parent.startup_cost,
        scan_est: scan,
        cost,
        returned_rows: parent.returned_rows,
        selectivity: parent.selectivity,
        limit: parent.limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(cost: f64, startup: f64, selectivity: f64, limit: Option<f64>) -> CostEstimate {
        CostEstimate {
            startup_cost: startup,
            scan_est: 100.0,
            cost,
            returned_rows: 100.0,
            selectivity,
            limit,
        }
    }

    #[test]
    fn semi_limit_shrinks_scan_by_child_selectivity() {
        let parent = estimate(0.0, 0.0, 1.0, Some(10.0));
        let child = estimate(5.0, 1.0, 0.5, None);
        let result = combine(JoinType::Semi, &parent, &child, false);
        // scan = min(100, 10 / 0.5) = 20
        assert_eq!(result.scan_est, 20.0);
        assert_eq!(result.cost, 20.0 * (1.0 + 5.0));
    }

    #[test]
    fn flipped_ignores_parent_limit_in_scan() {
        let parent = estimate(0.0, 0.0, 1.0, Some(10.0));
        let child = estimate(5.0, 1.0, 0.5, None);
        let result = combine(JoinType::Flipped, &parent, &child, false);
        assert_eq!(result.scan_est, 100.0);
        assert_eq!(result.cost, 5.0 * (0.0 + 100.0));
    }

    #[test]
    fn pinned_flip_survives_reset() {
        let correlation = FieldCorrelation {
            parent_field: "id".to_string(),
            child_field: "parent_id".to_string(),
        };
        let mut join = Join::new(
            PlanId(0),
            CorrelatedOp::Exists,
            FlipPin::ForceTrue,
            NodeRef::Connection(crate::graph::ConnectionId(0)),
            NodeRef::Connection(crate::graph::ConnectionId(1)),
            &correlation,
        );
        assert!(!join.flippable());
        assert_eq!(join.join_type(), JoinType::Flipped);
        join.reset();
        assert_eq!(join.join_type(), JoinType::Flipped);
    }
}
