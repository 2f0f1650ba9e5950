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

//! The plan graph: one arena per correlation scope.
//!
//! Nodes live in parallel `Vec`s indexed by small integer ids, per the
//! "dual-state" design note: structure is set once at construction,
//! planning state is churned and reset between enumeration attempts. This
//! avoids any borrow-checker tension between a node and its neighbors,
//! because every cross-node reference is an id, not a borrow, and every
//! mutation goes through `&mut PlannerGraph`.

mod connection;
mod fan;
mod join;
mod terminus;

pub use connection::Connection;
pub use fan::{FanIn, FanInVariant, FanOut, FanOutVariant};
pub use join::{Join, JoinType};
pub use terminus::Terminus;

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::branch::BranchPattern;
use crate::constraint::PlannerConstraint;
use crate::cost::{CostEstimate, CostModel};
use crate::error::{PlannerError, Result, SnapshotShape};

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub(crate) usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }

            pub(crate) fn from_index(index: usize) -> Self {
                Self(index)
            }
        }
    };
}

define_id!(ConnectionId);
define_id!(JoinId);
define_id!(FanOutId);
define_id!(FanInId);

/// A reference to any structural node in a plan graph. The terminus is not
/// representable as a `NodeRef`: it is the unique root and is never
/// anyone's predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRef {
    Connection(ConnectionId),
    Join(JoinId),
    FanOut(FanOutId),
    FanIn(FanInId),
}

/// Which bucket of a connection's accumulated constraints to cost.
/// `All` sums every bucket touched this attempt and exists for the
/// debug-trace layer; the planning math itself always asks for a specific
/// pattern, mirroring how each node is reached from exactly one place in
/// the tree at a given branch pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CostQuery {
    All,
    Pattern(BranchPattern),
}

/// A `(FanOut, FanIn, joins strictly between them)` triple, recorded by the
/// builder as it wires an `OR` region. Used every enumeration
/// attempt to decide whether the pair should present as `FO`/`FI` or
/// `UFO`/`UFI`.
#[derive(Debug, Clone)]
pub(crate) struct FanPair {
    pub fan_out: FanOutId,
    pub fan_in: FanInId,
    pub joins_between: Vec<JoinId>,
}

/// One planner scope: the top-level query or one related subquery. Owns
/// every node reachable from its single [`Terminus`].
pub struct PlannerGraph {
    connections: Vec<Connection>,
    joins: Vec<Join>,
    fan_outs: Vec<FanOut>,
    fan_ins: Vec<FanIn>,
    terminus: Terminus,
    /// Construction-order list of joins eligible for flipping. Indexing
    /// into this list is what the enumeration mask's bits mean.
    flippable_joins: Vec<JoinId>,
    fan_pairs: Vec<FanPair>,
    cost_model: Rc<dyn CostModel>,
}

impl std::fmt::Debug for PlannerGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannerGraph")
            .field("connections", &self.connections)
            .field("joins", &self.joins)
            .field("fan_outs", &self.fan_outs)
            .field("fan_ins", &self.fan_ins)
            .field("terminus", &self.terminus)
            .field("flippable_joins", &self.flippable_joins)
            .field("fan_pairs", &self.fan_pairs)
            .field("cost_model", &"<dyn CostModel>")
            .finish()
    }
}

/// A full snapshot of a graph's planning state, for capture/restore.
#[derive(Debug, Clone)]
pub struct PlanningSnapshot {
    join_types: Vec<JoinType>,
    fan_out_variants: Vec<FanOutVariant>,
    fan_in_variants: Vec<FanInVariant>,
    connection_limits: Vec<Option<f64>>,
    connection_constraints: Vec<Vec<(BranchPattern, Option<PlannerConstraint>)>>,
}

impl PlannerGraph {
    pub(crate) fn new(cost_model: Rc<dyn CostModel>) -> Self {
        Self {
            connections: Vec::new(),
            joins: Vec::new(),
            fan_outs: Vec::new(),
            fan_ins: Vec::new(),
            terminus: Terminus::new(NodeRef::Connection(ConnectionId(0))),
            flippable_joins: Vec::new(),
            fan_pairs: Vec::new(),
            cost_model,
        }
    }

    // -- arena accessors, used by the builder and by node dispatch below --

    pub(crate) fn push_connection(&mut self, connection: Connection) -> ConnectionId {
        let id = ConnectionId(self.connections.len());
        self.connections.push(connection);
        id
    }

    pub(crate) fn push_join(&mut self, join: Join) -> JoinId {
        let id = JoinId(self.joins.len());
        if join.flippable() {
            self.flippable_joins.push(id);
        }
        self.joins.push(join);
        id
    }

    pub(crate) fn push_fan_out(&mut self, fan_out: FanOut) -> FanOutId {
        let id = FanOutId(self.fan_outs.len());
        self.fan_outs.push(fan_out);
        id
    }

    pub(crate) fn push_fan_in(&mut self, fan_in: FanIn) -> FanInId {
        let id = FanInId(self.fan_ins.len());
        self.fan_ins.push(fan_in);
        id
    }

    pub(crate) fn set_terminus_input(&mut self, input: NodeRef) {
        self.terminus = Terminus::new(input);
    }

    pub(crate) fn record_fan_pair(&mut self, fan_out: FanOutId, fan_in: FanInId, joins_between: Vec<JoinId>) {
        self.fan_pairs.push(FanPair {
            fan_out,
            fan_in,
            joins_between,
        });
    }

    pub fn connection(&self, id: ConnectionId) -> &Connection {
        &self.connections[id.index()]
    }

    pub fn join(&self, id: JoinId) -> &Join {
        &self.joins[id.index()]
    }

    pub fn fan_out(&self, id: FanOutId) -> &FanOut {
        &self.fan_outs[id.index()]
    }

    pub fn fan_in(&self, id: FanInId) -> &FanIn {
        &self.fan_ins[id.index()]
    }

    pub fn terminus(&self) -> &Terminus {
        &self.terminus
    }

    pub fn flippable_joins(&self) -> &[JoinId] {
        &self.flippable_joins
    }

    pub fn connection_ids(&self) -> impl Iterator<Item = ConnectionId> {
        (0..self.connections.len()).map(ConnectionId)
    }

    pub fn join_ids(&self) -> impl Iterator<Item = JoinId> {
        (0..self.joins.len()).map(JoinId)
    }

    pub fn fan_out_ids(&self) -> impl Iterator<Item = FanOutId> {
        (0..self.fan_outs.len()).map(FanOutId)
    }

    pub fn fan_in_ids(&self) -> impl Iterator<Item = FanInId> {
        (0..self.fan_ins.len()).map(FanInId)
    }

    // -- planning lifecycle --

    pub fn reset_planning_state(&mut self) {
        for join in &mut self.joins {
            join.reset();
        }
        for fan_out in &mut self.fan_outs {
            fan_out.reset();
        }
        for fan_in in &mut self.fan_ins {
            fan_in.reset();
        }
        for connection in &mut self.connections {
            connection.reset();
        }
    }

    /// For the `i`-th flippable join, flip it iff bit `i` of `mask` is set.
    /// Masks that would flip an unflippable join are unreachable by
    /// construction: `flippable_joins` only ever lists flippable joins.
    pub fn apply_flip_pattern(&mut self, mask: u32) -> Result<()> {
        for (bit, join_id) in self.flippable_joins.clone().into_iter().enumerate() {
            if mask & (1 << bit) != 0 {
                self.joins[join_id.index()]
                    .flip()
                    .map_err(|_| PlannerError::NotFlippable { join: join_id })?;
            }
        }
        Ok(())
    }

    /// Walk the builder-recorded `(FanOut, FanIn, joins_between)` cache and
    /// convert each pair to its union variant iff at least one of the
    /// joins between them is currently flipped. Must run after
    /// flips are applied and before constraint propagation.
    pub fn derive_fan_variants(&mut self) {
        for pair in &self.fan_pairs {
            let any_flipped = pair
                .joins_between
                .iter()
                .any(|j| self.joins[j.index()].join_type() == JoinType::Flipped);
            if any_flipped {
                self.fan_outs[pair.fan_out.index()].convert_to_ufo();
                self.fan_ins[pair.fan_in.index()].convert_to_ufi();
            }
        }
    }

    /// Call the unlimit propagation for every currently-flipped join. Run
    /// once per enumeration attempt, after flips and variant
    /// derivation, before constraint propagation).
    pub fn propagate_all_unlimits(&mut self) {
        let flipped: Vec<JoinId> = self
            .joins
            .iter()
            .enumerate()
            .filter(|(_, j)| j.join_type() == JoinType::Flipped)
            .map(|(i, _)| JoinId(i))
            .collect();
        for join_id in flipped {
            let (parent, child) = {
                let join = &self.joins[join_id.index()];
                (join.parent(), join.child())
            };
            self.propagate_unlimit(parent);
            self.propagate_unlimit(child);
        }
    }

    fn propagate_unlimit(&mut self, node: NodeRef) {
        match node {
            NodeRef::Connection(id) => self.connections[id.index()].unlimit(),
            NodeRef::Join(id) => {
                let join = &self.joins[id.index()];
                match join.join_type() {
                    // The child of a semi-join still gets probed with a
                    // bound, so unlimiting doesn't reach past it; the semi
                    // continues unlimiting into its own parent only.
                    JoinType::Semi => {
                        let parent = join.parent();
                        self.propagate_unlimit(parent);
                    }
                    // Already unlimited by whichever flip triggered this
                    // walk first; stop.
                    JoinType::Flipped => {}
                }
            }
            NodeRef::FanOut(id) => {
                let input = self.fan_outs[id.index()].input();
                self.propagate_unlimit(input);
            }
            NodeRef::FanIn(id) => {
                let inputs = self.fan_ins[id.index()].inputs().to_vec();
                for input in inputs {
                    self.propagate_unlimit(input);
                }
            }
        }
    }

    /// Propagate constraints from the terminus through the whole graph for
    /// the current attempt.
    pub fn propagate_constraints(&mut self) -> Result<()> {
        let input = self.terminus.input();
        self.dispatch_propagate(input, BranchPattern::root(), None)
    }

    pub(crate) fn dispatch_propagate(
        &mut self,
        node: NodeRef,
        pattern: BranchPattern,
        incoming: Option<PlannerConstraint>,
    ) -> Result<()> {
        match node {
            NodeRef::Connection(id) => {
                self.connections[id.index()].propagate_constraints(pattern, incoming);
                Ok(())
            }
            NodeRef::Join(id) => {
                let join = self.joins[id.index()].clone_structure_for_propagation();
                match join.join_type {
                    JoinType::Semi => {
                        self.dispatch_propagate(join.child, pattern.clone(), Some(join.child_constraint.clone()))?;
                        self.dispatch_propagate(join.parent, pattern, incoming)
                    }
                    JoinType::Flipped => {
                        self.dispatch_propagate(join.child, pattern.clone(), None)?;
                        let merged = PlannerConstraint::merge(incoming.as_ref(), Some(&join.parent_constraint));
                        self.dispatch_propagate(join.parent, pattern, merged)
                    }
                }
            }
            NodeRef::FanOut(id) => {
                let input = self.fan_outs[id.index()].input();
                self.dispatch_propagate(input, pattern, incoming)
            }
            NodeRef::FanIn(id) => {
                let (variant, inputs) = {
                    let fan_in = &self.fan_ins[id.index()];
                    (fan_in.variant(), fan_in.inputs().to_vec())
                };
                for (i, input) in inputs.into_iter().enumerate() {
                    let sub_pattern = match variant {
                        FanInVariant::Fi => pattern.prepend_shared(),
                        FanInVariant::Ufi => pattern.prepend_branch(i),
                    };
                    self.dispatch_propagate(input, sub_pattern, incoming.clone())?;
                }
                Ok(())
            }
        }
    }

    /// The total cost of the plan as currently configured: the quantity
    /// the search loop minimizes.
    pub fn total_cost(&mut self) -> Result<f64> {
        let input = self.terminus.input();
        let estimate = self.dispatch_cost(input, CostQuery::Pattern(BranchPattern::root()), 1.0)?;
        Ok(estimate.total())
    }

    pub(crate) fn dispatch_cost(
        &mut self,
        node: NodeRef,
        query: CostQuery,
        downstream_selectivity: f64,
    ) -> Result<CostEstimate> {
        match node {
            NodeRef::Connection(id) => {
                let cost_model = Rc::clone(&self.cost_model);
                Ok(self.connections[id.index()].estimate_cost(query, downstream_selectivity, cost_model.as_ref())?)
            }
            NodeRef::Join(id) => self.estimate_join_cost(id, query),
            NodeRef::FanOut(id) => {
                let input = self.fan_outs[id.index()].input();
                self.dispatch_cost(input, query, downstream_selectivity)
            }
            NodeRef::FanIn(id) => self.estimate_fan_in_cost(id, query),
        }
    }

    fn estimate_join_cost(&mut self, id: JoinId, query: CostQuery) -> Result<CostEstimate> {
        let pattern = match query {
            CostQuery::Pattern(p) => p,
            CostQuery::All => BranchPattern::root(),
        };
        let join = self.joins[id.index()].clone_structure_for_propagation();
        let parent_cost = self.dispatch_cost(join.parent, CostQuery::Pattern(pattern.clone()), 1.0)?;
        let child_cost = self.dispatch_cost(join.child, CostQuery::Pattern(pattern), 1.0)?;
        let is_pipeline = self.closest_is_join(join.parent);
        Ok(join::combine(join.join_type, &parent_cost, &child_cost, is_pipeline))
    }

    fn estimate_fan_in_cost(&mut self, id: FanInId, query: CostQuery) -> Result<CostEstimate> {
        let pattern = match query {
            CostQuery::Pattern(p) => p,
            CostQuery::All => BranchPattern::root(),
        };
        let (variant, inputs) = {
            let fan_in = &self.fan_ins[id.index()];
            (fan_in.variant(), fan_in.inputs().to_vec())
        };
        let mut estimates = Vec::with_capacity(inputs.len());
        for (i, input) in inputs.into_iter().enumerate() {
            let sub_pattern = match variant {
                FanInVariant::Fi => pattern.prepend_shared(),
                FanInVariant::Ufi => pattern.prepend_branch(i),
            };
            estimates.push(self.dispatch_cost(input, CostQuery::Pattern(sub_pattern), 1.0)?);
        }
        Ok(fan::combine_fan_in(variant, &estimates))
    }

    /// Whether `node`'s closest non-transparent ancestor-in-cost-chain is a
    /// `Join`, used by the join cost formula to pick the pipeline vs.
    /// nested-loop-root case. Delegated through `FanIn`/`FanOut`/`Terminus`
    /// (none of which generate rows of their own).
    pub(crate) fn closest_is_join(&self, node: NodeRef) -> bool {
        match node {
            NodeRef::Join(_) => true,
            NodeRef::Connection(_) => false,
            NodeRef::FanOut(id) => self.closest_is_join(self.fan_outs[id.index()].input()),
            NodeRef::FanIn(id) => {
                // All inputs are structurally parallel; a FanIn reads as a
                // join-like pipeline stage iff every branch does, which in
                // practice coincides with "any branch does" for the single-
                // parent trees the builder produces (every branch hangs off
                // the same upstream chain above the FanOut).
                self.fan_ins[id.index()]
                    .inputs()
                    .iter()
                    .any(|i| self.closest_is_join(*i))
            }
        }
    }

    // -- snapshot support --

    pub fn capture_planning_snapshot(&self) -> PlanningSnapshot {
        PlanningSnapshot {
            join_types: self.joins.iter().map(Join::join_type).collect(),
            fan_out_variants: self.fan_outs.iter().map(FanOut::variant).collect(),
            fan_in_variants: self.fan_ins.iter().map(FanIn::variant).collect(),
            connection_limits: self.connections.iter().map(Connection::limit).collect(),
            connection_constraints: self
                .connections
                .iter()
                .map(Connection::capture_constraints)
                .collect(),
        }
    }

    pub fn restore_planning_snapshot(&mut self, snapshot: &PlanningSnapshot) -> Result<()> {
        let expected = SnapshotShape {
            connections: snapshot.connection_limits.len(),
            joins: snapshot.join_types.len(),
            fan_outs: snapshot.fan_out_variants.len(),
            fan_ins: snapshot.fan_in_variants.len(),
        };
        let found = SnapshotShape {
            connections: self.connections.len(),
            joins: self.joins.len(),
            fan_outs: self.fan_outs.len(),
            fan_ins: self.fan_ins.len(),
        };
        if expected != found {
            return Err(PlannerError::SnapshotMismatch { expected, found });
        }
        for (join, ty) in self.joins.iter_mut().zip(&snapshot.join_types) {
            join.restore_type(*ty);
        }
        for (fan_out, variant) in self.fan_outs.iter_mut().zip(&snapshot.fan_out_variants) {
            fan_out.restore_variant(*variant);
        }
        for (fan_in, variant) in self.fan_ins.iter_mut().zip(&snapshot.fan_in_variants) {
            fan_in.restore_variant(*variant);
        }
        for (connection, limit, constraints) in itertools::izip!(
            self.connections.iter_mut(),
            &snapshot.connection_limits,
            &snapshot.connection_constraints
        ) {
            connection.restore_limit(*limit);
            connection.restore_constraints(constraints.clone());
        }
        Ok(())
    }
}
