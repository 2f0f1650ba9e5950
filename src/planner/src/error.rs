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

//! Planner error kinds. `TooManyFlippableJoins` is deliberately absent
//! here: it is not an error, it is recovered locally by `PlannerGraph::plan`
//! returning a [`crate::planner::PlanOutcome::Unoptimized`].

use crate::graph::JoinId;

/// The shape of a planning snapshot, used to report a mismatch without
/// dumping the whole (potentially large) state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotShape {
    pub connections: usize,
    pub joins: usize,
    pub fan_outs: usize,
    pub fan_ins: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// `Join::flip` was called on a join whose `flippable` is `false`. By
    /// construction the search loop only ever flips joins drawn from its
    /// own flippable list, so this signals a builder/graph invariant
    /// violation rather than a data-driven failure.
    #[error("join {join:?} is not flippable")]
    NotFlippable { join: JoinId },

    /// `restore_planning_snapshot` was given a snapshot whose shape doesn't
    /// match the graph it's being restored into.
    #[error("snapshot shape mismatch: expected {expected:?}, found {found:?}")]
    SnapshotMismatch {
        expected: SnapshotShape,
        found: SnapshotShape,
    },

    /// The external cost-model callback failed. The current enumeration
    /// attempt is abandoned; the error propagates to the caller of `plan`.
    #[error(transparent)]
    CostModelError(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PlannerError>;
