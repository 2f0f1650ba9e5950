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

//! The unique root of a plan graph. Planning begins here: both
//! constraint propagation and cost estimation traverse from the terminus,
//! at the empty branch pattern. It carries no planning state of its own.

use crate::graph::NodeRef;

#[derive(Debug)]
pub struct Terminus {
    input: NodeRef,
}

impl Terminus {
    pub(crate) fn new(input: NodeRef) -> Self {
        Self { input }
    }

    pub fn input(&self) -> NodeRef {
        self.input
    }
}
