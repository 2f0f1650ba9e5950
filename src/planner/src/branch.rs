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

//! Branch patterns identify which `OR`-branch path a constraint or cost
//! flows along. The empty pattern identifies the terminus.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BranchPattern(Vec<u32>);

impl BranchPattern {
    /// The pattern at the terminus.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// The pattern seen by an input of a `FI`-variant fan-in: branch index
    /// is irrelevant (all branches share a bucket), so `0` is prepended.
    pub fn prepend_shared(&self) -> Self {
        let mut buf = Vec::with_capacity(self.0.len() + 1);
        buf.push(0);
        buf.extend_from_slice(&self.0);
        Self(buf)
    }

    /// The pattern seen by the `i`-th input of a `UFI`-variant fan-in.
    pub fn prepend_branch(&self, index: usize) -> Self {
        let mut buf = Vec::with_capacity(self.0.len() + 1);
        buf.push(index as u32);
        buf.extend_from_slice(&self.0);
        Self(buf)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_empty() {
        assert!(BranchPattern::root().as_slice().is_empty());
    }

    #[test]
    fn prepend_shared_vs_branch() {
        let base = BranchPattern::root();
        assert_eq!(base.prepend_shared().as_slice(), &[0]);
        assert_eq!(base.prepend_branch(2).as_slice(), &[2]);

        let nested = base.prepend_branch(1).prepend_shared();
        assert_eq!(nested.as_slice(), &[0, 1]);
    }

    #[test]
    fn distinct_patterns_are_distinguishable() {
        let a = BranchPattern::root().prepend_branch(0);
        let b = BranchPattern::root().prepend_branch(1);
        assert_ne!(a, b);
    }
}
