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

//! Paired structural couriers bracketing an `OR` region. Neither
//! generates rows nor holds filters; they only shape branch patterns and
//! combine per-branch cost estimates.

use serde::{Deserialize, Serialize};

use crate::cost::CostEstimate;
use crate::graph::NodeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FanOutVariant {
    Fo,
    Ufo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FanInVariant {
    Fi,
    Ufi,
}

#[derive(Debug)]
pub struct FanOut {
    input: NodeRef,
    variant: FanOutVariant,
}

impl FanOut {
    pub(crate) fn new(input: NodeRef) -> Self {
        Self {
            input,
            variant: FanOutVariant::Fo,
        }
    }

    pub fn input(&self) -> NodeRef {
        self.input
    }

    pub fn variant(&self) -> FanOutVariant {
        self.variant
    }

    pub(crate) fn convert_to_ufo(&mut self) {
        self.variant = FanOutVariant::Ufo;
    }

    pub(crate) fn reset(&mut self) {
        self.variant = FanOutVariant::Fo;
    }

    pub(crate) fn restore_variant(&mut self, variant: FanOutVariant) {
        self.variant = variant;
    }
}

#[derive(Debug)]
pub struct FanIn {
    inputs: Vec<NodeRef>,
    variant: FanInVariant,
}

impl FanIn {
    pub(crate) fn new(inputs: Vec<NodeRef>) -> Self {
        Self {
            inputs,
            variant: FanInVariant::Fi,
        }
    }

    pub fn inputs(&self) -> &[NodeRef] {
        &self.inputs
    }

    pub fn variant(&self) -> FanInVariant {
        self.variant
    }

    pub(crate) fn convert_to_ufi(&mut self) {
        self.variant = FanInVariant::Ufi;
    }

    pub(crate) fn reset(&mut self) {
        self.variant = FanInVariant::Fi;
    }

    pub(crate) fn restore_variant(&mut self, variant: FanInVariant) {
        self.variant = variant;
    }
}

/// Combine per-branch cost estimates at a FanIn. `FI` means a single
/// fetch serves every branch (all branches must therefore agree on
/// `limit`); `UFI` means one fetch per branch, so costs and row counts
/// stack. Both modes union branch selectivities as independent events.
pub(crate) fn combine_fan_in(variant: FanInVariant, estimates: &[CostEstimate]) -> CostEstimate {
    debug_assert!(!estimates.is_empty(), "a FanIn always has at least one input");

    let selectivity = 1.0 - estimates.iter().map(|e| 1.0 - e.selectivity).product::<f64>();

    match variant {
        FanInVariant::Fi => {
            let fold = |f: fn(&CostEstimate) -> f64| estimates.iter().map(f).fold(f64::MIN, f64::max);
            CostEstimate {
                startup_cost: fold(|e| e.startup_cost),
                scan_est: fold(|e| e.scan_est),
                cost: fold(|e| e.cost),
                returned_rows: fold(|e| e.returned_rows),
                selectivity,
                limit: estimates[0].limit,
            }
        }
        FanInVariant::Ufi => {
            let sum = |f: fn(&CostEstimate) -> f64| estimates.iter().map(f).sum::<f64>();
            CostEstimate {
                startup_cost: sum(|e| e.startup_cost),
                scan_est: sum(|e| e.scan_est),
                cost: sum(|e| e.cost),
                returned_rows: sum(|e| e.returned_rows),
                selectivity,
                limit: estimates[0].limit,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(cost: f64, selectivity: f64) -> CostEstimate {
        CostEstimate {
            startup_cost: 1.0,
            scan_est: cost,
            cost,
            returned_rows: cost,
            selectivity,
            limit: Some(5.0),
        }
    }

    #[test]
    fn fi_takes_max_across_branches() {
        let estimates = vec![estimate(10.0, 0.5), estimate(30.0, 0.2)];
        let combined = combine_fan_in(FanInVariant::Fi, &estimates);
        assert_eq!(combined.cost, 30.0);
    }

    #[test]
    fn ufi_sums_across_branches() {
        let estimates = vec![estimate(10.0, 0.5), estimate(30.0, 0.2)];
        let combined = combine_fan_in(FanInVariant::Ufi, &estimates);
        assert_eq!(combined.cost, 40.0);
    }

    #[test]
    fn selectivity_unions_as_independent_events() {
        let estimates = vec![estimate(10.0, 0.5), estimate(30.0, 0.5)];
        let combined = combine_fan_in(FanInVariant::Fi, &estimates);
        assert_eq!(combined.selectivity, 0.75);
    }
}
