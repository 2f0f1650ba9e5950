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

//! A demonstration/debugging front end for `joinflip`. Reads a query AST
//! and an optional per-table cost-statistics file, both JSON, runs the
//! planner, and prints the rewritten AST plus (optionally) the debug
//! trace.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use joinflip::ast::{Condition, OrderKey, Query};
use joinflip::constraint::PlannerConstraint;
use joinflip::debug::CollectingSink;
use joinflip::planner::MAX_FLIPPABLE_JOINS;

#[derive(Parser, Debug)]
#[command(name = "joinflip", about = "Plan EXISTS/NOT EXISTS correlations as semi- or flipped joins")]
struct Args {
    /// Path to a JSON-encoded query AST (see `joinflip::ast::Query`).
    #[arg(long)]
    query: PathBuf,

    /// Path to a JSON table of per-table cost statistics. Tables absent
    /// from it fall back to `--default-base-rows`.
    #[arg(long)]
    cost_table: Option<PathBuf>,

    /// Row estimate for an unconstrained scan of a table not present in
    /// `--cost-table`.
    #[arg(long, default_value_t = 100.0)]
    default_base_rows: f64,

    /// Per-constrained-column row discount applied to the default model
    /// (floored at 1 row), mirroring the toy cost model used in the
    /// planner's own test scenarios.
    #[arg(long, default_value_t = 10.0)]
    default_discount_per_column: f64,

    /// Override the per-graph safety-gate bound on flippable joins.
    #[arg(long, default_value_t = MAX_FLIPPABLE_JOINS)]
    max_flippable_joins: usize,

    /// Print the full debug-event stream alongside the rewritten AST.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, serde::Deserialize)]
struct TableCost {
    #[serde(default)]
    startup_cost: f64,
    base_rows: f64,
    /// Row estimate when any constraint is propagated into this table's
    /// scan, overriding the default per-column discount.
    #[serde(default)]
    constrained_rows: Option<f64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let query_json = fs::read_to_string(&args.query).with_context(|| format!("reading {}", args.query.display()))?;
    let query: Query = serde_json::from_str(&query_json).context("parsing query AST")?;

    let table_costs: BTreeMap<String, TableCost> = match &args.cost_table {
        Some(path) => {
            let json = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&json).context("parsing cost table")?
        }
        None => BTreeMap::new(),
    };

    let default_base_rows = args.default_base_rows;
    let default_discount = args.default_discount_per_column;
    let cost_model = move |table: &str, _ordering: &[OrderKey], _filters: Option<&Condition>, constraint: Option<&PlannerConstraint>| {
        let columns = constraint.map(PlannerConstraint::len).unwrap_or(0);
        let (startup_cost, rows) = match table_costs.get(table) {
            Some(stats) => {
                let rows = if columns > 0 {
                    stats.constrained_rows.unwrap_or(stats.base_rows)
                } else {
                    stats.base_rows
                };
                (stats.startup_cost, rows)
            }
            None => {
                let rows = (default_base_rows - default_discount * columns as f64).max(1.0);
                (0.0, if columns > 0 { rows } else { default_base_rows })
            }
        };
        Ok((startup_cost, rows))
    };

    let mut sink = CollectingSink::default();
    let result = joinflip::plan_verbose_with_limit(&query, cost_model, &mut sink, args.max_flippable_joins)?;

    if args.trace {
        for event in &sink.events {
            println!("{}", serde_json::to_string(event)?);
        }
    }

    println!("{}", serde_json::to_string_pretty(&result.query)?);
    eprintln!("root scope outcome: {:?}", result.root_outcome);

    Ok(())
}
