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

//! End-to-end scenarios and boundary behaviors run through the public
//! `plan`/`plan_verbose_with_limit` entry points, against self-authored toy
//! cost models. Expected outcomes assert the qualitative `best_mask`/flip
//! decision each scenario calls for, not the illustrative arithmetic used
//! to motivate it.

use pretty_assertions::assert_eq;

use joinflip::ast::{Condition, CorrelatedOp, CorrelatedSubquery, FieldCorrelation, FlipPin, OrderKey, Query, RelatedSubquery};
use joinflip::constraint::PlannerConstraint;
use joinflip::debug::CollectingSink;
use joinflip::planner::{PlanOutcome, MAX_FLIPPABLE_JOINS};

fn correlation() -> FieldCorrelation {
    FieldCorrelation {
        parent_field: "id".to_string(),
        child_field: "user_id".to_string(),
    }
}

fn exists_condition(table: &str) -> Condition {
    Condition::CorrelatedSubquery(Box::new(CorrelatedSubquery::new(CorrelatedOp::Exists, correlation(), Query::new(table))))
}

fn flip_of(query: &Query) -> bool {
    match query.filter.as_ref().expect("filter present") {
        Condition::CorrelatedSubquery(sub) => sub.flip,
        other => panic!("expected a correlated subquery, found {other:?}"),
    }
}

/// A flat model: every table scans at `base` rows regardless of constraint.
fn flat_model(base: f64) -> impl Fn(&str, &[OrderKey], Option<&Condition>, Option<&PlannerConstraint>) -> anyhow::Result<(f64, f64)> {
    move |_table, _ordering, _filters, _constraint| Ok((0.0, base))
}

#[test]
fn scenario_1_single_exists_with_limit_prefers_semi() {
    let query = Query::new("users").with_limit(10).with_filter(exists_condition("posts"));
    let rewritten = joinflip::plan(&query, flat_model(100.0)).unwrap();
    assert!(!flip_of(&rewritten));
}

#[test]
fn scenario_2_selective_child_filter_prefers_semi() {
    let query = Query::new("users").with_limit(10).with_filter(exists_condition("posts"));
    let model = move |table: &str, _ordering: &[OrderKey], _filters: Option<&Condition>, constraint: Option<&PlannerConstraint>| {
        let selective = table == "posts" && constraint.map(|c| c.contains("user_id")).unwrap_or(false);
        Ok((0.0, if selective { 1.0 } else { 100.0 }))
    };
    let rewritten = joinflip::plan(&query, model).unwrap();
    assert!(!flip_of(&rewritten));
}

#[test]
fn scenario_3_tiny_child_huge_parent_prefers_semi() {
    let query = Query::new("users").with_limit(10).with_filter(exists_condition("posts"));
    let model = move |table: &str, _ordering: &[OrderKey], _filters: Option<&Condition>, _constraint: Option<&PlannerConstraint>| {
        Ok((0.0, if table == "users" { 1_000_000.0 } else { 1.0 }))
    };
    let rewritten = joinflip::plan(&query, model).unwrap();
    assert!(!flip_of(&rewritten));
}

#[test]
fn scenario_4_no_limit_selective_parent_constraint_prefers_flip() {
    let query = Query::new("users").with_filter(exists_condition("posts"));
    let model = move |table: &str, _ordering: &[OrderKey], _filters: Option<&Condition>, constraint: Option<&PlannerConstraint>| {
        let rows = match table {
            "users" if constraint.map(|c| c.contains("id")).unwrap_or(false) => 5.0,
            "users" => 1_000_000.0,
            _ => 10.0,
        };
        Ok((0.0, rows))
    };
    let rewritten = joinflip::plan(&query, model).unwrap();
    assert!(flip_of(&rewritten));
}

#[test]
fn scenario_5_or_of_two_comparable_branches_prefers_all_semi() {
    let query = Query::new("users").with_filter(Condition::Or(vec![exists_condition("posts"), exists_condition("comments")]));
    let rewritten = joinflip::plan(&query, flat_model(50.0)).unwrap();
    let Condition::Or(branches) = rewritten.filter.as_ref().unwrap() else {
        panic!("expected an Or condition");
    };
    for branch in branches {
        match branch {
            Condition::CorrelatedSubquery(sub) => assert!(!sub.flip),
            other => panic!("expected a correlated subquery, found {other:?}"),
        }
    }
}

#[test]
fn scenario_6_not_exists_ignores_flip_pin() {
    let sub = CorrelatedSubquery::new(CorrelatedOp::NotExists, correlation(), Query::new("posts")).with_flip_pin(FlipPin::ForceTrue);
    let query = Query::new("users").with_filter(Condition::CorrelatedSubquery(Box::new(sub)));
    let rewritten = joinflip::plan(&query, flat_model(100.0)).unwrap();
    assert!(!flip_of(&rewritten));
}

#[test]
fn zero_flippable_joins_passes_through_with_one_attempt() {
    let query = Query::new("users").with_filter(Condition::Simple(joinflip::ast::SimplePredicate::new("active = true")));
    let mut sink = CollectingSink::default();
    let result = joinflip::plan_verbose(&query, flat_model(100.0), &mut sink).unwrap();
    match result.root_outcome {
        PlanOutcome::Planned { best_mask, attempts, .. } => {
            assert_eq!(best_mask, 0);
            assert_eq!(attempts, 1);
        }
        other => panic!("expected Planned, got {other:?}"),
    }
}

fn and_of_n_exists(n: usize) -> Query {
    let conditions: Vec<Condition> = (0..n).map(|i| exists_condition(&format!("t{i}"))).collect();
    Query::new("users").with_filter(Condition::And(conditions))
}

#[test]
fn exactly_max_flippable_joins_runs_full_enumeration() {
    let query = and_of_n_exists(MAX_FLIPPABLE_JOINS);
    let mut sink = CollectingSink::default();
    let result = joinflip::plan_verbose(&query, flat_model(100.0), &mut sink).unwrap();
    match result.root_outcome {
        PlanOutcome::Planned { attempts, .. } => assert_eq!(attempts, 1 << MAX_FLIPPABLE_JOINS),
        other => panic!("expected Planned, got {other:?}"),
    }
}

#[test]
fn more_than_max_flippable_joins_skips_enumeration() {
    let query = and_of_n_exists(MAX_FLIPPABLE_JOINS + 1);
    let mut sink = CollectingSink::default();
    let result = joinflip::plan_verbose(&query, flat_model(100.0), &mut sink).unwrap();
    assert_eq!(
        result.root_outcome,
        PlanOutcome::TooManyFlippableJoins {
            flippable: MAX_FLIPPABLE_JOINS + 1
        }
    );
    let Some(Condition::And(conditions)) = result.query.filter.as_ref() else {
        panic!("expected an And condition");
    };
    for condition in conditions {
        match condition {
            Condition::CorrelatedSubquery(sub) => assert!(!sub.flip),
            other => panic!("expected a correlated subquery, found {other:?}"),
        }
    }
}

#[test]
fn empty_or_with_no_correlated_subqueries_builds_no_fan_nodes() {
    let mut query = Query::new("users").with_filter(Condition::Or(vec![
        Condition::Simple(joinflip::ast::SimplePredicate::new("a = 1")),
        Condition::Simple(joinflip::ast::SimplePredicate::new("b = 2")),
    ]));
    let cost_model: std::rc::Rc<dyn joinflip::cost::CostModel> = std::rc::Rc::new(flat_model(100.0));
    let scope = joinflip::builder::build(&mut query, cost_model);
    assert_eq!(scope.graph.fan_out_ids().count(), 0);
    assert_eq!(scope.graph.fan_in_ids().count(), 0);
    assert_eq!(scope.graph.join_ids().count(), 0);
}

#[test]
fn same_ast_and_cost_model_reproduces_the_same_best_mask() {
    let query = Query::new("users").with_filter(Condition::Or(vec![exists_condition("posts"), exists_condition("comments")]));
    let first = joinflip::plan_verbose(&query, flat_model(73.0), &mut ()).unwrap();
    let second = joinflip::plan_verbose(&query, flat_model(73.0), &mut ()).unwrap();
    assert_eq!(first.root_outcome, second.root_outcome);
}

#[test]
fn pinning_every_joins_chosen_flip_leaves_nothing_flippable_on_replan() {
    let query = Query::new("users").with_limit(10).with_filter(exists_condition("posts"));
    let rewritten = joinflip::plan(&query, flat_model(100.0)).unwrap();
    let chosen_flip = flip_of(&rewritten);

    let pin = if chosen_flip { FlipPin::ForceTrue } else { FlipPin::ForceFalse };
    let sub = CorrelatedSubquery::new(CorrelatedOp::Exists, correlation(), Query::new("posts")).with_flip_pin(pin);
    let pinned_query = Query::new("users").with_limit(10).with_filter(Condition::CorrelatedSubquery(Box::new(sub)));

    let mut sink = CollectingSink::default();
    let result = joinflip::plan_verbose(&pinned_query, flat_model(100.0), &mut sink).unwrap();
    match result.root_outcome {
        PlanOutcome::Planned { attempts, .. } => assert_eq!(attempts, 1),
        other => panic!("expected Planned with a single attempt, got {other:?}"),
    }
    assert_eq!(flip_of(&result.query), chosen_flip);
}

/// A related subquery is its own scope root: its `LIMIT` must land on its
/// own graph's root connection, not get dropped on the way in. Exercises a
/// related scope that also nests its own correlated subquery, so both the
/// limit and the nested flip choice are checked against the same build.
#[test]
fn related_subquery_keeps_its_own_limit_and_plans_its_nested_correlation() {
    let nested = CorrelatedSubquery::new(CorrelatedOp::Exists, correlation(), Query::new("comments"));
    let related_query = Query::new("posts").with_limit(5).with_filter(Condition::CorrelatedSubquery(Box::new(nested)));
    let related = RelatedSubquery {
        alias: "recent_posts".to_string(),
        correlation: correlation(),
        query: Box::new(related_query),
    };
    let mut query = Query::new("users").with_related(vec![related]);

    let cost_model: std::rc::Rc<dyn joinflip::cost::CostModel> = std::rc::Rc::new(flat_model(100.0));
    let mut scope = joinflip::builder::build(&mut query, cost_model);

    let related_scope = scope
        .related
        .get_mut(&None)
        .and_then(|by_alias| by_alias.get_mut("recent_posts"))
        .expect("related scope built under its declared alias");

    let mut sink = CollectingSink::default();
    let outcome = joinflip::planner::plan(&mut related_scope.graph, &mut sink).unwrap();
    match outcome {
        PlanOutcome::Planned { best_mask, .. } => assert_eq!(best_mask, 0),
        other => panic!("expected Planned, got {other:?}"),
    }

    let root_connection_id = related_scope
        .graph
        .connection_ids()
        .next()
        .expect("related scope has a root connection");
    assert_eq!(related_scope.graph.connection(root_connection_id).limit(), Some(5.0));

    let rewritten = joinflip::rewriter::rewrite(&query, &scope);
    match rewritten.related[0].query.filter.as_ref().expect("filter present") {
        Condition::CorrelatedSubquery(sub) => assert!(!sub.flip),
        other => panic!("expected a correlated subquery, found {other:?}"),
    }
}
