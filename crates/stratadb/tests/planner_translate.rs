/*
 * Copyright 2026 StrataDB Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::sync::Arc;
use stratadb::catalog::{Column, Table};
use stratadb::engine::memory::MemoryEngine;
use stratadb::planner::expression::CompiledExpr;
use stratadb::planner::fallback::FallbackPlanner;
use stratadb::planner::plan::{PlanOp, Statement};
use stratadb::planner::Translator;
use stratadb::types::{ColumnType, Value};

fn engine() -> Arc<MemoryEngine> {
    let engine = Arc::new(MemoryEngine::new("node-a"));
    engine.create_table_space("ts1");
    engine
        .define_table(Table {
            table_space: "ts1".to_string(),
            name: "t".to_string(),
            columns: vec![
                Column::new("k", ColumnType::Long),
                Column::new("name", ColumnType::String),
                Column::new("n", ColumnType::Integer),
            ],
            primary_key: vec![0],
        })
        .expect("define table");
    engine
}

fn translator() -> Translator {
    Translator::new(engine())
}

#[test]
fn fast_path_prefixes_route_to_the_fallback_planner() {
    let t = translator();
    let fallback = FallbackPlanner::default();
    for query in [
        "BEGIN",
        "COMMIT",
        "ROLLBACK",
        "CREATE TABLE t2 (a INT PRIMARY KEY)",
        "DROP TABLE t2",
        "TRUNCATE TABLE t",
        "EXECUTE BEGINTRANSACTION 'ts1'",
    ] {
        let via_translator = t
            .translate("ts1", query, vec![], false, true, true, 0)
            .expect("translate");
        let via_fallback = fallback
            .translate("ts1", query, vec![], true, true)
            .expect("fallback");
        assert_eq!(
            via_translator.plan.main, via_fallback.plan.main,
            "fast path must match the fallback planner for {query}"
        );
    }
}

#[test]
fn fast_path_check_is_case_sensitive_and_untrimmed() {
    let t = translator();
    // Lowercase and leading-whitespace variants miss the prefix check and
    // land in the relational planner, which does not plan them.
    assert!(t
        .translate("ts1", "begin", vec![], false, true, true, 0)
        .is_err());
    assert!(t
        .translate("ts1", " BEGIN", vec![], false, true, true, 0)
        .is_err());
}

#[test]
fn select_lowers_to_a_fully_lowered_operator_tree() {
    let t = translator();
    let translated = t
        .translate(
            "ts1",
            "SELECT name FROM t WHERE n > 1 ORDER BY name LIMIT 2 OFFSET 1",
            vec![],
            true,
            true,
            false,
            0,
        )
        .expect("translate");
    let Statement::Planned(root) = &translated.plan.main else {
        panic!("expected planned statement");
    };
    // Limit(Sort(Project(FilteredTableScan)))
    let PlanOp::Limit { input, fetch, offset } = root else {
        panic!("expected Limit root, got {}", root.kind());
    };
    assert!(fetch.is_some());
    assert!(offset.is_some());
    let PlanOp::Sort {
        input,
        directions,
        fields,
    } = input.as_ref()
    else {
        panic!("expected Sort, got {}", input.kind());
    };
    assert_eq!(directions, &[true]);
    assert_eq!(fields, &[0]);
    let PlanOp::Project {
        input,
        field_names,
        columns,
        exprs,
    } = input.as_ref()
    else {
        panic!("expected Project, got {}", input.kind());
    };
    assert_eq!(field_names, &["name".to_string()]);
    assert_eq!(columns.len(), exprs.len());
    let PlanOp::FilteredTableScan { .. } = input.as_ref() else {
        panic!("expected FilteredTableScan, got {}", input.kind());
    };
}

#[test]
fn every_operator_declares_a_consistent_row_type() {
    let t = translator();
    let translated = t
        .translate(
            "ts1",
            "SELECT name, count(*) AS total FROM t GROUP BY name ORDER BY name",
            vec![],
            true,
            true,
            false,
            0,
        )
        .expect("translate");
    let Statement::Planned(root) = &translated.plan.main else {
        panic!("expected planned statement");
    };
    assert_arity(root);
}

fn assert_arity(op: &PlanOp) {
    match op {
        PlanOp::Project { input, exprs, columns, field_names } => {
            assert_eq!(exprs.len(), columns.len());
            assert_eq!(field_names.len(), columns.len());
            assert_arity(input);
        }
        PlanOp::Sort { input, directions, fields } => {
            assert_eq!(directions.len(), fields.len());
            let schema = input.output_schema();
            for field in fields {
                assert!(*field < schema.len());
            }
            assert_arity(input);
        }
        PlanOp::Aggregate {
            input,
            field_names,
            columns,
            functions,
            arg_lists,
            group_fields,
        } => {
            assert_eq!(field_names.len(), columns.len());
            assert_eq!(functions.len(), arg_lists.len());
            assert_eq!(group_fields.len() + functions.len(), columns.len());
            let schema = input.output_schema();
            for args in arg_lists {
                for arg in args {
                    assert!(*arg < schema.len());
                }
            }
            assert_arity(input);
        }
        PlanOp::Limit { input, .. } | PlanOp::Filter { input, .. } => assert_arity(input),
        PlanOp::Insert { input, .. } => assert_arity(input),
        PlanOp::Values { field_names, columns, rows, .. } => {
            assert_eq!(field_names.len(), columns.len());
            for row in rows {
                assert_eq!(row.len(), columns.len());
            }
        }
        _ => {}
    }
}

#[test]
fn point_lookup_is_detected_only_on_the_non_scan_path() {
    let t = translator();
    let get = t
        .translate(
            "ts1",
            "SELECT * FROM t WHERE k = ?",
            vec![Value::Long(1)],
            false,
            true,
            true,
            0,
        )
        .expect("translate");
    assert!(matches!(get.plan.main, Statement::Get(_)));

    let scan = t
        .translate(
            "ts1",
            "SELECT * FROM t WHERE k = ?",
            vec![Value::Long(1)],
            true,
            true,
            false,
            0,
        )
        .expect("translate");
    let Statement::Planned(root) = &scan.plan.main else {
        panic!("expected planned statement");
    };
    assert!(matches!(root, PlanOp::FilteredTableScan { .. }));

    // Equality on a non-key column stays a scan even without wants-scan.
    let non_key = t
        .translate(
            "ts1",
            "SELECT * FROM t WHERE n = 1",
            vec![],
            false,
            true,
            true,
            0,
        )
        .expect("translate");
    assert!(matches!(non_key.plan.main, Statement::Planned(_)));

    // A projected point query is not carved out either; the non-scan path
    // still hands back the fully-lowered operator tree.
    let projected = t
        .translate(
            "ts1",
            "SELECT name FROM t WHERE k = 1",
            vec![],
            false,
            true,
            true,
            0,
        )
        .expect("translate");
    let Statement::Planned(root) = &projected.plan.main else {
        panic!("expected planned statement");
    };
    assert!(matches!(root, PlanOp::Project { .. }));
}

#[test]
fn max_rows_wraps_the_scan_in_a_limit() {
    let t = translator();
    let translated = t
        .translate("ts1", "SELECT * FROM t", vec![], true, true, false, 3)
        .expect("translate");
    let Statement::Planned(PlanOp::Limit { fetch, .. }) = &translated.plan.main else {
        panic!("expected Limit root");
    };
    assert_eq!(
        fetch,
        &Some(CompiledExpr::Literal(Value::Long(3)))
    );
}

#[test]
fn insert_lowers_to_values_under_insert_stamped_with_the_node_id() {
    let t = translator();
    let translated = t
        .translate(
            "ts1",
            "INSERT INTO t(k,name,n) VALUES(?,?,?)",
            vec![
                Value::Long(1),
                Value::String("x".to_string()),
                Value::Integer(2),
            ],
            false,
            true,
            true,
            0,
        )
        .expect("translate");
    let Statement::Planned(PlanOp::Insert {
        input,
        return_values,
        ..
    }) = &translated.plan.main
    else {
        panic!("expected Insert root");
    };
    assert!(*return_values);
    let PlanOp::Values { node_id, rows, .. } = input.as_ref() else {
        panic!("expected Values input, got {}", input.kind());
    };
    assert_eq!(node_id, "node-a");
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0],
        vec![
            CompiledExpr::Parameter(0),
            CompiledExpr::Parameter(1),
            CompiledExpr::Parameter(2),
        ]
    );
}

#[test]
fn unsupported_shapes_surface_as_statement_execution_errors() {
    let t = translator();
    for query in [
        "SELECT a FROM t JOIN t2 ON t.k = t2.k",
        "SELECT * FROM t UNION SELECT * FROM t",
        "SELECT unknown_column FROM t",
        "SELECT * FROM missing_table",
        "INSERT INTO t(k) SELECT k FROM t",
    ] {
        assert!(
            t.translate("ts1", query, vec![], true, true, false, 0).is_err(),
            "{query} must be rejected"
        );
    }
}

#[test]
fn update_and_delete_lower_with_pushed_down_predicates() {
    let t = translator();
    let update = t
        .translate(
            "ts1",
            "UPDATE t SET n = n + 1 WHERE k = ?",
            vec![Value::Long(3)],
            false,
            true,
            true,
            0,
        )
        .expect("translate");
    let Statement::Planned(PlanOp::Update {
        assignments,
        predicate,
        return_values,
        ..
    }) = &update.plan.main
    else {
        panic!("expected Update root");
    };
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].0, "n");
    assert!(predicate.is_some());
    assert!(*return_values);

    let delete = t
        .translate("ts1", "DELETE FROM t", vec![], false, true, true, 0)
        .expect("translate");
    let Statement::Planned(PlanOp::Delete { predicate, .. }) = &delete.plan.main else {
        panic!("expected Delete root");
    };
    assert!(predicate.is_none());
}

#[test]
fn fallback_cache_counters_are_reported_by_the_translator() {
    let t = translator();
    let _ = t.translate("ts1", "BEGIN", vec![], false, true, true, 0);
    let _ = t.translate("ts1", "BEGIN", vec![], false, true, true, 0);
    assert_eq!(t.cache_misses(), 1);
    assert_eq!(t.cache_hits(), 1);
}
