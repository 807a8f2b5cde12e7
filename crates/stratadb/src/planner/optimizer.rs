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

//! Plan optimization. The single rewrite merges a filter into the scan
//! directly beneath it; everything else recurses structurally.

use crate::planner::expression::{BinaryOp, CompiledExpr};
use crate::planner::plan::PlanOp;

pub(crate) fn optimize(op: PlanOp) -> PlanOp {
    match op {
        PlanOp::Filter { input, condition } => {
            let input = optimize(*input);
            match input {
                PlanOp::TableScan { table_space, table } => PlanOp::FilteredTableScan {
                    table_space,
                    table,
                    predicate: condition,
                },
                PlanOp::FilteredTableScan {
                    table_space,
                    table,
                    predicate,
                } => PlanOp::FilteredTableScan {
                    table_space,
                    table,
                    predicate: CompiledExpr::Binary {
                        op: BinaryOp::And,
                        left: Box::new(predicate),
                        right: Box::new(condition),
                    },
                },
                other => PlanOp::Filter {
                    input: Box::new(other),
                    condition,
                },
            }
        }
        PlanOp::Project {
            input,
            field_names,
            columns,
            exprs,
        } => PlanOp::Project {
            input: Box::new(optimize(*input)),
            field_names,
            columns,
            exprs,
        },
        PlanOp::Sort {
            input,
            directions,
            fields,
        } => PlanOp::Sort {
            input: Box::new(optimize(*input)),
            directions,
            fields,
        },
        PlanOp::Limit {
            input,
            fetch,
            offset,
        } => PlanOp::Limit {
            input: Box::new(optimize(*input)),
            fetch,
            offset,
        },
        PlanOp::Aggregate {
            input,
            field_names,
            columns,
            functions,
            arg_lists,
            group_fields,
        } => PlanOp::Aggregate {
            input: Box::new(optimize(*input)),
            field_names,
            columns,
            functions,
            arg_lists,
            group_fields,
        },
        PlanOp::Insert {
            table_space,
            table,
            input,
            return_values,
        } => PlanOp::Insert {
            table_space,
            table,
            input: Box::new(optimize(*input)),
            return_values,
        },
        leaf @ (PlanOp::TableScan { .. }
        | PlanOp::FilteredTableScan { .. }
        | PlanOp::Values { .. }
        | PlanOp::Update { .. }
        | PlanOp::Delete { .. }) => leaf,
    }
}
