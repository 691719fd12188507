#![allow(dead_code)]

use sqlstream::{
    CollectSink, DataType, PipelineExecutor, Registry, RelNode, Schema, Tuple, Value, compile,
    tuple,
};
use std::sync::Arc;

/// FOO(ID, NAME, ADDR) with ids 0..=4
pub fn foo_schema() -> Schema {
    Schema::of(&[
        ("ID", DataType::Integer),
        ("NAME", DataType::Varchar),
        ("ADDR", DataType::Varchar),
    ])
}

pub fn foo_rows() -> Vec<Tuple> {
    (0..5).map(|id| tuple![id, "x", "y"]).collect()
}

/// FOO(GRPID, NAME, ADDR, AGE, SCORE): one group, ages 1..=5
pub fn grouped_schema() -> Schema {
    Schema::of(&[
        ("GRPID", DataType::Integer),
        ("NAME", DataType::Varchar),
        ("ADDR", DataType::Varchar),
        ("AGE", DataType::Integer),
        ("SCORE", DataType::Integer),
    ])
}

pub fn grouped_rows() -> Vec<Tuple> {
    let scores = [40, 30, 42, 20, 44];
    (1..=5)
        .zip(scores)
        .map(|(age, score)| tuple![0, "x", "y", age, score])
        .collect()
}

pub fn emp_schema() -> Schema {
    Schema::of(&[
        ("EMPID", DataType::Integer),
        ("EMPNAME", DataType::Varchar),
        ("DEPTID", DataType::Integer),
    ])
}

/// employees 1..=4 work in departments 0 and 1, 5..=9 in departments 10..=14 that do not exist
pub fn emp_rows() -> Vec<Tuple> {
    (1..=9i64)
        .map(|id| {
            let dept = if id <= 4 { (id - 1) / 2 } else { id + 5 };
            tuple![id, format!("emp-{}", id), dept]
        })
        .collect()
}

pub fn dept_schema() -> Schema {
    Schema::of(&[("DEPTID", DataType::Integer), ("DEPTNAME", DataType::Varchar)])
}

pub fn dept_rows() -> Vec<Tuple> {
    (0..5i64)
        .map(|id| tuple![id, format!("dept-{}", id)])
        .collect()
}

pub fn registry() -> Registry {
    let mut registry = Registry::with_builtins();
    registry
        .register_memory_source("FOO", foo_schema(), foo_rows())
        .register_memory_source("GRP", grouped_schema(), grouped_rows())
        .register_memory_source("EMP", emp_schema(), emp_rows())
        .register_memory_source("DEPT", dept_schema(), dept_rows());
    registry
}

/// compile, drain every source, flush once and return the root output
pub fn run(plan: &RelNode, registry: &Registry) -> Vec<Tuple> {
    let pipeline = compile(plan, registry).unwrap();
    let mut executor = PipelineExecutor::new(pipeline);
    executor.execute().unwrap();
    executor.pipeline_mut().take_results()
}

/// same as `run` but through an attached collecting writer
pub fn run_collected(plan: &RelNode, registry: &Registry) -> CollectSink {
    let mut pipeline = compile(plan, registry).unwrap();
    let sink = CollectSink::new();
    pipeline.attach(Arc::new(sink.clone()));
    PipelineExecutor::new(pipeline).execute().unwrap();
    sink
}

/// multiset comparison, output order is not part of the contract
pub fn assert_same_rows(actual: Vec<Tuple>, expected: Vec<Tuple>) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "row count differs: {:?} vs {:?}",
        actual,
        expected
    );
    let mut remaining = actual.clone();
    for row in &expected {
        match remaining.iter().position(|r| r == row) {
            Some(pos) => {
                remaining.swap_remove(pos);
            }
            None => panic!("missing row {} in {:?}", row, actual),
        }
    }
}

pub fn null() -> Value {
    Value::Null
}
