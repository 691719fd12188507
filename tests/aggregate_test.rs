mod common;

use common::{assert_same_rows, registry, run};
use sqlstream::plan::{call, field, lit};
use sqlstream::{
    Accumulator, AggregateCall, CompileErrorKind, DataType, EvalResult, Registry, RelNode, Schema,
    Value, compile, tuple,
};

#[test]
fn test_group_by_with_count_max_min() {
    let plan = RelNode::scan("GRP").aggregate(
        vec![field("GRPID").named()],
        vec![
            AggregateCall::count_star(),
            AggregateCall::new("MAX", vec![field("AGE")]),
            AggregateCall::new("MIN", vec![field("AGE")]),
        ],
    );
    assert_eq!(run(&plan, &registry()), vec![tuple![0, 5, 5, 1]]);
}

#[test]
fn test_group_by_with_post_aggregation_expression() {
    let plan = RelNode::scan("GRP")
        .aggregate(
            vec![field("GRPID").named()],
            vec![
                AggregateCall::count_star().alias("CNT"),
                AggregateCall::new("MAX", vec![field("AGE")]).alias("MAX_AGE"),
                AggregateCall::new("MIN", vec![field("AGE")]).alias("MIN_AGE"),
                AggregateCall::new("AVG", vec![field("AGE")]).alias("AVG_AGE"),
            ],
        )
        .project(vec![
            field("GRPID").named(),
            field("CNT").named(),
            field("MAX_AGE").named(),
            field("MIN_AGE").named(),
            field("AVG_AGE").named(),
            field("MAX_AGE").sub(field("MIN_AGE")).alias("DIFF"),
        ]);
    let registry = registry();
    let pipeline = compile(&plan, &registry).unwrap();
    assert_eq!(
        pipeline.output_schema().names(),
        vec!["GRPID", "CNT", "MAX_AGE", "MIN_AGE", "AVG_AGE", "DIFF"]
    );
    assert_eq!(run(&plan, &registry), vec![tuple![0, 5, 5, 1, 3, 4]]);
}

#[test]
fn test_aggregate_over_expression() {
    let plan = RelNode::scan("GRP").aggregate(
        vec![field("GRPID").named()],
        vec![
            AggregateCall::count_star().alias("CNT"),
            AggregateCall::new("MAX", vec![field("SCORE").sub(field("AGE"))])
                .alias("MAX_SCORE_MINUS_AGE"),
        ],
    );
    assert_eq!(run(&plan, &registry()), vec![tuple![0, 5, 39]]);
}

#[test]
fn test_post_aggregation_cannot_see_input_fields() {
    let plan = RelNode::scan("GRP")
        .aggregate(vec![field("GRPID").named()], vec![AggregateCall::count_star().alias("CNT")])
        .project(vec![field("AGE").named()]);
    let err = compile(&plan, &registry()).unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::UnresolvedField);
    assert_eq!(err.node, "Project");
}

#[test]
fn test_aggregate_errors_under_projection_name_the_aggregate() {
    let plan = RelNode::scan("GRP")
        .aggregate(
            vec![field("GRPID").named()],
            vec![AggregateCall::new("MAX", vec![field("NOPE")]).alias("HI")],
        )
        .project(vec![field("GRPID").named()]);
    let err = compile(&plan, &registry()).unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::UnresolvedField);
    assert_eq!(err.node, "Aggregate");
}

#[test]
fn test_post_aggregation_duplicate_names_are_suffixed() {
    let plan = RelNode::scan("GRP")
        .aggregate(vec![field("GRPID").named()], vec![AggregateCall::count_star().alias("CNT")])
        .project(vec![field("CNT").named(), field("CNT").named()]);
    let pipeline = compile(&plan, &registry()).unwrap();
    assert_eq!(pipeline.output_schema().names(), vec!["CNT", "CNT0"]);
    assert_eq!(run(&plan, &registry()), vec![tuple![5, 5]]);
}

#[test]
fn test_null_measures() {
    let mut registry = Registry::new();
    registry.register_memory_source(
        "M",
        Schema::of(&[("G", DataType::Integer), ("V", DataType::Integer)]),
        vec![
            tuple![1, 10],
            tuple![1, Value::Null],
            tuple![1, 20],
            tuple![2, Value::Null],
        ],
    );
    let plan = RelNode::scan("M").aggregate(
        vec![field("G").named()],
        vec![
            AggregateCall::count_star(),
            AggregateCall::new("COUNT", vec![field("V")]),
            AggregateCall::new("SUM", vec![field("V")]),
            AggregateCall::new("AVG", vec![field("V")]),
            AggregateCall::new("MIN", vec![field("V")]),
        ],
    );
    assert_same_rows(
        run(&plan, &registry),
        vec![
            tuple![1, 3, 2, 30, 15, 10],
            tuple![2, 1, 0, Value::Null, Value::Null, Value::Null],
        ],
    );
}

#[test]
fn test_filtered_input_without_groups_emits_nothing() {
    let plan = RelNode::scan("GRP")
        .filter(field("AGE").gt(lit(100)))
        .aggregate(vec![field("GRPID").named()], vec![AggregateCall::count_star()]);
    assert!(run(&plan, &registry()).is_empty());
}

#[test]
fn test_aggregate_in_scalar_context_is_rejected() {
    let plan = RelNode::scan("GRP").project(vec![call("MAX", vec![field("AGE")]).named()]);
    let err = compile(&plan, &registry()).unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::UnknownFunction);
}

#[test]
fn test_unknown_aggregate() {
    let plan = RelNode::scan("GRP").aggregate(
        vec![],
        vec![AggregateCall::new("MEDIAN", vec![field("AGE")])],
    );
    let err = compile(&plan, &registry()).unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::UnknownFunction);
}

#[derive(Default)]
struct SumOfIntegers {
    sum: i64,
}

impl Accumulator for SumOfIntegers {
    fn merge(&mut self, args: &[Value]) -> EvalResult<()> {
        if let Value::Integer(v) = args[0] {
            self.sum += v;
        }
        Ok(())
    }

    fn finalize(&self) -> EvalResult<Value> {
        Ok(Value::Integer(self.sum))
    }
}

/// the same sum kept behind a different accumulator type
struct StaticSum(i64);

impl Accumulator for StaticSum {
    fn merge(&mut self, args: &[Value]) -> EvalResult<()> {
        if let Some(v) = args[0].as_f64() {
            self.0 += v as i64;
        }
        Ok(())
    }

    fn finalize(&self) -> EvalResult<Value> {
        Ok(Value::Integer(self.0))
    }
}

#[test]
fn test_user_defined_aggregates() {
    let mut registry = registry();
    registry
        .register_aggregate("MYSUM", 1, DataType::Integer, || {
            Box::new(SumOfIntegers::default()) as Box<dyn Accumulator>
        })
        .register_aggregate("MYSTATICSUM", 1, DataType::Integer, || {
            Box::new(StaticSum(0)) as Box<dyn Accumulator>
        });
    let plan = RelNode::scan("GRP").aggregate(
        vec![field("GRPID").named()],
        vec![
            AggregateCall::count_star().alias("CNT"),
            AggregateCall::new("MYSTATICSUM", vec![field("AGE")]).alias("MY_STATIC_SUM"),
            AggregateCall::new("mysum", vec![field("AGE")]).alias("MY_SUM"),
        ],
    );
    let pipeline = compile(&plan, &registry).unwrap();
    assert_eq!(
        pipeline.output_schema(),
        &Schema::of(&[
            ("GRPID", DataType::Integer),
            ("CNT", DataType::Integer),
            ("MY_STATIC_SUM", DataType::Integer),
            ("MY_SUM", DataType::Integer),
        ])
    );
    assert_eq!(run(&plan, &registry), vec![tuple![0, 5, 15, 15]]);
}

#[test]
fn test_udaf_arity_is_checked() {
    let mut registry = registry();
    registry.register_aggregate("MYSUM", 1, DataType::Integer, || {
        Box::new(SumOfIntegers::default()) as Box<dyn Accumulator>
    });
    let plan = RelNode::scan("GRP").aggregate(
        vec![],
        vec![AggregateCall::new("MYSUM", vec![field("AGE"), field("SCORE")])],
    );
    let err = compile(&plan, &registry).unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::ArityMismatch);
}
