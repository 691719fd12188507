mod common;

use common::{assert_same_rows, null, registry, run};
use sqlstream::plan::{column, field, lit};
use sqlstream::{
    AggregateCall, CompileErrorKind, DataType, JoinType, Registry, RelNode, Schema, compile, tuple,
};

fn emp_join_dept(join_type: JoinType) -> RelNode {
    RelNode::scan("EMP").join(
        RelNode::scan("DEPT"),
        join_type,
        vec![field("DEPTID")],
        vec![field("DEPTID")],
    )
}

#[test]
fn test_join_output_schema_concatenates_children() {
    let pipeline = compile(&emp_join_dept(JoinType::Inner), &registry()).unwrap();
    assert_eq!(
        pipeline.output_schema().names(),
        vec!["EMPID", "EMPNAME", "DEPTID", "DEPTID0", "DEPTNAME"]
    );
}

#[test]
fn test_equi_join_and_group_by() {
    let plan = emp_join_dept(JoinType::Inner)
        .filter(field("EMPID").gt(lit(0)))
        .aggregate(
            vec![field("DEPTID0").named()],
            vec![AggregateCall::new("COUNT", vec![field("EMPID")])],
        );
    assert_same_rows(run(&plan, &registry()), vec![tuple![0, 2], tuple![1, 2]]);
}

#[test]
fn test_left_outer_join() {
    // DEPT LEFT JOIN EMP: departments nobody works in survive with a null employee side
    let plan = RelNode::scan("DEPT")
        .join(
            RelNode::scan("EMP"),
            JoinType::Left,
            vec![field("DEPTID")],
            vec![field("DEPTID")],
        )
        .filter(field("EMPID").is_null())
        .project(vec![column(0).named(), field("DEPTID0").named()]);
    assert_same_rows(
        run(&plan, &registry()),
        vec![tuple![2, null()], tuple![3, null()], tuple![4, null()]],
    );
}

#[test]
fn test_right_outer_join() {
    let plan = emp_join_dept(JoinType::Right)
        .filter(field("EMPID").is_null())
        .project(vec![field("DEPTID0").named(), field("DEPTID").named()]);
    assert_same_rows(
        run(&plan, &registry()),
        vec![tuple![2, null()], tuple![3, null()], tuple![4, null()]],
    );
}

#[test]
fn test_full_outer_join() {
    let plan = emp_join_dept(JoinType::Full)
        .filter(field("DEPTNAME").is_null().or(field("EMPNAME").is_null()))
        .project(vec![field("DEPTID").named(), field("DEPTNAME").named()]);
    assert_same_rows(
        run(&plan, &registry()),
        vec![
            tuple![null(), "dept-2"],
            tuple![null(), "dept-3"],
            tuple![null(), "dept-4"],
            tuple![10, null()],
            tuple![11, null()],
            tuple![12, null()],
            tuple![13, null()],
            tuple![14, null()],
        ],
    );
}

#[test]
fn test_matched_rows_are_identical_across_modes() {
    let registry = registry();
    let matched = |join_type| {
        let plan = emp_join_dept(join_type)
            .filter(field("EMPID").is_not_null().and(field("DEPTNAME").is_not_null()));
        run(&plan, &registry)
    };
    let inner = matched(JoinType::Inner);
    assert_eq!(inner.len(), 4);
    for join_type in [JoinType::Left, JoinType::Right, JoinType::Full] {
        assert_same_rows(matched(join_type), inner.clone());
    }
}

#[test]
fn test_many_to_many_keys_cross_product() {
    let mut registry = Registry::new();
    let schema = Schema::of(&[("K", DataType::Integer), ("TAG", DataType::Varchar)]);
    registry
        .register_memory_source(
            "L",
            schema.clone(),
            vec![tuple![1, "a"], tuple![1, "b"], tuple![1, "c"]],
        )
        .register_memory_source("R", schema, vec![tuple![1, "x"], tuple![1, "y"]]);
    let plan = RelNode::scan("L").join(
        RelNode::scan("R"),
        JoinType::Inner,
        vec![field("K")],
        vec![field("K")],
    );
    assert_eq!(run(&plan, &registry).len(), 6);
}

#[test]
fn test_null_keys_never_match() {
    let mut registry = Registry::new();
    let schema = Schema::of(&[("K", DataType::Integer)]);
    registry
        .register_memory_source("L", schema.clone(), vec![tuple![null()], tuple![1]])
        .register_memory_source("R", schema, vec![tuple![null()], tuple![1]]);
    let join = |join_type| {
        RelNode::scan("L").join(RelNode::scan("R"), join_type, vec![column(0)], vec![column(0)])
    };
    assert_eq!(run(&join(JoinType::Inner), &registry), vec![tuple![1, 1]]);
    assert_same_rows(
        run(&join(JoinType::Full), &registry),
        vec![tuple![1, 1], tuple![null(), null()], tuple![null(), null()]],
    );
}

#[test]
fn test_mixed_numeric_keys_match() {
    let mut registry = Registry::new();
    registry
        .register_memory_source("I", Schema::of(&[("K", DataType::Integer)]), vec![tuple![2]])
        .register_memory_source("F", Schema::of(&[("K", DataType::Float)]), vec![tuple![2.0]]);
    let plan = RelNode::scan("I").join(
        RelNode::scan("F"),
        JoinType::Inner,
        vec![field("K")],
        vec![field("K")],
    );
    assert_eq!(run(&plan, &registry), vec![tuple![2, 2.0]]);
}

#[test]
fn test_incompatible_key_types() {
    let plan = RelNode::scan("EMP").join(
        RelNode::scan("DEPT"),
        JoinType::Inner,
        vec![field("EMPNAME")],
        vec![field("DEPTID")],
    );
    let err = compile(&plan, &registry()).unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::TypeMismatch);
    assert_eq!(err.node, "Join(INNER)");
}
