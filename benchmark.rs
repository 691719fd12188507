use sqlstream::logging;
use sqlstream::plan::{AggregateCall, field, lit};
use sqlstream::{
    DataType, JoinType, PipelineExecutor, Registry, RelNode, Schema, Tuple, Value, compile,
};
use std::time::Instant;

const EMPLOYEES: i64 = 200_000;
const DEPARTMENTS: i64 = 1_000;

fn main() {
    logging::init("warn");

    println!("========================================");
    println!("sqlstream Benchmark");
    println!("========================================");
    println!();

    let registry = registry();

    // benchmark 1: filter + projection, stateless stages only
    run(
        "Benchmark 1: filter + projection",
        &registry,
        RelNode::scan("EMP")
            .filter(field("AGE").gt(lit(30)).and(field("AGE").lt(lit(70))))
            .project(vec![
                field("EMPID").named(),
                field("SALARY").mul(lit(1.1)).alias("RAISED"),
            ]),
    );
    println!();

    // benchmark 2: grouped aggregation with a fused post-aggregation expression
    run(
        "Benchmark 2: group by DEPTID",
        &registry,
        RelNode::scan("EMP")
            .aggregate(
                vec![field("DEPTID").named()],
                vec![
                    AggregateCall::count_star().alias("CNT"),
                    AggregateCall::new("MAX", vec![field("AGE")]).alias("OLDEST"),
                    AggregateCall::new("MIN", vec![field("AGE")]).alias("YOUNGEST"),
                    AggregateCall::new("AVG", vec![field("SALARY")]).alias("PAY"),
                ],
            )
            .project(vec![
                field("DEPTID").named(),
                field("CNT").named(),
                field("OLDEST").sub(field("YOUNGEST")).alias("SPREAD"),
                field("PAY").named(),
            ]),
    );
    println!();

    // benchmark 3: streaming hash join
    run(
        "Benchmark 3: EMP join DEPT",
        &registry,
        RelNode::scan("EMP").join(
            RelNode::scan("DEPT"),
            JoinType::Inner,
            vec![field("DEPTID")],
            vec![field("DEPTID")],
        ),
    );
    println!();

    // benchmark 4: full outer join feeding an aggregate
    run(
        "Benchmark 4: FULL join + group by",
        &registry,
        RelNode::scan("EMP")
            .join(
                RelNode::scan("DEPT"),
                JoinType::Full,
                vec![field("DEPTID")],
                vec![field("DEPTID")],
            )
            .aggregate(
                vec![field("REGION").named()],
                vec![AggregateCall::new("COUNT", vec![field("EMPID")]).alias("HEADCOUNT")],
            ),
    );
}

fn registry() -> Registry {
    let employees: Vec<Tuple> = (0..EMPLOYEES)
        .map(|id| {
            Tuple::new(vec![
                Value::Integer(id),
                // a few employees point at departments that do not exist
                Value::Integer(id % (DEPARTMENTS + 10)),
                Value::Integer(20 + id % 50),
                Value::Float(30_000.0 + (id % 997) as f64 * 75.0),
            ])
        })
        .collect();
    let departments: Vec<Tuple> = (0..DEPARTMENTS)
        .map(|id| {
            Tuple::new(vec![
                Value::Integer(id),
                Value::Varchar(format!("REGION-{}", id % 7)),
            ])
        })
        .collect();

    let mut registry = Registry::with_builtins();
    registry
        .register_memory_source(
            "EMP",
            Schema::of(&[
                ("EMPID", DataType::Integer),
                ("DEPTID", DataType::Integer),
                ("AGE", DataType::Integer),
                ("SALARY", DataType::Float),
            ]),
            employees,
        )
        .register_memory_source(
            "DEPT",
            Schema::of(&[("DEPTID", DataType::Integer), ("REGION", DataType::Varchar)]),
            departments,
        );
    registry
}

fn run(title: &str, registry: &Registry, plan: RelNode) {
    println!("{}", title);

    let start = Instant::now();
    let pipeline = compile(&plan, registry).expect("compile failed");
    let compile_time = start.elapsed();

    let mut executor = PipelineExecutor::new(pipeline);
    let stats = executor.execute().expect("execution failed");
    let total = start.elapsed();

    println!(
        "Completed: {}ms (compile {}µs, {} rows in, {} rows out)",
        total.as_millis(),
        compile_time.as_micros(),
        stats.tuples_read,
        stats.tuples_emitted
    );
    println!("========================================");
}
