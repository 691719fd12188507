use super::aggregate::{AggregateCompiler, fuse_projection};
use super::expression::{CompiledExpression, ExpressionCompiler};
use crate::error::{CompileError, CompileErrorKind, CompileResult};
use crate::execution::operators::{
    PhysicalAggregate, PhysicalFilter, PhysicalJoin, PhysicalProjection, PhysicalScan,
    PhysicalSink, Stage,
};
use crate::execution::pipeline::{Pipeline, PipelineBuilder, StageId};
use crate::plan::{AggregateCall, Expression, JoinType, NamedExpression, RelNode, column};
use crate::registry::Registry;
use crate::schema::{DataType, Schema};
use tracing::{debug, info};

/// relational plan compiler
/// walks the operator tree post-order and emits one physical stage per node
pub struct PlanCompiler<'a> {
    registry: &'a Registry,
}

impl<'a> PlanCompiler<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// compile a whole plan; any failure aborts and no partial pipeline is returned
    pub fn compile(&self, root: &RelNode) -> CompileResult<Pipeline> {
        let mut builder = PipelineBuilder::new();
        let root_id = self.compile_node(root, &mut builder)?;
        let pipeline = builder.build(root_id);
        info!(
            stages = pipeline.stage_count(),
            sources = ?pipeline.sources(),
            output = %pipeline.output_schema(),
            "plan compiled"
        );
        Ok(pipeline)
    }

    fn compile_node(&self, node: &RelNode, builder: &mut PipelineBuilder) -> CompileResult<StageId> {
        let id = match node {
            RelNode::Scan { source } => self.build_scan(source, builder),
            RelNode::Filter { predicate, input } => {
                // recurse to child first (build bottom-up)
                let child = self.compile_node(input, builder)?;
                self.build_filter(predicate, child, builder)
            }
            RelNode::Project { exprs, input } => match input.as_ref() {
                // a projection straight over an aggregate becomes its post-aggregation list
                RelNode::Aggregate {
                    group_by,
                    calls,
                    input: grouped,
                } => {
                    let child = self.compile_node(grouped, builder)?;
                    self.build_aggregate(input, group_by, calls, Some(exprs), child, builder)
                }
                _ => {
                    let child = self.compile_node(input, builder)?;
                    self.build_projection(exprs, child, builder)
                }
            },
            RelNode::Join {
                left,
                right,
                left_keys,
                right_keys,
                join_type,
            } => {
                let left_id = self.compile_node(left, builder)?;
                let right_id = self.compile_node(right, builder)?;
                self.build_join(*join_type, left_keys, right_keys, left_id, right_id, builder)
            }
            RelNode::Aggregate {
                group_by,
                calls,
                input,
            } => {
                let child = self.compile_node(input, builder)?;
                self.build_aggregate(node, group_by, calls, None, child, builder)
            }
            RelNode::Sink { target, input } => {
                let child = self.compile_node(input, builder)?;
                self.build_sink(target, child, builder)
            }
        }
        .map_err(|e| e.at(node.label()))?;

        debug!(node = %node.label(), schema = %builder.schema(id), "compiled node");
        Ok(id)
    }

    fn build_scan(&self, source: &str, builder: &mut PipelineBuilder) -> CompileResult<StageId> {
        let def = self.registry.source(source).ok_or_else(|| {
            CompileError::new(
                CompileErrorKind::UnknownSource,
                format!("no source named '{}' is registered", source),
            )
        })?;
        let stage = Stage::Scan(PhysicalScan::new(def.name.clone(), def.schema.len()));
        Ok(builder.add_scan(&def.name, stage, def.schema.clone(), def.reader.clone()))
    }

    fn build_filter(
        &self,
        predicate: &Expression,
        child: StageId,
        builder: &mut PipelineBuilder,
    ) -> CompileResult<StageId> {
        let schema = builder.schema(child).clone();
        let compiled = ExpressionCompiler::new(&schema, self.registry).compile_predicate(predicate)?;
        let stage = Stage::Filter(PhysicalFilter::new(compiled, predicate.to_string()));
        Ok(builder.add(stage, schema, &[child]))
    }

    fn build_projection(
        &self,
        exprs: &[NamedExpression],
        child: StageId,
        builder: &mut PipelineBuilder,
    ) -> CompileResult<StageId> {
        let compiler = ExpressionCompiler::new(builder.schema(child), self.registry);
        let compiled = exprs
            .iter()
            .enumerate()
            .map(|(i, named)| compiler.compile_named(named, i))
            .collect::<CompileResult<Vec<_>>>()?;
        self.add_projection(compiled, child, builder)
    }

    fn add_projection(
        &self,
        compiled: Vec<CompiledExpression>,
        child: StageId,
        builder: &mut PipelineBuilder,
    ) -> CompileResult<StageId> {
        let schema = Schema::deduplicated(compiled.iter().map(CompiledExpression::field).collect());
        let stage = Stage::Project(PhysicalProjection::new(compiled));
        Ok(builder.add(stage, schema, &[child]))
    }

    fn build_join(
        &self,
        join_type: JoinType,
        left_keys: &[Expression],
        right_keys: &[Expression],
        left: StageId,
        right: StageId,
        builder: &mut PipelineBuilder,
    ) -> CompileResult<StageId> {
        if left_keys.len() != right_keys.len() {
            return Err(CompileError::new(
                CompileErrorKind::ArityMismatch,
                format!(
                    "{} left key(s) against {} right key(s)",
                    left_keys.len(),
                    right_keys.len()
                ),
            ));
        }
        let left_schema = builder.schema(left).clone();
        let right_schema = builder.schema(right).clone();
        let left_compiler = ExpressionCompiler::new(&left_schema, self.registry);
        let right_compiler = ExpressionCompiler::new(&right_schema, self.registry);

        let mut compiled_left = Vec::with_capacity(left_keys.len());
        let mut compiled_right = Vec::with_capacity(right_keys.len());
        for (l, r) in left_keys.iter().zip(right_keys) {
            let mut lk = left_compiler.compile(l)?;
            let mut rk = right_compiler.compile(r)?;
            // keys hash by value, so mixed numeric keys are widened to FLOAT on both sides
            match (lk.data_type, rk.data_type) {
                (a, b) if a == b => {}
                (DataType::Integer, DataType::Float) => {
                    lk = left_compiler.compile(&l.clone().cast(DataType::Float))?;
                }
                (DataType::Float, DataType::Integer) => {
                    rk = right_compiler.compile(&r.clone().cast(DataType::Float))?;
                }
                (a, b) => {
                    return Err(CompileError::new(
                        CompileErrorKind::TypeMismatch,
                        format!("cannot join {} key {} with {} key {}", a, l, b, r),
                    ));
                }
            }
            compiled_left.push(lk);
            compiled_right.push(rk);
        }

        let schema = Schema::concat(&left_schema, &right_schema);
        let stage = Stage::Join(PhysicalJoin::new(
            join_type,
            compiled_left,
            compiled_right,
            left_schema.len(),
            right_schema.len(),
        ));
        Ok(builder.add(stage, schema, &[left, right]))
    }

    /// a fused projection's own errors are left for the caller to label with the Project node
    fn build_aggregate(
        &self,
        aggregate: &RelNode,
        group_by: &[NamedExpression],
        calls: &[AggregateCall],
        post: Option<&Vec<NamedExpression>>,
        child: StageId,
        builder: &mut PipelineBuilder,
    ) -> CompileResult<StageId> {
        let mut compiled = AggregateCompiler::new(builder.schema(child), self.registry)
            .compile(group_by, calls)
            .map_err(|e| e.at(aggregate.label()))?;
        if let Some(exprs) = post {
            fuse_projection(&mut compiled, exprs, self.registry)?;
        }
        let schema = compiled.output_schema.clone();
        let stage = Stage::Aggregate(PhysicalAggregate::new(compiled));
        Ok(builder.add(stage, schema, &[child]))
    }

    /// positional insert: the child's columns bind to the target's fields in order
    fn build_sink(
        &self,
        target: &str,
        child: StageId,
        builder: &mut PipelineBuilder,
    ) -> CompileResult<StageId> {
        let def = self.registry.sink(target).ok_or_else(|| {
            CompileError::new(
                CompileErrorKind::UnknownSink,
                format!("no sink named '{}' is registered", target),
            )
        })?;
        let input = builder.schema(child).clone();
        if input.len() != def.schema.len() {
            return Err(CompileError::new(
                CompileErrorKind::SchemaMismatch,
                format!(
                    "{} supplies {} column(s) but {} expects {}",
                    input,
                    input.len(),
                    def.name,
                    def.schema.len()
                ),
            ));
        }

        let mut exprs = Vec::with_capacity(input.len());
        let mut reshaped = false;
        for (i, (from, to)) in input.fields().iter().zip(def.schema.fields()).enumerate() {
            let expr = match (from.data_type, to.data_type) {
                (a, b) if a == b => column(i),
                (DataType::Integer, DataType::Float) => column(i).cast(DataType::Float),
                (a, b) => {
                    return Err(CompileError::new(
                        CompileErrorKind::SchemaMismatch,
                        format!(
                            "column {} ({}) cannot be inserted into {}.{} ({})",
                            from.name, a, def.name, to.name, b
                        ),
                    ));
                }
            };
            reshaped |= from.data_type != to.data_type || from.name != to.name;
            exprs.push(expr.alias(&to.name));
        }

        let child = if reshaped {
            self.build_projection(&exprs, child, builder)?
        } else {
            child
        };
        let stage = Stage::Sink(PhysicalSink::new(def.name.clone(), def.writer.clone()));
        Ok(builder.add(stage, def.schema.clone(), &[child]))
    }
}
