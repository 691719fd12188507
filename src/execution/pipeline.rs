use super::operators::{Side, Stage};
use crate::error::{EvalResult, EvaluationError};
use crate::io::SinkWriter;
use crate::registry::ReaderFactory;
use crate::schema::Schema;
use crate::value::Tuple;
use std::fmt;
use std::sync::Arc;

pub type StageId = usize;

struct StageNode {
    stage: Stage,
    schema: Schema,
    parent: Option<(StageId, Side)>,
    children: Vec<StageId>,
}

/// entry point for one scanned source
#[derive(Clone)]
struct SourceEntry {
    name: String,
    stage: StageId,
    reader: Option<ReaderFactory>,
}

/// assembles stages bottom-up; children must be added before their parent
#[derive(Default)]
pub struct PipelineBuilder {
    nodes: Vec<StageNode>,
    sources: Vec<SourceEntry>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_scan(
        &mut self,
        source: &str,
        stage: Stage,
        schema: Schema,
        reader: Option<ReaderFactory>,
    ) -> StageId {
        let id = self.add(stage, schema, &[]);
        self.sources.push(SourceEntry {
            name: source.to_string(),
            stage: id,
            reader,
        });
        id
    }

    /// add a stage fed by the given children; a two-child stage takes (left, right)
    pub fn add(&mut self, stage: Stage, schema: Schema, children: &[StageId]) -> StageId {
        let id = self.nodes.len();
        for (i, child) in children.iter().enumerate() {
            let side = if i == 0 { Side::Left } else { Side::Right };
            self.nodes[*child].parent = Some((id, side));
        }
        self.nodes.push(StageNode {
            stage,
            schema,
            parent: None,
            children: children.to_vec(),
        });
        id
    }

    pub fn schema(&self, id: StageId) -> &Schema {
        &self.nodes[id].schema
    }

    pub fn build(self, root: StageId) -> Pipeline {
        Pipeline {
            nodes: self.nodes,
            root,
            sources: self.sources,
            writers: Vec::new(),
            results: Vec::new(),
            emitted: 0,
        }
    }
}

/// compiled, runnable graph of physical stages
///
/// the external engine calls `consume` any number of times and then `flush` once
/// per window; a pipeline instance is never shared between threads, use
/// `partition` to get an independent instance per partition
pub struct Pipeline {
    /// post-order: every child precedes its parent
    nodes: Vec<StageNode>,
    root: StageId,
    sources: Vec<SourceEntry>,
    writers: Vec<Arc<dyn SinkWriter>>,
    /// root output kept when no writer is attached
    results: Vec<Tuple>,
    emitted: usize,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.nodes.len())
            .field("sources", &self.sources())
            .field("output_schema", self.output_schema())
            .field("emitted", &self.emitted)
            .finish()
    }
}

impl Pipeline {
    pub fn output_schema(&self) -> &Schema {
        &self.nodes[self.root].schema
    }

    /// distinct source names in the order they are scanned
    pub fn sources(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for entry in &self.sources {
            if !names.contains(&entry.name) {
                names.push(entry.name.clone());
            }
        }
        names
    }

    pub fn reader(&self, source: &str) -> Option<ReaderFactory> {
        self.sources
            .iter()
            .find(|entry| entry.name == source)
            .and_then(|entry| entry.reader.clone())
    }

    pub fn stage_count(&self) -> usize {
        self.nodes.len()
    }

    /// number of tuples delivered to the root output or written by a sink stage
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// route root output to a writer in addition to any already attached
    pub fn attach(&mut self, writer: Arc<dyn SinkWriter>) {
        self.writers.push(writer);
    }

    /// take root output buffered while no writer was attached
    pub fn take_results(&mut self) -> Vec<Tuple> {
        std::mem::take(&mut self.results)
    }

    /// feed one tuple from a named source
    pub fn consume(&mut self, source: &str, tuple: Tuple) -> EvalResult<()> {
        let entries: Vec<StageId> = self
            .sources
            .iter()
            .filter(|entry| entry.name == source)
            .map(|entry| entry.stage)
            .collect();
        if entries.is_empty() {
            return Err(EvaluationError::UnknownSource(source.to_string()));
        }
        for stage in entries {
            self.propagate(stage, Side::Left, vec![tuple.clone()])?;
        }
        Ok(())
    }

    /// close the window: flush stages children-first so buffered output reaches
    /// its parent before the parent is flushed itself
    ///
    /// on error every stage is still left empty for the next window
    pub fn flush(&mut self) -> EvalResult<()> {
        if let Err(e) = self.flush_stages() {
            for node in &mut self.nodes {
                node.stage.reset();
            }
            return Err(e);
        }
        for writer in &self.writers {
            writer.flush()?;
        }
        Ok(())
    }

    fn flush_stages(&mut self) -> EvalResult<()> {
        for id in 0..self.nodes.len() {
            let mut output = Vec::new();
            self.nodes[id].stage.flush(&mut output)?;
            if output.is_empty() {
                continue;
            }
            match self.nodes[id].parent {
                Some((parent, side)) => self.propagate(parent, side, output)?,
                None => self.emit(output)?,
            }
        }
        Ok(())
    }

    /// independent instance with empty join/aggregate state sharing compiled evaluators
    pub fn partition(&self) -> Pipeline {
        Pipeline {
            nodes: self
                .nodes
                .iter()
                .map(|node| StageNode {
                    stage: node.stage.fresh(),
                    schema: node.schema.clone(),
                    parent: node.parent,
                    children: node.children.clone(),
                })
                .collect(),
            root: self.root,
            sources: self.sources.clone(),
            writers: self.writers.clone(),
            results: Vec::new(),
            emitted: 0,
        }
    }

    fn propagate(&mut self, start: StageId, side: Side, tuples: Vec<Tuple>) -> EvalResult<()> {
        let (mut current, mut side, mut batch) = (start, side, tuples);
        loop {
            if batch.is_empty() {
                return Ok(());
            }
            let node = &mut self.nodes[current];
            if let Stage::Sink(_) = node.stage {
                self.emitted += batch.len();
            }
            let mut output = Vec::new();
            for tuple in batch {
                node.stage.push(side, tuple, &mut output)?;
            }
            let parent = node.parent;
            match parent {
                Some((parent, parent_side)) => {
                    current = parent;
                    side = parent_side;
                    batch = output;
                }
                None => return self.emit(output),
            }
        }
    }

    fn emit(&mut self, output: Vec<Tuple>) -> EvalResult<()> {
        self.emitted += output.len();
        if self.writers.is_empty() {
            self.results.extend(output);
            return Ok(());
        }
        for tuple in output {
            for writer in &self.writers {
                writer.write(tuple.clone())?;
            }
        }
        Ok(())
    }

    /// stage tree, root first
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_node(self.root, 0, &mut out);
        out
    }

    fn explain_node(&self, id: StageId, indent: usize, out: &mut String) {
        let node = &self.nodes[id];
        let prefix = if indent > 0 {
            " ".repeat(indent) + "└── "
        } else {
            String::new()
        };
        out.push_str(&format!("{}{} -> {}\n", prefix, node.stage.describe(), node.schema));
        for child in &node.children {
            self.explain_node(*child, indent + 2, out);
        }
    }
}
