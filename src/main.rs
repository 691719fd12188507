use colored::*;
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use sqlstream::{
    CollectSink, Config, ExecutionStats, PipelineExecutor, Registry, RelNode, Schema, Tuple,
    Value, logging,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => match Config::load(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", format!("Config error: {}", e).red().bold());
                std::process::exit(1);
            }
        },
        None => {
            let mut config = Config::default();
            config.apply_env();
            config
        }
    };
    logging::init(&config.log_filter);

    let registry = match config.build_registry() {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("{}", format!("Catalog error: {}", e).red().bold());
            std::process::exit(1);
        }
    };

    // ctrl-c stops the running plan; at the prompt rustyline reports it instead
    let interrupt = Arc::new(AtomicBool::new(false));
    let handler_flag = interrupt.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst)) {
        eprintln!("{}", format!("Cannot install ctrl-c handler: {}", e).yellow());
    }

    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}", format!("Cannot start line editor: {}", e).red().bold());
            std::process::exit(1);
        }
    };

    println!("{}", "sqlstream plan runner".bright_cyan().bold());
    println!("{}", "Type .help for commands".bright_black());

    loop {
        match editor.readline("sqlstream> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);
                if !dispatch(line, &config, &registry, &interrupt) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}", format!("Input error: {}", e).red());
                break;
            }
        }
    }
}

/// run one command line; false means quit
fn dispatch(line: &str, config: &Config, registry: &Registry, interrupt: &Arc<AtomicBool>) -> bool {
    let (command, argument) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    match command {
        ".quit" | ".exit" => return false,
        ".help" => print_help(),
        ".sources" => print_catalog("Sources", registry.source_names(), |name| {
            registry.source(name).map(|def| def.schema.clone())
        }),
        ".sinks" => print_catalog("Sinks", registry.sink_names(), |name| {
            registry.sink(name).map(|def| def.schema.clone())
        }),
        ".explain" | ".run" if argument.is_empty() => {
            eprintln!("{}", format!("usage: {} <plan.json>", command).yellow());
        }
        ".explain" => {
            if let Some(plan) = load_plan(argument) {
                explain(&plan, registry);
            }
        }
        ".run" => {
            if let Some(plan) = load_plan(argument) {
                interrupt.store(false, Ordering::SeqCst);
                run(&plan, config, registry, interrupt.clone());
            }
        }
        other => eprintln!(
            "{}",
            format!("Unknown command '{}', try .help", other).yellow()
        ),
    }
    true
}

fn print_help() {
    println!("{}", "Commands:".bright_cyan().bold());
    println!("  .sources            list registered sources");
    println!("  .sinks              list registered sinks");
    println!("  .run <plan.json>    compile and execute a plan");
    println!("  .explain <plan.json> show the compiled stage tree");
    println!("  .quit               leave");
}

fn print_catalog<F>(title: &str, names: Vec<String>, schema_of: F)
where
    F: Fn(&str) -> Option<Schema>,
{
    if names.is_empty() {
        println!("{}", format!("No {}", title.to_lowercase()).yellow());
        return;
    }
    println!("{}", format!("{}:", title).bright_cyan().bold());
    for name in names {
        let schema = schema_of(&name).map(|s| s.to_string()).unwrap_or_default();
        println!("  {} {}", name.bright_white(), schema.bright_black());
    }
}

fn load_plan(path: &str) -> Option<RelNode> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("{}", format!("Cannot read {}: {}", path, e).red().bold());
            return None;
        }
    };
    match serde_json::from_str::<RelNode>(&text) {
        Ok(plan) => Some(plan),
        Err(e) => {
            eprintln!("{}", format!("Invalid plan {}: {}", path, e).red().bold());
            None
        }
    }
}

fn explain(plan: &RelNode, registry: &Registry) {
    match sqlstream::compile(plan, registry) {
        Ok(pipeline) => {
            println!("{}", "=== PIPELINE ===".bright_cyan().bold());
            print!("{}", pipeline.explain());
        }
        Err(e) => eprintln!("{}", format!("Compile failed: {}", e).red().bold()),
    }
}

fn run(plan: &RelNode, config: &Config, registry: &Registry, interrupt: Arc<AtomicBool>) {
    let mut pipeline = match sqlstream::compile(plan, registry) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("{}", format!("Compile failed: {}", e).red().bold());
            return;
        }
    };
    if config.show_plan {
        println!("{}", "=== PIPELINE ===".bright_cyan().bold());
        print!("{}", pipeline.explain());
    }

    let schema = pipeline.output_schema().clone();
    let is_insert = matches!(plan, RelNode::Sink { .. });
    let collected = CollectSink::new();
    pipeline.attach(Arc::new(collected.clone()));

    let mut executor = PipelineExecutor::new(pipeline).with_interrupt(interrupt);
    match executor.execute() {
        Ok(stats) => {
            if is_insert {
                print_insert(plan, &stats);
            } else {
                print_results(&schema, &collected.tuples());
            }
            print_stats(&stats);
        }
        Err(e) => eprintln!("{}", format!("Execution failed: {}", e).red().bold()),
    }
}

fn print_insert(plan: &RelNode, stats: &ExecutionStats) {
    let target = match plan {
        RelNode::Sink { target, .. } => target.as_str(),
        _ => "",
    };
    println!(
        "{} {} row(s) into {}",
        "Inserted".green().bold(),
        stats.tuples_emitted.to_string().bright_yellow(),
        target.bright_white()
    );
}

fn print_results(schema: &Schema, tuples: &[Tuple]) {
    if tuples.is_empty() {
        println!("{}", "No results".yellow());
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            schema
                .fields()
                .iter()
                .map(|f| Cell::new(format!("{}\n{}", f.name, f.data_type))),
        );
    for tuple in tuples {
        table.add_row(tuple.values().iter().map(|v| Cell::new(format_value(v))));
    }
    println!("{table}");
    println!("Total rows: {}", tuples.len().to_string().bright_yellow());
}

fn print_stats(stats: &ExecutionStats) {
    if stats.interrupted {
        println!("{}", "Interrupted, partial window flushed".yellow());
    }
    println!(
        "{}",
        format!(
            "{} read, {} emitted ({})",
            stats.tuples_read,
            stats.tuples_emitted,
            format_duration(stats.elapsed)
        )
        .bright_black()
    );
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Varchar(s) => format!("'{}'", s),
        other => other.to_string(),
    }
}

fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros < 1000 {
        format!("{}µs", micros)
    } else if micros < 1_000_000 {
        format!("{:.2}ms", micros as f64 / 1000.0)
    } else {
        format!("{:.2}s", micros as f64 / 1_000_000.0)
    }
}
