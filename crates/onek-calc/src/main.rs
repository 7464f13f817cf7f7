use std::{
    io::BufRead,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::Context;
use clap::Parser;
use onek_calc::Eval;
use onek_runtime::{graph::DotGraph, Config, Grammar, LogTrace, Trace, TraceBuffer};

/// Evaluates arithmetic expressions.
#[derive(Parser)]
struct Args {
    /// Expressions to evaluate, one per line of stdin when omitted
    expressions: Vec<String>,
    /// JSON file overriding the parser configuration
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print the tree of every expression
    #[arg(long)]
    tree: bool,
    /// Write the tree of the n-th expression to `<DIR>/ast<n>.gv`
    #[arg(long, value_name = "DIR")]
    dot: Option<PathBuf>,
    /// Print the most recent parse events of expressions that fail to parse
    #[arg(long)]
    trace: bool,
}

fn main() {
    init_logger();
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("error: {err:?}");
            std::process::exit(1);
        }
    }
}

fn init_logger() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| log::LevelFilter::from_str(&level).ok())
        .unwrap_or(log::LevelFilter::Warn);

    let result = simplelog::TermLogger::init(
        level,
        simplelog::ConfigBuilder::new()
            .set_time_format_custom(&[])
            .build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Never,
    );
    if let Err(err) = result {
        eprintln!("Failed to initialize logging: {err}");
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config `{}`", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid config `{}`", path.display()))
}

fn run() -> anyhow::Result<bool> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    let grammar = onek_calc::grammar(config).context("Failed to build the grammar")?;

    let mut expressions = args.expressions.clone();
    if expressions.is_empty() {
        for line in std::io::stdin().lock().lines() {
            let line = line.context("Failed to read stdin")?;
            if !line.trim().is_empty() {
                expressions.push(line);
            }
        }
    }

    let mut ok = true;
    for (i, expression) in expressions.iter().enumerate() {
        ok &= evaluate(&grammar, expression, i + 1, &args)?;
    }
    Ok(ok)
}

fn evaluate(
    grammar: &Grammar<Eval>,
    expression: &str,
    n: usize,
    args: &Args,
) -> anyhow::Result<bool> {
    let mut buffer = TraceBuffer::new(grammar.config().trace_capacity);
    let mut log = LogTrace::new();
    let trace: &mut dyn Trace = if args.trace { &mut buffer } else { &mut log };

    let ast = match grammar.parse_with(grammar.root(), expression, trace) {
        Ok(ast) => ast,
        Err(failure) => {
            eprintln!("{failure}");
            if args.trace {
                eprint!("{buffer}");
            }
            return Ok(false);
        }
    };
    log::debug!("`{expression}` parsed into {} nodes", ast.len());

    if args.tree {
        print!("{ast}");
    }
    if let Some(dir) = &args.dot {
        let mut graph = DotGraph::new();
        ast.export_graph(&mut graph);
        let path = dir.join(format!("ast{n}.gv"));
        std::fs::write(&path, graph.to_string())
            .with_context(|| format!("Failed to write `{}`", path.display()))?;
    }

    match ast.execute() {
        Some(Ok(value)) => {
            println!("{value}");
            Ok(true)
        }
        Some(Err(err)) => {
            eprintln!("{expression}: {err}");
            Ok(false)
        }
        None => Ok(false),
    }
}
