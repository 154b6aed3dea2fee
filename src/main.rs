use std::{io::{self, BufRead, Write}, path::{Path, PathBuf}};

use anyhow::Context;
use clap::{ArgAction, Parser};
use skeme::{parse_all, EvaluationContext, SchemeError, SchemeResult, Value};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "skeme", version, about = "A small Scheme interpreter")]
struct Arguments {
    /// Program to run. Without one, forms are read from an interactive prompt
    file: Option<PathBuf>,

    /// Files evaluated before FILE, without echoing their values
    #[arg(long, value_name = "FILE", num_args = 1..)]
    load: Vec<PathBuf>,

    /// Stop at the first form that fails
    #[arg(short = 'e', long)]
    fail_on_error: bool,

    /// Do not echo the value of each form
    #[arg(short, long)]
    quiet: bool,

    /// Log more (-v info, -vv debug, -vvv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn report(outcome: SchemeResult<Value>, echo: bool, fail_on_error: bool, out: &mut impl Write) -> anyhow::Result<()> {
    match outcome {
        Ok(value) if echo => writeln!(out, "{}", value)?,
        Ok(_) => {}
        Err(error) if fail_on_error => return Err(error.into()),
        Err(error) => writeln!(out, "Error: {}", error)?,
    }
    Ok(())
}

/// Evaluates `source` one form at a time, reporting each form before the
/// next one runs.
fn run_source(context: &mut EvaluationContext, source: &str, echo: bool, fail_on_error: bool, out: &mut impl Write) -> anyhow::Result<()> {
    let expressions = match parse_all(source) {
        Ok(expressions) => expressions,
        Err(error) => return report(Err(error), echo, fail_on_error, out),
    };

    for expression in &expressions {
        let outcome = context.evaluate(expression);
        out.write_all(context.take_output().as_bytes())?;
        report(outcome, echo, fail_on_error, out)?;
    }
    Ok(())
}

fn run_file(context: &mut EvaluationContext, path: &Path, echo: bool, fail_on_error: bool) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    run_source(context, &source, echo, fail_on_error, &mut io::stdout())
        .with_context(|| format!("evaluating {}", path.display()))
}

fn repl(context: &mut EvaluationContext, echo: bool) -> anyhow::Result<()> {
    // Lines accumulate until they hold only complete forms

    let stdin = io::stdin();
    let mut buffer = String::new();
    loop {
        print!("{}", if buffer.is_empty() { "scm> " } else { "...> " });
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 { break; }
        buffer.push_str(&line);

        match parse_all(&buffer) {
            Err(SchemeError::UnexpectedEof) => continue,
            Err(error) => println!("Error: {}", error),
            Ok(expressions) => {
                for expression in &expressions {
                    report(context.evaluate(expression), echo, false, &mut io::stdout())?;
                }
            }
        }
        buffer.clear();
    }

    println!("\nBye.");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let arguments = Arguments::parse();
    init_tracing(arguments.verbose);

    let mut context = EvaluationContext::new();
    for path in &arguments.load {
        run_file(&mut context, path, false, arguments.fail_on_error)?;
    }

    match &arguments.file {
        Some(path) => run_file(&mut context, path, !arguments.quiet, arguments.fail_on_error),
        None => repl(&mut context, !arguments.quiet),
    }
}
