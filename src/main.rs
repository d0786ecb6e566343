use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use jyield::ast::ClassDecl;
use jyield::diagnostics::Diagnostics;
use jyield::interp::{Interpreter, RuntimeError, Value};
use jyield::lower::{Anchor, LowerOptions, Outcome, process_class_with};
use jyield::printer::print_class;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "jyield",
    version,
    about = "Lowers yield() generator methods into iterator state machines"
)]
struct Cli {
    /// Increase logging verbosity (-v: debug, -vv+: trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lower every generator method of a JSON class declaration
    Lower {
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = Emit::Java)]
        emit: Emit,

        #[command(flatten)]
        lowering: LoweringArgs,
    },
    /// Lower a class, then call one of its methods and print what it yields
    Run {
        file: PathBuf,

        #[arg(short, long)]
        method: String,

        /// Integer arguments passed to the method
        #[arg(long = "arg", allow_negative_numbers = true)]
        args: Vec<i64>,

        /// Stop after this many values
        #[arg(long, default_value_t = 1000)]
        limit: usize,

        /// Statement budget for the evaluator
        #[arg(long)]
        steps: Option<u64>,

        /// Run the class as written, without lowering
        #[arg(long)]
        no_lower: bool,

        #[command(flatten)]
        lowering: LoweringArgs,
    },
}

#[derive(clap::Args)]
struct LoweringArgs {
    /// Prefix of the synthesized class names
    #[arg(long)]
    class_prefix: Option<String>,

    /// Keep one state per label instead of folding adjacent labels
    #[arg(long)]
    no_coalesce: bool,
}

impl LoweringArgs {
    fn options(&self) -> LowerOptions {
        let defaults = LowerOptions::default();
        LowerOptions {
            class_prefix: self.class_prefix.clone().unwrap_or(defaults.class_prefix),
            coalesce_labels: !self.no_coalesce,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Emit {
    Java,
    Json,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} is not a class declaration: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("cannot serialize the lowered class: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("class {class} has no method '{method}'")]
    UnknownMethod { class: String, method: String },
    #[error("{0} method(s) rejected")]
    Rejected(usize),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

fn directive_for_verbosity(v: u8) -> &'static str {
    match v {
        0 => "jyield=warn",
        1 => "jyield=debug",
        _ => "jyield=trace",
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive_for_verbosity(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path) -> Result<ClassDecl, CliError> {
    let source = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&source).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Lowers `class` in place and prints diagnostics; returns how many methods
/// were rejected.
fn lower_class(path: &Path, class: &mut ClassDecl, options: &LowerOptions) -> usize {
    let mut sink = Diagnostics::new();
    let outcomes = process_class_with(class, &Anchor::new(class.span), &mut sink, options);
    for diagnostic in sink.iter() {
        eprintln!("{}: {diagnostic}", path.display());
    }
    let mut rejected = 0;
    for outcome in &outcomes {
        match outcome {
            Outcome::Lowered(lowered) => info!(
                method = %lowered.method,
                class = %lowered.class_name,
                states = lowered.states,
                captured = ?lowered.captured,
                "lowered"
            ),
            Outcome::Rejected(_) => rejected += 1,
            Outcome::Untouched => {}
        }
    }
    rejected
}

fn lower(file: &Path, emit: Emit, options: &LowerOptions) -> Result<(), CliError> {
    let mut class = load(file)?;
    let rejected = lower_class(file, &mut class, options);
    match emit {
        Emit::Java => print!("{}", print_class(&class)),
        Emit::Json => {
            let json = serde_json::to_string_pretty(&class).map_err(CliError::Serialize)?;
            println!("{json}");
        }
    }
    if rejected > 0 {
        return Err(CliError::Rejected(rejected));
    }
    Ok(())
}

struct RunRequest<'a> {
    method: &'a str,
    args: &'a [i64],
    limit: usize,
    steps: Option<u64>,
    lower: bool,
}

fn run(file: &Path, request: &RunRequest<'_>, options: &LowerOptions) -> Result<(), CliError> {
    let mut class = load(file)?;
    if class.method(request.method).is_none() {
        return Err(CliError::UnknownMethod {
            class: class.name,
            method: request.method.to_string(),
        });
    }
    if request.lower {
        let rejected = lower_class(file, &mut class, options);
        if rejected > 0 {
            return Err(CliError::Rejected(rejected));
        }
    }

    let mut interp = Interpreter::new(&class);
    if let Some(steps) = request.steps {
        interp = interp.with_step_limit(steps);
    }
    let args = request.args.iter().copied().map(Value::Int).collect();
    let result = interp.call(request.method, args)?;

    let mut printed = 0;
    let mut flush = |interp: &Interpreter| {
        for line in &interp.output()[printed..] {
            println!("{line}");
        }
        printed = interp.output().len();
    };
    flush(&interp);
    if !matches!(result, Value::Object(_) | Value::List(_) | Value::ListIter(_)) {
        if result != Value::Null {
            println!("=> {result}");
        }
        return Ok(());
    }
    let iterator = interp.iterator(&result)?;
    for _ in 0..request.limit {
        let batch = interp.drain(&iterator, 1)?;
        flush(&interp);
        let Some(value) = batch.first() else {
            break;
        };
        println!("=> {value}");
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Command::Lower {
            file,
            emit,
            lowering,
        } => lower(file, *emit, &lowering.options()),
        Command::Run {
            file,
            method,
            args,
            limit,
            steps,
            no_lower,
            lowering,
        } => {
            let request = RunRequest {
                method,
                args,
                limit: *limit,
                steps: *steps,
                lower: !no_lower,
            };
            run(file, &request, &lowering.options())
        }
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("jyield: {e}");
            ExitCode::from(1)
        }
    }
}
