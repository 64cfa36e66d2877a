use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::error;

/// Angel compiler: translates Angel source files to C++, or starts a REPL
/// when no file is given.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Path to an Angel source file. Without it the REPL starts.
    #[arg(index = 1)]
    file: Option<PathBuf>,

    /// Dump the clarified AST as JSON instead of compiling.
    #[arg(long)]
    dump_ast: bool,

    /// Specify the log level of the compiler.
    #[arg(value_enum, short, long, default_value_t = LogLevel::default())]
    verbosity: LogLevel,
}

#[derive(ValueEnum, Clone, Default, Debug)]
enum LogLevel {
    /// Only critical errors.
    #[default]
    #[value(alias("0"))]
    Error,
    /// Warnings as well.
    #[value(alias("1"))]
    Warn,
    /// General pipeline progress.
    #[value(alias("2"))]
    Info,
    /// Internal details of every stage.
    #[value(alias("3"))]
    Debug,
    /// Everything.
    #[value(alias("4"))]
    Trace,
}

impl From<&LogLevel> for log::Level {
    fn from(value: &LogLevel) -> Self {
        match value {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

fn main() -> ExitCode {
    let args = Cli::parse();
    simple_logger::init_with_level((&args.verbosity).into()).unwrap();

    let Some(file) = args.file else {
        return ExitCode::from(angel::repl::run() as u8);
    };

    let source = match std::fs::read_to_string(&file) {
        Ok(source) => source,
        Err(io_error) => {
            error!("cannot read '{}': {io_error}", file.display());
            return ExitCode::FAILURE;
        }
    };

    if args.dump_ast {
        return match angel::parse_and_clarify(&source, true) {
            Ok(ast) => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&ast)
                        .expect("the AST serializes to JSON")
                );
                ExitCode::SUCCESS
            }
            Err(compile_error) => {
                eprintln!("{}", format!("{compile_error}").red());
                ExitCode::FAILURE
            }
        };
    }

    match angel::compile_string(&source, true) {
        Ok(cpp) => {
            println!("{cpp}");
            ExitCode::SUCCESS
        }
        Err(compile_error) => {
            eprintln!("{}", format!("{compile_error}").red());
            ExitCode::FAILURE
        }
    }
}
