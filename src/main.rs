//! recjit CLI
//!
//! Computes M applications of a scalar recurrence N_{k+1} = f(N_k) and
//! prints N_M. The expression is JIT-compiled to native code by default;
//! `--no-jit` evaluates with the reference interpreter instead.

use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;

use recjit::{Recurrence, Token};

const DEFAULT_EXPRESSION: &str = "(((54 + 3) / 8) - (4 * 2)) + n";

#[derive(Parser)]
#[command(name = "recjit")]
#[command(version)]
#[command(about = "JIT-compiled evaluation of scalar recurrences", long_about = None)]
struct Cli {
    /// Recurrence expression over `n`; every binary application needs its
    /// own parentheses
    #[arg(value_name = "EXPRESSION", default_value = DEFAULT_EXPRESSION)]
    expression: String,

    /// Number of iterations M
    #[arg(value_name = "ITERATIONS", default_value_t = 100_000)]
    iterations: usize,

    /// Initial value N_0
    #[arg(value_name = "N0", default_value_t = 0.0, allow_negative_numbers = true)]
    initial: f64,

    /// Evaluate with the interpreter instead of the JIT
    #[arg(long)]
    no_jit: bool,

    /// Print the lexed token stream before computing
    #[arg(long)]
    dump_tokens: bool,

    /// Print the postfix form before computing
    #[arg(long)]
    dump_postfix: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let recurrence = match Recurrence::new(&cli.expression, cli.initial) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    if cli.dump_tokens {
        eprintln!("tokens:  {}", render(recurrence.tokens()));
    }
    if cli.dump_postfix {
        eprintln!("postfix: {}", render(recurrence.postfix()));
    }

    match recurrence.compute(cli.iterations, !cli.no_jit) {
        Ok(value) => {
            println!("{}", value);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn render(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
