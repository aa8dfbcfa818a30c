//! `pcre-regex-cli` (command-line diagnostics/emission front end for
//! `pcre_regex_core`).
//!
//! This binary is the binding-agnostic communication layer between editor
//! tooling (LSP servers) and the Rust core: it reads a delimited PCRE
//! pattern from a file or stdin, and either reports a structured
//! diagnostic (parse success or failure, as JSON) or dumps the compiled
//! AST/bytecode for inspection.
//!
//! # Usage
//!
//! ```bash
//! pcre-regex-cli diagnostics <filepath>
//! pcre-regex-cli diagnostics --stdin
//! pcre-regex-cli emit --target ast <filepath>
//! pcre-regex-cli emit --target bytecode --stdin
//! ```

use clap::{Parser, Subcommand};
use pcre_regex_core::core::utf16;
use pcre_regex_core::{preprocess, ParseError};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a pattern and report success or a structured diagnostic.
    Diagnostics {
        /// Input file path (omit with --stdin)
        file: Option<PathBuf>,

        /// Read the pattern from stdin instead of a file
        #[arg(long)]
        stdin: bool,
    },

    /// Run the full pipeline and emit the result as JSON.
    Emit {
        /// What to emit: `ast` or `bytecode`
        #[arg(long)]
        target: String,

        /// Input file path (omit with --stdin)
        file: Option<PathBuf>,

        /// Read the pattern from stdin instead of a file
        #[arg(long)]
        stdin: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Diagnostics { file, stdin }) => {
            let pattern = match read_input(file.as_ref(), *stdin) {
                Ok(text) => text,
                Err(e) => fail_io(&e),
            };
            run_diagnostics(&pattern);
        }
        Some(Commands::Emit { target, file, stdin }) => {
            let pattern = match read_input(file.as_ref(), *stdin) {
                Ok(text) => text,
                Err(e) => fail_io(&e),
            };
            run_emit(target, &pattern);
        }
        None => {
            eprintln!("No command specified. Use --help for usage information.");
            std::process::exit(1);
        }
    }
}

fn run_diagnostics(pattern: &str) {
    match pcre_regex_core::compile(pattern) {
        Ok(_) => {
            let report = serde_json::json!({
                "success": true,
                "diagnostics": [],
            });
            println!("{}", serde_json::to_string_pretty(&report).unwrap());
        }
        Err(err) => {
            let report = serde_json::json!({
                "success": false,
                "diagnostics": [err.to_lsp_diagnostic()],
            });
            println!("{}", serde_json::to_string_pretty(&report).unwrap());
            std::process::exit(1);
        }
    }
}

fn run_emit(target: &str, pattern: &str) {
    match target {
        "ast" => match parse_to_ast(pattern) {
            Ok(tree) => println!("{}", serde_json::to_string_pretty(&tree).unwrap()),
            Err(err) => fail_parse(&err),
        },
        "bytecode" => match pcre_regex_core::compile(pattern) {
            Ok(code) => println!("{}", serde_json::to_string_pretty(&code).unwrap()),
            Err(err) => fail_parse(&err),
        },
        other => {
            eprintln!("unknown --target '{other}'; expected 'ast' or 'bytecode'");
            std::process::exit(1);
        }
    }
}

fn parse_to_ast(pattern: &str) -> Result<pcre_regex_core::RegexNode, ParseError> {
    let preprocessed = preprocess(pattern).map_err(|kind| ParseError::new(kind, 0, pattern))?;
    let parser = pcre_regex_core::Parser::new(&preprocessed.body, preprocessed.options)?;
    let (tree, _captures) = parser.parse()?;
    Ok(utf16::transform(&tree))
}

fn fail_parse(err: &ParseError) -> ! {
    eprintln!("{}", err.render());
    std::process::exit(1);
}

fn fail_io(err: &io::Error) -> ! {
    eprintln!("Error reading input: {}", err);
    std::process::exit(1);
}

fn read_input(file: Option<&PathBuf>, stdin: bool) -> io::Result<String> {
    if stdin || file.is_none() {
        read_stdin()
    } else {
        fs::read_to_string(file.unwrap())
    }
}

fn read_stdin() -> io::Result<String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}
