//! Punto de entrada ("driver").
//!
//! Este módulo expone una CLI sobre [`mlpc::pipeline`] y decide qué
//! resultados emitir.

use anyhow::{self, bail, Context};
use bitflags::bitflags;
use clap::{self, crate_version, Arg, ArgAction, ArgMatches};
use mlpc::Compilation;
use tracing_subscriber::EnvFilter;

use std::{
    fs::File,
    io::{self, Read, Write},
};

bitflags! {
    /// Resultados a emitir.
    struct Emit: u32 {
        /// Flujo de tokens.
        const TOKENS = 0x01;

        /// Árbol sintáctico.
        const AST = 0x02;

        /// Tabla de símbolos.
        const SYMBOLS = 0x04;

        /// Código de tres direcciones.
        const TAC = 0x08;
    }
}

impl Emit {
    fn from_names<'a, I: IntoIterator<Item = &'a String>>(names: I) -> anyhow::Result<Self> {
        let mut emit = Emit::empty();
        for name in names {
            emit |= match name.as_str() {
                "tokens" => Emit::TOKENS,
                "ast" => Emit::AST,
                "symbols" => Emit::SYMBOLS,
                "tac" => Emit::TAC,
                other => bail!("Unknown output kind: {}", other),
            };
        }

        Ok(emit)
    }
}

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = clap::Command::new("MLP compiler")
        .version(crate_version!())
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .action(ArgAction::Set)
                .required(true)
                .help("Source file ('-' for stdin)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .action(ArgAction::Set)
                .default_value("-")
                .help("Output file ('-' for stdout)"),
        )
        .arg(
            Arg::new("emit")
                .long("emit")
                .value_name("KIND")
                .action(ArgAction::Append)
                .value_delimiter(',')
                .value_parser(["tokens", "ast", "symbols", "tac"])
                .default_value("tac")
                .help("Results to emit"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("Increase log verbosity"),
        )
        .get_matches();

    init_logging(args.get_count("verbose"));

    let input = required(&args, "input")?;
    let output = required(&args, "output")?;
    let emit = Emit::from_names(args.get_many::<String>("emit").into_iter().flatten())?;

    let compilation = if input == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read from stdin")?;

        mlpc::compile(&text, "<stdin>")
    } else {
        mlpc::compile_file(input).with_context(|| format!("Failed to read: {}", input))?
    };

    match output {
        "-" => write_results(&compilation, emit, &mut io::stdout().lock())
            .context("Failed to write to stdout")?,

        path => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to open for writing: {}", path))?;

            write_results(&compilation, emit, &mut file)
                .with_context(|| format!("Failed to write to file: {}", path))?;
        }
    }

    if !compilation.succeeded() {
        eprint!("{}", compilation.diagnostics);
        std::process::exit(1);
    }

    Ok(())
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("Missing argument: {}", name))
}

/// `RUST_LOG` tiene precedencia sobre `-v`.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .init();
}

/// Emite lo que exista de cada resultado solicitado, aun si la compilación falló.
fn write_results<W: Write>(compilation: &Compilation, emit: Emit, output: &mut W) -> io::Result<()> {
    if emit.contains(Emit::TOKENS) {
        for token in &compilation.tokens {
            let (location, token) = (token.location(), token.val());
            writeln!(output, "{}\t{}\t{}", location, token.kind(), token.text())?;
        }
    }

    if emit.contains(Emit::AST) {
        if let Some(program) = &compilation.program {
            writeln!(output, "{:#?}", program)?;
        }
    }

    if emit.contains(Emit::SYMBOLS) {
        if let Some(symbols) = &compilation.symbols {
            write!(output, "{}", symbols)?;
        }
    }

    if emit.contains(Emit::TAC) {
        if let Some(tac) = &compilation.tac {
            write!(output, "{}", tac)?;
        }
    }

    output.flush()
}
