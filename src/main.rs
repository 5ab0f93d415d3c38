use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;

use markmatch::{CaptureDispatcher, Template};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Template file
    #[arg(value_name = "TEMPLATE")]
    template: String,

    /// Document to match, read from stdin when omitted
    #[arg(value_name = "DOCUMENT")]
    document: Option<String>,

    /// Document encoding label, e.g. iso-8859-1
    #[arg(short = 'c', long, value_name = "LABEL")]
    charset: Option<String>,

    /// Print only these captures (repeatable)
    #[arg(short = 'p', long = "print", value_name = "NAME")]
    print: Vec<String>,

    /// Do not print captures
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Debug logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let source = fs::read_to_string(&args.template)
        .with_context(|| format!("Failed to read template {}", args.template))?;
    let template = Template::compile(&source)
        .with_context(|| format!("Failed to compile template {}", args.template))?;

    let bytes = match args.document.as_ref() {
        Some(path) => fs::read(path).with_context(|| format!("Failed to read {path}"))?,
        None => {
            let mut bytes = Vec::new();
            io::stdin()
                .read_to_end(&mut bytes)
                .context("Failed to read stdin")?;
            bytes
        }
    };

    let names: Vec<String> = match (args.quiet, args.print.is_empty()) {
        (true, _) => Vec::new(),
        (false, true) => template
            .capture_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
        (false, false) => args.print.clone(),
    };
    let mut dispatcher = CaptureDispatcher::new();
    for name in &names {
        dispatcher.register(name, move |scope| {
            println!("{name}: {}", scope.get(name).unwrap_or_default());
        });
    }

    let run = template
        .run_bytes(&bytes, args.charset.as_deref(), &mut dispatcher)
        .context("Failed to read document")?;
    drop(dispatcher);

    println!("{}", run.verdict());
    Ok(if run.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
