#[macro_use]
extern crate clap;

use std::fs::File;
use std::io::prelude::*;
use std::io::BufReader;
use std::path::Path;

use clap::Arg;
use icvm::{constants, Host, Image, Processor};

fn main() {
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("disassemble")
                .short("s")
                .long("disassemble")
                .help("Lists the compiled program instead of running it"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Increases diagnostic verbosity (up to -vvvv)"),
        )
        .arg(
            Arg::with_name("SOURCE")
                .help("The source file to interpret")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("ARGS")
                .help("Arguments passed through to the hosted program")
                .multiple(true)
                .index(2),
        )
        .get_matches();

    init_tracing(matches.occurrences_of("verbose"));

    let source_path = matches.value_of("SOURCE").unwrap();
    // The hosted program's argv starts with the source path, like any
    // process's argv starts with its own name.
    let mut args = vec![source_path.to_string()];
    if let Some(rest) = matches.values_of("ARGS") {
        args.extend(rest.map(String::from));
    }

    match run(source_path, &args, matches.is_present("disassemble")) {
        Ok(value) => std::process::exit(value),
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    }
}

/// Maps `-v` occurrences onto tracing levels: warnings appear at `-v`, and
/// each further flag opens one more level.
fn init_tracing(verbosity: u64) {
    use tracing_subscriber::filter::LevelFilter;

    let level = match verbosity {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::WARN,
        2 => LevelFilter::INFO,
        3 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(source_path: &str, args: &[String], disassemble: bool) -> Result<i32, Box<dyn std::error::Error>> {
    let mut source = String::new();
    BufReader::new(File::open(Path::new(source_path))?).read_to_string(&mut source)?;

    let program = icpp::compile(&source)?;

    if disassemble {
        print!("{}", icpp::listing(&source, &program));
        return Ok(0);
    }

    let Image {
        mut memory,
        registers,
        layout,
    } = icvm::load(&program, args, constants::MEMORY_WORDS)?;

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();
    let mut host = Host::new(&mut out, &mut err);

    let mut processor = Processor::new(registers);
    let value = processor.run(&mut memory, &layout, program.externals(), &mut host)?;
    Ok(value)
}
