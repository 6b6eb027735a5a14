//! Command-line front end for the resolver.
//!
//! Resolves one or more domain names sequentially and prints each
//! caller-facing response in dig-like sections. Exits non-zero on a
//! configuration failure, a resolver initialisation failure, or an
//! unsupported record type.

use clap::Parser;
use iterdns::{e_fmt, RecordType, Resolver, ResolverConfig, Result};
use log::LevelFilter;
use std::{
    env, fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

#[derive(Parser, Debug)]
#[command(
    name = "iterdns",
    about = "A recursive DNS resolver that walks the hierarchy from the root servers"
)]
struct Args {
    /// Record type to query for each name (A, NS, CNAME, TXT or AAAA).
    #[arg(short = 't', long = "type", default_value = "A")]
    record_type: String,

    /// Log every step of the iterative walk.
    #[arg(long)]
    trace: bool,

    /// Root-hints file: BIND-like lines without timestamps.
    #[arg(long, default_value = "root-servers.conf")]
    hints: PathBuf,

    /// Cache file, created when missing and rewritten on exit.
    #[arg(long, default_value = "resolver-cache.conf")]
    cache: PathBuf,

    /// Send trace logs to this file instead of standard output.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Domain names to resolve.
    #[arg(required = true)]
    names: Vec<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("iterdns: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let rtype = RecordType::parse(&args.record_type)?;

    let hints = absolutize(&args.hints)?;
    let cache = absolutize(&args.cache)?;
    if !cache.exists() {
        fs::write(&cache, "")
            .map_err(|e| e_fmt!("failed to create {}: {}", cache.display(), e))?;
    }

    let mut config = ResolverConfig::new(&hints, &cache)?;
    if let Some(path) = &args.log_file {
        config = config.with_log_file(&absolutize(path)?)?;
    }
    init_logging(args.trace, config.log_file.as_deref())?;

    let mut resolver = Resolver::new(&config)?;
    for name in &args.names {
        println!("; <<>> iterdns <<>> {} {}", name, rtype);
        let response = resolver.resolve(name, rtype);
        println!("{}", response);
    }
    resolver.close()
}

/// Interprets a possibly relative CLI path against the working
/// directory; the resolver itself only accepts absolute paths.
fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir()
        .map_err(|e| e_fmt!("failed to get working directory: {}", e))?;
    Ok(cwd.join(path))
}

fn init_logging(trace: bool, log_file: Option<&Path>) -> Result<()> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(if trace {
        LevelFilter::Trace
    } else {
        LevelFilter::Warn
    });
    match log_file {
        Some(path) => {
            let file = fs::File::create(path)
                .map_err(|e| e_fmt!("failed to open {}: {}", path.display(), e))?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        None => {
            builder.target(env_logger::Target::Stdout);
        }
    }
    let _ = builder.try_init();
    Ok(())
}
