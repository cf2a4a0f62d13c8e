use clap::Parser;
use env_logger::Env;
use log::debug;
use srpm_utils::{Error, RpmConfig, SpecEngine, SpecParser, SrpmInfo};
use std::path::PathBuf;
use std::process::exit;

#[derive(Debug, Parser)]
#[command(name = "srpmutil")]
struct Args {
    /// Path to spec file
    #[arg(name = "spec")]
    spec: PathBuf,

    /// Source rpm name echoed into the output
    #[arg(name = "srpm")]
    srpm: String,

    /// Target platform, e.g. x86_64-linux
    #[arg(name = "target")]
    target: Option<String>,

    /// Define a macro, e.g. -D 'dist .el9'
    #[arg(long = "define", short = 'D', value_name = "MACRO")]
    defines: Vec<String>,

    /// Enable a `%bcond` build option
    #[arg(long = "with", value_name = "OPTION")]
    with: Vec<String>,

    /// Disable a `%bcond` build option
    #[arg(long = "without", value_name = "OPTION")]
    without: Vec<String>,

    /// Load additional macro definitions
    #[arg(long = "macros", value_name = "FILE")]
    macro_files: Vec<PathBuf>,

    /// Outputs indented JSON
    #[arg(long = "pretty")]
    pretty: bool,

    /// Log spec evaluation to stderr
    #[arg(long = "debug", short = 'd')]
    debug: bool,
}

fn parse_args() -> Result<Args, Error> {
    Args::try_parse().map_err(|err| {
        if !err.use_stderr() {
            // --help and --version
            err.exit();
        }
        Error::Argument(err.to_string().trim_end().to_owned())
    })
}

fn init_logger(debug: bool) {
    let level = if debug { "debug" } else { "warn" };
    env_logger::init_from_env(Env::default().filter_or("RUST_LOG", level));
}

fn run(args: Args) -> Result<String, Error> {
    let mut config = RpmConfig::read(args.target.as_deref())?;
    for path in &args.macro_files {
        config.load_macro_file(path)?;
    }
    for definition in &args.defines {
        config.define(definition)?;
    }
    for option in &args.with {
        config.define(&format!("_with_{} --with-{}", option, option))?;
    }
    for option in &args.without {
        config.define(&format!("_without_{} --without-{}", option, option))?;
    }
    debug!(
        "target {}-{}, spec {}",
        config.target_cpu(),
        config.target_os(),
        args.spec.display()
    );

    let spec = SpecParser::new(&config).parse_spec(&args.spec)?;
    let info = SrpmInfo::from_spec(&args.srpm, &spec)?;
    debug!("{} binary packages", info.packages.len());

    if args.pretty {
        let mut output = info.to_pretty_json()?;
        output.push('\n');
        Ok(output)
    } else {
        Ok(info.to_string())
    }
}

fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{}", err);
            exit(err.exit_code());
        }
    };
    init_logger(args.debug);

    match run(args) {
        Ok(output) => print!("{}", output),
        Err(err) => {
            if err.is_parse_failure() {
                println!("fail");
            }
            eprintln!("{}", err);
            exit(err.exit_code());
        }
    }
}
