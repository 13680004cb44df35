use anyhow::Result;
use std::path::PathBuf;

use pagelens::{logging, Config, Library};

struct Args {
    config_path: Option<PathBuf>,
    per_month: bool,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        config_path: None,
        per_month: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("pagelens {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--per-month" | "-m" => parsed.per_month = true,
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!(
        r#"pagelens - inspect a photo library

USAGE:
    pagelens [OPTIONS]

OPTIONS:
    --config, -c PATH   Path to config file
    --per-month, -m     Print visible photos per month
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PAGELENS_CONFIG     Path to config file (overrides default location)
    PAGELENS_LOG        Log filter (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/pagelens/config.toml"#
    );
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn main() -> Result<()> {
    let args = parse_args();

    if let Err(e) = logging::init(Some(Config::config_dir().join("logs"))) {
        eprintln!("warning: logging disabled: {:#}", e);
    }

    let config = match args.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    let library = Library::open(&config)?;
    let view = library.new_view()?;

    println!("database: {}", config.db_path.display());
    println!("photos:   {} visible, {} total", view.count()?, library.photos().total_photos()?);

    if args.per_month {
        println!();
        println!("year  {}", MONTHS.map(|m| format!("{:>5}", m)).join(""));
        for (year, counts) in view.photos_per_month()? {
            let row: String = counts.iter().map(|c| format!("{:>5}", c)).collect();
            println!("{}  {}", year, row);
        }
    }

    Ok(())
}
