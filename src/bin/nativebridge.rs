use std::path::PathBuf;

use nativebridge::{bridge, logging, Config};

const USAGE: &str = "Usage: nativebridge [OPTIONS]\n\n\
Prints the runtime bridge table as JSON for the code generator.\n\nOptions:\n  \
--compact        Single-line JSON\n  \
--check          Validate the table and print a summary instead\n  \
--config FILE    Load settings from a TOML file (default: discover nativebridge.toml)\n  \
--help           Show this message";

#[derive(Debug, Default)]
struct CliOptions {
    compact: bool,
    check: bool,
    config: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Option<CliOptions>, String> {
    let mut options = CliOptions::default();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--compact" => options.compact = true,
            "--check" => options.check = true,
            "--config" => {
                i += 1;
                let path = args
                    .get(i)
                    .ok_or_else(|| "--config requires an argument".to_string())?;
                options.config = Some(PathBuf::from(path));
            }
            "--help" | "-h" => return Ok(None),
            other => return Err(format!("Unknown option: {}\n\n{}", other, USAGE)),
        }
        i += 1;
    }

    Ok(Some(options))
}

fn run(options: CliOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &options.config {
        Some(path) => Config::from_file(path)?,
        None => Config::discover()?,
    }
    .with_env()?;

    let table = nativebridge::init(&config);

    if options.check {
        // Rebuild to confirm the published table is reproducible
        let rebuilt = bridge::build()?;
        if &rebuilt != table {
            return Err("bridge table differs between builds".into());
        }
        println!(
            "✓ bridge table for {}: {} offsets, {} addresses, {} messages, {} constants",
            table.architecture,
            table.offsets.len(),
            table.addresses.len(),
            table.messages.len(),
            table.constants.len()
        );
    } else if options.compact {
        println!("{}", table.to_json()?);
    } else {
        println!("{}", table.to_json_pretty()?);
    }
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(Some(options)) => options,
        Ok(None) => {
            println!("{}", USAGE);
            return;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    let result = run(options);
    logging::flush();
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
