use clap::Parser;
use echometa::{Cli, EchoMeta, EchoMetaError, OutputFormatter, OutputMode, UserFriendlyError};
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::process;

fn init_logger(verbose: u8) {
    if std::env::var("RUST_LOG").is_ok() {
        env_logger::Builder::from_default_env()
            .target(Target::Stderr)
            .init();
        return;
    }

    let crate_level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    Builder::new()
        .target(Target::Stderr)
        .filter_level(LevelFilter::Warn)
        .filter_module("echometa", crate_level)
        .init();
}

fn main() {
    let exit_code = run();
    process::exit(exit_code);
}

fn run() -> i32 {
    let cli = Cli::parse();
    init_logger(cli.verbosity_level());

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let echometa = match EchoMeta::from_cli(&cli) {
        Ok(echometa) => echometa,
        Err(e) => {
            print_startup_error(&e);
            return exit_code_for(&e);
        }
    };

    if cli.dry_run {
        return handle_dry_run(&echometa);
    }

    match echometa.run() {
        Ok(report) => {
            echometa.output_formatter().print_run_report(&report);
            0
        }
        Err(e) => {
            echometa.handle_error(&e);
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(error: &EchoMetaError) -> i32 {
    match error {
        EchoMetaError::InvalidPath { .. } | EchoMetaError::Pattern(_) => 2,
        EchoMetaError::NoInputFiles { .. } => 3,
        EchoMetaError::UnsupportedDialect { .. } | EchoMetaError::Backend { .. } => 4,
        EchoMetaError::NavigationMissing { .. } => 5,
        EchoMetaError::OutputExists { .. } => 6,
        EchoMetaError::Config { .. } => 7,
        _ => 1,
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "echometa.toml".to_string());

    match EchoMeta::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!("  echometa --config {}", config_path);
            println!("\nEdit the [survey] section before the first run.");
            0
        }
        Err(e) => {
            eprintln!(
                "Failed to generate configuration file: {}",
                e.user_message()
            );
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn handle_dry_run(echometa: &EchoMeta) -> i32 {
    let formatter = echometa.output_formatter();
    let config = echometa.config();

    formatter.status("Dry run: no acquisitions will be read and nothing will be written");

    let files = match echometa.plan() {
        Ok(files) => files,
        Err(e) => {
            echometa.handle_error(&e);
            return exit_code_for(&e);
        }
    };

    let csv_path = config.output.csv_path(&config.survey.cruise_label);
    formatter.print_dry_run(&files, &csv_path);

    if csv_path.exists() {
        if config.output.force_overwrite {
            formatter.warning("Force mode enabled - would overwrite the existing table");
        } else {
            formatter.warning("Output table already exists; a real run needs --force");
        }
    }

    0
}

fn print_startup_error(error: &EchoMetaError) {
    let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
    formatter.print_user_friendly_error(error);
}
