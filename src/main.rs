//! ssl-trust - default root resolution and peer identity inspection

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::{debug, error};

use ssl_trust::{
    cli::{Cli, Command, IdentityReport, OutputFormat, RootsReport, auth_context_from_pem},
    config::{TrustConfig, install_process_config},
    name_matcher::check_call_host,
    roots::default_root_store,
    setup_tracing,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match TrustConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    debug!(?config, "Configuration loaded");
    if let Err(e) = install_process_config(config) {
        error!(error = %e, "Failed to install configuration");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Command::Roots { pem } => run_roots(pem, cli.format),
        Command::Identity { cert } => run_identity(&cert, cli.format),
        Command::CheckHost {
            cert,
            host,
            target_name,
            override_name,
        } => run_check_host(
            &cert,
            &host,
            target_name.as_deref().unwrap_or(&host),
            &override_name,
            cli.format,
        ),
    }
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to serialize to JSON: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_roots(pem: bool, format: OutputFormat) -> ExitCode {
    let store = match default_root_store() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Default roots unusable: {e}");
            return ExitCode::FAILURE;
        }
    };

    if pem {
        print!("{}", String::from_utf8_lossy(store.pem()));
        return ExitCode::SUCCESS;
    }

    let report = RootsReport::from(store);
    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            if report.anchors == 0 {
                println!("No default root certificates available");
            } else {
                println!(
                    "{} trust anchor(s), {} PEM bytes",
                    report.anchors, report.pem_bytes
                );
            }
            ExitCode::SUCCESS
        }
    }
}

fn run_identity(cert: &std::path::Path, format: OutputFormat) -> ExitCode {
    let ctx = match std::fs::read(cert)
        .map_err(ssl_trust::Error::from)
        .and_then(|pem| auth_context_from_pem(&pem))
    {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{}: {e}", cert.display());
            return ExitCode::FAILURE;
        }
    };

    let report = IdentityReport::from(&*ctx);
    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            match &report.identity_property {
                Some(name) => println!("Identity ({name}):"),
                None => println!("Identity: <unauthenticated>"),
            }
            for value in &report.identity {
                println!("  {value}");
            }
            println!("Properties:");
            for (name, value) in &report.properties {
                let first_line = value.lines().next().unwrap_or_default();
                println!("  {name}: {first_line}");
            }
            ExitCode::SUCCESS
        }
    }
}

#[derive(Serialize)]
struct CheckHostReport<'a> {
    host: &'a str,
    authorized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

fn run_check_host(
    cert: &std::path::Path,
    host: &str,
    target_name: &str,
    override_name: &str,
    format: OutputFormat,
) -> ExitCode {
    let ctx = match std::fs::read(cert)
        .map_err(ssl_trust::Error::from)
        .and_then(|pem| auth_context_from_pem(&pem))
    {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{}: {e}", cert.display());
            return ExitCode::FAILURE;
        }
    };

    let outcome = check_call_host(host, target_name, override_name, &ctx);
    let report = CheckHostReport {
        host,
        authorized: outcome.is_ok(),
        reason: outcome.err().map(|e| e.to_string()),
    };

    let printed = match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            match &report.reason {
                None => println!("{host}: authorized"),
                Some(reason) => println!("{host}: {reason}"),
            }
            ExitCode::SUCCESS
        }
    };
    if report.authorized {
        printed
    } else {
        ExitCode::FAILURE
    }
}
