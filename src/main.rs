use clap::{Arg, Command};
use log::LevelFilter;
use phishscan::config::{default_config_yaml, ScanConfig};
use phishscan::engine::{ScanEngine, ScanReport};
use phishscan::report;
use std::path::Path;
use std::process;

fn main() {
    let matches = Command::new("phishscan")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Heuristic email phishing detection with supervised and anomaly scoring")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/phishscan.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Validate the configuration and load every configured model")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("scan")
                .long("scan")
                .value_name("FILE")
                .help("Scan an email file and print per-model verdicts")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Emit the scan report as JSON instead of text")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("metrics")
                .long("metrics")
                .help("Render the stored offline evaluation report")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches.get_one::<String>("config").unwrap();
    let config = match ScanConfig::load_from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        test_config(&config);
        return;
    }

    if matches.get_flag("metrics") {
        print_metrics(&config);
        return;
    }

    if let Some(email_path) = matches.get_one::<String>("scan") {
        scan_email(&config, email_path, matches.get_flag("json"));
        return;
    }

    eprintln!("Nothing to do: pass --scan, --metrics, --test-config or --generate-config");
    process::exit(2);
}

fn generate_default_config(path: &str) {
    match std::fs::write(path, default_config_yaml()) {
        Ok(()) => println!("Default configuration written to {path}"),
        Err(e) => {
            eprintln!("Error writing configuration to {path}: {e}");
            process::exit(1);
        }
    }
}

fn test_config(config: &ScanConfig) {
    match ScanEngine::new(config) {
        Ok(_) => println!("Configuration valid, all configured models loaded"),
        Err(e) => {
            eprintln!("Configuration test failed: {e:#}");
            process::exit(1);
        }
    }
}

fn print_metrics(config: &ScanConfig) {
    match report::read_csv(Path::new(&config.metrics_path)) {
        Ok(metrics) => print!("{}", report::render_table(&metrics)),
        Err(e) => {
            eprintln!("Error reading metrics report: {e:#}");
            process::exit(1);
        }
    }
}

fn scan_email(config: &ScanConfig, email_path: &str, as_json: bool) {
    let raw = match std::fs::read(email_path) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Error reading email file {email_path}: {e}");
            process::exit(1);
        }
    };

    let engine = match ScanEngine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error loading models: {e:#}");
            process::exit(1);
        }
    };

    let scan_report = engine.scan(&raw);

    if as_json {
        match serde_json::to_string_pretty(&scan_report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing report: {e}");
                process::exit(1);
            }
        }
        return;
    }

    print_report(&scan_report);
}

fn print_report(scan_report: &ScanReport) {
    if !scan_report.supervised.is_empty() {
        println!("Supervised classifiers:");
        for entry in &scan_report.supervised {
            println!("  {:<22} {}", entry.model, entry.verdict);
        }
    }
    if !scan_report.anomaly.is_empty() {
        println!("Anomaly detectors:");
        for entry in &scan_report.anomaly {
            println!("  {:<22} {}", entry.model, entry.verdict);
        }
    }

    println!("Extracted metadata:");
    println!("  From:    {}", scan_report.record.sender);
    println!("  To:      {}", scan_report.record.receiver);
    println!("  Subject: {}", scan_report.record.subject);
    println!("  Date:    {}", scan_report.record.date);
    println!("  Body:    {} chars", scan_report.record.body.chars().count());
}
