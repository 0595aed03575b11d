//! Integration tests for CLI argument handling
//!
//! Tests flag validation and help output of the fuelcache binary.

use std::process::Command;

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_fuelcache"))
        .args(args)
        .env_remove("PORT")
        .output()
        .expect("Failed to execute fuelcache")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(
        output.status.success(),
        "Expected --help to exit successfully"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("fuelcache"), "Help should mention fuelcache");
    assert!(stdout.contains("--candidates"), "Help should mention --candidates");
    assert!(stdout.contains("--cache-dir"), "Help should mention --cache-dir");
}

#[test]
fn test_invalid_candidates_prints_error_and_exits() {
    let output = run_cli(&["--candidates", "fuzzy"]);
    assert!(!output.status.success(), "Expected invalid strategy to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Invalid candidate strategy"),
        "Should print error message about the strategy: {}",
        stderr
    );
}

#[test]
fn test_invalid_upstream_url_prints_error_and_exits() {
    let output = run_cli(&["--upstream-url", "not a url"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid upstream URL"), "{}", stderr);
}

#[test]
fn test_non_numeric_port_is_rejected_by_parser() {
    let output = run_cli(&["--port", "eighty"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--port"), "{}", stderr);
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use clap::Parser;
    use fuelcache::cli::{parse_candidates_arg, Cli, ProxyConfig};
    use fuelcache::data::CandidateStrategy;

    #[test]
    fn test_parse_candidates_arg_exact() {
        assert_eq!(parse_candidates_arg("exact").unwrap(), CandidateStrategy::Exact);
    }

    #[test]
    fn test_parse_candidates_arg_invalid_returns_error() {
        assert!(parse_candidates_arg("invalid").is_err());
    }

    #[test]
    fn test_proxy_config_from_cli_with_cache_dir() {
        let cli = Cli::parse_from(["fuelcache", "--cache-dir", "/var/cache/fuel", "--port", "9000"]);
        let config = ProxyConfig::from_cli(&cli).unwrap();
        assert_eq!(config.cache_dir, std::path::PathBuf::from("/var/cache/fuel"));
        assert_eq!(config.bind_addr.port(), 9000);
    }

    #[test]
    fn test_proxy_config_from_cli_zero_prune_interval_disables_pruning() {
        let cli = Cli::parse_from(["fuelcache", "--prune-interval-mins", "0"]);
        let config = ProxyConfig::from_cli(&cli).unwrap();
        assert!(!config.prune.enabled);
    }
}
