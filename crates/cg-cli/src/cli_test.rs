use super::*;
use clap::CommandFactory;

#[test]
fn verify_cli_args() {
    // Validates the entire command tree: short flag conflicts,
    // duplicate args, and other clap definition errors.
    Cli::command().debug_assert();
}

#[test]
fn test_global_overrides_parse_after_subcommand() {
    let cli = Cli::try_parse_from([
        "costguard",
        "estimate",
        "--threshold",
        "2.5",
        "--cost-per-credit",
        "4",
        "-o",
        "json",
    ])
    .unwrap();
    assert_eq!(cli.global.threshold, Some(2.5));
    assert_eq!(cli.global.cost_per_credit, Some(4.0));
    assert_eq!(cli.global.warehouse, ":memory:");
    match cli.command {
        Commands::Estimate(args) => assert_eq!(args.output, OutputFormat::Json),
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_run_takes_trailing_command() {
    let cli = Cli::try_parse_from([
        "costguard", "run", "--yes", "-s", "fct_*", "--", "dbt", "run", "--select", "fct_*",
    ])
    .unwrap();
    match cli.command {
        Commands::Run(args) => {
            assert!(args.yes);
            assert_eq!(args.selection.select.as_deref(), Some("fct_*"));
            assert_eq!(args.command, vec!["dbt", "run", "--select", "fct_*"]);
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_run_requires_a_command() {
    assert!(Cli::try_parse_from(["costguard", "run"]).is_err());
}

#[test]
fn test_config_subcommand_with_policy_path() {
    let cli = Cli::try_parse_from(["costguard", "config", "-c", "policy.yml", "-t", "3"]).unwrap();
    assert!(matches!(cli.command, Commands::Config));
    assert_eq!(cli.global.config.as_deref(), Some("policy.yml"));
    assert_eq!(cli.global.threshold, Some(3.0));
}
