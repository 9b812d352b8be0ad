use super::*;

#[test]
fn parses_plain_run() {
    let cli = Cli::try_parse_from(["brandres", "run"]).expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Commands::Run {
            brand: None,
            retry_failed: false,
            refresh: false
        }
    ));
}

#[test]
fn parses_run_with_brand_filter_and_flags() {
    let cli = Cli::try_parse_from([
        "brandres",
        "run",
        "--brand",
        "luky-dys",
        "--retry-failed",
        "--refresh",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Commands::Run {
            brand: Some(ref b),
            retry_failed: true,
            refresh: true
        } if b == "luky-dys"
    ));
}

#[test]
fn parses_status_and_maintenance_commands() {
    let status = Cli::try_parse_from(["brandres", "status"]).unwrap();
    assert!(matches!(status.command, Commands::Status { brand: None }));

    let reset = Cli::try_parse_from(["brandres", "reset-failed"]).unwrap();
    assert!(matches!(reset.command, Commands::ResetFailed));

    let publish = Cli::try_parse_from(["brandres", "publish"]).unwrap();
    assert!(matches!(publish.command, Commands::Publish));
}

#[test]
fn subcommand_is_required() {
    assert!(Cli::try_parse_from(["brandres"]).is_err());
}
