use super::*;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

#[test]
fn cli_parse_no_flags() {
    let cli = parse(&["rangefetch"]);
    assert!(cli.config.is_none());
    assert!(cli.listen.is_none());
    assert!(cli.threads.is_none());
    assert!(cli.speed_limit.is_none());
}

#[test]
fn cli_parse_all_flags() {
    let cli = parse(&[
        "rangefetch",
        "--config",
        "/tmp/rf.toml",
        "--listen",
        "0.0.0.0:9000",
        "--threads",
        "4",
        "--speed-limit",
        "100000",
    ]);
    assert_eq!(cli.config, Some(PathBuf::from("/tmp/rf.toml")));
    assert_eq!(cli.listen.as_deref(), Some("0.0.0.0:9000"));
    assert_eq!(cli.threads, Some(4));
    assert_eq!(cli.speed_limit, Some(100_000));
}

#[test]
fn cli_rejects_zero_threads() {
    assert!(Cli::try_parse_from(["rangefetch", "--threads", "0"]).is_err());
}

#[test]
fn overrides_replace_config_values() {
    let mut cfg = ServerConfig {
        max_threads: 2,
        speed_limit: 500,
        ..ServerConfig::default()
    };
    parse(&["rangefetch", "--threads", "8", "--listen", "127.0.0.1:0"]).apply_overrides(&mut cfg);
    assert_eq!(cfg.max_threads, 8);
    assert_eq!(cfg.listen_addr, "127.0.0.1:0");
    assert_eq!(cfg.speed_limit, 500, "unset flags keep config values");
}
