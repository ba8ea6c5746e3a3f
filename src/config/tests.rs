use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_match_service_tunables() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.cache.local_capacity.get(), 100);
    assert_eq!(settings.cache.ttl_secs.get(), 300);
    assert_eq!(settings.service.deletion_queue_capacity.get(), 100);
    assert_eq!(settings.service.admission_ceiling.get(), 200);
    assert_eq!(settings.service.admission_poll_interval_ms.get(), 2_000);
    assert_eq!(settings.service.cache_read_timeout_ms.get(), 1_000);
    assert!(settings.redis.url.is_none());
    assert!(settings.database.url.is_none());
}

#[test]
fn zero_timeout_is_rejected() {
    let mut raw = RawSettings::default();
    raw.service.timeout_ms = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero timeout must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "service.timeout_ms",
            ..
        }
    ));
}

#[test]
fn zero_cache_capacity_is_rejected() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        cache_local_capacity: Some(0),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let err = Settings::from_raw(raw).expect_err("zero capacity must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.local_capacity",
            ..
        }
    ));
}

#[test]
fn blank_redis_url_disables_remote_tier() {
    let mut raw = RawSettings::default();
    raw.redis.url = Some("redis://cache:6379".to_string());
    let overrides = ServeOverrides {
        redis_url: Some("   ".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.redis.url.is_none());
}

#[test]
fn blank_tokens_are_dropped() {
    let mut raw = RawSettings::default();
    raw.auth.user_tokens = vec!["alpha".to_string(), " ".to_string()];
    raw.auth.admin_tokens = vec![" root ".to_string()];

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.auth.user_tokens, vec!["alpha".to_string()]);
    assert_eq!(settings.auth.admin_tokens, vec!["root".to_string()]);
}

#[test]
fn auth_debug_hides_tokens() {
    let auth = AuthSettings {
        user_tokens: vec!["secret-user".to_string()],
        admin_tokens: vec!["secret-admin".to_string()],
    };
    let rendered = format!("{auth:?}");
    assert!(!rendered.contains("secret"));
}

#[test]
fn invalid_log_level_is_reported() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("loud".to_string());

    let err = Settings::from_raw(raw).expect_err("unknown level must fail");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "logging.level",
            ..
        }
    ));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["bannerflow"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_arguments() {
    let args = CliArgs::parse_from([
        "bannerflow",
        "serve",
        "--database-url",
        "postgres://example",
        "--redis-url",
        "redis://example",
        "--service-admission-ceiling",
        "50",
        "--log-json",
        "yes",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            let overrides = &serve.overrides;
            assert_eq!(
                overrides.database.database_url.as_deref(),
                Some("postgres://example")
            );
            assert_eq!(overrides.redis_url.as_deref(), Some("redis://example"));
            assert_eq!(overrides.service_admission_ceiling, Some(50));
            assert_eq!(overrides.log_json, Some(true));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_migrate_arguments() {
    let args = CliArgs::parse_from([
        "bannerflow",
        "migrate",
        "--database-url",
        "postgres://example",
    ]);

    let mut raw = RawSettings::default();
    match args.command.expect("migrate command") {
        Command::Migrate(migrate) => raw.apply_database_override(&migrate.database),
        _ => panic!("wrong command parsed"),
    }
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.database.url.as_deref(), Some("postgres://example"));
}
