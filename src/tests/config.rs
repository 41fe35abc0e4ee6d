use crate::config::Config;

fn tmp_base() -> (tempfile::TempDir, String) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let base = tmp.path().to_str().unwrap().to_string();
    (tmp, base)
}

#[test]
fn test_creates_default_config() {
    let (tmp, base) = tmp_base();

    let config = Config::load_with(&base).unwrap();
    assert!(tmp.path().join("config.yaml").exists());

    assert_eq!(config.logo_service_base_url, "https://logo.clearbit.com");
    assert_eq!(config.request_timeout_ms, 4000);
    assert_eq!(config.probe_concurrency, 1);
    assert!(!config.strict_validation);
    assert!(config.cache.enabled);
    assert!(config.policy.block_private_ips);
    assert_eq!(config.listen, "0.0.0.0:3001");

    // loading again reads back the same file
    let again = Config::load_with(&base).unwrap();
    assert_eq!(
        serde_yml::to_string(&config).unwrap(),
        serde_yml::to_string(&again).unwrap()
    );
}

#[test]
fn test_partial_config_is_upgraded() {
    let (tmp, base) = tmp_base();
    let file = tmp.path().join("config.yaml");
    std::fs::write(&file, "strict_validation: true\nprobe_concurrency: 3\n").unwrap();

    let config = Config::load_with(&base).unwrap();
    assert!(config.strict_validation);
    assert_eq!(config.probe_concurrency, 3);
    assert_eq!(config.max_page_bytes, 2 * 1024 * 1024);

    let saved = std::fs::read_to_string(&file).unwrap();
    assert!(saved.contains("logo_service_base_url"));
    assert!(saved.contains("max_page_bytes"));
}

#[test]
fn test_aliases_are_lowercased() {
    let (tmp, base) = tmp_base();
    std::fs::write(
        tmp.path().join("config.yaml"),
        "domain_aliases:\n  TryMesha.com: ' Mesha.AI '\n  empty.com: ''\n",
    )
    .unwrap();

    let config = Config::load_with(&base).unwrap();
    assert_eq!(config.domain_aliases.len(), 1);
    assert_eq!(
        config.domain_aliases.get("trymesha.com").map(String::as_str),
        Some("mesha.ai")
    );
}

#[test]
fn test_invalid_values_are_rejected() {
    for yaml in [
        "request_timeout_ms: 0\n",
        "max_page_bytes: 0\n",
        "logo_service_base_url: ftp://logos.example\n",
        "logo_service_base_url: not a url\n",
        "cache:\n  enabled: true\n  capacity: 0\n",
        "request_timeout_ms: [1, 2]\n",
    ] {
        let (tmp, base) = tmp_base();
        std::fs::write(tmp.path().join("config.yaml"), yaml).unwrap();
        assert!(Config::load_with(&base).is_err(), "{yaml:?} should be rejected");
    }
}

#[test]
fn test_validate_coerces_concurrency() {
    let mut config = Config::default();
    config.probe_concurrency = 0;
    config.validate().unwrap();
    assert_eq!(config.probe_concurrency, 1);

    let mut disabled = Config::default();
    disabled.logo_service_base_url.clear();
    assert!(disabled.validate().is_ok());
}
