use std::path::PathBuf;

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn load_fixture(relative: &str) -> String {
    std::fs::read_to_string(fixture_path(relative))
        .unwrap_or_else(|_| panic!("Failed to load fixture: {}", relative))
}

pub fn load_json_fixture(relative: &str) -> serde_json::Value {
    let content = load_fixture(relative);
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse JSON fixture {}: {}", relative, e))
}

/// Configuration file pointing at a mock store, with no request delay
pub fn test_config_toml(endpoint: &str, checkpoint_interval: usize) -> String {
    format!(
        r#"[search]
endpoint = "{endpoint}"
region = "ua"
user_agent = "catalogresolver-tests/0.1"
request_timeout_secs = 5

[rate_limit]
strategy = "fixed_delay"
request_delay_ms = 0

[run]
checkpoint_interval = {checkpoint_interval}
concurrency = 1

[paths]
input = "GameList.txt"
output_dir = "results"
"#
    )
}
