// tests/packaging_tests.rs
const DOCKERFILE: &str = include_str!("../Dockerfile");

#[test]
fn image_runs_unprivileged_with_healthcheck() {
    assert!(DOCKERFILE.contains("USER appuser"));
    assert!(DOCKERFILE.contains("EXPOSE 8000"));
    assert!(DOCKERFILE
        .lines()
        .any(|l| l.contains("\"temperature-collector\", \"healthcheck\"")));
}

#[test]
fn image_leaves_log_filter_to_config() {
    // RUST_LOG would override `logging.level` from the shipped config.yaml.
    assert!(
        !DOCKERFILE.lines().any(|l| l.trim_start().starts_with("ENV RUST_LOG")),
        "Dockerfile must not pin RUST_LOG"
    );
}
