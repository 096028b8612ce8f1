use platform_health::pb::v1::{HealthCheckRequest, Status};
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::test_setup::{client, get_free_port, spawn_server, write_config};

#[tokio::test]
async fn test_http_probes_against_a_live_endpoint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/boom"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let base = mock_server.uri();
    let config = format!(
        r#"
components:
  good:
    type: http
    url: {base}/ok
  picky:
    type: http
    url: {base}/ok
    checks:
      - check: response.status == 201
        message: unexpected HTTP status
  broken:
    type: http
    url: {base}/boom
"#
    );

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("health.yaml");
    write_config(&config_path, &config);

    let port = get_free_port();
    let _server = spawn_server(&config_path, port, "s1").await;

    let response = client(port)
        .await
        .check(HealthCheckRequest::default())
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.status(), Status::Unhealthy);

    let by_name = |name: &str| {
        response
            .components
            .iter()
            .find(|c| c.name == name)
            .unwrap_or_else(|| panic!("missing component '{name}'"))
    };

    assert_eq!(by_name("good").status(), Status::Healthy);

    let picky = by_name("picky");
    assert_eq!(picky.status(), Status::Unhealthy);
    assert_eq!(picky.messages, vec!["unexpected HTTP status".to_string()]);

    let broken = by_name("broken");
    assert_eq!(broken.status(), Status::Unhealthy);
    assert!(broken.messages[0].contains("503"));
}

#[tokio::test]
async fn test_http_timeout_is_unhealthy() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(30)))
        .mount(&mock_server)
        .await;

    let config = format!(
        "components:\n  slow:\n    type: http\n    url: {}/slow\n    timeout: 200ms\n",
        mock_server.uri()
    );

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("health.yaml");
    write_config(&config_path, &config);

    let port = get_free_port();
    let _server = spawn_server(&config_path, port, "s1").await;

    let response = client(port)
        .await
        .check(HealthCheckRequest::default())
        .await
        .unwrap()
        .into_inner();

    let slow = &response.components[0];
    assert_eq!(slow.status(), Status::Unhealthy);
    assert!(slow.messages[0].starts_with("timed out after"));
}
