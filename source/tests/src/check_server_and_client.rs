use platform_health::pb::v1::{HealthCheckRequest, Status};
use tempfile::tempdir;

use crate::common::test_setup::{client, get_free_port, spawn_server, write_config};

const CONFIG: &str = r#"
components:
  a:
    type: mock
    status: HEALTHY
  b:
    type: mock
    status: UNHEALTHY
    message: flat tire
  sys:
    type: system
    components:
      inner:
        type: mock
        status: HEALTHY
"#;

#[tokio::test]
async fn test_full_tree_over_the_wire() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("health.yaml");
    write_config(&config_path, CONFIG);

    let port = get_free_port();
    let _server = spawn_server(&config_path, port, "s1").await;

    let response = client(port)
        .await
        .check(HealthCheckRequest::default())
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.status(), Status::Unhealthy);
    assert_eq!(response.server_id, "s1");

    let names: Vec<&str> = response
        .components
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["a", "b", "sys"]);

    assert_eq!(response.components[1].messages, vec!["flat tire".to_string()]);
    assert_eq!(response.components[2].components[0].name, "inner");
    assert!(response.duration.is_some());
}

#[tokio::test]
async fn test_component_path_filter_over_the_wire() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("health.yaml");
    write_config(&config_path, CONFIG);

    let port = get_free_port();
    let _server = spawn_server(&config_path, port, "s1").await;

    let response = client(port)
        .await
        .check(HealthCheckRequest {
            components: vec!["a".to_string()],
            ..HealthCheckRequest::default()
        })
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.status(), Status::Healthy);
    assert_eq!(response.components.len(), 1);
    assert_eq!(response.components[0].name, "a");
}

#[tokio::test]
async fn test_invalid_path_over_the_wire() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("health.yaml");
    write_config(&config_path, CONFIG);

    let port = get_free_port();
    let _server = spawn_server(&config_path, port, "s1").await;

    let response = client(port)
        .await
        .check(HealthCheckRequest {
            components: vec!["nope".to_string()],
            ..HealthCheckRequest::default()
        })
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.status(), Status::Unhealthy);
    assert!(response.components.is_empty());
    assert_eq!(
        response.messages,
        vec!["invalid components: nope".to_string()]
    );
}

#[tokio::test]
async fn test_standard_grpc_health_service_is_serving() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("health.yaml");
    write_config(&config_path, "components:\n  a: {type: mock}\n");

    let port = get_free_port();
    let _server = spawn_server(&config_path, port, "s1").await;

    let channel = tonic::transport::Endpoint::try_from(format!("http://127.0.0.1:{port}"))
        .unwrap()
        .connect()
        .await
        .unwrap();
    let mut health = tonic_health::pb::health_client::HealthClient::new(channel);

    let response = health
        .check(tonic_health::pb::HealthCheckRequest {
            service: String::new(),
        })
        .await
        .unwrap()
        .into_inner();

    assert_eq!(
        response.status,
        tonic_health::pb::health_check_response::ServingStatus::Serving as i32
    );
}
