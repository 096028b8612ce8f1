use std::time::Duration;

use platform_health::pb::v1::{HealthCheckRequest, Status};
use tempfile::tempdir;
use tokio::time::timeout;

use crate::common::test_setup::{client, get_free_port, spawn_server, write_config};

const STAGE_1: &str = r#"
components:
  a:
    type: mock
    status: HEALTHY
"#;

const STAGE_2: &str = r#"
components:
  a:
    type: mock
    status: HEALTHY
  b:
    type: mock
    status: UNHEALTHY
    message: fresh from the reload
"#;

const STAGE_BROKEN: &str = ": this is not [ yaml\n";

async fn component_names(port: u16) -> Vec<String> {
    let response = client(port)
        .await
        .check(HealthCheckRequest::default())
        .await
        .unwrap()
        .into_inner();
    response.components.iter().map(|c| c.name.clone()).collect()
}

async fn wait_for_components(port: u16, expected: &[&str]) {
    let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    let poll = async {
        loop {
            if component_names(port).await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };

    if timeout(Duration::from_secs(5), poll).await.is_err() {
        panic!(
            "component set never became {:?}; currently {:?}",
            expected,
            component_names(port).await
        );
    }
}

#[tokio::test]
async fn test_file_change_swaps_tree_atomically() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("health.yaml");
    write_config(&config_path, STAGE_1);

    let port = get_free_port();
    let _server = spawn_server(&config_path, port, "s1").await;

    assert_eq!(component_names(port).await, vec!["a".to_string()]);

    write_config(&config_path, STAGE_2);
    wait_for_components(port, &["a", "b"]).await;

    let response = client(port)
        .await
        .check(HealthCheckRequest::default())
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.status(), Status::Unhealthy);
    assert_eq!(
        response.components[1].messages,
        vec!["fresh from the reload".to_string()]
    );
}

#[tokio::test]
async fn test_broken_reload_keeps_previous_tree() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("health.yaml");
    write_config(&config_path, STAGE_2);

    let port = get_free_port();
    let _server = spawn_server(&config_path, port, "s1").await;
    assert_eq!(
        component_names(port).await,
        vec!["a".to_string(), "b".to_string()]
    );

    // An unparseable file must not take the tree down.
    write_config(&config_path, STAGE_BROKEN);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
        component_names(port).await,
        vec!["a".to_string(), "b".to_string()]
    );

    // And a subsequent good write is picked up.
    write_config(&config_path, STAGE_1);
    wait_for_components(port, &["a"]).await;
}
