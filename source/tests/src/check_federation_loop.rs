use platform_health::pb::v1::{DetailLoop, HealthCheckRequest, Status};
use prost::Message;
use tempfile::tempdir;

use crate::common::test_setup::{client, get_free_port, spawn_server, write_config};

#[tokio::test]
async fn test_direct_loop_short_circuits() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("health.yaml");
    write_config(&config_path, "components:\n  a: {type: mock}\n");

    let port = get_free_port();
    let _server = spawn_server(&config_path, port, "S1").await;

    let response = client(port)
        .await
        .check(HealthCheckRequest {
            hops: vec!["S1".to_string()],
            ..HealthCheckRequest::default()
        })
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.status(), Status::LoopDetected);
    assert!(response.components.is_empty());

    let chain = DetailLoop::decode(response.details[0].value.as_slice()).unwrap();
    assert_eq!(chain.server_ids, vec!["S1".to_string(), "S1".to_string()]);
}

#[tokio::test]
async fn test_satellite_splices_remote_tree() {
    let dir = tempdir().unwrap();

    let leaf_port = get_free_port();
    let leaf_config = dir.path().join("leaf.yaml");
    write_config(
        &leaf_config,
        "components:\n  disk: {type: mock, status: HEALTHY}\n",
    );
    let _leaf = spawn_server(&leaf_config, leaf_port, "leaf").await;

    let hub_port = get_free_port();
    let hub_config = dir.path().join("hub.yaml");
    write_config(
        &hub_config,
        &format!("components:\n  remote:\n    type: satellite\n    address: 127.0.0.1:{leaf_port}\n"),
    );
    let _hub = spawn_server(&hub_config, hub_port, "hub").await;

    let response = client(hub_port)
        .await
        .check(HealthCheckRequest::default())
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.status(), Status::Healthy);

    let remote = &response.components[0];
    assert_eq!(remote.name, "remote");
    assert_eq!(remote.status(), Status::Healthy);
    assert_eq!(remote.components[0].name, "disk");
}

#[tokio::test]
async fn test_mutual_federation_is_broken_by_hops() {
    let dir = tempdir().unwrap();

    let port_a = get_free_port();
    let port_b = get_free_port();

    let config_a = dir.path().join("a.yaml");
    write_config(
        &config_a,
        &format!("components:\n  to-b:\n    type: satellite\n    address: 127.0.0.1:{port_b}\n"),
    );

    let config_b = dir.path().join("b.yaml");
    write_config(
        &config_b,
        &format!("components:\n  to-a:\n    type: satellite\n    address: 127.0.0.1:{port_a}\n"),
    );

    // B comes up first; its probe of A fails until A is up, which is fine.
    let _server_b = spawn_server(&config_b, port_b, "B").await;
    let _server_a = spawn_server(&config_a, port_a, "A").await;

    let response = client(port_a)
        .await
        .check(HealthCheckRequest::default())
        .await
        .unwrap()
        .into_inner();

    // A -> B -> back to A, which sees itself in hops.
    assert_eq!(response.status(), Status::LoopDetected);

    let to_b = &response.components[0];
    assert_eq!(to_b.name, "to-b");
    assert_eq!(to_b.status(), Status::LoopDetected);

    let to_a = &to_b.components[0];
    assert_eq!(to_a.name, "to-a");
    assert_eq!(to_a.status(), Status::LoopDetected);

    let chain = DetailLoop::decode(to_a.details[0].value.as_slice()).unwrap();
    assert_eq!(
        chain.server_ids,
        vec!["A".to_string(), "B".to_string(), "A".to_string()]
    );
}
