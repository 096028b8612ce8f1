use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use platform_health::app_context::{AppContext, ServerOptions};
use platform_health::pb::v1::health_client::HealthClient;
use platform_health::pb::v1::HealthCheckRequest;
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub fn get_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub fn write_config(path: &Path, body: &str) {
    std::fs::write(path, body).expect("failed to write test config");
}

/// Bootstrap and spawn a server, then block until it answers a `Check`.
pub async fn spawn_server(config: &Path, port: u16, server_id: &str) -> JoinHandle<()> {
    let options = ServerOptions {
        config: config.to_path_buf(),
        listen: format!("127.0.0.1:{port}").parse().unwrap(),
        server_id: Some(server_id.to_string()),
        strict: false,
        parallelism: None,
        watch: true,
    };

    let ctx = AppContext::bootstrap(options).expect("server bootstrap failed");
    let handle = tokio::spawn(async move {
        if let Err(e) = ctx.run().await {
            panic!("server exited: {e}");
        }
    });

    wait_until_serving(port).await;
    handle
}

pub async fn wait_until_serving(port: u16) {
    let ready = async {
        loop {
            if let Ok(mut client) = connect(port).await {
                if client.check(HealthCheckRequest::default()).await.is_ok() {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };

    if timeout(Duration::from_secs(5), ready).await.is_err() {
        panic!("server on port {port} did not come up in time");
    }
}

pub async fn connect(
    port: u16,
) -> Result<HealthClient<tonic::transport::Channel>, tonic::transport::Error> {
    HealthClient::connect(format!("http://127.0.0.1:{port}")).await
}

pub async fn client(port: u16) -> HealthClient<tonic::transport::Channel> {
    connect(port).await.expect("failed to connect")
}
