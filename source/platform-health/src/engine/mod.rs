//! The check engine: concurrent traversal of the component tree.
//!
//! Every leaf probe takes a permit from the request's global semaphore, so
//! parallelism is bounded no matter how deep containers nest. Child order in
//! the response always mirrors declared order; only completion order is
//! concurrent. Probe failures are statuses, never errors.

pub mod context;
pub mod filter;
pub mod rollup;

use std::time::Instant;

use async_recursion::async_recursion;
use futures_util::future::join_all;

use crate::pb::v1::{HealthCheckResponse, Status};
use crate::provider::{Instance, Probe};
use context::CheckContext;
use rollup::{rollup, worse};

/// Check a list of instances concurrently, in declared order, honoring the
/// context's component filter.
pub async fn check_instances(
    ctx: &CheckContext,
    instances: &[Instance],
) -> Vec<HealthCheckResponse> {
    let futures: Vec<_> = instances
        .iter()
        .filter_map(|instance| {
            let child_ctx = ctx.descend(&instance.name)?;
            Some(check_instance(child_ctx, instance))
        })
        .collect();

    join_all(futures).await
}

#[async_recursion]
pub async fn check_instance(ctx: CheckContext, instance: &Instance) -> HealthCheckResponse {
    let started = Instant::now();

    let mut response = HealthCheckResponse {
        name: instance.name.clone(),
        r#type: instance.kind.clone(),
        ..HealthCheckResponse::default()
    };

    if let Some(container) = instance.provider.as_container() {
        let traversal = check_instances(&ctx, container.children());
        let children = match instance.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, traversal).await {
                Ok(children) => children,
                Err(_) => {
                    response.set_status(Status::Unhealthy);
                    response.messages.push(format!(
                        "timed out after {}",
                        humantime::format_duration(timeout)
                    ));
                    response.duration = Some(to_proto_duration(started.elapsed()));
                    if ctx.fail_fast {
                        ctx.cancel.cancel();
                    }
                    return response;
                }
            },
            None => traversal.await,
        };
        let mut status = rollup(children.iter().map(|c| c.status()));

        if !instance.checks.is_empty() {
            let mut bindings = serde_json::Map::new();
            bindings.insert("components".to_string(), children_summary(&children));
            let failures = instance.checks.evaluate_aggregate(&bindings);
            if !failures.is_empty() {
                status = worse(status, Status::Unhealthy);
                response.messages.extend(failures);
            }
        }

        if container.summarize() {
            for child in &children {
                if child.status() != Status::Healthy {
                    let reason = child
                        .messages
                        .first()
                        .cloned()
                        .unwrap_or_else(|| child.status().as_str_name().to_string());
                    response.messages.push(format!("{}: {reason}", child.name));
                }
            }
        } else {
            response.components = children;
        }

        response.set_status(status);
    } else {
        let probe = run_probe(&ctx, instance).await;
        finish_leaf(instance, probe, &mut response);
    }

    if ctx.fail_fast && response.status() == Status::Unhealthy {
        ctx.cancel.cancel();
    }

    response.duration = Some(to_proto_duration(started.elapsed()));
    response
}

/// Gate a single probe behind the semaphore, the instance deadline, and the
/// request's cancellation token.
async fn run_probe(ctx: &CheckContext, instance: &Instance) -> Probe {
    let permit = tokio::select! {
        _ = ctx.cancel.cancelled() => return Probe::unknown("check cancelled"),
        permit = ctx.limiter.clone().acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return Probe::unknown("probe limiter closed"),
        },
    };

    let guarded = async {
        tokio::select! {
            _ = ctx.cancel.cancelled() => Probe::unknown("check cancelled"),
            probe = instance.provider.probe(ctx) => probe,
        }
    };

    let probe = match instance.timeout {
        Some(timeout) => match tokio::time::timeout(timeout, guarded).await {
            Ok(probe) => probe,
            Err(_) => Probe::unhealthy(format!(
                "timed out after {}",
                humantime::format_duration(timeout)
            )),
        },
        None => guarded.await,
    };

    drop(permit);
    probe
}

fn finish_leaf(instance: &Instance, probe: Probe, response: &mut HealthCheckResponse) {
    let Probe {
        status,
        messages,
        details,
        mut bindings,
        items,
        children,
    } = probe;

    response.messages.extend(messages);
    response.details = details;

    let mut children = children;
    if instance.checks.has_each() {
        for (index, item) in items.iter().enumerate() {
            let failures = instance.checks.evaluate_each(&item.value);
            let mut child = HealthCheckResponse {
                name: if item.name.is_empty() {
                    index.to_string()
                } else {
                    item.name.clone()
                },
                r#type: instance.kind.clone(),
                ..HealthCheckResponse::default()
            };
            child.set_status(if failures.is_empty() {
                Status::Healthy
            } else {
                Status::Unhealthy
            });
            child.messages = failures;
            children.push(child);
        }
    }

    let mut status = status;
    if !children.is_empty() {
        status = worse(status, rollup(children.iter().map(|c| c.status())));
    }

    if !instance.checks.is_empty() {
        if !items.is_empty() {
            bindings.insert(
                "items".to_string(),
                serde_json::Value::Array(items.iter().map(|i| i.value.clone()).collect()),
            );
        }
        let failures = instance.checks.evaluate_aggregate(&bindings);
        if !failures.is_empty() {
            status = worse(status, Status::Unhealthy);
            response.messages.extend(failures);
        }
    }

    response.components = children;
    response.set_status(status);
}

fn children_summary(children: &[HealthCheckResponse]) -> serde_json::Value {
    serde_json::Value::Array(
        children
            .iter()
            .map(|c| {
                serde_json::json!({
                    "name": c.name,
                    "status": c.status().as_str_name(),
                    "healthy": c.status() == Status::Healthy,
                })
            })
            .collect(),
    )
}

fn to_proto_duration(elapsed: std::time::Duration) -> prost_types::Duration {
    prost_types::Duration {
        seconds: elapsed.as_secs() as i64,
        nanos: elapsed.subsec_nanos() as i32,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use platform_health_config::raw::{CheckMode, RawCheck};
    use serde_json::json;

    use super::*;
    use crate::checks::CheckSet;
    use crate::engine::filter::ComponentFilter;
    use crate::pb::v1::Status;
    use crate::provider::mock::MockProvider;
    use crate::provider::system::SystemProvider;
    use crate::provider::Provider;

    fn instance(name: &str, provider: impl Provider) -> Instance {
        Instance {
            name: name.to_string(),
            kind: "mock".to_string(),
            timeout: None,
            checks: CheckSet::empty(),
            provider: Box::new(provider),
        }
    }

    fn ctx(parallelism: usize) -> CheckContext {
        CheckContext::new("test-server", parallelism)
    }

    #[tokio::test]
    async fn test_minimal_healthy() {
        let instances = vec![instance("a", MockProvider::fixed(Status::Healthy))];

        let responses = check_instances(&ctx(4), &instances).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].name, "a");
        assert_eq!(responses[0].status(), Status::Healthy);
        assert_eq!(rollup(responses.iter().map(|r| r.status())), Status::Healthy);
    }

    #[tokio::test]
    async fn test_rollup_keeps_declared_order() {
        let instances = vec![
            instance("ok", MockProvider::fixed(Status::Healthy)),
            instance(
                "broken",
                MockProvider::fixed(Status::Unhealthy).with_message("it broke"),
            ),
        ];

        let responses = check_instances(&ctx(4), &instances).await;
        let names: Vec<&str> = responses.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["ok", "broken"]);
        assert_eq!(
            rollup(responses.iter().map(|r| r.status())),
            Status::Unhealthy
        );
        assert_eq!(responses[1].messages, vec!["it broke".to_string()]);
    }

    #[tokio::test]
    async fn test_component_filter_prunes_siblings() {
        let instances = vec![
            instance("a", MockProvider::fixed(Status::Healthy)),
            instance("b", MockProvider::fixed(Status::Healthy)),
            instance("c", MockProvider::fixed(Status::Healthy)),
        ];

        let mut ctx = ctx(4);
        ctx.filter =
            ComponentFilter::from_paths(&["b".to_string()], &instances).expect("valid path");

        let responses = check_instances(&ctx, &instances).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].name, "b");
    }

    #[tokio::test]
    async fn test_nested_container_rollup() {
        let inner = vec![
            instance("good", MockProvider::fixed(Status::Healthy)),
            instance("bad", MockProvider::fixed(Status::Unhealthy)),
        ];
        let instances = vec![Instance {
            name: "sys".to_string(),
            kind: "system".to_string(),
            timeout: None,
            checks: CheckSet::empty(),
            provider: Box::new(SystemProvider::new(inner, false)),
        }];

        let responses = check_instances(&ctx(4), &instances).await;
        assert_eq!(responses[0].status(), Status::Unhealthy);
        assert_eq!(responses[0].components.len(), 2);
        assert_eq!(responses[0].components[0].name, "good");
    }

    #[tokio::test]
    async fn test_summarize_flattens_failures() {
        let inner = vec![
            instance("fine", MockProvider::fixed(Status::Healthy)),
            instance(
                "sad",
                MockProvider::fixed(Status::Unhealthy).with_message("no disk"),
            ),
        ];
        let instances = vec![Instance {
            name: "noisy".to_string(),
            kind: "system".to_string(),
            timeout: None,
            checks: CheckSet::empty(),
            provider: Box::new(SystemProvider::new(inner, true)),
        }];

        let responses = check_instances(&ctx(4), &instances).await;
        assert_eq!(responses[0].status(), Status::Unhealthy);
        assert!(responses[0].components.is_empty());
        assert_eq!(responses[0].messages, vec!["sad: no disk".to_string()]);
    }

    #[tokio::test]
    async fn test_each_mode_synthesizes_item_children() {
        let items = vec![
            json!({"name": "r1", "ready": true}),
            json!({"name": "r2", "ready": false}),
            json!({"name": "r3", "ready": true}),
        ];
        let checks = CheckSet::compile(&[RawCheck {
            check: "resource.ready".to_string(),
            message: None,
            mode: CheckMode::Each,
        }])
        .unwrap();

        let instances = vec![Instance {
            name: "resources".to_string(),
            kind: "mock".to_string(),
            timeout: None,
            checks,
            provider: Box::new(MockProvider::fixed(Status::Healthy).with_items(items)),
        }];

        let responses = check_instances(&ctx(4), &instances).await;
        let node = &responses[0];

        assert_eq!(node.status(), Status::Unhealthy);
        assert_eq!(node.components.len(), 3);
        assert_eq!(node.components[0].status(), Status::Healthy);
        assert_eq!(node.components[1].name, "r2");
        assert_eq!(node.components[1].status(), Status::Unhealthy);
        assert_eq!(node.components[2].status(), Status::Healthy);
    }

    #[tokio::test]
    async fn test_aggregate_check_demotes_leaf() {
        let checks = CheckSet::compile(&[RawCheck {
            check: "status == \"UNHEALTHY\"".to_string(),
            message: Some("expected the mock to be broken".to_string()),
            mode: CheckMode::Aggregate,
        }])
        .unwrap();

        let instances = vec![Instance {
            name: "picky".to_string(),
            kind: "mock".to_string(),
            timeout: None,
            checks,
            provider: Box::new(MockProvider::fixed(Status::Healthy)),
        }];

        let responses = check_instances(&ctx(4), &instances).await;
        assert_eq!(responses[0].status(), Status::Unhealthy);
        assert_eq!(
            responses[0].messages,
            vec!["expected the mock to be broken".to_string()]
        );
    }

    #[tokio::test]
    async fn test_timeout_turns_unhealthy() {
        let instances = vec![Instance {
            name: "slow".to_string(),
            kind: "mock".to_string(),
            timeout: Some(Duration::from_millis(30)),
            checks: CheckSet::empty(),
            provider: Box::new(
                MockProvider::fixed(Status::Healthy).with_delay(Duration::from_secs(30)),
            ),
        }];

        let responses = check_instances(&ctx(4), &instances).await;
        assert_eq!(responses[0].status(), Status::Unhealthy);
        assert!(responses[0].messages[0].starts_with("timed out after"));
    }

    struct CountingProvider {
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Provider for CountingProvider {
        async fn probe(&self, _ctx: &CheckContext) -> Probe {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Probe::healthy()
        }
    }

    #[tokio::test]
    async fn test_parallelism_bound_is_respected() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let instances: Vec<Instance> = (0..8)
            .map(|i| {
                instance(
                    &format!("c{i}"),
                    CountingProvider {
                        active: active.clone(),
                        peak: peak.clone(),
                    },
                )
            })
            .collect();

        let responses = check_instances(&ctx(2), &instances).await;
        assert_eq!(responses.len(), 8);
        assert!(
            peak.load(Ordering::SeqCst) <= 2,
            "in-flight probes exceeded the bound: {}",
            peak.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn test_fail_fast_cancels_pending_probes() {
        let mut ctx = ctx(4);
        ctx.fail_fast = true;

        let instances = vec![
            instance("broken", MockProvider::fixed(Status::Unhealthy)),
            instance(
                "slow",
                MockProvider::fixed(Status::Healthy).with_delay(Duration::from_secs(30)),
            ),
        ];

        let started = Instant::now();
        let responses = check_instances(&ctx, &instances).await;
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "fail-fast must not wait for the slow probe"
        );

        assert_eq!(responses[0].status(), Status::Unhealthy);
        assert_eq!(responses[1].status(), Status::Unknown);
        assert_eq!(responses[1].messages, vec!["check cancelled".to_string()]);
    }
}
