//! Status roll-up.

use crate::pb::v1::Status;

/// Combine child statuses into the parent's:
/// any LOOP_DETECTED wins, then any UNHEALTHY, then UNKNOWN when nothing is
/// HEALTHY, otherwise HEALTHY. An empty set is HEALTHY.
pub fn rollup(children: impl IntoIterator<Item = Status>) -> Status {
    let mut any_unknown = false;
    let mut any_healthy = false;
    let mut any_unhealthy = false;

    for status in children {
        match status {
            Status::LoopDetected => return Status::LoopDetected,
            Status::Unhealthy => any_unhealthy = true,
            Status::Unknown => any_unknown = true,
            Status::Healthy => any_healthy = true,
        }
    }

    if any_unhealthy {
        Status::Unhealthy
    } else if any_unknown && !any_healthy {
        Status::Unknown
    } else {
        Status::Healthy
    }
}

/// The more severe of two statuses, for folding a probe's own result into a
/// roll-up over synthesized children.
pub fn worse(a: Status, b: Status) -> Status {
    if severity(a) >= severity(b) {
        a
    } else {
        b
    }
}

fn severity(status: Status) -> u8 {
    match status {
        Status::Healthy => 0,
        Status::Unknown => 1,
        Status::Unhealthy => 2,
        Status::LoopDetected => 3,
    }
}
