//! Packing and unpacking of the typed `details` payloads carried on wire
//! responses. Unknown types survive rendering through a base64 fallback.

use base64::Engine;
use prost::Message;
use prost_types::Any;
use serde_json::json;

use crate::pb::v1::{DetailDns, DetailKStatus, DetailLoop, DetailTls};

const TYPE_URL_PREFIX: &str = "type.googleapis.com/platformhealth.v1.";

pub fn pack<M: Message>(type_name: &str, message: &M) -> Any {
    Any {
        type_url: format!("{TYPE_URL_PREFIX}{type_name}"),
        value: message.encode_to_vec(),
    }
}

pub fn pack_loop(server_ids: Vec<String>) -> Any {
    pack("DetailLoop", &DetailLoop { server_ids })
}

pub fn pack_dns(records: Vec<String>) -> Any {
    pack("DetailDns", &DetailDns { records })
}

/// The bare message name of an `Any`, e.g. `DetailLoop`.
pub fn type_name(any: &Any) -> &str {
    any.type_url.rsplit('/').next().unwrap_or(&any.type_url)
}

/// Decode a detail into renderable JSON. Recognized types become structured
/// records; anything else round-trips as base64 so no content is lost.
pub fn to_json(any: &Any) -> serde_json::Value {
    let decoded = match type_name(any) {
        "DetailLoop" => DetailLoop::decode(any.value.as_slice())
            .ok()
            .map(|d| json!({ "serverIds": d.server_ids })),
        "DetailDns" => DetailDns::decode(any.value.as_slice())
            .ok()
            .map(|d| json!({ "records": d.records })),
        "DetailTls" => DetailTls::decode(any.value.as_slice()).ok().map(|d| {
            json!({
                "subject": d.subject,
                "issuer": d.issuer,
                "notAfter": d.not_after,
                "daysRemaining": d.days_remaining,
            })
        }),
        "DetailKStatus" => DetailKStatus::decode(any.value.as_slice()).ok().map(|d| {
            json!({
                "kind": d.kind,
                "namespace": d.namespace,
                "name": d.name,
                "condition": d.condition,
                "status": d.status,
            })
        }),
        _ => None,
    };

    match decoded {
        Some(mut value) => {
            value["type"] = json!(type_name(any));
            value
        }
        None => json!({
            "typeUrl": any.type_url,
            "value": base64::engine::general_purpose::STANDARD.encode(&any.value),
        }),
    }
}
