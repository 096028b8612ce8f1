//! Client-side rendering of a check response: JSON, YAML, or JUnit, with
//! quiet levels that progressively drop healthy noise.

use clap::ValueEnum;
use serde::Serialize;

use crate::detail;
use crate::pb::v1::{HealthCheckResponse, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
    Junit,
}

/// Serializable mirror of the wire response.
#[derive(Debug, Serialize)]
pub struct ReportNode {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub server_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ReportNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

impl ReportNode {
    pub fn from_response(response: &HealthCheckResponse, quiet: u8) -> Self {
        let components = if quiet >= 2 {
            Vec::new()
        } else {
            response
                .components
                .iter()
                .filter(|c| quiet == 0 || c.status() != Status::Healthy)
                .map(|c| Self::from_response(c, quiet))
                .collect()
        };

        Self {
            name: response.name.clone(),
            kind: response.r#type.clone(),
            server_id: response.server_id.clone(),
            status: response.status().as_str_name().to_string(),
            messages: response.messages.clone(),
            details: response.details.iter().map(detail::to_json).collect(),
            components,
            duration: response.duration.as_ref().map(format_duration),
        }
    }
}

fn format_duration(duration: &prost_types::Duration) -> String {
    let std = std::time::Duration::new(
        duration.seconds.max(0) as u64,
        duration.nanos.max(0) as u32,
    );
    humantime::format_duration(std).to_string()
}

/// Render the response. Quiet level 3 and above produces nothing; the exit
/// code is the whole answer.
pub fn render(response: &HealthCheckResponse, format: OutputFormat, quiet: u8) -> String {
    if quiet >= 3 {
        return String::new();
    }

    let report = ReportNode::from_response(response, quiet);
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&report).unwrap_or_else(|e| format!("render error: {e}"))
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(&report).unwrap_or_else(|e| format!("render error: {e}"))
        }
        OutputFormat::Junit => render_junit(response),
    }
}

/// One `<testcase>` per leaf, classed by component path. Failures carry the
/// node's messages.
fn render_junit(response: &HealthCheckResponse) -> String {
    let mut cases = Vec::new();
    collect_cases(response, "", &mut cases);

    let failures = cases.iter().filter(|(_, status, _)| *status != Status::Healthy).count();

    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!(
        "<testsuite name=\"platform-health\" tests=\"{}\" failures=\"{failures}\">\n",
        cases.len()
    ));
    for (path, status, messages) in &cases {
        if *status == Status::Healthy {
            xml.push_str(&format!(
                "  <testcase name=\"{}\"/>\n",
                escape_xml(path)
            ));
        } else {
            let text = if messages.is_empty() {
                status.as_str_name().to_string()
            } else {
                messages.join("; ")
            };
            xml.push_str(&format!(
                "  <testcase name=\"{}\">\n    <failure message=\"{}\"/>\n  </testcase>\n",
                escape_xml(path),
                escape_xml(&text)
            ));
        }
    }
    xml.push_str("</testsuite>\n");
    xml
}

fn collect_cases(
    node: &HealthCheckResponse,
    prefix: &str,
    cases: &mut Vec<(String, Status, Vec<String>)>,
) {
    let path = if prefix.is_empty() {
        node.name.clone()
    } else {
        format!("{prefix}/{}", node.name)
    };

    if node.components.is_empty() {
        cases.push((path, node.status(), node.messages.clone()));
    } else {
        for child in &node.components {
            collect_cases(child, &path, cases);
        }
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Process exit code for a response: HEALTHY is 0, everything else is 1.
pub fn exit_code(response: &HealthCheckResponse) -> i32 {
    if response.status() == Status::Healthy {
        0
    } else {
        1
    }
}
