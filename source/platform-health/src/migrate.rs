//! One-shot rewriter from the legacy flat YAML shape to the current one.
//!
//! Legacy input groups instances by provider type at the top level, each with
//! an inline `name`. The output is a `components:` tree with framework keys
//! at the top and everything else under `spec`. Rewrites beyond the reshuffle:
//! `rest` becomes `http` (with `request.*` flattened), an HTTP `status` list
//! becomes an appended CEL check, and `expr`/`expression` inside check
//! entries become `check`. Every behavioral rewrite emits a note.

use std::path::{Path, PathBuf};

use miette::{miette, IntoDiagnostic, WrapErr};
use serde_yaml::{Mapping, Value};

const FRAMEWORK_KEYS: &[&str] = &["type", "checks", "timeout", "includes", "components"];

#[derive(Debug)]
pub struct Migration {
    pub document: Value,
    pub notes: Vec<String>,
}

/// Read `input`, migrate, write YAML to stdout or `--output`, notes to
/// stderr.
pub fn run(input: &Path, output: Option<PathBuf>) -> miette::Result<()> {
    let bytes = std::fs::read(input)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", input.display()))?;
    let value: Value = serde_yaml::from_slice(&bytes)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to parse {}", input.display()))?;

    let migration = migrate(&value)?;

    for note in &migration.notes {
        eprintln!("note: {note}");
    }

    let rendered = serde_yaml::to_string(&migration.document).into_diagnostic()?;
    match output {
        Some(path) => std::fs::write(&path, rendered)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write {}", path.display()))?,
        None => print!("{rendered}"),
    }

    Ok(())
}

pub fn migrate(input: &Value) -> miette::Result<Migration> {
    let Value::Mapping(groups) = input else {
        return Err(miette!(
            "legacy config must be a mapping of provider type to instance list"
        ));
    };

    let mut notes = Vec::new();

    // First pass: find names used under more than one provider type. Those
    // collide once everything lands in one components map.
    let mut seen: Vec<(String, String)> = Vec::new(); // (name, type)
    for (kind, value) in groups {
        let (Some(kind), Value::Sequence(instances)) = (kind.as_str(), value) else {
            return Err(miette!("each top-level entry must map a type to a list"));
        };
        for instance in instances {
            if let Some(name) = instance.get("name").and_then(Value::as_str) {
                seen.push((name.to_string(), kind.to_string()));
            }
        }
    }
    let collides = |name: &str| seen.iter().filter(|(n, _)| n == name).count() > 1;

    let mut components = Mapping::new();

    for (kind, value) in groups {
        let legacy_kind = kind.as_str().expect("checked above");
        let Value::Sequence(instances) = value else {
            unreachable!("checked above");
        };

        for instance in instances {
            let Value::Mapping(instance) = instance else {
                return Err(miette!(
                    "entries under '{legacy_kind}' must be mappings"
                ));
            };

            let Some(name) = instance.get("name").and_then(Value::as_str) else {
                return Err(miette!(
                    "an entry under '{legacy_kind}' is missing a 'name'"
                ));
            };

            let kind = match legacy_kind {
                "rest" => {
                    notes.push(format!("{name}: type 'rest' renamed to 'http'"));
                    "http".to_string()
                }
                other => other.to_string(),
            };

            let final_name = if collides(name) {
                let renamed = format!("{name}-{kind}");
                notes.push(format!(
                    "{name}: renamed to '{renamed}' (name collides across provider types)"
                ));
                renamed
            } else {
                name.to_string()
            };

            let migrated = migrate_instance(&kind, legacy_kind, instance, &mut notes)?;
            components.insert(Value::String(final_name), Value::Mapping(migrated));
        }
    }

    let mut document = Mapping::new();
    document.insert(
        Value::String("components".to_string()),
        Value::Mapping(components),
    );

    Ok(Migration {
        document: Value::Mapping(document),
        notes,
    })
}

fn migrate_instance(
    kind: &str,
    legacy_kind: &str,
    instance: &Mapping,
    notes: &mut Vec<String>,
) -> miette::Result<Mapping> {
    let mut rest = Mapping::new();
    for (key, value) in instance {
        if key.as_str() == Some("name") {
            continue;
        }
        rest.insert(key.clone(), value.clone());
    }

    // rest.request.* keys promote to the top level of the spec.
    if legacy_kind == "rest" {
        if let Some(Value::Mapping(request)) = rest.shift_remove("request") {
            for (key, value) in request {
                rest.entry(key).or_insert(value);
            }
        }
    }

    let mut checks = match rest.shift_remove("checks") {
        Some(Value::Sequence(entries)) => entries
            .into_iter()
            .map(migrate_check)
            .collect::<miette::Result<Vec<Value>>>()?,
        Some(other) => {
            return Err(miette!("'checks' must be a list, got {other:?}"))
        }
        None => Vec::new(),
    };

    // An HTTP status list becomes an explicit CEL check.
    if kind == "http" {
        if let Some(status) = rest.shift_remove("status") {
            let expression = status_expression(&status)?;
            let mut check = Mapping::new();
            check.insert(
                Value::String("check".to_string()),
                Value::String(expression),
            );
            check.insert(
                Value::String("message".to_string()),
                Value::String("unexpected HTTP status".to_string()),
            );
            checks.push(Value::Mapping(check));
        }
    }

    let timeout = rest.shift_remove("timeout");
    let includes = rest.shift_remove("includes");
    let components = rest.shift_remove("components");

    debug_assert!(FRAMEWORK_KEYS.iter().all(|k| !rest.contains_key(*k)));

    let mut out = Mapping::new();
    out.insert(
        Value::String("type".to_string()),
        Value::String(kind.to_string()),
    );
    if !checks.is_empty() {
        out.insert(
            Value::String("checks".to_string()),
            Value::Sequence(checks),
        );
    }
    if let Some(timeout) = timeout {
        out.insert(Value::String("timeout".to_string()), timeout);
    }
    if let Some(includes) = includes {
        out.insert(Value::String("includes".to_string()), includes);
    }
    if let Some(components) = components {
        out.insert(Value::String("components".to_string()), components);
    }
    out.insert(Value::String("spec".to_string()), Value::Mapping(rest));

    Ok(out)
}

/// `expr` and `expression` become `check`; everything else passes through.
fn migrate_check(entry: Value) -> miette::Result<Value> {
    let Value::Mapping(map) = entry else {
        return Err(miette!("each checks entry must be a mapping"));
    };

    let mut out = Mapping::new();
    for (key, value) in map {
        let key = match key.as_str() {
            Some("expr") | Some("expression") => Value::String("check".to_string()),
            _ => key,
        };
        out.insert(key, value);
    }
    Ok(Value::Mapping(out))
}

fn status_expression(status: &Value) -> miette::Result<String> {
    match status {
        Value::Number(n) => Ok(format!("response.status == {n}")),
        Value::Sequence(list) if list.len() == 1 => {
            let n = scalar_status(&list[0])?;
            Ok(format!("response.status == {n}"))
        }
        Value::Sequence(list) if !list.is_empty() => {
            let rendered = list
                .iter()
                .map(scalar_status)
                .collect::<miette::Result<Vec<String>>>()?;
            Ok(format!("response.status in [{}]", rendered.join(", ")))
        }
        other => Err(miette!(
            "'status' must be a number or a non-empty list, got {other:?}"
        )),
    }
}

fn scalar_status(value: &Value) -> miette::Result<String> {
    match value {
        Value::Number(n) => Ok(n.to_string()),
        other => Err(miette!("'status' entries must be numbers, got {other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(input: &str) -> Value {
        serde_yaml::from_str(input).expect("test YAML must parse")
    }

    fn get<'a>(value: &'a Value, path: &[&str]) -> &'a Value {
        let mut current = value;
        for segment in path {
            current = current
                .get(*segment)
                .unwrap_or_else(|| panic!("missing key '{segment}' in {current:?}"));
        }
        current
    }

    #[test]
    fn test_http_status_list_becomes_cel_check() {
        let migration = migrate(&yaml(
            "http:\n  - name: g\n    url: https://g\n    status: [200, 201]\n",
        ))
        .unwrap();
        let doc = &migration.document;

        assert_eq!(get(doc, &["components", "g", "type"]), &yaml("http"));
        assert_eq!(
            get(doc, &["components", "g", "checks"]),
            &yaml(
                "- check: response.status in [200, 201]\n  message: unexpected HTTP status\n"
            )
        );
        assert_eq!(
            get(doc, &["components", "g", "spec", "url"]),
            &yaml("https://g")
        );
        assert!(get(doc, &["components", "g", "spec"])
            .get("status")
            .is_none());
    }

    #[test]
    fn test_single_status_uses_equality() {
        let migration =
            migrate(&yaml("http:\n  - name: g\n    url: https://g\n    status: [418]\n"))
                .unwrap();

        let check = get(
            &migration.document,
            &["components", "g", "checks"],
        )[0]
        .clone();
        assert_eq!(check.get("check"), Some(&yaml("response.status == 418")));
    }

    #[test]
    fn test_rest_becomes_http_with_flattened_request() {
        let migration = migrate(&yaml(
            "rest:\n  - name: api\n    request:\n      url: https://api\n      method: POST\n",
        ))
        .unwrap();
        let doc = &migration.document;

        assert_eq!(get(doc, &["components", "api", "type"]), &yaml("http"));
        assert_eq!(
            get(doc, &["components", "api", "spec", "url"]),
            &yaml("https://api")
        );
        assert_eq!(
            get(doc, &["components", "api", "spec", "method"]),
            &yaml("POST")
        );
        assert!(get(doc, &["components", "api", "spec"])
            .get("request")
            .is_none());
        assert!(migration
            .notes
            .iter()
            .any(|n| n.contains("'rest' renamed to 'http'")));
    }

    #[test]
    fn test_cross_type_name_collision_renames() {
        let migration = migrate(&yaml(
            "http:\n  - name: g\n    url: https://g\ntcp:\n  - name: g\n    host: h\n    port: 1\n",
        ))
        .unwrap();
        let doc = &migration.document;

        assert!(get(doc, &["components"]).get("g").is_none());
        assert_eq!(get(doc, &["components", "g-http", "type"]), &yaml("http"));
        assert_eq!(get(doc, &["components", "g-tcp", "type"]), &yaml("tcp"));
        assert_eq!(
            migration
                .notes
                .iter()
                .filter(|n| n.contains("collides across provider types"))
                .count(),
            2
        );
    }

    #[test]
    fn test_expr_and_expression_become_check() {
        let migration = migrate(&yaml(
            "mock:\n  - name: m\n    checks:\n      - expr: a == 1\n      - expression: b == 2\n        message: b off\n",
        ))
        .unwrap();

        let checks = get(&migration.document, &["components", "m", "checks"]);
        assert_eq!(checks[0].get("check"), Some(&yaml("a == 1")));
        assert!(checks[0].get("expr").is_none());
        assert_eq!(checks[1].get("check"), Some(&yaml("b == 2")));
        assert_eq!(checks[1].get("message"), Some(&yaml("b off")));
    }

    #[test]
    fn test_timeout_stays_a_framework_key() {
        let migration = migrate(&yaml(
            "tcp:\n  - name: t\n    host: h\n    port: 1\n    timeout: 5s\n",
        ))
        .unwrap();
        let doc = &migration.document;

        assert_eq!(get(doc, &["components", "t", "timeout"]), &yaml("5s"));
        assert!(get(doc, &["components", "t", "spec"])
            .get("timeout")
            .is_none());
    }

    #[test]
    fn test_non_mapping_input_is_rejected() {
        assert!(migrate(&yaml("- a\n- b\n")).is_err());
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let err = migrate(&yaml("http:\n  - url: https://g\n")).unwrap_err();
        assert!(err.to_string().contains("missing a 'name'"));
    }
}
