//! `data-*` attributes as component options

use serde_json::Value;

use super::document::{Document, NodeId};
use crate::options::{OptionValue, Options};

/// Attributes skipped by [`dataset`]
const RESERVED: &[&str] = &[crate::component::UID_ATTRIBUTE];

/// Read `data-*` attributes of `node` as options
///
/// Keys are camel-cased (`data-max-items` becomes `maxItems`). Values that
/// parse as JSON keep their JSON type, anything else stays a string.
pub fn dataset(document: &Document, node: NodeId) -> Options {
    let mut options = Options::new();
    for (name, raw) in document.attributes(node) {
        if RESERVED.contains(&name.as_str()) {
            continue;
        }
        let Some(key) = name.strip_prefix("data-") else {
            continue;
        };
        if key.is_empty() {
            continue;
        }
        options.insert(camel_case(key), OptionValue::Value(parse_value(&raw)));
    }
    options
}

fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper = false;
    for c in key.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
