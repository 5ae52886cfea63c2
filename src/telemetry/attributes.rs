// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Attribute keys, metric names, and capability-to-attribute derivation.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::host::Capabilities;

/// Attribute map attached to spans and metric data points.
///
/// Ordered so that equal attribute sets always serialize identically.
pub type Attributes = BTreeMap<String, Value>;

/// Prefix for every span attribute this crate emits.
pub const ATTR_PREFIX: &str = "appium.";
/// Prefix for capability-derived span attributes.
pub const ATTR_CAPS_PREFIX: &str = "appium.caps.";
/// Span attribute carrying the session identity.
pub const ATTR_SESSION_ID: &str = "appium.session.id";

pub const METRIC_ATTR_COMMAND_NAME: &str = "command";
pub const METRIC_ATTR_STATUS: &str = "status";
pub const METRIC_ATTR_SUCCESS: &str = "success";
pub const METRIC_ATTR_ERROR: &str = "error";

/// Counter of command responses, tagged by command and status.
pub const METRIC_KEY_COMMAND_RESPONSES: &str = "appium.command.responses";
/// Gauge of live sessions according to the host.
pub const METRIC_KEY_SESSION_NUM_TOTAL: &str = "appium.sessions.total";
/// Gauge of the oldest tracked session age, in seconds.
pub const METRIC_KEY_OLDEST_SESSION_AGE: &str = "appium.sessions.oldest_age";

/// Convert a capability name to a snake_case attribute key.
///
/// Words are lowercase runs optionally led by one capital, trailing digits
/// stay with their word, and acronym runs form a word of their own
/// (`platformVersion` -> `platform_version`, `XMLHttpRequest` ->
/// `xml_http_request`). Any other character separates words, so vendor
/// prefixes such as `appium:deviceName` become `appium_device_name`.
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_ascii_uppercase() {
            let mut end = i;
            while end < chars.len() && chars[end].is_ascii_uppercase() {
                end += 1;
            }
            let next = chars.get(end).copied();

            if end - i >= 2
                && next.map_or(true, |n| n.is_ascii_lowercase() || !n.is_ascii_alphanumeric())
            {
                // The last capital belongs to the following word, if any.
                let cut = if next.is_some_and(|n| n.is_ascii_lowercase()) {
                    end - 1
                } else {
                    end
                };
                words.push(collect_lower(&chars[i..cut]));
                i = cut;
                continue;
            }

            if next.is_some_and(|n| n.is_ascii_lowercase()) && end - i == 1 {
                let stop = word_end(&chars, i + 1);
                words.push(collect_lower(&chars[i..stop]));
                i = stop;
            } else {
                words.push(c.to_ascii_lowercase().to_string());
                i += 1;
            }
        } else if c.is_ascii_lowercase() {
            let stop = word_end(&chars, i);
            words.push(collect_lower(&chars[i..stop]));
            i = stop;
        } else if c.is_ascii_digit() {
            let mut stop = i;
            while stop < chars.len() && chars[stop].is_ascii_digit() {
                stop += 1;
            }
            words.push(chars[i..stop].iter().collect());
            i = stop;
        } else {
            i += 1;
        }
    }

    words.join("_")
}

/// End of a `[a-z]+[0-9]*` word starting at `start`.
fn word_end(chars: &[char], start: usize) -> usize {
    let mut i = start;
    while i < chars.len() && chars[i].is_ascii_lowercase() {
        i += 1;
    }
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    i
}

fn collect_lower(chars: &[char]) -> String {
    chars.iter().map(|c| c.to_ascii_lowercase()).collect()
}

/// Whether a capability value counts as present.
///
/// `null`, `false`, zero and the empty string are treated as absent.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn select_capabilities(
    caps: Option<&Capabilities>,
    targets: &[String],
    prefix: &str,
) -> Attributes {
    let Some(caps) = caps else {
        return Attributes::new();
    };

    targets
        .iter()
        .filter_map(|target| {
            caps.get(target)
                .filter(|value| is_truthy(value))
                .map(|value| (format!("{}{}", prefix, to_snake_case(target)), value.clone()))
        })
        .collect()
}

/// Span attributes derived from the allow-listed capabilities
/// (`appium.caps.<snake_case key>`).
pub fn capabilities_to_attributes(caps: Option<&Capabilities>, targets: &[String]) -> Attributes {
    select_capabilities(caps, targets, ATTR_CAPS_PREFIX)
}

/// Metric attributes derived from the allow-listed capabilities
/// (bare `<snake_case key>`).
pub fn capabilities_to_metric_attributes(
    caps: Option<&Capabilities>,
    targets: &[String],
) -> Attributes {
    select_capabilities(caps, targets, "")
}

/// Span attributes identifying a session: capability attributes plus the
/// session id.
pub fn session_attributes(session_id: &str, caps: &Capabilities, targets: &[String]) -> Attributes {
    let mut attributes = capabilities_to_attributes(Some(caps), targets);
    attributes.insert(ATTR_SESSION_ID.to_string(), Value::String(session_id.to_string()));
    attributes
}

/// Merge several attribute maps; later maps win on key conflicts.
pub fn merge_attributes<'a>(layers: impl IntoIterator<Item = &'a Attributes>) -> Attributes {
    let mut merged = Attributes::new();
    for layer in layers {
        merged.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
}
