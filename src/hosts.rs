//! Host names from Traefik routing labels.
//!
//! A container publishes its virtual hosts through labels of the form
//! `traefik.http.routers.<router>.rule`, e.g.
//!
//! ```text
//! traefik.http.routers.web.rule = Host(`app.local`) || Host(`www.app.local`)
//! ```
//!
//! Each `||` alternative contributes the text between its first and last
//! backtick. Templated hosts (containing `{` or `}`) are skipped.

use std::collections::HashMap;

const ROUTER_PREFIX: &str = "traefik.http.routers.";
const RULE_SUFFIX: &str = ".rule";

/// Extracts the host names declared by a container's routing labels.
///
/// No deduplication; order follows label iteration order, then alternative order.
///
/// # Example
/// ```
/// use std::collections::HashMap;
/// use docker_certs::hosts::extract_hosts;
///
/// let labels = HashMap::from([(
///     "traefik.http.routers.api.rule".to_string(),
///     "Host(`api.local`) || Host(`api.test`)".to_string(),
/// )]);
/// assert_eq!(extract_hosts(&labels), vec!["api.local", "api.test"]);
/// ```
pub fn extract_hosts(labels: &HashMap<String, String>) -> Vec<String> {
    labels
        .iter()
        .filter(|(key, _)| is_router_rule(key))
        .flat_map(|(_, rule)| rule.split("||"))
        .filter_map(between_backticks)
        .filter(|host| !host.is_empty() && !host.contains(['{', '}']))
        .map(str::to_owned)
        .collect()
}

fn is_router_rule(key: &str) -> bool {
    key.starts_with(ROUTER_PREFIX) && key.ends_with(RULE_SUFFIX)
}

/// Text strictly between the first and the last backtick.
fn between_backticks(rule: &str) -> Option<&str> {
    let start = rule.find('`')?;
    let end = rule.rfind('`')?;
    (start < end).then(|| &rule[start + 1..end])
}
