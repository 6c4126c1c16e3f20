//! Relabel rule builders for the generated scrape jobs
//!
//! Each function produces one stage of the pipeline. The writer concatenates
//! them in a fixed order; nothing here looks at more than it needs.

use scrape_types::{
    sanitize_label_name, Endpoint, LabelSelector, RelabelAction, RelabelConfig, RelabelRegex,
    RelabelRule, SelectorOperator, TargetPort,
};
use tracing::debug;

/// Discovery meta-label prefix for service labels
pub const SERVICE_LABEL_PREFIX: &str = "__meta_kubernetes_service_label_";

/// Discovery meta-label prefix for pod labels
pub const POD_LABEL_PREFIX: &str = "__meta_kubernetes_pod_label_";

pub const ENDPOINT_PORT_NAME: &str = "__meta_kubernetes_endpoint_port_name";
pub const ENDPOINT_PORT_NUMBER: &str = "__meta_kubernetes_endpoint_port_number";

const ADDRESS_TARGET_KIND: &str = "__meta_kubernetes_endpoint_address_target_kind";
const ADDRESS_TARGET_NAME: &str = "__meta_kubernetes_endpoint_address_target_name";
const NAMESPACE: &str = "__meta_kubernetes_namespace";
const SERVICE_NAME: &str = "__meta_kubernetes_service_name";
const POD_NAME: &str = "__meta_kubernetes_pod_name";
const POD_CONTAINER_NAME: &str = "__meta_kubernetes_pod_container_name";

const FIRST_GROUP: &str = "${1}";

fn service_label(key: &str) -> String {
    format!("{}{}", SERVICE_LABEL_PREFIX, sanitize_label_name(key))
}

fn pod_label(key: &str) -> String {
    format!("{}{}", POD_LABEL_PREFIX, sanitize_label_name(key))
}

/// Keep rules for `matchLabels` (sorted by key) followed by `matchExpressions`
/// in declaration order.
pub fn selector_rules(selector: &LabelSelector) -> Vec<RelabelRule> {
    // BTreeMap iteration is already ascending by key
    let mut rules: Vec<RelabelRule> = selector
        .match_labels
        .iter()
        .map(|(key, value)| {
            RelabelRule::new(RelabelAction::Keep)
                .with_source_labels([service_label(key)])
                .with_regex(RelabelRegex::new(value.as_str()))
        })
        .collect();

    for requirement in &selector.match_expressions {
        let (action, regex) = match requirement.operator {
            SelectorOperator::In => (
                RelabelAction::Keep,
                RelabelRegex::new(requirement.values.join("|")),
            ),
            SelectorOperator::NotIn => (
                RelabelAction::Drop,
                RelabelRegex::new(requirement.values.join("|")),
            ),
            SelectorOperator::Exists => (RelabelAction::Keep, RelabelRegex::match_all()),
            SelectorOperator::DoesNotExist => (RelabelAction::Drop, RelabelRegex::match_all()),
            SelectorOperator::Unknown => {
                debug!(key = %requirement.key, "Skipping selector requirement with unknown operator");
                continue;
            }
        };

        rules.push(
            RelabelRule::new(action)
                .with_source_labels([service_label(&requirement.key)])
                .with_regex(regex),
        );
    }

    rules
}

/// Port selection: a named port wins over the target port
pub fn port_rule(endpoint: &Endpoint) -> Option<RelabelRule> {
    let (source, value) = if !endpoint.port.is_empty() {
        (ENDPOINT_PORT_NAME, endpoint.port.clone())
    } else {
        match endpoint.target_port.as_ref()? {
            TargetPort::Str(name) if !name.is_empty() => (ENDPOINT_PORT_NAME, name.clone()),
            TargetPort::Int(number) if *number != 0 => (ENDPOINT_PORT_NUMBER, number.to_string()),
            _ => return None,
        }
    };

    Some(
        RelabelRule::new(RelabelAction::Keep)
            .with_source_labels([source])
            .with_regex(RelabelRegex::new(value)),
    )
}

/// Fixed rules copying discovery topology onto the target
pub fn topology_rules() -> Vec<RelabelRule> {
    vec![
        RelabelRule::replace()
            .with_source_labels([ADDRESS_TARGET_KIND, ADDRESS_TARGET_NAME])
            .with_separator(";")
            .with_regex(RelabelRegex::new("Node;(.*)"))
            .with_replacement(FIRST_GROUP)
            .with_target_label("node"),
        RelabelRule::replace()
            .with_source_labels([ADDRESS_TARGET_KIND, ADDRESS_TARGET_NAME])
            .with_separator(";")
            .with_regex(RelabelRegex::new("Pod;(.*)"))
            .with_replacement(FIRST_GROUP)
            .with_target_label("pod"),
        RelabelRule::replace()
            .with_source_labels([NAMESPACE])
            .with_target_label("namespace"),
        RelabelRule::replace()
            .with_source_labels([SERVICE_NAME])
            .with_target_label("service_name"),
        RelabelRule::replace()
            .with_source_labels([POD_NAME])
            .with_target_label("pod"),
        RelabelRule::replace()
            .with_source_labels([POD_CONTAINER_NAME])
            .with_target_label("container"),
    ]
}

fn copy_rule(source: String, key: &str) -> RelabelRule {
    RelabelRule::replace()
        .with_source_labels([source])
        .with_target_label(sanitize_label_name(key))
        .with_regex(RelabelRegex::non_empty())
        .with_replacement(FIRST_GROUP)
}

/// Copy service labels, then pod labels, onto the target when non-empty
pub fn target_label_rules(target_labels: &[String], pod_target_labels: &[String]) -> Vec<RelabelRule> {
    let service = target_labels.iter().map(|key| copy_rule(service_label(key), key));
    let pod = pod_target_labels.iter().map(|key| copy_rule(pod_label(key), key));
    service.chain(pod).collect()
}

/// `job` from the service name, optionally overridden by a service label
pub fn job_rules(job_label: &str) -> Vec<RelabelRule> {
    let mut rules = vec![RelabelRule::replace()
        .with_source_labels([SERVICE_NAME])
        .with_target_label("job")
        .with_replacement(FIRST_GROUP)];

    if !job_label.is_empty() {
        rules.push(
            RelabelRule::replace()
                .with_source_labels([service_label(job_label)])
                .with_target_label("job")
                .with_regex(RelabelRegex::non_empty())
                .with_replacement(FIRST_GROUP),
        );
    }

    rules
}

/// Static `endpoint` label naming the selected port
pub fn endpoint_display_rule(endpoint: &Endpoint) -> Option<RelabelRule> {
    let display = if !endpoint.port.is_empty() {
        endpoint.port.clone()
    } else {
        let port = endpoint.target_port.as_ref()?.to_string();
        if port.is_empty() {
            return None;
        }
        port
    };

    Some(
        RelabelRule::replace()
            .with_target_label("endpoint")
            .with_replacement(display),
    )
}

/// Carry user-written rules over unchanged; blank fields stay unset.
pub fn user_rules(configs: &[RelabelConfig]) -> Vec<RelabelRule> {
    configs.iter().map(user_rule).collect()
}

fn user_rule(config: &RelabelConfig) -> RelabelRule {
    let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_string());

    RelabelRule {
        source_labels: config.source_labels.clone(),
        separator: non_empty(&config.separator),
        regex: non_empty(&config.regex).map(RelabelRegex::new),
        modulus: (config.modulus != 0).then_some(config.modulus),
        target_label: non_empty(&config.target_label),
        replacement: non_empty(&config.replacement),
        action: RelabelAction::parse(&config.action),
    }
}
