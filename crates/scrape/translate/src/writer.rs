//! Descriptor to scrape job translation

use crate::rules;
use scrape_types::{
    Endpoint, KubernetesSdConfig, MonitorDescriptor, PromDuration, RemoteWriteConfig,
    ScrapeConfig, ScrapeJobConfig, TlsConfig,
};
use tracing::{debug, warn};

/// Name of the job generated for the endpoint at `index`
pub fn job_name(namespace: &str, name: &str, index: usize) -> String {
    format!("{}/{}/{}", namespace, name, index)
}

/// Builds agent scrape jobs from monitor descriptors
///
/// Translation is pure: the same descriptor always yields the same jobs, in
/// endpoint order, and never fails. Optional fields that cannot be parsed
/// are left unset.
#[derive(Debug, Clone)]
pub struct ConfigWriter {
    remote_write: RemoteWriteConfig,
}

impl ConfigWriter {
    /// Create a writer attaching `remote_write` to every job
    pub fn new(remote_write: RemoteWriteConfig) -> Self {
        Self { remote_write }
    }

    /// Remote-write destination shared by generated jobs
    pub fn remote_write(&self) -> &RemoteWriteConfig {
        &self.remote_write
    }

    /// One job per endpoint, in endpoint order
    pub fn scrape_configs_for(&self, descriptor: &MonitorDescriptor) -> Vec<ScrapeJobConfig> {
        descriptor
            .spec
            .endpoints
            .iter()
            .enumerate()
            .map(|(index, endpoint)| self.job_for_endpoint(descriptor, endpoint, index))
            .collect()
    }

    /// Names of the jobs [`scrape_configs_for`](Self::scrape_configs_for) would produce
    pub fn job_names_for(&self, descriptor: &MonitorDescriptor) -> Vec<String> {
        (0..descriptor.spec.endpoints.len())
            .map(|index| job_name(&descriptor.namespace, &descriptor.name, index))
            .collect()
    }

    fn job_for_endpoint(
        &self,
        descriptor: &MonitorDescriptor,
        endpoint: &Endpoint,
        index: usize,
    ) -> ScrapeJobConfig {
        let spec = &descriptor.spec;
        let name = job_name(&descriptor.namespace, &descriptor.name, index);
        let namespaces = spec
            .namespace_selector
            .effective_namespaces(&descriptor.namespace);

        let mut scrape = ScrapeConfig {
            job_name: name.clone(),
            honor_labels: endpoint.honor_labels,
            honor_timestamps: endpoint.honor_timestamps.unwrap_or(false),
            sample_limit: spec.sample_limit,
            target_limit: spec.target_limit,
            kubernetes_sd_configs: vec![KubernetesSdConfig::endpoints(namespaces)],
            ..Default::default()
        };

        scrape.scrape_interval = parse_duration(&name, "interval", &endpoint.interval);
        scrape.scrape_timeout = parse_duration(&name, "scrapeTimeout", &endpoint.scrape_timeout);

        if !endpoint.path.is_empty() {
            scrape.metrics_path = Some(endpoint.path.clone());
        }
        if let Some(proxy) = endpoint.proxy_url.as_deref() {
            scrape.proxy_url = parse_proxy_url(&name, proxy);
        }
        if !endpoint.params.is_empty() {
            scrape.params = endpoint.params.clone();
        }
        if !endpoint.scheme.is_empty() {
            scrape.scheme = Some(endpoint.scheme.clone());
        }
        if let Some(tls) = &endpoint.tls_config {
            scrape.tls_config = Some(TlsConfig {
                insecure_skip_verify: tls.insecure_skip_verify,
                server_name: (!tls.server_name.is_empty()).then(|| tls.server_name.clone()),
                ..Default::default()
            });
        }
        if !endpoint.bearer_token_file.is_empty() {
            scrape.bearer_token_file = Some(endpoint.bearer_token_file.clone());
        }

        let relabel = &mut scrape.relabel_configs;
        relabel.extend(rules::selector_rules(&spec.selector));
        relabel.extend(rules::port_rule(endpoint));
        relabel.extend(rules::topology_rules());
        relabel.extend(rules::target_label_rules(
            &spec.target_labels,
            &spec.pod_target_labels,
        ));
        relabel.extend(rules::job_rules(&spec.job_label));
        relabel.extend(rules::endpoint_display_rule(endpoint));
        relabel.extend(rules::user_rules(&endpoint.relabel_configs));
        relabel.extend(rules::user_rules(&endpoint.metric_relabel_configs));

        ScrapeJobConfig {
            name,
            scrape_configs: vec![scrape],
            remote_write: vec![self.remote_write.clone()],
        }
    }
}

fn parse_duration(job: &str, field: &str, raw: &str) -> Option<PromDuration> {
    if raw.is_empty() {
        return None;
    }
    match PromDuration::parse(raw) {
        Ok(duration) => Some(duration),
        Err(e) => {
            debug!(job = %job, field = %field, error = %e, "Ignoring unparsable duration");
            None
        }
    }
}

fn parse_proxy_url(job: &str, raw: &str) -> Option<String> {
    match url::Url::parse(raw) {
        Ok(parsed) => Some(parsed.to_string()),
        Err(e) => {
            warn!(job = %job, proxy_url = %raw, error = %e, "Ignoring invalid proxy URL");
            None
        }
    }
}
