//! Cluster credential resolution

use crate::config::ClusterConfig;
use crate::error::{OperatorError, OperatorResult};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable overriding the kubeconfig path.
///
/// The spelling is part of the operator's external contract.
pub const KUBECONFIG_ENV: &str = "KUBECONFG";

/// Pick the kubeconfig path: explicit setting, then `KUBECONFG`, then
/// `$HOME/.kube/config`.
pub fn kubeconfig_path(
    explicit: Option<&Path>,
    env_override: Option<OsString>,
    home: Option<PathBuf>,
) -> OperatorResult<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = env_override {
        return Ok(PathBuf::from(path));
    }

    home.map(|home| home.join(".kube").join("config"))
        .ok_or_else(|| OperatorError::Credentials("cannot determine home directory".to_string()))
}

/// Build a Kubernetes client from the configured credential source.
pub async fn client(config: &ClusterConfig) -> OperatorResult<Client> {
    let kube_config = if config.in_cluster {
        info!("Running in-cluster");
        kube::Config::incluster().map_err(|e| OperatorError::Credentials(e.to_string()))?
    } else {
        let path = kubeconfig_path(
            config.kubeconfig.as_deref(),
            std::env::var_os(KUBECONFIG_ENV),
            dirs::home_dir(),
        )?;

        if !path.exists() {
            return Err(OperatorError::KubeconfigMissing(path));
        }

        info!(kubeconfig = %path.display(), "Using config file");
        let kubeconfig =
            Kubeconfig::read_from(&path).map_err(|e| OperatorError::Credentials(e.to_string()))?;
        kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| OperatorError::Credentials(e.to_string()))?
    };

    Ok(Client::try_from(kube_config)?)
}
