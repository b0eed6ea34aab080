//! Resolves which cluster to delete from arguments and the config file

use decom_common::{ClusterConfig, ClusterIdentity};
use tracing::debug;

use super::DeleteClusterArgs;
use crate::{Error, Result};

/// Build the target identity, plus the declared configuration when a config
/// file is given.
///
/// The name comes from the positional argument, `--name`, or the config file,
/// and exactly one of them must supply it. With a config file, `--name` and
/// `--region` come from the file.
pub fn load_cluster_metadata(
    args: &DeleteClusterArgs,
) -> Result<(ClusterIdentity, Option<ClusterConfig>)> {
    if let (Some(flag), Some(positional)) = (&args.name, &args.cluster) {
        return Err(Error::validation(format!(
            "--name={} and argument {} cannot be used at the same time",
            flag, positional
        )));
    }
    let cli_name = args.name.as_ref().or(args.cluster.as_ref());

    let (mut identity, declared) = match &args.config_file {
        Some(path) => {
            if let Some(name) = cli_name {
                return Err(Error::validation(format!(
                    "cannot use cluster name {} when --config-file is set",
                    name
                )));
            }
            if args.region.is_some() {
                return Err(Error::validation(
                    "cannot use --region when --config-file is set",
                ));
            }
            if !path.exists() {
                return Err(Error::ConfigNotFound { path: path.clone() });
            }
            let config = ClusterConfig::load(path)?;
            if config.metadata.name.is_empty() {
                return Err(Error::validation(format!(
                    "metadata.name must be set in {}",
                    path.display()
                )));
            }
            let rendered = config.to_pretty_json()?;
            debug!(config = %rendered, "Loaded cluster configuration");
            (config.identity(), Some(config))
        }
        None => {
            let name = cli_name
                .filter(|n| !n.is_empty())
                .ok_or_else(|| Error::validation("--name must be set"))?;
            let mut identity = ClusterIdentity::new(name.clone());
            if let Some(region) = &args.region {
                identity = identity.with_region(region.clone());
            }
            (identity, None)
        }
    };

    if let Some(namespace) = &args.namespace {
        identity = identity.with_namespace(namespace.clone());
    }
    if let Some(context) = &args.context {
        identity = identity.with_context(context.clone());
    }
    Ok((identity, declared))
}
