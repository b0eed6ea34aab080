//! Delete command

mod cluster;
mod format;
mod metadata;

use clap::{Args, Subcommand};

use crate::Result;

pub use cluster::DeleteClusterArgs;
pub use metadata::load_cluster_metadata;

/// Delete resources
#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[command(subcommand)]
    pub resource: DeleteResource,
}

/// Resource to delete
#[derive(Subcommand, Debug)]
pub enum DeleteResource {
    /// Delete a cluster, its node groups and its supporting stacks
    Cluster(DeleteClusterArgs),
}

/// Run the delete command
pub async fn run(args: DeleteArgs) -> Result<()> {
    match args.resource {
        DeleteResource::Cluster(args) => cluster::run(args).await,
    }
}
