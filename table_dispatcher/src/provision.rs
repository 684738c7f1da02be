//! Creation of missing destination tables from the partition template.

use thiserror::Error;
use tracing::{debug, info};

use crate::{
    destination::{Destination, DestinationError},
    template::PartitionTemplate,
};

/// Errors ensuring destination tables exist.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Retrying cannot help until an operator creates the table or configures
    /// a template.
    #[error("destination table {table} does not exist and no partition template is configured")]
    NoTemplateConfigured { table: String },

    #[error("failed to check whether table {table} exists: {source}")]
    Lookup {
        table: String,
        source: DestinationError,
    },

    #[error("failed to create table {table}: {source}")]
    Create {
        table: String,
        source: DestinationError,
    },

    #[error("failed to commit creation of table {table}: {source}")]
    Commit {
        table: String,
        source: DestinationError,
    },
}

/// Ensures tables exist before rows are written to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableProvisioner {
    template: Option<PartitionTemplate>,
}

impl TableProvisioner {
    pub fn new(template: Option<PartitionTemplate>) -> Self {
        Self { template }
    }

    pub fn template(&self) -> Option<&PartitionTemplate> {
        self.template.as_ref()
    }

    /// Create each of `tables` that does not exist yet, returning the names of
    /// the tables created.
    ///
    /// Each creation is committed straight away so the table is durable before
    /// any row is inserted into it. This must run before the batch writes any
    /// rows, otherwise the commit would also make those rows durable.
    ///
    /// There is no locking between the existence check and the create; two
    /// dispatchers racing on the same new table may both attempt to create it,
    /// and the loser fails its batch.
    pub async fn ensure_tables<D>(
        &self,
        destination: &mut D,
        tables: &[&str],
    ) -> Result<Vec<String>, ProvisionError>
    where
        D: Destination + ?Sized,
    {
        let mut created = vec![];

        for &table in tables {
            let exists = destination
                .table_exists(table)
                .await
                .map_err(|source| ProvisionError::Lookup {
                    table: table.to_string(),
                    source,
                })?;
            if exists {
                debug!(%table, "destination table exists");
                continue;
            }

            let template = self
                .template
                .as_ref()
                .ok_or_else(|| ProvisionError::NoTemplateConfigured {
                    table: table.to_string(),
                })?;

            let sql = template.render(table);
            destination
                .execute(&sql)
                .await
                .map_err(|source| ProvisionError::Create {
                    table: table.to_string(),
                    source,
                })?;
            destination
                .commit()
                .await
                .map_err(|source| ProvisionError::Commit {
                    table: table.to_string(),
                    source,
                })?;

            info!(%table, "created destination table");
            created.push(table.to_string());
        }

        Ok(created)
    }
}
