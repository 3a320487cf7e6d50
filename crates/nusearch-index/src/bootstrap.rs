//! Index bootstrap: make sure the target index exists with the package
//! schema before ingestion starts.

use std::sync::Arc;

use nusearch_core::{DocumentStore, IndexSchema, Result};
use tracing::info;

/// What to do with an index that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootstrapMode {
    /// Delete it and create it again from the schema.
    #[default]
    Recreate,
    /// Leave it alone; documents are upserted into it.
    KeepExisting,
}

/// What the bootstrap did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapAction {
    /// The index did not exist and was created.
    Created,
    /// The index existed and was deleted then created.
    Recreated,
    /// The index existed and was kept.
    Kept,
}

/// Creates (or recreates) one index.
pub struct IndexBootstrap {
    store: Arc<dyn DocumentStore>,
    index: String,
    schema: IndexSchema,
}

impl IndexBootstrap {
    /// Bootstrap `index` with the package schema.
    pub fn new(store: Arc<dyn DocumentStore>, index: impl Into<String>) -> Self {
        Self {
            store,
            index: index.into(),
            schema: IndexSchema::packages(),
        }
    }

    /// Use a different schema.
    pub fn with_schema(mut self, schema: IndexSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Bring the index into the requested state.
    pub async fn prepare(&self, mode: BootstrapMode) -> Result<BootstrapAction> {
        let exists = self.store.exists(&self.index).await?;

        let action = match (exists, mode) {
            (true, BootstrapMode::KeepExisting) => {
                info!(index = %self.index, "keeping existing index");
                return Ok(BootstrapAction::Kept);
            }
            (true, BootstrapMode::Recreate) => {
                info!(index = %self.index, "found existing index, deleting");
                self.store.delete_index(&self.index).await?;
                BootstrapAction::Recreated
            }
            (false, _) => BootstrapAction::Created,
        };

        self.store.create_index(&self.index, &self.schema).await?;
        info!(index = %self.index, "index created");
        Ok(action)
    }
}
