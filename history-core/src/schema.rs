//! Core schema version probe

use crate::asset::AssetCodec;
use crate::db::CoreQ;
use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::debug;

/// Reports the currently active on-disk schema version
///
/// Implementations must not cache: a migration can flip the version between
/// two calls, and every caller re-probes before choosing an encoding.
#[async_trait]
pub trait SchemaVersionSource: Send + Sync {
    /// Current schema version
    async fn schema_version(&self) -> Result<u32>;

    /// Asset codec for the current schema version
    async fn asset_codec(&self) -> Result<AssetCodec> {
        Ok(AssetCodec::new(self.schema_version().await?))
    }
}

#[async_trait]
impl SchemaVersionSource for CoreQ {
    async fn schema_version(&self) -> Result<u32> {
        let state: Option<String> = sqlx::query_scalar(
            "SELECT state FROM storestate WHERE statename = 'databaseschema'",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::SchemaVersion(e.to_string()))?;

        let state = state.ok_or_else(|| Error::SchemaVersion("databaseschema row missing".into()))?;
        let version = state
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::SchemaVersion(format!("`{}` is not a schema version", state)))?;

        debug!(schema_version = version, "Probed core schema version");
        Ok(version)
    }
}
