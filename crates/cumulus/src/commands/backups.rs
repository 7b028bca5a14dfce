//! `cumulus backups`: Postgres cluster backups as JSON

use cumulus_cloud_ionos::IonosClient;
use cumulus_cloud_ionos::kinds::postgres_cluster::PostgresClusterKind;
use serde_json::json;
use std::sync::Arc;

pub async fn handle(client: Arc<IonosClient>, cluster: Option<&str>) -> anyhow::Result<()> {
    let kind = PostgresClusterKind::new(client);
    let backups = kind.backups(cluster).await?;

    let rows: Vec<serde_json::Value> = backups
        .iter()
        .map(|backup| json!({ "id": backup.id, "properties": backup.properties }))
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
