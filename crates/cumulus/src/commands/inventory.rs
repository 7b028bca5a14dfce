//! `cumulus inventory`: grouped server inventory as JSON

use cumulus_cloud_ionos::IonosClient;
use cumulus_cloud_ionos::types::{ApiList, ApiResource, DatacenterProps, ServerProps};
use cumulus_inventory::{HostRecord, Inventory, InventoryCache, InventoryConfig, build_inventory};

pub async fn handle(
    client: &IonosClient,
    config: &InventoryConfig,
    refresh: bool,
    account: &str,
) -> anyhow::Result<()> {
    let cache = config
        .cache_file()
        .map(|path| InventoryCache::new(path, config.cache_max_age, account));

    if !refresh
        && let Some(cache) = &cache
        && let Some(inventory) = cache.load().await
    {
        print_inventory(&inventory)?;
        return Ok(());
    }

    let records = fetch_records(client).await?;
    let inventory = build_inventory(&records, config);

    if let Some(cache) = &cache {
        cache.save(&inventory).await?;
    }

    print_inventory(&inventory)
}

fn print_inventory(inventory: &Inventory) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(inventory)?);
    Ok(())
}

/// All servers across all visible datacenters
async fn fetch_records(client: &IonosClient) -> anyhow::Result<Vec<HostRecord>> {
    let datacenters: ApiList<DatacenterProps> = client
        .get_json(&client.api("/datacenters?depth=1"))
        .await?;

    let mut records = Vec::new();
    for datacenter in &datacenters.items {
        let servers: ApiList<ServerProps> = client
            .get_json(
                &client.api(&format!("/datacenters/{}/servers?depth=3", datacenter.id)),
            )
            .await?;

        for server in &servers.items {
            records.push(HostRecord {
                id: server.id.clone(),
                name: server.properties.name.clone().unwrap_or_default(),
                datacenter_id: datacenter.id.clone(),
                location: datacenter.properties.location.clone(),
                availability_zone: server.properties.availability_zone.clone(),
                ip_addresses: nic_ips(server),
                vm_state: server.properties.vm_state.clone(),
            });
        }
    }

    tracing::debug!("fetched {} servers", records.len());
    Ok(records)
}

fn nic_ips(server: &ApiResource<ServerProps>) -> Vec<String> {
    server
        .entities
        .as_ref()
        .and_then(|e| e.get("nics"))
        .and_then(|nics| nics.get("items"))
        .and_then(|items| items.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|nic| nic.get("properties").and_then(|p| p.get("ips")))
                .filter_map(|ips| ips.as_array())
                .flatten()
                .filter_map(|ip| ip.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
