use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tsmeta_bkdata::HttpBkdataClient;
use tsmeta_vm::{AccessStatus, VmAccessor};

pub async fn run(config_path: &Path, bk_biz_id: i64, table_id: &str, data_id: u32) -> anyhow::Result<()> {
    let (config, catalog) = super::open(config_path)?;
    let client = HttpBkdataClient::from_config(&config.bkdata)?;
    let accessor = VmAccessor::new(catalog, Arc::new(client), config.bkdata, config.vm);

    let status = accessor.access_bkdata(bk_biz_id, table_id, data_id).await?;
    let record = status.record();
    match &status {
        AccessStatus::AlreadyAccessed(_) => info!(%table_id, "already accessed"),
        AccessStatus::Accessed(_) => info!(%table_id, "accessed"),
    }
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}
