//! Space and cluster resolution.

use tracing::{debug, info, warn};
use tsmeta_catalog::{Catalog, ClusterInfo, SpaceVmInfo};
use tsmeta_core::{ClusterType, SPACE_TYPE_BKCC, VmDataType};

use crate::error::{AccessError, AccessResult};

/// A `(space_type, space_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceRef {
    pub space_type: String,
    pub space_id: String,
}

/// Map a business id onto its space.
///
/// Positive ids are CMDB businesses. Other ids are the negated primary
/// key of a space; a missing space yields `None`.
pub fn space_for_biz(catalog: &Catalog, bk_biz_id: i64) -> AccessResult<Option<SpaceRef>> {
    if bk_biz_id > 0 {
        return Ok(Some(SpaceRef {
            space_type: SPACE_TYPE_BKCC.to_string(),
            space_id: bk_biz_id.to_string(),
        }));
    }
    let Some(space) = catalog.get_space_by_pk(bk_biz_id.unsigned_abs())? else {
        debug!(bk_biz_id, "no space for business");
        return Ok(None);
    };
    if space.space_type_id.is_empty() || space.space_id.is_empty() {
        return Ok(None);
    }
    Ok(Some(SpaceRef {
        space_type: space.space_type_id,
        space_id: space.space_id,
    }))
}

/// The single default cluster of `cluster_type`.
pub fn find_unique_default(catalog: &Catalog, cluster_type: ClusterType) -> AccessResult<ClusterInfo> {
    let mut defaults: Vec<ClusterInfo> = catalog
        .list_clusters_by_type(cluster_type)?
        .into_iter()
        .filter(|c| c.is_default_cluster)
        .collect();
    match defaults.len() {
        0 => Err(AccessError::ConfigurationInconsistent(format!(
            "no default {cluster_type} cluster"
        ))),
        1 => Ok(defaults.remove(0)),
        n => {
            let ids: Vec<u64> = defaults.iter().map(|c| c.cluster_id).collect();
            Err(AccessError::ConfigurationInconsistent(format!(
                "{n} default {cluster_type} clusters: {ids:?}"
            )))
        }
    }
}

/// Resolve the VM cluster a table is accessed into.
pub fn resolve_vm_cluster(
    catalog: &Catalog,
    space: Option<&SpaceRef>,
    explicit_cluster_id: u64,
) -> AccessResult<ClusterInfo> {
    if explicit_cluster_id != 0 {
        return catalog
            .get_cluster(explicit_cluster_id)?
            .filter(|c| c.cluster_type == ClusterType::Vm)
            .ok_or_else(|| AccessError::not_found("vm cluster", explicit_cluster_id.to_string()));
    }

    if let Some(space) = space {
        match catalog.get_space_vm_info(&space.space_type, &space.space_id)? {
            Some(binding) => {
                return catalog.get_cluster(binding.vm_cluster_id)?.ok_or_else(|| {
                    AccessError::not_found(
                        "vm cluster",
                        format!(
                            "{} bound to {}/{}",
                            binding.vm_cluster_id, space.space_type, space.space_id
                        ),
                    )
                });
            }
            None => warn!(
                space_type = %space.space_type,
                space_id = %space.space_id,
                "space not bound to a vm cluster"
            ),
        }
    }

    find_unique_default(catalog, ClusterType::Vm)
}

/// Return the space's VM binding, binding it to the default VM cluster
/// if it has none.
pub fn ensure_space_vm_binding(
    catalog: &Catalog,
    space: &SpaceRef,
    retention: &str,
    now: u64,
) -> AccessResult<SpaceVmInfo> {
    if let Some(existing) = catalog.get_space_vm_info(&space.space_type, &space.space_id)? {
        return Ok(existing);
    }
    let cluster = find_unique_default(catalog, ClusterType::Vm)?;
    let fresh = SpaceVmInfo {
        space_type: space.space_type.clone(),
        space_id: space.space_id.clone(),
        vm_cluster_id: cluster.cluster_id,
        vm_retention_time: retention.to_string(),
        created_at: now,
    };
    let (stored, inserted) = catalog.insert_space_vm_info_if_absent(&fresh)?;
    if inserted {
        info!(
            space_type = %space.space_type,
            space_id = %space.space_id,
            vm_cluster_id = stored.vm_cluster_id,
            "space bound to default vm cluster"
        );
    }
    Ok(stored)
}

/// Where the data of `bk_data_id` comes from, and its container cluster if any.
pub fn classify_data_source(catalog: &Catalog, bk_data_id: u32) -> AccessResult<(VmDataType, String)> {
    let Some(cluster) = catalog.find_bcs_cluster_by_data_id(bk_data_id)? else {
        return Ok((VmDataType::UserCustom, String::new()));
    };
    let data_type = if cluster.k8s_metric_data_id == bk_data_id {
        VmDataType::BcsClusterK8s
    } else {
        VmDataType::BcsClusterCustom
    };
    Ok((data_type, cluster.cluster_id))
}
