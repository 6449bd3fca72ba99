// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The `kube-public/local-registry-hosting` ConfigMap

use crate::constants::{hosting, FIELD_MANAGER};
use crate::error::Result;
use crate::types::LocalRegistryHostingV1;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{
    api::{ObjectMeta, Patch, PatchParams},
    Api, Client,
};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Read the registry a cluster advertises, if any
pub async fn read_local_registry_hosting(client: &Client) -> Result<Option<LocalRegistryHostingV1>> {
    let config_maps: Api<ConfigMap> = Api::namespaced(client.clone(), hosting::NAMESPACE);

    let Some(config_map) = config_maps.get_opt(hosting::CONFIG_MAP).await? else {
        debug!("No {} ConfigMap", hosting::CONFIG_MAP);
        return Ok(None);
    };

    let Some(payload) = config_map
        .data
        .as_ref()
        .and_then(|d| d.get(hosting::DATA_KEY))
    else {
        return Ok(None);
    };

    Ok(Some(serde_yaml::from_str(payload)?))
}

/// Advertise a registry to in-cluster tooling (create or update)
#[instrument(skip(client, hosting_v1), fields(host = %hosting_v1.host))]
pub async fn publish_local_registry_hosting(
    client: &Client,
    hosting_v1: &LocalRegistryHostingV1,
) -> Result<()> {
    let config_maps: Api<ConfigMap> = Api::namespaced(client.clone(), hosting::NAMESPACE);
    let config_map = hosting_config_map(hosting_v1)?;

    let pp = PatchParams::apply(FIELD_MANAGER).force();
    config_maps
        .patch(hosting::CONFIG_MAP, &pp, &Patch::Apply(&config_map))
        .await?;

    info!("Published local registry hosting");
    Ok(())
}

fn hosting_config_map(hosting_v1: &LocalRegistryHostingV1) -> Result<ConfigMap> {
    Ok(ConfigMap {
        metadata: ObjectMeta {
            name: Some(hosting::CONFIG_MAP.to_string()),
            namespace: Some(hosting::NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            hosting::DATA_KEY.to_string(),
            serde_yaml::to_string(hosting_v1)?,
        )])),
        ..Default::default()
    })
}
