// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! NamespaceSet CRD discovery

use crate::constants::crd::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::error::{OperatorError, Result};
use crate::types::NamespaceSet;
use kube::{discovery::Discovery, Client, CustomResourceExt, Resource};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Block until the API server serves NamespaceSet.
///
/// Polls discovery with a doubling interval, capped at
/// `POLL_MAX_INTERVAL_SECS`. Returns `ShuttingDown` if `shutdown` fires first.
pub async fn wait_for_namespace_set_crd(
    client: &Client,
    shutdown: &CancellationToken,
) -> Result<()> {
    let crd_name = NamespaceSet::crd_name();
    let mut interval = Duration::from_secs(POLL_INTERVAL_SECS);

    loop {
        match namespace_set_served(client).await {
            Ok(true) => {
                info!("CRD {} is available", crd_name);
                return Ok(());
            }
            Ok(false) => info!(
                "CRD {} not installed yet, checking again in {}s",
                crd_name,
                interval.as_secs()
            ),
            Err(e) => warn!(
                "Discovery failed while looking for CRD {}: {}, retrying in {}s",
                crd_name,
                e,
                interval.as_secs()
            ),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.cancelled() => {
                debug!("Stopped waiting for CRD {}", crd_name);
                return Err(OperatorError::ShuttingDown);
            }
        }
        interval = next_interval(interval);
    }
}

fn next_interval(current: Duration) -> Duration {
    (current * 2).min(Duration::from_secs(POLL_MAX_INTERVAL_SECS))
}

/// Whether discovery lists NamespaceSet at its declared group and version
async fn namespace_set_served(client: &Client) -> Result<bool> {
    let group = NamespaceSet::group(&());
    let discovery = Discovery::new(client.clone())
        .filter(&[group.as_ref()])
        .run()
        .await?;

    let kind = NamespaceSet::kind(&());
    let version = NamespaceSet::version(&());
    Ok(discovery
        .get(&group)
        .and_then(|g| g.recommended_kind(&kind))
        .is_some_and(|(ar, _)| ar.version == version))
}
