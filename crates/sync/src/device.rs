// crates/sync/src/device.rs
//! Stable per-install device identifier.
//!
//! Format `device_<unix-millis>_<32 hex chars>`, written once and kept in
//! two places: the routed primary key and an independent backup key. If
//! both are unreadable a lower-entropy timestamp-only id is minted so sync
//! can still namespace its calls.

use std::sync::Arc;

use mizan_storage::StorageRouter;
use rand::RngCore;
use tracing::{info, warn};

pub const DEVICE_ID_KEY: &str = "device_id";
pub const DEVICE_ID_BACKUP_KEY: &str = "device_id_backup";

pub struct DeviceIdentity {
    store: Arc<StorageRouter>,
}

impl DeviceIdentity {
    pub fn new(store: Arc<StorageRouter>) -> Self {
        Self { store }
    }

    /// Read the persisted id, or mint and persist a fresh one. Never
    /// fails: every storage failure degrades to the next fallback.
    pub async fn get_or_create(&self) -> String {
        match self.store.get(DEVICE_ID_KEY).await {
            Ok(Some(id)) if !id.trim().is_empty() => return id,
            Ok(_) => {}
            Err(e) => {
                warn!("primary device id read failed: {e}");
                if let Some(id) = self.read_backup().await {
                    return id;
                }
            }
        }

        let id = generate_device_id();
        match self.store.set(DEVICE_ID_KEY, &id).await {
            Ok(()) => {
                // Backup failure is logged only; the primary copy suffices.
                if let Err(e) = self.store.set(DEVICE_ID_BACKUP_KEY, &id).await {
                    warn!("device id backup write failed: {e}");
                }
                info!(device_id = %id, "created new device identity");
                id
            }
            Err(e) => {
                warn!("primary device id write failed: {e}");
                if let Some(existing) = self.read_backup().await {
                    return existing;
                }
                let degraded = format!("device_{}", chrono::Utc::now().timestamp_millis());
                warn!(device_id = %degraded, "falling back to degraded timestamp-only device id");
                if let Err(e) = self.store.set(DEVICE_ID_KEY, &degraded).await {
                    warn!("degraded device id write failed: {e}");
                }
                if let Err(e) = self.store.set(DEVICE_ID_BACKUP_KEY, &degraded).await {
                    warn!("degraded device id backup write failed: {e}");
                }
                degraded
            }
        }
    }

    async fn read_backup(&self) -> Option<String> {
        match self.store.get(DEVICE_ID_BACKUP_KEY).await {
            Ok(Some(id)) if !id.trim().is_empty() => {
                info!("recovered device id from backup location");
                Some(id)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("device id backup read failed: {e}");
                None
            }
        }
    }
}

fn generate_device_id() -> String {
    let mut entropy = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut entropy);
    format!(
        "device_{}_{}",
        chrono::Utc::now().timestamp_millis(),
        hex::encode(entropy)
    )
}
