//! [`GattClient`] implementation on top of btleplug.
//!
//! btleplug exposes async request/response calls. The driver wants
//! fire-and-forget submissions whose outcome arrives later as an event, so
//! every submission here spawns a task that awaits the btleplug call (bounded
//! by the operation timeout) and posts the matching completion to the
//! driver's command queue.
//!
//! Characteristic handles are assigned per discovery: the n-th characteristic
//! reported by the peripheral gets handle n (1-based).

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use btleplug::api::{Characteristic as BleCharacteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use tracing::{debug, warn};
use uuid::Uuid;

use switchmate_types::{CharHandle, ConnectionId, GattStatus, WriteMode};

use crate::error::{Error, Result};
use crate::events::GattEvent;
use crate::runtime::CommandSender;
use crate::traits::GattClient;

#[derive(Debug, Default)]
struct Attachment {
    peripheral: Option<Peripheral>,
    conn_id: ConnectionId,
    characteristics: Vec<BleCharacteristic>,
}

#[derive(Debug)]
struct Inner {
    attachment: Mutex<Attachment>,
    events: CommandSender,
    operation_timeout: Duration,
}

/// btleplug-backed GATT client for one peripheral.
///
/// Cloning is cheap; clones share the same attachment.
#[derive(Debug, Clone)]
pub struct BtleplugClient {
    inner: Arc<Inner>,
}

impl BtleplugClient {
    /// Create a detached client that posts completions to `events`.
    pub fn new(events: CommandSender, operation_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                attachment: Mutex::new(Attachment::default()),
                events,
                operation_timeout,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Attachment> {
        self.inner
            .attachment
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Bind to a freshly connected peripheral under `conn_id`.
    pub fn attach(&self, peripheral: Peripheral, conn_id: ConnectionId) {
        let mut attachment = self.lock();
        attachment.peripheral = Some(peripheral);
        attachment.conn_id = conn_id;
        attachment.characteristics.clear();
    }

    /// Reload the characteristic table after service discovery.
    ///
    /// Returns the number of characteristics found.
    pub fn refresh_characteristics(&self) -> usize {
        let mut attachment = self.lock();
        let characteristics: Vec<_> = match &attachment.peripheral {
            Some(peripheral) => peripheral.characteristics().into_iter().collect(),
            None => Vec::new(),
        };
        attachment.characteristics = characteristics;
        attachment.characteristics.len()
    }

    /// Drop the peripheral. The connection id is kept so late completions
    /// can still be told apart from those of the next connection.
    pub fn detach(&self) {
        let mut attachment = self.lock();
        attachment.peripheral = None;
        attachment.characteristics.clear();
    }

    /// Whether a peripheral is attached.
    pub fn is_attached(&self) -> bool {
        self.lock().peripheral.is_some()
    }

    /// Handle of the characteristic with `uuid`, for routing notifications.
    pub fn handle_for_uuid(&self, uuid: Uuid) -> Option<CharHandle> {
        let attachment = self.lock();
        attachment
            .characteristics
            .iter()
            .position(|c| c.uuid == uuid)
            .and_then(handle_at)
    }

    fn lookup(&self, handle: CharHandle) -> Result<(Peripheral, BleCharacteristic, ConnectionId)> {
        let attachment = self.lock();
        let peripheral = attachment.peripheral.clone().ok_or(Error::NotConnected)?;
        let characteristic = usize::from(handle.raw())
            .checked_sub(1)
            .and_then(|i| attachment.characteristics.get(i))
            .cloned()
            .ok_or_else(|| {
                Error::characteristic_not_found(handle.to_string(), attachment.characteristics.len())
            })?;
        Ok((peripheral, characteristic, attachment.conn_id))
    }

    /// Spawn `operation` and post the event built from its outcome.
    fn submit<F, T>(
        &self,
        operation: &'static str,
        fut: F,
        complete: impl FnOnce(GattStatus, Option<T>) -> GattEvent + Send + 'static,
    ) -> Result<()>
    where
        F: std::future::Future<Output = std::result::Result<T, btleplug::Error>> + Send + 'static,
        T: Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::submit_failed(operation, e.to_string()))?;
        let events = self.inner.events.clone();
        let timeout = self.inner.operation_timeout;

        runtime.spawn(async move {
            let (status, value) = match tokio::time::timeout(timeout, fut).await {
                Ok(Ok(value)) => (GattStatus::Ok, Some(value)),
                Ok(Err(e)) => {
                    warn!(error = %e, "GATT {} failed", operation);
                    (GattStatus::Failed, None)
                }
                Err(_) => {
                    warn!(timeout = ?timeout, "GATT {} timed out", operation);
                    (GattStatus::Timeout, None)
                }
            };
            if events.post_event(complete(status, value)).is_err() {
                debug!("Driver stopped before {} completed", operation);
            }
        });
        Ok(())
    }
}

fn handle_at(index: usize) -> Option<CharHandle> {
    u16::try_from(index + 1).ok().and_then(CharHandle::new)
}

impl GattClient for BtleplugClient {
    fn connection_id(&self) -> ConnectionId {
        self.lock().conn_id
    }

    fn resolve_characteristic(&self, service: Uuid, characteristic: Uuid) -> Option<CharHandle> {
        let attachment = self.lock();
        attachment
            .characteristics
            .iter()
            .position(|c| c.service_uuid == service && c.uuid == characteristic)
            .and_then(handle_at)
    }

    fn submit_read(&self, handle: CharHandle) -> Result<()> {
        let (peripheral, characteristic, conn_id) = self.lookup(handle)?;
        debug!(%handle, uuid = %characteristic.uuid, "Submitting read");
        self.submit(
            "read",
            async move { peripheral.read(&characteristic).await },
            move |status, value| GattEvent::ReadComplete {
                conn_id,
                handle,
                status,
                value: value.unwrap_or_default(),
            },
        )
    }

    fn submit_write(&self, handle: CharHandle, value: &[u8], mode: WriteMode) -> Result<()> {
        let (peripheral, characteristic, conn_id) = self.lookup(handle)?;
        let write_type = match mode {
            WriteMode::WithResponse => WriteType::WithResponse,
            WriteMode::WithoutResponse => WriteType::WithoutResponse,
        };
        let value = value.to_vec();
        debug!(%handle, ?value, "Submitting write");
        self.submit(
            "write",
            async move { peripheral.write(&characteristic, &value, write_type).await },
            move |status, _: Option<()>| GattEvent::WriteComplete {
                conn_id,
                handle,
                status,
            },
        )
    }

    fn submit_subscribe(&self, handle: CharHandle) -> Result<()> {
        let (peripheral, characteristic, conn_id) = self.lookup(handle)?;
        debug!(%handle, uuid = %characteristic.uuid, "Submitting subscribe");
        self.submit(
            "subscribe",
            async move { peripheral.subscribe(&characteristic).await },
            move |status, _: Option<()>| GattEvent::SubscribeConfirmed {
                conn_id,
                handle,
                status,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime;

    #[test]
    fn test_handle_assignment_is_one_based() {
        assert_eq!(handle_at(0), CharHandle::new(1));
        assert_eq!(handle_at(41), CharHandle::new(42));
        assert_eq!(handle_at(usize::from(u16::MAX)), None);
    }

    #[test]
    fn test_detached_client_refuses_submissions() {
        let (sender, _queue) = runtime::channel();
        let client = BtleplugClient::new(sender, Duration::from_secs(1));
        let handle = CharHandle::new(1).unwrap();

        assert!(!client.is_attached());
        assert!(matches!(client.submit_read(handle), Err(Error::NotConnected)));
        assert!(matches!(
            client.submit_write(handle, &[1], WriteMode::WithResponse),
            Err(Error::NotConnected)
        ));
        assert!(matches!(client.submit_subscribe(handle), Err(Error::NotConnected)));
        assert_eq!(client.resolve_characteristic(Uuid::nil(), Uuid::nil()), None);
        assert_eq!(client.refresh_characteristics(), 0);
    }
}
