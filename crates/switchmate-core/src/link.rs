//! Connection supervision for a real peripheral.
//!
//! [`LinkSupervisor`] owns the btleplug side of the lifecycle: it finds the
//! peripheral, connects, runs service discovery, forwards notifications and
//! watches the adapter for disconnects. Everything it learns is posted to
//! the driver's command queue as a lifecycle transition or a [`GattEvent`].
//! After a lost link it waits `reconnect_delay` and starts over, until
//! cancelled.
//!
//! [`Session`] wires a supervisor, a [`BtleplugClient`] and a driver task
//! together for the common case.

use std::pin::Pin;

use btleplug::api::{Central, CentralEvent, Peripheral as _, ValueNotification};
use btleplug::platform::{Adapter, Peripheral};
use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use switchmate_types::{ConnectionId, ConnectionState, GattStatus};

use crate::client::BtleplugClient;
use crate::config::{DriverOptions, LinkConfig};
use crate::driver::PeripheralDriver;
use crate::error::{Error, Result};
use crate::events::GattEvent;
use crate::runtime::{self, CommandSender, DriverHandle};
use crate::scan::{find_device_with_adapter, get_adapter};
use crate::traits::GattClient;

type EventStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// How a served connection ended.
enum LinkEnd {
    Lost,
    Cancelled,
}

/// Keeps one peripheral connected and reports to a driver.
pub struct LinkSupervisor {
    identifier: String,
    config: LinkConfig,
    client: BtleplugClient,
    commands: CommandSender,
    cancel: CancellationToken,
}

impl LinkSupervisor {
    /// Create a supervisor for the device matching `identifier`.
    pub fn new(
        identifier: impl Into<String>,
        config: LinkConfig,
        client: BtleplugClient,
        commands: CommandSender,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            config,
            client,
            commands,
            cancel,
        }
    }

    /// Run until cancelled.
    ///
    /// Only adapter-level failures end the loop early. Everything else is
    /// logged and retried after `reconnect_delay`.
    #[tracing::instrument(level = "info", skip_all, fields(device = %self.identifier))]
    pub async fn run(self) -> Result<()> {
        let adapter = get_adapter().await?;
        let mut conn_id = self.client.connection_id();

        while !self.cancel.is_cancelled() {
            conn_id = conn_id.next();
            match self.connect_and_serve(&adapter, conn_id).await {
                Ok(LinkEnd::Cancelled) => break,
                Ok(LinkEnd::Lost) => {
                    warn!("Link lost, reconnecting in {:?}", self.config.reconnect_delay);
                }
                Err(e) => {
                    warn!(error = %e, "Connection attempt failed, retrying in {:?}", self.config.reconnect_delay);
                }
            }

            self.post_state(ConnectionState::Disconnected);
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }

        self.client.detach();
        info!("Link supervisor stopped");
        Ok(())
    }

    async fn connect_and_serve(&self, adapter: &Adapter, conn_id: ConnectionId) -> Result<LinkEnd> {
        self.post_state(ConnectionState::Connecting);

        let adapter_events = adapter.events().await?;
        let peripheral =
            find_device_with_adapter(adapter, &self.identifier, self.config.scan_duration).await?;

        info!(%conn_id, "Connecting to device...");
        let connected = timeout(self.config.connection_timeout, peripheral.connect()).await;
        let status = match &connected {
            Ok(Ok(())) => GattStatus::Ok,
            Ok(Err(_)) => GattStatus::Failed,
            Err(_) => GattStatus::Timeout,
        };
        if !status.is_ok() {
            self.post(GattEvent::ConnectComplete { conn_id, status });
        }
        connected.map_err(|_| Error::timeout("connect to device", self.config.connection_timeout))??;

        self.client.attach(peripheral.clone(), conn_id);
        self.post(GattEvent::ConnectComplete {
            conn_id,
            status: GattStatus::Ok,
        });

        match self.discover(&peripheral).await {
            Ok(notifications) => {
                self.post(GattEvent::DiscoveryComplete { conn_id });
                let end = self
                    .serve(&peripheral, conn_id, notifications, adapter_events)
                    .await;
                self.teardown(&peripheral, conn_id).await;
                Ok(end)
            }
            Err(e) => {
                self.teardown(&peripheral, conn_id).await;
                Err(e)
            }
        }
    }

    async fn discover(&self, peripheral: &Peripheral) -> Result<EventStream<ValueNotification>> {
        self.post_state(ConnectionState::Discovering);

        info!("Discovering services...");
        timeout(self.config.discovery_timeout, peripheral.discover_services())
            .await
            .map_err(|_| Error::timeout("discover services", self.config.discovery_timeout))??;

        let count = self.client.refresh_characteristics();
        debug!("Found {} characteristics", count);

        Ok(peripheral.notifications().await?)
    }

    async fn serve(
        &self,
        peripheral: &Peripheral,
        conn_id: ConnectionId,
        mut notifications: EventStream<ValueNotification>,
        mut adapter_events: EventStream<CentralEvent>,
    ) -> LinkEnd {
        let id = peripheral.id();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return LinkEnd::Cancelled,

                notification = notifications.next() => {
                    let Some(notification) = notification else {
                        debug!("Notification stream ended");
                        return LinkEnd::Lost;
                    };
                    match self.client.handle_for_uuid(notification.uuid) {
                        Some(handle) => self.post(GattEvent::Notify {
                            conn_id,
                            handle,
                            value: notification.value,
                        }),
                        None => debug!(uuid = %notification.uuid, "Notification for unknown characteristic"),
                    }
                }

                event = adapter_events.next() => {
                    match event {
                        Some(CentralEvent::DeviceDisconnected(disconnected)) if disconnected == id => {
                            return LinkEnd::Lost;
                        }
                        Some(_) => {}
                        None => {
                            debug!("Adapter event stream ended");
                            return LinkEnd::Lost;
                        }
                    }
                }
            }
        }
    }

    async fn teardown(&self, peripheral: &Peripheral, conn_id: ConnectionId) {
        if let Err(e) = peripheral.disconnect().await {
            debug!(error = %e, "Disconnect failed");
        }
        self.client.detach();
        self.post(GattEvent::Disconnect { conn_id });
    }

    fn post(&self, event: GattEvent) {
        if self.commands.post_event(event).is_err() {
            debug!("Driver stopped, dropping event");
        }
    }

    fn post_state(&self, state: ConnectionState) {
        if self.commands.set_connection_state(state).is_err() {
            debug!("Driver stopped, dropping state change");
        }
    }
}

/// A running driver connected to a real peripheral.
pub struct Session {
    handle: DriverHandle,
    cancel: CancellationToken,
    driver_task: JoinHandle<PeripheralDriver<BtleplugClient>>,
    link_task: JoinHandle<Result<()>>,
}

impl Session {
    /// Start the driver and the link supervisor for `identifier`.
    ///
    /// Returns as soon as both tasks are running. Use
    /// [`crate::OutputReceivers::wait_for_connection`] to wait for the link.
    pub fn start(identifier: &str, options: &DriverOptions, config: LinkConfig) -> Result<Self> {
        options.validate()?;
        config.validate()?;

        let cancel = CancellationToken::new();
        let (sender, queue) = runtime::channel();
        let client = BtleplugClient::new(sender.clone(), config.operation_timeout);
        let driver = PeripheralDriver::new(client.clone(), options);
        let (handle, driver_task) = runtime::spawn(driver, sender.clone(), queue, cancel.child_token());

        let supervisor = LinkSupervisor::new(identifier, config, client, sender, cancel.child_token());
        let link_task = tokio::spawn(supervisor.run());

        Ok(Self {
            handle,
            cancel,
            driver_task,
            link_task,
        })
    }

    /// Handle to the driver task.
    pub fn handle(&self) -> &DriverHandle {
        &self.handle
    }

    /// Stop both tasks and wait for them.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        let link = self.link_task.await.map_err(|_| Error::Cancelled)?;
        self.driver_task.await.map_err(|_| Error::Cancelled)?;
        link
    }
}
