//! Serialized execution of a driver on a tokio task.
//!
//! The driver is single-owner state. This module gives it one home task and
//! funnels every trigger into it through a command queue: GATT events from
//! the backend, lifecycle transitions, user commands and poll ticks. No two
//! handlers ever run concurrently.
//!
//! # Example
//!
//! ```ignore
//! use switchmate_core::{runtime, DriverOptions, MockGattClient, PeripheralDriver};
//! use tokio_util::sync::CancellationToken;
//!
//! let (sender, queue) = runtime::channel();
//! let client = MockGattClient::new();
//! client.attach_responder(sender.clone());
//! let driver = PeripheralDriver::new(client.clone(), &DriverOptions::default());
//! let (handle, task) = runtime::spawn(driver, sender, queue, CancellationToken::new());
//!
//! client.connect();
//! handle.set_state(true).await?;
//! ```

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use switchmate_types::ConnectionState;

use crate::config::MIN_UPDATE_INTERVAL;
use crate::driver::{DriverStatus, PeripheralDriver};
use crate::error::{Error, Result};
use crate::events::GattEvent;
use crate::outputs::OutputReceivers;
use crate::traits::{GattClient, SwitchController};

/// A unit of work for the driver task.
#[derive(Debug)]
pub enum Command {
    /// Deliver an event from the BLE stack.
    Event(GattEvent),
    /// Record a lifecycle transition.
    SetConnectionState(ConnectionState),
    /// Run a poll now, outside the regular schedule.
    Poll,
    /// Request a relay change. The reply, if any, carries the submit result.
    SetState {
        on: bool,
        reply: Option<oneshot::Sender<Result<()>>>,
    },
    /// Request a status snapshot.
    Status(oneshot::Sender<DriverStatus>),
}

/// Sending side of the command queue.
///
/// Cheap to clone. Posting never blocks, so it can be used from synchronous
/// callbacks as well as from tasks.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<Command>,
}

/// Receiving side of the command queue, consumed by [`spawn`].
#[derive(Debug)]
pub struct CommandQueue {
    rx: mpsc::UnboundedReceiver<Command>,
}

/// Create a command queue.
pub fn channel() -> (CommandSender, CommandQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandSender { tx }, CommandQueue { rx })
}

impl CommandSender {
    /// Queue a command.
    ///
    /// Returns [`Error::Cancelled`] if the driver task has stopped.
    pub fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).map_err(|_| Error::Cancelled)
    }

    /// Queue a GATT event.
    pub fn post_event(&self, event: GattEvent) -> Result<()> {
        self.send(Command::Event(event))
    }

    /// Queue a lifecycle transition.
    pub fn set_connection_state(&self, state: ConnectionState) -> Result<()> {
        self.send(Command::SetConnectionState(state))
    }

    /// Queue an immediate poll.
    pub fn poll(&self) -> Result<()> {
        self.send(Command::Poll)
    }

    /// Whether the driver task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Client-side handle to a running driver task.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    commands: CommandSender,
    outputs: OutputReceivers,
    cancel: CancellationToken,
}

impl DriverHandle {
    /// Request a relay change and wait until it was handed to the stack.
    ///
    /// The published state changes only once the peripheral confirms.
    pub async fn set_state(&self, on: bool) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(Command::SetState {
            on,
            reply: Some(reply),
        })?;
        rx.await.map_err(|_| Error::Cancelled)?
    }

    /// Snapshot of the driver state.
    pub async fn status(&self) -> Result<DriverStatus> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(Command::Status(reply))?;
        rx.await.map_err(|_| Error::Cancelled)
    }

    /// Run a poll now.
    pub fn poll(&self) -> Result<()> {
        self.commands.poll()
    }

    /// Receivers for the published values.
    pub fn outputs(&self) -> OutputReceivers {
        self.outputs.clone()
    }

    /// The queue the backend posts events to.
    pub fn commands(&self) -> &CommandSender {
        &self.commands
    }

    /// Stop the driver task.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl SwitchController for DriverHandle {
    fn write_switch_state(&mut self, on: bool) -> Result<()> {
        self.commands.send(Command::SetState { on, reply: None })
    }
}

/// Move `driver` onto its own task.
///
/// The task polls every `driver.update_interval()`, starting one interval
/// after spawn, and runs until `cancel` fires. Intervals shorter than the
/// one [`DriverOptions::validate`](crate::DriverOptions::validate) accepts
/// are raised to that minimum. The driver is handed back
/// when the task ends.
pub fn spawn<C>(
    driver: PeripheralDriver<C>,
    commands: CommandSender,
    queue: CommandQueue,
    cancel: CancellationToken,
) -> (DriverHandle, JoinHandle<PeripheralDriver<C>>)
where
    C: GattClient + Send + 'static,
{
    let handle = DriverHandle {
        commands,
        outputs: driver.subscribe(),
        cancel: cancel.clone(),
    };
    let task = tokio::spawn(run(driver, queue, cancel));
    (handle, task)
}

async fn run<C: GattClient>(
    mut driver: PeripheralDriver<C>,
    mut queue: CommandQueue,
    cancel: CancellationToken,
) -> PeripheralDriver<C> {
    let mut period = driver.update_interval();
    if period < MIN_UPDATE_INTERVAL {
        warn!(
            device = %driver.name(),
            requested = ?period,
            "Update interval below {:?}, clamping",
            MIN_UPDATE_INTERVAL
        );
        period = MIN_UPDATE_INTERVAL;
    }
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(device = %driver.name(), interval = ?period, "Driver task started");

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(device = %driver.name(), "Driver task cancelled");
                break;
            }

            command = queue.rx.recv() => {
                match command {
                    Some(command) => apply(&mut driver, command),
                    None => {
                        debug!(device = %driver.name(), "Command queue closed");
                        break;
                    }
                }
            }

            _ = ticker.tick() => {
                driver.update();
            }
        }
    }

    info!(device = %driver.name(), "Driver task stopped");
    driver
}

fn apply<C: GattClient>(driver: &mut PeripheralDriver<C>, command: Command) {
    match command {
        Command::Event(event) => driver.handle_event(event),
        Command::SetConnectionState(state) => driver.set_connection_state(state),
        Command::Poll => driver.update(),
        Command::SetState { on, reply } => {
            let result = driver.set_state(on);
            match reply {
                Some(reply) => {
                    let _ = reply.send(result);
                }
                None => {
                    if let Err(e) = result {
                        warn!(device = %driver.name(), error = %e, "State command failed");
                    }
                }
            }
        }
        Command::Status(reply) => {
            let _ = reply.send(driver.status());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::DriverOptions;
    use crate::mock::MockGattClient;

    fn start(
        client: &MockGattClient,
        options: DriverOptions,
    ) -> (DriverHandle, JoinHandle<PeripheralDriver<MockGattClient>>) {
        let (sender, queue) = channel();
        client.attach_responder(sender.clone());
        let driver = PeripheralDriver::new(client.clone(), &options);
        spawn(driver, sender, queue, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_status_round_trip() {
        let client = MockGattClient::new();
        let (handle, task) = start(&client, DriverOptions::new("rt"));

        let status = handle.status().await.unwrap();
        assert_eq!(status.name, "rt");
        assert_eq!(status.connection_state, ConnectionState::Disconnected);

        handle.shutdown();
        let driver = task.await.unwrap();
        assert_eq!(driver.name(), "rt");
    }

    #[tokio::test]
    async fn test_set_state_before_connect_is_rejected() {
        let client = MockGattClient::new();
        let (handle, _task) = start(&client, DriverOptions::new("rt"));
        let result = handle.set_state(true).await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_polls_on_schedule() {
        let client = MockGattClient::builder().battery_level(77).build();
        let options = DriverOptions::new("rt").update_interval(Duration::from_secs(10));
        let (handle, _task) = start(&client, options);
        let mut outputs = handle.outputs();

        client.connect();
        outputs
            .wait_for_connection(ConnectionState::is_established)
            .await
            .unwrap();
        assert!(client.reads().is_empty());

        tokio::time::sleep(Duration::from_secs(11)).await;
        let status = handle.status().await.unwrap();
        assert_eq!(client.reads().len(), 2);
        assert_eq!(status.exposed_battery, Some(77));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_update_interval_is_clamped() {
        let client = MockGattClient::new();
        let options = DriverOptions::new("rt").update_interval(Duration::ZERO);
        let (handle, task) = start(&client, options);

        client.connect();
        let status = handle.status().await.unwrap();
        assert_eq!(status.name, "rt");

        tokio::time::sleep(MIN_UPDATE_INTERVAL + Duration::from_millis(100)).await;
        handle.status().await.unwrap();
        assert!(!task.is_finished());
        assert_eq!(client.reads().len(), 2);

        handle.shutdown();
        assert!(task.await.is_ok());
    }

    #[tokio::test]
    async fn test_commands_after_shutdown_fail() {
        let client = MockGattClient::new();
        let (handle, task) = start(&client, DriverOptions::new("rt"));
        handle.shutdown();
        task.await.unwrap();
        assert!(matches!(handle.status().await, Err(Error::Cancelled)));
    }
}
