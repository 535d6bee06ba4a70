//! Normalized event delivery from an evdev device node

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use evdev::Device;
use modmask_core::NormalizedEvent;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::tracker::PointerTracker;

/// How long to wait for udev to create a freshly built device node.
const DEVNODE_RETRIES: u32 = 20;
const DEVNODE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Background task that reads one device and forwards normalized events.
///
/// The task stops when the handle is dropped, when the receiver goes away,
/// or when the device stops delivering.
pub struct EvdevEventSource {
    task: JoinHandle<()>,
}

impl EvdevEventSource {
    /// Open `devnode` and start forwarding events into `sender`.
    ///
    /// With `grab` set the device is taken for exclusive access, so the
    /// desktop never sees the robot's clicks.
    pub fn spawn(
        devnode: &Path,
        mut tracker: PointerTracker,
        grab: bool,
        sender: UnboundedSender<NormalizedEvent>,
    ) -> Result<Self> {
        let mut device = Device::open(devnode)
            .with_context(|| format!("Failed to open {}", devnode.display()))?;

        if grab {
            device
                .grab()
                .with_context(|| format!("Failed to grab {}", devnode.display()))?;
        }

        let name = device.name().unwrap_or("Unknown").to_string();
        let mut stream = device.into_event_stream().with_context(|| {
            format!(
                "Failed to create event stream for device '{}' at {}",
                name,
                devnode.display()
            )
        })?;

        tracing::info!("Listening for pointer events on '{}' ({})", name, devnode.display());

        let task = tokio::spawn(async move {
            loop {
                let event = match stream.next_event().await {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!("Event stream for '{}' ended: {}", name, e);
                        break;
                    }
                };

                for normalized in tracker.process(&event) {
                    tracing::trace!("delivering {}", normalized);
                    if sender.send(normalized).is_err() {
                        tracing::debug!("Event receiver dropped, stopping source");
                        return;
                    }
                }
            }
        });

        Ok(Self { task })
    }

    /// Wait for a device node to appear, then [`spawn`](Self::spawn) on it.
    ///
    /// `find` is polled until it yields a path.
    pub async fn spawn_when_ready<F>(
        mut find: F,
        tracker: PointerTracker,
        grab: bool,
        sender: UnboundedSender<NormalizedEvent>,
    ) -> Result<Self>
    where
        F: FnMut() -> Result<Option<std::path::PathBuf>>,
    {
        for attempt in 1..=DEVNODE_RETRIES {
            if let Some(devnode) = find()? {
                // udev may still be fixing permissions on the node
                match Self::spawn(&devnode, tracker.clone(), grab, sender.clone()) {
                    Ok(source) => return Ok(source),
                    Err(e) if attempt < DEVNODE_RETRIES => {
                        tracing::debug!("Device node not ready ({:#}), retrying", e);
                    }
                    Err(e) => return Err(e),
                }
            }
            tokio::time::sleep(DEVNODE_RETRY_DELAY).await;
        }

        anyhow::bail!(
            "Device node did not appear after {:?}",
            DEVNODE_RETRY_DELAY * DEVNODE_RETRIES
        )
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for EvdevEventSource {
    fn drop(&mut self) {
        self.task.abort();
    }
}
