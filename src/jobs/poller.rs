use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument, trace};
use tvsurf::models::{DownloadProgressWithName, Monitor};

pub const DOWNLOAD_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(10);

const CHANNEL_CAPACITY: usize = 16;

#[async_trait]
pub trait Poller: Send + 'static {
    type Snapshot: Send;

    fn name(&self) -> &'static str;

    async fn poll(&mut self) -> Result<Self::Snapshot>;
    async fn handle(&mut self, snapshot: Self::Snapshot) -> Result<()>;
}

pub fn start_with_period(
    poller: impl Poller,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    start_with_interval(poller, interval(period), cancel)
}

pub fn start_with_interval(
    poller: impl Poller,
    mut interval: Interval,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::task::spawn(async move {
        let mut poller = poller;
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(err) = execute(&mut poller).await {
                        error!("failed to poll {}: {err}", poller.name());
                    }
                }
            }
        }
        trace!("stopped polling {}", poller.name());
    })
}

#[instrument(skip(poller), fields(poller = poller.name()))]
async fn execute(poller: &mut impl Poller) -> Result<()> {
    trace!("polling");
    let snapshot = poller.poll().await?;
    poller.handle(snapshot).await
}

/// Broadcasts the backend download list.
#[derive(Debug)]
pub struct DownloadProgressPoller {
    client: tvsurf::Client,
    sender: Sender<Vec<DownloadProgressWithName>>,
}

impl DownloadProgressPoller {
    #[must_use]
    pub fn new(client: tvsurf::Client) -> (Self, Receiver<Vec<DownloadProgressWithName>>) {
        let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
        (Self { client, sender }, receiver)
    }
}

#[async_trait]
impl Poller for DownloadProgressPoller {
    type Snapshot = Vec<DownloadProgressWithName>;

    fn name(&self) -> &'static str {
        "download progress"
    }

    async fn poll(&mut self) -> Result<Self::Snapshot> {
        Ok(tvsurf::download::progress(&self.client).await?)
    }

    async fn handle(&mut self, snapshot: Self::Snapshot) -> Result<()> {
        let _ = self.sender.send(snapshot);
        Ok(())
    }
}

/// Broadcasts the active download and error counters.
#[derive(Debug)]
pub struct MonitorPoller {
    client: tvsurf::Client,
    sender: Sender<Monitor>,
}

impl MonitorPoller {
    #[must_use]
    pub fn new(client: tvsurf::Client) -> (Self, Receiver<Monitor>) {
        let (sender, receiver) = broadcast::channel(CHANNEL_CAPACITY);
        (Self { client, sender }, receiver)
    }
}

#[async_trait]
impl Poller for MonitorPoller {
    type Snapshot = Monitor;

    fn name(&self) -> &'static str {
        "monitor"
    }

    async fn poll(&mut self) -> Result<Self::Snapshot> {
        Ok(tvsurf::download::monitor(&self.client).await?)
    }

    async fn handle(&mut self, snapshot: Self::Snapshot) -> Result<()> {
        let _ = self.sender.send(snapshot);
        Ok(())
    }
}

/// Polls download progress every second until `cancel` fires.
#[must_use]
pub fn start_download_progress(
    client: tvsurf::Client,
    cancel: CancellationToken,
) -> (JoinHandle<()>, Receiver<Vec<DownloadProgressWithName>>) {
    let (poller, receiver) = DownloadProgressPoller::new(client);
    let handle = start_with_period(poller, DOWNLOAD_PROGRESS_INTERVAL, cancel);
    (handle, receiver)
}

/// Polls the monitor counters every ten seconds until `cancel` fires.
#[must_use]
pub fn start_monitor(
    client: tvsurf::Client,
    cancel: CancellationToken,
) -> (JoinHandle<()>, Receiver<Monitor>) {
    let (poller, receiver) = MonitorPoller::new(client);
    let handle = start_with_period(poller, MONITOR_INTERVAL, cancel);
    (handle, receiver)
}
