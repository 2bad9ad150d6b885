use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use engine_logging::{engine_error, engine_info};
use harvester_core::{ProgressUpdate, UrlGroup};
use tokio_util::sync::CancellationToken;

use crate::harvest::{Harvester, ProgressSink};
use crate::{EngineEvent, HarvestError, HarvestSettings};

/// Forwards a group's progress updates to the engine's event channel.
pub struct ChannelProgressSink {
    group: String,
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(group: impl Into<String>, tx: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            group: group.into(),
            tx,
        }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, update: ProgressUpdate) {
        let _ = self.tx.send(EngineEvent::Progress {
            group: self.group.clone(),
            update,
        });
    }
}

/// Background harvest of a sequence of groups.
///
/// Groups run one after another on a dedicated thread that owns the async
/// runtime; each group is a separate batch. Results arrive as
/// [`EngineEvent`]s, the last one always being `Finished`.
pub struct EngineHandle {
    event_rx: mpsc::Receiver<EngineEvent>,
    cancel: CancellationToken,
    worker: Option<thread::JoinHandle<()>>,
}

impl EngineHandle {
    pub fn start(settings: HarvestSettings, groups: Vec<UrlGroup>) -> Self {
        Self::start_with_cancel(settings, groups, CancellationToken::new())
    }

    /// Like [`EngineHandle::start`], but stopped by the caller's token as well.
    ///
    /// Cancelling `cancel` from anywhere, such as a signal handler, has the
    /// same effect as [`EngineHandle::stop`].
    pub fn start_with_cancel(
        settings: HarvestSettings,
        groups: Vec<UrlGroup>,
        cancel: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        let token = cancel.clone();

        let worker = thread::spawn(move || run_groups(settings, groups, event_tx, token));

        Self {
            event_rx,
            cancel,
            worker: Some(worker),
        }
    }

    /// Requests a cooperative stop. Safe to call any number of times.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            engine_info!("Stop processing requested");
            self.cancel.cancel();
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Blocks for the next event; `None` once the engine thread has exited.
    pub fn recv(&self) -> Option<EngineEvent> {
        self.event_rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Waits for the engine thread to exit.
    pub fn join(mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                engine_error!("Engine thread panicked");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        // Dropping the handle stops the engine.
        self.cancel.cancel();
    }
}

fn run_groups(
    settings: HarvestSettings,
    groups: Vec<UrlGroup>,
    event_tx: mpsc::Sender<EngineEvent>,
    cancel: CancellationToken,
) {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            engine_error!("Failed to start async runtime: {}", err);
            let _ = event_tx.send(EngineEvent::Failed {
                group: String::new(),
                error: HarvestError::Runtime(err.to_string()),
            });
            let _ = event_tx.send(EngineEvent::Finished { cancelled: false });
            return;
        }
    };

    let harvester = Harvester::new(settings);
    for group in groups {
        if cancel.is_cancelled() {
            break;
        }
        engine_info!("Starting group {} ({} urls)", group.name, group.urls.len());
        let sink = ChannelProgressSink::new(group.name.clone(), event_tx.clone());
        match runtime.block_on(harvester.harvest(&group.urls, &sink, &cancel)) {
            Ok(result) => {
                let _ = event_tx.send(EngineEvent::GroupCompleted {
                    group: group.name,
                    result,
                });
            }
            Err(error) => {
                engine_error!("Group {} could not start: {}", group.name, error);
                let _ = event_tx.send(EngineEvent::Failed {
                    group: group.name,
                    error,
                });
                break;
            }
        }
    }

    let _ = event_tx.send(EngineEvent::Finished {
        cancelled: cancel.is_cancelled(),
    });
}
