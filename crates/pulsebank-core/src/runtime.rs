//! Control/realtime split.
//!
//! The realtime side:
//! - Owns the authoritative [`Sequencer`]
//! - Drains pending [`LiveUpdate`]s at the start of every block
//! - Never blocks, never waits on the control side
//!
//! The control side keeps a mirror of the sequencer to resolve requests
//! (mutations in particular) and sends complete updates over a bounded
//! channel. It is also the only side that watches the bank parameter: a
//! move is sent as a [`LiveUpdate::SelectBank`] ahead of the tick's
//! requests, so both sides see the same bank when they apply them. The
//! realtime side publishes its step and live bank through the shared
//! [`Monitor`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use rand::rngs::StdRng;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::events::TriggerEvent;
use crate::sequencer::Sequencer;
use crate::state::{ControlRequest, EngineSnapshot, LiveUpdate};
use crate::timing::TransportSnapshot;

const NO_STEP: usize = usize::MAX;

/// Realtime state readable from any thread.
///
/// Values are eventually consistent: a reader may see the previous step
/// for the duration of one block.
#[derive(Debug)]
pub struct Monitor {
    current_step: AtomicUsize,
    live_bank: AtomicUsize,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Monitor {
    pub fn new() -> Self {
        Self {
            current_step: AtomicUsize::new(NO_STEP),
            live_bank: AtomicUsize::new(0),
        }
    }

    /// Step being played, `None` before playback started.
    pub fn current_step(&self) -> Option<usize> {
        match self.current_step.load(Ordering::Relaxed) {
            NO_STEP => None,
            step => Some(step),
        }
    }

    /// Index of the live bank.
    pub fn live_bank(&self) -> usize {
        self.live_bank.load(Ordering::Relaxed)
    }

    pub(crate) fn publish_step(&self, step: Option<usize>) {
        self.current_step
            .store(step.unwrap_or(NO_STEP), Ordering::Relaxed);
    }

    pub(crate) fn publish_bank(&self, bank: usize) {
        self.live_bank.store(bank, Ordering::Relaxed);
    }
}

/// Create a connected control/realtime pair around `sequencer`.
pub(crate) fn split(
    mut sequencer: Sequencer,
    mutation_rng: StdRng,
    capacity: usize,
) -> (Controller, RealtimeSequencer) {
    let (update_tx, update_rx) = bounded(capacity.max(1));
    let monitor = Arc::clone(sequencer.monitor());

    // the mirror publishes into its own monitor so observers only ever see
    // the realtime side
    let mut mirror = sequencer.clone();
    mirror.set_monitor(Arc::new(Monitor::new()));
    sequencer.set_follows_parameter(false);

    let controller = Controller {
        mirror,
        update_tx,
        rng: mutation_rng,
        monitor,
    };
    let realtime = RealtimeSequencer {
        sequencer,
        update_rx,
    };
    (controller, realtime)
}

/// Control side of a split engine.
pub struct Controller {
    mirror: Sequencer,
    update_tx: Sender<LiveUpdate>,
    rng: StdRng,
    monitor: Arc<Monitor>,
}

impl Controller {
    /// Resolve and send a batch of requests.
    ///
    /// A move of the bank parameter is sent first, so the requests apply to
    /// the bank that is about to be live on both sides. Blocks while the
    /// channel is full.
    pub fn on_control_tick<I>(&mut self, config: &EngineConfig, requests: I) -> Result<()>
    where
        I: IntoIterator<Item = ControlRequest>,
    {
        let config = config.clamped();
        self.mirror.apply_config(&config);

        if let Some(update) = self.mirror.bank_parameter_update(&config) {
            self.send(update)?;
        }
        for request in requests {
            let update = request.resolve(self.mirror.bank(), &mut self.rng);
            self.send(update)?;
        }
        Ok(())
    }

    fn send(&mut self, update: LiveUpdate) -> Result<()> {
        self.mirror.apply(update);
        self.mirror.service_pending_switch();
        self.update_tx
            .send(update)
            .map_err(|_| Error::Disconnected)
    }

    /// Send a request without blocking. Returns `false` when the channel is
    /// full; the mirror is then left untouched.
    pub fn try_request(&mut self, request: ControlRequest) -> Result<bool> {
        let mut mirror = self.mirror.clone();
        let update = request.resolve(mirror.bank(), &mut self.rng);
        match self.update_tx.try_send(update) {
            Ok(()) => {
                mirror.apply(update);
                mirror.service_pending_switch();
                self.mirror = mirror;
                Ok(true)
            }
            Err(TrySendError::Full(_)) => {
                log::warn!("Update queue full, dropping request");
                Ok(false)
            }
            Err(TrySendError::Disconnected(_)) => Err(Error::Disconnected),
        }
    }

    /// Step the realtime side is playing.
    pub fn current_step(&self) -> Option<usize> {
        self.monitor.current_step()
    }

    /// Bank the realtime side is playing.
    pub fn live_bank(&self) -> usize {
        self.monitor.live_bank()
    }

    pub fn monitor(&self) -> Arc<Monitor> {
        Arc::clone(&self.monitor)
    }

    /// Snapshot of the control side's view.
    pub fn snapshot(&self) -> EngineSnapshot {
        self.mirror.snapshot()
    }
}

/// Realtime side of a split engine.
///
/// Ignores `bank_index` in the config it renders with; the [`Controller`]
/// turns moves of the parameter into queued updates.
pub struct RealtimeSequencer {
    sequencer: Sequencer,
    update_rx: Receiver<LiveUpdate>,
}

impl RealtimeSequencer {
    /// Apply queued updates, then render one block.
    pub fn process_block(
        &mut self,
        transport: &TransportSnapshot,
        config: &EngineConfig,
        block_len: usize,
    ) -> &[TriggerEvent] {
        while let Ok(update) = self.update_rx.try_recv() {
            self.sequencer.apply(update);
            // keep switches ordered with the updates queued around them
            self.sequencer.service_pending_switch();
        }
        self.sequencer.process_block(transport, config, block_len)
    }

    pub fn current_step(&self) -> Option<usize> {
        self.sequencer.current_step()
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }
}
