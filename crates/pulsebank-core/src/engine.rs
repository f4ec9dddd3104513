//! Single-threaded engine.
//!
//! [`Engine`] drives both sides of the sequencer from one thread: control
//! requests are resolved and applied directly, and blocks are rendered on
//! demand. Use [`Engine::into_split`] to hand the realtime side to an audio
//! thread.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::events::TriggerEvent;
use crate::runtime::{self, Controller, Monitor, RealtimeSequencer};
use crate::sequencer::Sequencer;
use crate::state::{ControlRequest, EngineSnapshot};
use crate::timing::TransportSnapshot;

/// Default capacity of the control-to-realtime queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// A sequencer plus the RNG used for pattern variations.
pub struct Engine {
    sequencer: Sequencer,
    mutation_rng: StdRng,
}

impl Engine {
    /// An engine whose generator and variations are seeded from `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            sequencer: Sequencer::new(seed, Arc::new(Monitor::new())),
            mutation_rng: StdRng::seed_from_u64(seed.wrapping_add(1)),
        }
    }

    /// An engine seeded from the OS.
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    /// Render one block. See [`Sequencer::process_block`].
    pub fn process_block(
        &mut self,
        transport: &TransportSnapshot,
        config: &EngineConfig,
        block_len: usize,
    ) -> &[TriggerEvent] {
        self.sequencer.process_block(transport, config, block_len)
    }

    /// Apply control requests in order.
    ///
    /// Bank switches are serviced as they are reached so that later
    /// requests in the same batch see the new live bank.
    pub fn on_control_tick<I>(&mut self, config: &EngineConfig, requests: I)
    where
        I: IntoIterator<Item = ControlRequest>,
    {
        self.sequencer.apply_config(&config.clamped());
        for request in requests {
            let update = request.resolve(self.sequencer.bank(), &mut self.mutation_rng);
            self.sequencer.apply(update);
            self.sequencer.service_pending_switch();
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.sequencer.snapshot()
    }

    pub fn restore(&mut self, snapshot: &EngineSnapshot) -> Result<()> {
        self.sequencer.restore(snapshot)
    }

    /// Step of the most recently processed sample.
    pub fn current_step(&self) -> Option<usize> {
        self.sequencer.current_step()
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn monitor(&self) -> Arc<Monitor> {
        Arc::clone(self.sequencer.monitor())
    }

    /// Split into a control side and a realtime side joined by a bounded
    /// queue of `capacity` updates.
    pub fn into_split(self, capacity: usize) -> (Controller, RealtimeSequencer) {
        log::debug!("Splitting engine, queue capacity {}", capacity);
        runtime::split(self.sequencer, self.mutation_rng, capacity)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::from_entropy()
    }
}
