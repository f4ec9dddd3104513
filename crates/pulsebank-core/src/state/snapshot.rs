//! Persisted engine state.

use serde::{Deserialize, Serialize};

use crate::bank::{BankSlot, PatternBank, SlotSnapshot};
use crate::error::{Error, Result};
use crate::ioi::{IoiEntry, IoiTable, NUM_IOIS};
use crate::NUM_BANKS;

/// Everything needed to bring an engine back to where it was.
///
/// The live slot is stored with its unsaved edits, so a snapshot captures
/// what was being played.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Index of the live bank.
    pub live_bank: usize,
    /// All sixteen slots in bank order.
    pub banks: Vec<SlotSnapshot>,
    /// IOI factors and their probabilities.
    pub ioi: Vec<IoiEntry>,
}

impl EngineSnapshot {
    /// Capture a bank and IOI table.
    pub fn capture(bank: &PatternBank, ioi: &IoiTable) -> Self {
        let live = bank.live_index();
        Self {
            live_bank: live,
            banks: bank
                .slots()
                .iter()
                .enumerate()
                .map(|(i, slot)| {
                    if i == live {
                        bank.live().to_snapshot()
                    } else {
                        slot.to_snapshot()
                    }
                })
                .collect(),
            ioi: ioi.entries().to_vec(),
        }
    }

    /// Check the shape of a snapshot before it is applied.
    pub fn validate(&self) -> Result<()> {
        if self.banks.len() != NUM_BANKS {
            return Err(Error::InvalidSnapshot(format!(
                "expected {} banks, found {}",
                NUM_BANKS,
                self.banks.len()
            )));
        }
        if self.live_bank >= NUM_BANKS {
            return Err(Error::InvalidSnapshot(format!(
                "live bank {} out of range",
                self.live_bank
            )));
        }
        if self.ioi.len() > NUM_IOIS {
            return Err(Error::InvalidSnapshot(format!(
                "expected at most {} IOI entries, found {}",
                NUM_IOIS,
                self.ioi.len()
            )));
        }
        Ok(())
    }

    /// Rebuild the bank, with the live slot loaded.
    pub fn to_bank(&self) -> Result<PatternBank> {
        self.validate()?;
        let mut bank = PatternBank::new();
        for (i, slot) in self.banks.iter().enumerate() {
            bank.write_slot(i, BankSlot::from_snapshot(slot));
        }
        bank.load(self.live_bank);
        Ok(bank)
    }

    /// Rebuild the IOI table. Factors are matched to the nearest known one.
    pub fn to_ioi_table(&self) -> Result<IoiTable> {
        self.validate()?;
        let mut table = IoiTable::new();
        for entry in &self.ioi {
            table.set_probability(entry.factor, entry.probability);
        }
        Ok(table)
    }
}
