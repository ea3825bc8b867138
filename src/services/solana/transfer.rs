//! SOL transfers found in landed transactions

use solana_sdk::{
    message::VersionedMessage,
    pubkey::Pubkey,
    system_instruction::SystemInstruction,
    system_program,
};

/// A system-program SOL transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub from: Pubkey,
    pub to: Pubkey,
    pub lamports: u64,
}

/// A transaction as recorded by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandedTransaction {
    pub transfers: Vec<Transfer>,
    /// Execution error, if the transaction failed
    pub error: Option<String>,
}

impl LandedTransaction {
    /// Whether the transaction moved exactly `lamports` from `from` to `to`
    pub fn pays(&self, from: &Pubkey, to: &Pubkey, lamports: u64) -> bool {
        self.error.is_none()
            && self.transfers
                .iter()
                .any(|t| t.from == *from && t.to == *to && t.lamports == lamports)
    }
}

/// Top-level system transfers of a message
///
/// Only statically listed accounts are resolved; instructions that reference
/// lookup-table accounts are skipped.
pub fn system_transfers(message: &VersionedMessage) -> Vec<Transfer> {
    let keys = message.static_account_keys();

    message
        .instructions()
        .iter()
        .filter_map(|ix| {
            if *keys.get(usize::from(ix.program_id_index))? != system_program::id() {
                return None;
            }

            let (instruction, _) = bincode::serde::decode_from_slice::<SystemInstruction, _>(
                &ix.data,
                bincode::config::legacy(),
            )
            .ok()?;
            let SystemInstruction::Transfer { lamports } = instruction else {
                return None;
            };

            let from = *keys.get(usize::from(*ix.accounts.first()?))?;
            let to = *keys.get(usize::from(*ix.accounts.get(1)?))?;
            Some(Transfer { from, to, lamports })
        })
        .collect()
}
