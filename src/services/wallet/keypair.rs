//! Wallet backed by a local keypair file
//!
//! Used by the `pay` command. Signing can require an explicit "y" on stdin,
//! which plays the role of the approval popup of a browser wallet.

use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{read_keypair_file, Keypair, Signer},
    transaction::Transaction,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, instrument};

use crate::core::error::AppError;
use crate::core::result::AppResult;
use crate::core::types::abbreviate;
use super::{WalletError, WalletProvider};

/// How signing requests are approved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    /// Sign without asking
    Automatic,
    /// Ask on stdin before every signature
    Prompt,
}

/// Wallet provider over an in-memory keypair
pub struct KeypairWallet {
    keypair: Keypair,
    approval: Approval,
    connected: AtomicBool,
}

impl std::fmt::Debug for KeypairWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeypairWallet")
            .field("pubkey", &self.keypair.pubkey())
            .field("approval", &self.approval)
            .finish()
    }
}

impl KeypairWallet {
    pub fn new(keypair: Keypair, approval: Approval) -> Self {
        Self {
            keypair,
            approval,
            connected: AtomicBool::new(false),
        }
    }

    /// Load a keypair from a Solana CLI JSON file
    pub fn from_file<P: AsRef<Path>>(path: P, approval: Approval) -> AppResult<Self> {
        let path = path.as_ref();
        let keypair = read_keypair_file(path).map_err(|e| AppError::Wallet {
            message: format!("Failed to read keypair {}: {}", path.display(), e),
            address: None,
        })?;

        debug!("🔑 Loaded keypair {}", keypair.pubkey());
        Ok(Self::new(keypair, approval))
    }

    async fn approve(&self, transaction: &Transaction) -> Result<bool, WalletError> {
        if self.approval == Approval::Automatic {
            return Ok(true);
        }

        let question = format!(
            "Sign transaction from {} with {} instruction(s)?",
            abbreviate(&self.keypair.pubkey().to_string()),
            transaction.message.instructions.len(),
        );

        let mut stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        confirm(&mut stdin, &mut stdout, &question)
            .await
            .map_err(|e| WalletError::Failed(format!("approval prompt failed: {}", e)))
    }
}

/// Ask a yes/no question; anything but `y`/`yes` (including EOF) is a no
pub(crate) async fn confirm<R, W>(reader: &mut R, writer: &mut W, question: &str) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_all(format!("{} [y/N] ", question).as_bytes()).await?;
    writer.flush().await?;

    let mut line = String::new();
    reader.read_line(&mut line).await?;

    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

#[async_trait]
impl WalletProvider for KeypairWallet {
    async fn connect(&self) -> Result<Pubkey, WalletError> {
        self.connected.store(true, Ordering::SeqCst);
        info!("👛 Wallet connected: {}", self.keypair.pubkey());
        Ok(self.keypair.pubkey())
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn public_key(&self) -> Option<Pubkey> {
        self.is_connected().then(|| self.keypair.pubkey())
    }

    #[instrument(skip(self, transaction))]
    async fn sign_transaction(&self, mut transaction: Transaction) -> Result<Transaction, WalletError> {
        if !self.is_connected() {
            return Err(WalletError::Failed("wallet is not connected".to_string()));
        }

        if !self.approve(&transaction).await? {
            return Err(WalletError::Rejected);
        }

        let blockhash = transaction.message.recent_blockhash;
        transaction
            .try_sign(&[&self.keypair], blockhash)
            .map_err(|e| WalletError::Failed(e.to_string()))?;

        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{hash::Hash, message::Message, signature::write_keypair_file, system_instruction};
    use tempfile::TempDir;

    fn transfer(from: &Pubkey) -> Transaction {
        let to = Pubkey::new_unique();
        let ix = system_instruction::transfer(from, &to, 100_000_000);
        let message = Message::new_with_blockhash(&[ix], Some(from), &Hash::new_unique());
        Transaction::new_unsigned(message)
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let wallet = KeypairWallet::new(Keypair::new(), Approval::Automatic);
        assert!(!wallet.is_connected());
        assert!(wallet.public_key().is_none());

        let address = wallet.connect().await.unwrap();
        assert!(wallet.is_connected());
        assert_eq!(wallet.public_key(), Some(address));

        wallet.disconnect().await.unwrap();
        assert!(wallet.public_key().is_none());
    }

    #[tokio::test]
    async fn test_sign_requires_connection() {
        let wallet = KeypairWallet::new(Keypair::new(), Approval::Automatic);
        let tx = transfer(&wallet.keypair.pubkey());

        assert_eq!(
            wallet.sign_transaction(tx).await.unwrap_err(),
            WalletError::Failed("wallet is not connected".to_string())
        );
    }

    #[tokio::test]
    async fn test_automatic_signing_produces_valid_signature() {
        let wallet = KeypairWallet::new(Keypair::new(), Approval::Automatic);
        let payer = wallet.connect().await.unwrap();

        let signed = wallet.sign_transaction(transfer(&payer)).await.unwrap();
        assert!(signed.is_signed());
        assert!(signed.verify().is_ok());
    }

    #[tokio::test]
    async fn test_confirm_prompt_answers() {
        let mut out = Vec::new();

        let mut yes: &[u8] = b"yes\n";
        assert!(confirm(&mut yes, &mut out, "Pay?").await.unwrap());

        let mut y_upper: &[u8] = b"  Y \n";
        assert!(confirm(&mut y_upper, &mut out, "Pay?").await.unwrap());

        let mut no: &[u8] = b"\n";
        assert!(!confirm(&mut no, &mut out, "Pay?").await.unwrap());

        let mut eof: &[u8] = b"";
        assert!(!confirm(&mut eof, &mut out, "Pay?").await.unwrap());

        assert!(String::from_utf8(out).unwrap().starts_with("Pay? [y/N] "));
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("id.json");
        let keypair = Keypair::new();
        write_keypair_file(&keypair, &path).unwrap();

        let wallet = KeypairWallet::from_file(&path, Approval::Prompt).unwrap();
        assert_eq!(wallet.keypair.pubkey(), keypair.pubkey());

        let missing = KeypairWallet::from_file(dir.path().join("absent.json"), Approval::Prompt);
        assert!(matches!(missing, Err(AppError::Wallet { .. })));
    }
}
