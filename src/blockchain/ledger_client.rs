// src/blockchain/ledger_client.rs
//! EVM ledger client.
//!
//! Provides a signing JSON-RPC connection (Ganache, Hardhat node or any EVM
//! chain) used both by the ledger-backed store and by contract deployment.

use crate::error::CertError;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers_contract::Contract;
use ethers_core::abi::Abi;
use ethers_core::types::Address;
use std::sync::Arc;

/// Provider wrapped with a local signing wallet.
pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Ledger client for managing the wallet and contract handles.
///
/// This client provides:
/// - Local private-key signing with the chain ID fetched at connect time
/// - Contract handles bound to the signing middleware
/// - Network status queries
#[derive(Clone)]
pub struct LedgerClient {
    /// JSON-RPC provider
    provider: Provider<Http>,
    /// Provider + signer, shared by every contract handle
    signer: Arc<SignerClient>,
}

impl LedgerClient {
    /// Connects to an RPC endpoint and loads the signing key.
    ///
    /// # Arguments
    /// * `rpc_url` - JSON-RPC endpoint URL (e.g. `http://127.0.0.1:7545`)
    /// * `private_key` - Hex-encoded private key (with or without 0x prefix)
    ///
    /// # Errors
    /// Returns error if:
    /// - The URL is malformed (`CertError::Config`)
    /// - The private key is invalid (`CertError::Config`)
    /// - The chain ID cannot be retrieved (`CertError::Upstream`)
    pub async fn connect(rpc_url: &str, private_key: &str) -> Result<Self, CertError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| CertError::Config(format!("invalid RPC URL {}: {}", rpc_url, e)))?;

        let wallet: LocalWallet = private_key
            .trim()
            .trim_start_matches("0x")
            .parse()
            .map_err(|e| CertError::Config(format!("invalid private key: {}", e)))?;

        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| CertError::Upstream(format!("failed to reach {}: {}", rpc_url, e)))?
            .as_u64();

        let signer = Arc::new(SignerMiddleware::new(
            provider.clone(),
            wallet.with_chain_id(chain_id),
        ));

        Ok(Self { provider, signer })
    }

    /// Address transactions are sent from.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn signer(&self) -> Arc<SignerClient> {
        self.signer.clone()
    }

    /// Binds a contract handle at `address` to the signing middleware.
    pub fn contract(&self, address: Address, abi: Abi) -> Contract<SignerClient> {
        Contract::new(address, abi, self.signer.clone())
    }

    /// Returns `(chain_id, latest_block)`.
    pub async fn chain_status(&self) -> Result<(u64, u64), CertError> {
        let chain_id = self
            .provider
            .get_chainid()
            .await
            .map_err(|e| CertError::Upstream(e.to_string()))?;
        let block = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| CertError::Upstream(e.to_string()))?;
        Ok((chain_id.as_u64(), block.as_u64()))
    }
}
