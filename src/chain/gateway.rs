//! EVM gateway submitting peg-out deposits to the bridge contract

use super::{classify_submission_error, ChainGateway, DepositCall};
use crate::config::ChainConfig;
use crate::error::GatewayError;

use async_trait::async_trait;
use ethers::abi::{encode, Token};
use ethers::middleware::signer::SignerMiddlewareError;
use ethers::prelude::*;
use sha3::{Digest, Keccak256};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Bridge contract entry point for peg-out deposits
pub const DEPOSIT_PEGOUT_SIGNATURE: &str = "depositPegout(bytes32,string,bytes)";

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Signs with a local key and submits over HTTP JSON-RPC
pub struct EvmChainGateway {
    client: SignerClient,
    contract_address: Address,
    submit_timeout: Duration,
}

impl EvmChainGateway {
    pub fn new(config: &ChainConfig, submit_timeout: Duration) -> Result<Self, GatewayError> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| GatewayError::Rpc(format!("invalid rpc url {}: {}", config.rpc_url, e)))?
            .interval(Duration::from_millis(500));

        let wallet = load_wallet(&config.private_key_env)?.with_chain_id(config.chain_id);

        let contract_address: Address = config.bridge_contract_address.parse().map_err(|e| {
            GatewayError::InvalidCall(format!("invalid bridge contract address: {}", e))
        })?;

        info!(
            "Chain gateway for chain {} using wallet {:?}",
            config.chain_id,
            wallet.address()
        );

        Ok(Self {
            client: SignerMiddleware::new(provider, wallet),
            contract_address,
            submit_timeout,
        })
    }

    pub fn wallet_address(&self) -> Address {
        self.client.address()
    }
}

/// Load the signing key from the environment variable named in config
fn load_wallet(private_key_env: &str) -> Result<LocalWallet, GatewayError> {
    let key = std::env::var(private_key_env).map_err(|_| {
        GatewayError::SigningRejected(format!(
            "no wallet configured, set {}",
            private_key_env
        ))
    })?;

    key.trim_start_matches("0x")
        .parse::<LocalWallet>()
        .map_err(|e| GatewayError::SigningRejected(format!("invalid private key: {}", e)))
}

fn function_selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// ABI-encode `depositPegout(quoteHash, destination, signature)`
pub fn deposit_calldata(call: &DepositCall) -> Result<Vec<u8>, GatewayError> {
    let quote_hash = hex::decode(call.quote_id.0.trim_start_matches("0x"))
        .map_err(|e| GatewayError::InvalidCall(format!("quote id is not hex: {}", e)))?;
    if quote_hash.len() != 32 {
        return Err(GatewayError::InvalidCall(format!(
            "quote hash must be 32 bytes, got {}",
            quote_hash.len()
        )));
    }

    let signature = call
        .signature
        .to_bytes()
        .map_err(|e| GatewayError::InvalidCall(format!("signature is not hex: {}", e)))?;

    let mut data = function_selector(DEPOSIT_PEGOUT_SIGNATURE).to_vec();
    data.extend(encode(&[
        Token::FixedBytes(quote_hash),
        Token::String(call.destination.clone()),
        Token::Bytes(signature),
    ]));
    Ok(data)
}

#[async_trait]
impl ChainGateway for EvmChainGateway {
    async fn submit_deposit(&self, call: DepositCall) -> Result<String, GatewayError> {
        let data = deposit_calldata(&call)?;

        let tx = TransactionRequest::new()
            .to(self.contract_address)
            .value(U256::from(call.value))
            .data(data);

        debug!(
            "Submitting depositPegout for quote {} with value {}",
            call.quote_id, call.value
        );

        match timeout(self.submit_timeout, self.client.send_transaction(tx, None)).await {
            Ok(Ok(pending)) => {
                let tx_hash = format!("{:?}", pending.tx_hash());
                info!("Deposit for quote {} sent: {}", call.quote_id, tx_hash);
                Ok(tx_hash)
            }
            Ok(Err(SignerMiddlewareError::SignerError(e))) => {
                warn!("Wallet refused to sign deposit: {}", e);
                Err(GatewayError::SigningRejected(e.to_string()))
            }
            Ok(Err(e)) => Err(classify_submission_error(e.to_string())),
            Err(_) => Err(GatewayError::Timeout {
                operation: "deposit submission".to_string(),
            }),
        }
    }
}
