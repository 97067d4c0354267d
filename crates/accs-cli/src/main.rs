mod fields;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use accs_bitcoin_chain::{BitcoinChain, EsploraChain};
use accs_bitshares_chain::{BitsharesChain, WsBitsharesChain};
use accs_orchestrator::{EngineConfig, SwapOrchestrator};

use crate::fields::{exit_code_for, SwapFields};

#[tokio::main]
async fn main() -> ExitCode {
    let fields = SwapFields::parse();
    let engine_config = EngineConfig::load_or_default(&fields.config_path);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&engine_config.log_level))
        .init();

    let network = fields.network();
    let bitcoin_endpoint = if network == bitcoin::Network::Bitcoin {
        &engine_config.bitcoin_mainnet_endpoint
    } else {
        &engine_config.bitcoin_testnet_endpoint
    };
    let bitshares_endpoint = if network == bitcoin::Network::Bitcoin {
        &engine_config.bitshares_mainnet_endpoint
    } else {
        &engine_config.bitshares_testnet_endpoint
    };

    let config = match fields.into_swap_config(&engine_config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(%e, "invalid swap fields");
            return ExitCode::from(1);
        }
    };

    let bitcoin_chain: Arc<dyn BitcoinChain> = match EsploraChain::new(bitcoin_endpoint.clone()) {
        Ok(chain) => Arc::new(chain),
        Err(e) => {
            tracing::error!(%e, "failed to initialize bitcoin chain adapter");
            return ExitCode::from(2);
        }
    };
    let bitshares_chain: Arc<dyn BitsharesChain> = match WsBitsharesChain::connect(bitshares_endpoint).await
    {
        Ok(chain) => Arc::new(chain),
        Err(e) => {
            tracing::error!(%e, "failed to connect to bitshares endpoint");
            return ExitCode::from(2);
        }
    };

    let mut orchestrator = SwapOrchestrator::new(config, bitcoin_chain, bitshares_chain);
    let result = orchestrator.run().await;
    match &result {
        Ok(outcome) => tracing::info!(?outcome, "swap finished"),
        Err(e) => tracing::error!(%e, "swap failed"),
    }
    ExitCode::from(exit_code_for(&result) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn swap_fields_parses_a_full_proposer_btc_invocation() {
        let args = [
            "accs",
            "--mode",
            "proposer",
            "--network-to-trade",
            "testnet",
            "--currency-to-give",
            "btc",
            "--amount-to-send",
            "1.0",
            "--amount-to-receive",
            "50000",
            "--bitcoin-private-key",
            "cN9spWsvaxA8taS7DFMxnk1yJD2gaF2PX1npuTpy3vuZFJdwavaw",
            "--bitshares-private-key",
            "5Jtest",
            "--counterparty-bitcoin-public-key",
            "020c04eb8cb87485501e30b656f37439ea7866d7c58b3c38161e5793b68e712356",
            "--counterparty-bitshares-account-name",
            "accepter-account",
            "--bitcoin-tx-id",
            "1111111111111111111111111111111111111111111111111111111111111111",
            "--asset",
            "1.3.0",
            "--priority",
            "1",
            "--secret",
            "1111111111111111111111111111111111111111111111111111111111111111",
        ];
        let fields = SwapFields::try_parse_from(args).unwrap();
        assert!(matches!(fields.mode, fields::ModeArg::Proposer));
    }

    #[test]
    fn swap_fields_rejects_out_of_range_priority() {
        let mut cmd = SwapFields::command();
        let result = cmd.try_get_matches_from_mut([
            "accs",
            "--mode",
            "proposer",
            "--network-to-trade",
            "testnet",
            "--currency-to-give",
            "btc",
            "--amount-to-send",
            "1.0",
            "--amount-to-receive",
            "50000",
            "--bitcoin-private-key",
            "x",
            "--bitshares-private-key",
            "x",
            "--counterparty-bitcoin-public-key",
            "x",
            "--counterparty-bitshares-account-name",
            "x",
            "--asset",
            "1.3.0",
            "--priority",
            "9",
            "--secret",
            "x",
        ]);
        assert!(result.is_err());
    }
}
