//! Omnigas CLI
//!
//! ## Usage
//!
//! ```bash
//! omnigas --config config/omnigas.toml serve
//! omnigas balance 0xAccount
//! omnigas estimate --account 0xAccount --to 0xTarget --execute-on optimal
//! OMNIGAS_PRIVATE_KEY=0x... omnigas execute --account 0xAccount --to 0xTarget \
//!     --execute-on 84532 --smart-account 0xSmartAccount
//! ```
//!
//! The config path can also be set via `OMNIGAS_CONFIG_PATH`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use omnigas::api::ApiServer;
use omnigas::crypto::{LocalKeySigner, WalletSigner};
use omnigas::service::updates_channel;
use omnigas::{
    Amount, Authorization, ChainId, ExecuteOn, ExecutionCoordinator, OmnigasConfig, PayFrom, TransactionIntent,
    TransferMode, Urgency,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const PRIVATE_KEY_ENV: &str = "OMNIGAS_PRIVATE_KEY";

#[derive(Parser, Debug)]
#[command(name = "omnigas")]
#[command(about = "Cross-chain gas payment routing and settlement")]
struct Args {
    /// Path to configuration file (default: OMNIGAS_CONFIG_PATH or config/omnigas.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Show the unified stablecoin balance of an account
    Balance { account: String },
    /// Analyze routes for a transaction without sending anything
    Estimate {
        #[arg(long)]
        account: String,
        #[command(flatten)]
        intent: IntentArgs,
    },
    /// Route, bridge if needed, and send a transaction
    Execute {
        #[arg(long)]
        account: String,
        #[command(flatten)]
        intent: IntentArgs,
        /// Smart account controlled by OMNIGAS_PRIVATE_KEY (enables sponsored execution)
        #[arg(long)]
        smart_account: Option<String>,
        /// JSON-RPC URL of an interactive wallet (enables direct execution)
        #[arg(long, requires = "wallet_address")]
        wallet_url: Option<String>,
        /// Address the wallet signs for
        #[arg(long, requires = "wallet_url")]
        wallet_address: Option<String>,
        /// How long the wallet user has to approve, in seconds
        #[arg(long, default_value_t = 300)]
        wallet_timeout_secs: u64,
    },
}

#[derive(clap::Args, Debug)]
struct IntentArgs {
    /// Target contract or recipient
    #[arg(long)]
    to: String,
    /// Native value in wei
    #[arg(long)]
    value: Option<String>,
    /// Calldata (0x hex)
    #[arg(long)]
    data: Option<String>,
    #[arg(long)]
    gas_limit: Option<u64>,
    /// Chain id or "optimal"
    #[arg(long, default_value = "optimal")]
    execute_on: String,
    /// Chain id or "auto"
    #[arg(long, default_value = "auto")]
    pay_from: String,
    /// low | medium | high
    #[arg(long, default_value = "medium")]
    urgency: String,
    /// auto | fast | standard
    #[arg(long)]
    transfer_mode: Option<String>,
}

impl IntentArgs {
    fn into_intent(self) -> Result<TransactionIntent> {
        let execute_on = match self.execute_on.as_str() {
            "optimal" => ExecuteOn::Optimal,
            id => ExecuteOn::Chain(ChainId(id.parse().context("--execute-on must be a chain id or 'optimal'")?)),
        };
        let pay_from = match self.pay_from.as_str() {
            "auto" => PayFrom::Auto,
            id => PayFrom::Chain(ChainId(id.parse().context("--pay-from must be a chain id or 'auto'")?)),
        };
        let value = self
            .value
            .map(|v| v.parse::<Amount>())
            .transpose()
            .context("--value must be a decimal wei amount")?;
        let transfer_mode = self.transfer_mode.map(|m| m.parse::<TransferMode>()).transpose()?;

        let mut intent = TransactionIntent::new(self.to);
        intent.value = value;
        intent.data = self.data;
        intent.gas_limit = self.gas_limit;
        intent.execute_on = execute_on;
        intent.pay_from = pay_from;
        intent.urgency = self.urgency.parse::<Urgency>()?;
        intent.transfer_mode = transfer_mode;
        intent.validate()?;
        Ok(intent)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = OmnigasConfig::load_from_path(args.config.as_deref())?;
    info!("Configuration loaded: {} chain(s)", config.chains.len());

    let coordinator = Arc::new(ExecutionCoordinator::from_config(&config)?);

    match args.command {
        Command::Serve => {
            let server = ApiServer::new(config.api.clone(), coordinator);
            tokio::select! {
                result = server.run() => result?,
                _ = signal::ctrl_c() => info!("Shutdown signal received"),
            }
        }
        Command::Balance { account } => {
            let balance = coordinator.balances().get_unified_balance(&account).await;
            println!("{}", serde_json::to_string_pretty(&balance)?);
        }
        Command::Estimate { account, intent } => {
            let intent = intent.into_intent()?;
            let analysis = coordinator.estimate(&intent, &account).await?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        Command::Execute {
            account,
            intent,
            smart_account,
            wallet_url,
            wallet_address,
            wallet_timeout_secs,
        } => {
            let intent = intent.into_intent()?;
            let auth = build_authorization(
                smart_account,
                wallet_url,
                wallet_address,
                Duration::from_secs(wallet_timeout_secs),
            )?;

            let cancel = CancellationToken::new();
            let ctrl_c_cancel = cancel.clone();
            tokio::spawn(async move {
                if signal::ctrl_c().await.is_ok() {
                    warn!("Cancelling execution");
                    ctrl_c_cancel.cancel();
                }
            });

            let (tx, mut rx) = updates_channel();
            let printer = tokio::spawn(async move {
                while let Some(update) = rx.recv().await {
                    match serde_json::to_string(&update) {
                        Ok(line) => eprintln!("{}", line),
                        Err(e) => warn!("Failed to serialize update: {}", e),
                    }
                }
            });

            let result = coordinator.execute(&intent, &account, &auth, Some(tx), &cancel).await;
            let _ = printer.await;
            let outcome = result?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}

fn build_authorization(
    smart_account: Option<String>,
    wallet_url: Option<String>,
    wallet_address: Option<String>,
    wallet_timeout: Duration,
) -> Result<Authorization> {
    let private_key = match std::env::var(PRIVATE_KEY_ENV) {
        Ok(key) => Some(LocalKeySigner::from_hex(&key).with_context(|| format!("Invalid {}", PRIVATE_KEY_ENV))?),
        Err(_) => None,
    };
    if smart_account.is_some() && private_key.is_none() {
        anyhow::bail!("--smart-account requires {} to be set", PRIVATE_KEY_ENV);
    }
    let wallet = match (wallet_url, wallet_address) {
        (Some(url), Some(address)) => Some(WalletSigner::new(&url, &address, wallet_timeout)?),
        _ => None,
    };
    if let Some(key) = &private_key {
        info!("Signing with local key {}", key.address());
    }
    Ok(Authorization {
        private_key,
        smart_account: smart_account.map(|a| a.to_lowercase()),
        wallet,
    })
}
