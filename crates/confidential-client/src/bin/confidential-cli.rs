use alloy::{
    eips::BlockNumberOrTag,
    primitives::{
        Address,
        Bytes,
        U256,
    },
};
use clap::{
    Args,
    Parser,
    Subcommand,
};
use confidential_client::{
    Account,
    CallArgs,
    ClientConfig,
    ConfidentialClient,
    EstimateGasArgs,
    NodePublicKey,
    PrepareTransactionArgs,
    TransactionRequest,
    TransactionType,
};
use tracing_subscriber::{
    EnvFilter,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use url::Url;

#[derive(Debug, Parser)]
#[command(author, version, about = "Confidential transaction client", long_about = None)]
struct Cli {
    /// JSON-RPC endpoint of the confidential node [env: CONFIDENTIAL_RPC_URL]
    #[arg(long = "rpc-url")]
    rpc_url: Option<Url>,
    /// Pin the chain id instead of asking the node [env: CONFIDENTIAL_CHAIN_ID]
    #[arg(long = "chain-id")]
    chain_id: Option<u64>,
    /// Use this node key instead of fetching it per call
    #[arg(long = "node-key")]
    node_key: Option<NodePublicKey>,
    /// Base fee multiplier in percent [default: 120]
    #[arg(long = "base-fee-multiplier")]
    base_fee_multiplier_percent: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the node's sealing key
    NodeKey,
    /// Run a sealed eth_call and print the unsealed result
    Call {
        #[command(flatten)]
        tx: TxArgs,
        /// Block number or tag
        #[arg(long, default_value = "latest")]
        block: BlockNumberOrTag,
    },
    /// Estimate gas, including the authorization surcharge
    EstimateGas {
        #[command(flatten)]
        tx: TxArgs,
        #[arg(long)]
        block: Option<BlockNumberOrTag>,
    },
    /// Fill a request and print it as JSON
    Prepare {
        #[command(flatten)]
        tx: TxArgs,
    },
}

#[derive(Debug, Args)]
struct TxArgs {
    #[arg(long)]
    from: Option<Address>,
    /// The account signs locally rather than through the node
    #[arg(long, requires = "from")]
    local: bool,
    #[arg(long)]
    to: Option<Address>,
    #[arg(long)]
    data: Option<Bytes>,
    #[arg(long)]
    value: Option<U256>,
    #[arg(long)]
    nonce: Option<u64>,
    #[arg(long)]
    gas: Option<U256>,
    #[arg(long = "gas-price")]
    gas_price: Option<U256>,
    #[arg(long = "max-fee-per-gas")]
    max_fee_per_gas: Option<U256>,
    #[arg(long = "max-priority-fee-per-gas")]
    max_priority_fee_per_gas: Option<U256>,
    #[arg(long = "type")]
    transaction_type: Option<TransactionType>,
}

impl TxArgs {
    fn account(&self) -> Option<Account> {
        self.from.map(|address| {
            if self.local {
                Account::local(address)
            } else {
                Account::json_rpc(address)
            }
        })
    }

    fn into_request(self) -> TransactionRequest {
        TransactionRequest {
            from: self.from,
            to: self.to,
            data: self.data,
            value: self.value,
            nonce: self.nonce,
            gas: self.gas,
            gas_price: self.gas_price,
            max_fee_per_gas: self.max_fee_per_gas,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            transaction_type: self.transaction_type,
            ..Default::default()
        }
    }
}

impl Cli {
    /// Environment first, then explicit flags on top.
    fn config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = ClientConfig::from_env()?;
        if let Some(rpc_url) = &self.rpc_url {
            config.rpc_url = rpc_url.clone();
        }
        if let Some(chain_id) = self.chain_id {
            config.chain_id = Some(chain_id);
        }
        if let Some(percent) = self.base_fee_multiplier_percent {
            config.base_fee_multiplier_percent = percent;
        }
        if let Some(key) = self.node_key {
            config.node_public_key = Some(key);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = cli.config()?.validate()?;

    let client = ConfidentialClient::from_config(&config)?;

    match cli.command {
        Command::NodeKey => {
            println!("{}", client.node_public_key().await?);
        }
        Command::Call { tx, block } => {
            let args = CallArgs {
                account: tx.account(),
                request: tx.into_request(),
                block: Some(block),
            };
            println!("{}", client.call(args).await?);
        }
        Command::EstimateGas { tx, block } => {
            let account = tx.account();
            let args = EstimateGasArgs {
                request: tx.into_request(),
                account,
                block,
                kzg: None,
            };
            println!("{}", client.estimate_gas(args).await?);
        }
        Command::Prepare { tx } => {
            let account = tx.account();
            let args = PrepareTransactionArgs {
                request: tx.into_request(),
                account,
                parameters: config.parameters.clone(),
                ..Default::default()
            };
            let prepared = client.prepare_transaction_request(args).await?;
            println!("{}", serde_json::to_string_pretty(&prepared)?);
        }
    }

    Ok(())
}
