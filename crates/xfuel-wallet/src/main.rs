//! xfuel-wallet: connects a Theta wallet, keeps the session alive and reports
//! the connected account.

use std::time::Duration;

use clap::{Parser, Subcommand};
use eyre::WrapErr;

use xfuel_wallet_adapters::WalletAdapterConfig;
use xfuel_wallet_core::{BridgeOutcome, PriceOraclePort, WalletState};

mod bridge;

use bridge::WalletBridge;

#[derive(Parser)]
#[command(name = "xfuel-wallet", about = "Theta wallet connection manager for XFuel")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Restore the stored session and print the wallet state.
    Status,
    /// Restore the stored session, or connect when there is none.
    Connect,
    /// Forget the current session.
    Disconnect,
    /// Refresh the balance and print it with its USD value.
    Balance {
        /// Skip the cached price quote.
        #[arg(long)]
        fresh_price: bool,
    },
    /// Follow wallet account and chain changes.
    Watch {
        /// Poll interval in milliseconds.
        #[arg(long, default_value_t = 2_000)]
        interval_ms: u64,
        /// Stop after this many polls.
        #[arg(long)]
        polls: Option<u64>,
    },
    /// Sign a message with the connected account.
    Sign { message: String },
}

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = WalletAdapterConfig::from_env().wrap_err("invalid wallet configuration")?;
    tracing::info!(chain_id = config.chain.chain_id, "Starting xfuel-wallet");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to start runtime")?;
    runtime.block_on(run(cli.command.unwrap_or(Commands::Status), &config))
}

async fn run(command: Commands, config: &WalletAdapterConfig) -> eyre::Result<()> {
    let bridge = WalletBridge::from_config(config)?;
    let manager = &bridge.manager;
    let restored = manager.restore_session_on_startup().await;

    match command {
        Commands::Status => print_state(&restored),
        Commands::Connect => {
            if restored.is_connected {
                print_state(&restored);
                return Ok(());
            }
            let mut pairing = manager.subscribe_pairing_uri();
            let connect = manager.connect();
            tokio::pin!(connect);
            let result = loop {
                tokio::select! {
                    result = &mut connect => break result,
                    Ok(()) = pairing.changed() => {
                        if let Some(uri) = pairing.borrow_and_update().clone() {
                            println!("Scan with Theta Wallet: {uri}");
                        }
                    }
                }
            };
            match result {
                Ok(state) => print_state(&state),
                Err(e) if e.is_silent() => print_state(&manager.state()),
                Err(e) => eyre::bail!("{} ({e})", e.user_message()),
            }
        }
        Commands::Disconnect => {
            manager.disconnect().await;
            println!("disconnected");
        }
        Commands::Balance { fresh_price } => {
            let state = manager.refresh_balance().await;
            if !state.is_connected {
                eyre::bail!("no wallet connected");
            }
            if fresh_price {
                bridge.oracle.get_prices(true).await?;
            }
            let usd = manager.balance_usd(&bridge.oracle).await;
            println!(
                "{} TFUEL{}",
                state.balance,
                usd.map(|v| format!(" ({v})")).unwrap_or_default()
            );
        }
        Commands::Watch { interval_ms, polls } => {
            let mut remaining = polls;
            while remaining != Some(0) {
                bridge.poll_wallets().await;
                match manager.process_provider_events().await {
                    BridgeOutcome::Idle | BridgeOutcome::Ignored => {}
                    BridgeOutcome::Disconnected => println!("wallet disconnected"),
                    BridgeOutcome::Reconnected(Ok(state)) | BridgeOutcome::Reloaded(state) => {
                        print_state(&state)
                    }
                    BridgeOutcome::Reconnected(Err(e)) if e.is_silent() => {}
                    BridgeOutcome::Reconnected(Err(e)) => println!("{}", e.user_message()),
                }
                remaining = remaining.map(|n| n - 1);
                tokio::time::sleep(Duration::from_millis(interval_ms)).await;
            }
        }
        Commands::Sign { message } => {
            let signer = manager
                .signer()
                .ok_or_else(|| eyre::eyre!("no wallet connected"))?;
            let signature = signer
                .personal_sign(message.as_bytes())
                .await
                .map_err(|e| eyre::eyre!("{} ({e})", e.user_message()))?;
            println!("{signature}");
        }
    }
    Ok(())
}

fn print_state(state: &WalletState) {
    match state.display_address() {
        Some(address) if state.is_connected => {
            println!(
                "connected {address} via {:?} on chain {} balance {} TFUEL",
                state.connection_method,
                state.chain_id.unwrap_or_default(),
                state.balance
            );
        }
        _ => println!("not connected"),
    }
}
