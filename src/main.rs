//! # daodash
//!
//! Command line companion of the DAO dashboard core.
//!
//! ```bash
//! # Show the resolved network configuration
//! daodash network
//!
//! # Classify an organization identifier
//! daodash check mycompany.aragonid.eth
//!
//! # Derive frontend fields from a raw app snapshot
//! daodash prepare-apps apps.json
//!
//! # Follow the wallet's account, balance, network and connectivity
//! RUST_LOG=debug daodash watch
//! ```
//!
//! Configuration comes from the environment (and `.env`): `DAO_NETWORK`,
//! `WALLET_RPC_URL`, `WALLET_PROVIDER_ID`, `DEFAULT_ETH_NODE`, `IPFS_GATEWAY`,
//! `DEFAULT_DAO_ADDRESS`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dao_dashboard::apps::{prepare_apps_for_frontend, script_url, RawApp};
use dao_dashboard::shell::{menu_items, resolve_dao_param, MenuIcon};
use dao_dashboard::utils::address::{format_short, is_valid_address, is_valid_ens_name};
use dao_dashboard::{EthereumRpcClient, NetworkConfig, WalletMonitor, WalletState};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "daodash")]
#[command(about = "DAO dashboard client core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the configuration of the selected network
    Network,
    /// Tell whether an identifier is an ENS domain or an address
    Check {
        /// Address, ENS domain or `main`
        input: String,
    },
    /// Prepare a raw app snapshot (JSON array) for the frontend
    PrepareApps {
        /// Snapshot file
        file: String,
    },
    /// Watch the wallet until Ctrl-C
    Watch,
}

fn network(config: &NetworkConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn check(config: &NetworkConfig, input: &str) -> Result<()> {
    let dao = resolve_dao_param(input, config);
    if dao.is_empty() {
        println!("❌ `{}` needs DEFAULT_DAO_ADDRESS to be set", input);
    } else if is_valid_address(dao) {
        println!("✅ {} is an address ({})", dao, format_short(dao));
    } else if is_valid_ens_name(dao) {
        if config.has_ens_registry() {
            println!("✅ {} is an ENS domain, resolved through {}", dao, config.ens_registry);
        } else {
            println!("⚠️  {} is an ENS domain but {} has no ENS registry", dao, config.network_type);
        }
    } else {
        println!("❌ {} is neither an address nor an ENS domain", dao);
    }
    Ok(())
}

fn prepare_apps(config: &NetworkConfig, file: &str) -> Result<()> {
    let content = std::fs::read_to_string(file).with_context(|| format!("reading {}", file))?;
    let raw: Vec<RawApp> = serde_json::from_str(&content).with_context(|| format!("parsing {}", file))?;
    let apps = prepare_apps_for_frontend(&raw, &config.ipfs_gateway);

    for app in &apps {
        println!("📦 {} ({})", app.name(), app.proxy_address());
        println!("   base url: {}", app.base_url);
        println!("   src:      {}", app.src);
        println!("   registry: {}", app.apm_registry);
        println!("   tags:     {}", app.tags.join(", "));
        if let Some(script) = script_url(&app.app, &config.ipfs_gateway) {
            println!("   script:   {}", script);
        }
    }

    println!("\n📋 Menu:");
    for item in menu_items(&apps) {
        match item.icon {
            MenuIcon::Url(icon) => println!("  {} [{}] {}", item.name, item.route_key, icon),
            MenuIcon::Default => println!("  {} [{}]", item.name, item.route_key),
        }
    }
    Ok(())
}

fn print_wallet(state: &WalletState) {
    println!(
        "👛 account: {}  balance: {}  network: {}  {}",
        state.account.as_deref().map(format_short).unwrap_or_else(|| "locked".to_string()),
        state.balance,
        if state.wallet_network.is_empty() { "?" } else { state.wallet_network.as_str() },
        if state.connected { "online" } else { "offline" }
    );
}

async fn watch(config: &NetworkConfig) -> Result<()> {
    let wallet = Arc::new(EthereumRpcClient::wallet(config)?);
    let node = Arc::new(EthereumRpcClient::node(config)?);
    log::info!("Watching wallet at {} (node {})", wallet.url(), node.url());

    let mut monitor = WalletMonitor::start(wallet, node);
    let mut updates = monitor.subscribe();

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                print_wallet(&state);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    monitor.stop();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = NetworkConfig::from_env()?;

    match cli.command {
        Commands::Network => network(&config)?,
        Commands::Check { input } => check(&config, &input)?,
        Commands::PrepareApps { file } => prepare_apps(&config, &file)?,
        Commands::Watch => watch(&config).await?,
    }

    Ok(())
}
