// Copyright (c) 2024 The Sustained developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use anyhow::{anyhow, bail, Context as _};
use clap::{Parser, Subcommand};
use log::*;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sustained::chain::{Connector, MemoryConnector, RpcConnector};
use sustained::context::ChainContext;
use sustained::contract::{system_clock, ContractErr, QfContractService};
use sustained::mock;
use sustained::network::{all_networks, NetworkConfig};
use sustained::primitives::balance::format_balance_with_symbol;
use sustained::primitives::{
    format_time_remaining, AccountId, Balance, Round, RoundData, RoundStatus, Timestamp,
};
use sustained::settings::SETTINGS;
use sustained::storage::{FileStore, KeyValueStore};
use sustained::views::{
    AdminMessage, AdminView, AppMessage, AppView, BannerKind, BannerSlot, DashboardView,
    RoundsMessage, RoundsView, Tab, CONNECT_WALLET_FIRST,
};
use sustained::wallet::{ConnectionWizard, ExtensionRegistry, KeystoreExtension, KEYSTORE_SOURCE};
use tokio::runtime::Builder;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "sustained", version, about = "City quadratic funding client")]
struct Cli {
    /// Run against the seeded in-memory contract
    #[arg(long)]
    demo: bool,

    /// Network to use instead of the saved one
    ///
    /// Nodes are reached over HTTP JSON-RPC on the same host and port as the
    /// network's websocket endpoint, so `wss://` is dialed as `https://` and
    /// `ws://` as `http://`. Run `networks` to see the endpoint used.
    #[arg(long)]
    network: Option<String>,

    /// Account to act as, defaults to the last selected one
    #[arg(long)]
    account: Option<String>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the supported networks
    Networks,

    /// List the rounds open for contributions
    Rounds,

    /// Show a round with its projects and matching estimates
    Round { round_id: u32 },

    /// Show a project
    Project { project_id: u32 },

    /// Contribution statistics of an account
    Stats { address: Option<String> },

    /// Contributions made by an account
    Contributions { address: Option<String> },

    /// Contribute to a project in a round
    Contribute {
        round_id: u32,
        project_id: u32,

        /// Amount in whole tokens, e.g. `2.5`
        amount: String,
    },

    /// Register a project wallet (admin only)
    AddProject { wallet: String },

    /// Open a funding round (admin only)
    CreateRound {
        /// Matching pool in whole tokens
        pool: String,

        /// Comma separated eligible project ids
        #[arg(long, value_delimiter = ',', required = true)]
        projects: Vec<u32>,

        #[arg(long, default_value_t = 168)]
        hours: u64,
    },

    /// Distribute the matching pool of an ended round (admin only)
    Distribute { round_id: u32 },

    /// Manage the local keystore
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },
}

#[derive(Subcommand)]
enum KeysCommand {
    /// Create a new sr25519 key
    Generate { name: String },

    /// List stored keys
    List,

    /// Import a key from its hex encoded 32 byte seed
    Import { name: String, seed: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let runtime = Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()?;

    runtime.block_on(async move {
        init_tracing()?;
        SETTINGS.validate()?;
        run(cli).await
    })
}

fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::filter::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let data_dir = SETTINGS.data_dir();
    let keystore = Arc::new(KeystoreExtension::new(&data_dir));

    match &cli.command {
        Command::Networks => return print_networks(cli.json),
        Command::Keys { command } => return run_keys(&keystore, command, cli.json),
        _ => {}
    }

    let demo = cli.demo || SETTINGS.app.demo_mode;
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&data_dir)?);
    let connector: Arc<dyn Connector> = if demo {
        Arc::new(MemoryConnector::new())
    } else {
        Arc::new(RpcConnector::new(Duration::from_secs(
            SETTINGS.network.rpc_timeout_secs,
        )))
    };

    let mut wallets = ExtensionRegistry::new();
    wallets.register(keystore.clone());

    let mut context = ChainContext::new(connector, wallets, store);
    match &cli.network {
        Some(network) => context.switch_network(network).await?,
        None => context.init().await?,
    }

    if let Some(info) = context.chain_info() {
        info!(
            "Running Sustained v{} on {} ({})",
            env!("CARGO_PKG_VERSION"),
            info.chain,
            info.chain_type
        );
    }

    if needs_wallet(&cli.command) {
        unlock_wallet(&keystore, &mut context, cli.account.as_deref()).await?;
    }

    let service = if demo {
        // The demo contract is administered by the unlocked key when there is one
        let admin = match context.selected_account() {
            Some(account) => account.address,
            None => SETTINGS.contract.admin_address.parse()?,
        };
        context = context.with_admin(admin);
        let contract = mock::demo_contract_with(
            system_clock(),
            admin,
            Balance::from(SETTINGS.contract.min_contribution),
        );
        QfContractService::new(Arc::new(contract), admin)
    } else {
        let service = context.live_contract(&SETTINGS.contract)?;
        service.initialize().await?;
        service
    };

    if let Some(tab) = command_tab(&cli.command) {
        let mut app = AppView::for_context(&context);
        app.update(AppMessage::TabSelected(tab));
        if app.active() != tab {
            return Err(ContractErr::NotAdmin.into());
        }
        debug!("Opened the {tab} tab");
    }

    let now = now();
    let network = context.network();

    match cli.command {
        Command::Rounds => {
            let mut view = RoundsView::new();
            view.load(&context, &service, now).await?;
            if cli.json {
                return print_json(&view.rounds());
            }

            if view.rounds().is_empty() {
                println!("No active funding rounds");
            }
            for round in view.rounds() {
                print_round(round, network, now);
            }
        }

        Command::Round { round_id } => {
            let data = service.get_round_data(service.admin(), round_id).await?;
            if cli.json {
                return print_json(&data);
            }
            print_round_data(&data, network, now);
        }

        Command::Project { project_id } => {
            let project = service
                .get_project(service.admin(), project_id)
                .await?
                .ok_or_else(|| anyhow!("Project {project_id} does not exist"))?;
            if cli.json {
                return print_json(&project);
            }

            let title = mock::project_meta(project_id).map_or("", |m| m.title);
            println!("Project #{} {title}", project.project_id);
            println!("  wallet        {}", project.wallet_address.to_ss58(network.ss58_format));
            println!("  raised        {}", amount(project.total_contributions, network));
            println!("  contributors  {}", project.contributor_count);
        }

        Command::Stats { address } => {
            let user = resolve_user(&context, address.as_deref())?;
            let stats = service.get_user_stats(&user, &user).await?;
            if cli.json {
                return print_json(&stats);
            }

            println!("Total contributed   {}", amount(stats.total_contributed, network));
            println!("Projects supported  {:?}", stats.projects_supported);
            println!("Rounds participated {:?}", stats.rounds_participated);
        }

        Command::Contributions { address } => {
            let user = resolve_user(&context, address.as_deref())?;
            let mut contributions = service.get_user_contributions(&user, &user).await?;
            contributions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            if cli.json {
                return print_json(&contributions);
            }

            for c in &contributions {
                println!(
                    "round {} project {} {} at {}",
                    c.round_id,
                    c.project_id,
                    amount(c.amount, network),
                    format_timestamp(c.timestamp)
                );
            }
        }

        Command::Contribute {
            round_id,
            project_id,
            amount: value,
        } => {
            let mut view = RoundsView::new();
            let origin = context
                .selected_account()
                .map(|a| a.address)
                .ok_or_else(|| anyhow!("No account selected"))?;
            view.select_round(&origin, &service, round_id).await?;

            if !view.open_form(&context, project_id) {
                bail!(CONNECT_WALLET_FIRST);
            }
            view.update(RoundsMessage::CustomAmountChanged(value));
            if let Some(impact) = view.impact_estimate(network.decimals) {
                info!("Estimated additional matching: {}", amount(impact, network));
            }

            view.contribute(&context, &service).await.map_err(|err| anyhow!(err))?;
            show_banner(&mut view.banner);

            // The dashboard picks up the new contribution
            let mut dashboard = DashboardView::new();
            dashboard.load(&context, &service).await?;
            if let Some(stats) = dashboard.stats() {
                println!("Total contributed: {}", amount(stats.total_contributed, network));
            }
        }

        Command::AddProject { wallet } => {
            let mut view = AdminView::new();
            view.update(AdminMessage::ProjectWalletChanged(wallet));
            view.add_project(&context, &service)
                .await
                .map_err(|err| anyhow!(err))?;
            show_banner(&mut view.banner);
        }

        Command::CreateRound {
            pool,
            projects,
            hours,
        } => {
            let mut view = AdminView::new();
            view.update(AdminMessage::MatchingPoolChanged(pool));
            view.update(AdminMessage::DurationChanged(hours.to_string()));
            for project_id in projects {
                view.update(AdminMessage::ProjectToggled(project_id));
            }

            view.create_round(&context, &service)
                .await
                .map_err(|err| anyhow!(err))?;
            show_banner(&mut view.banner);
        }

        Command::Distribute { round_id } => {
            let mut view = AdminView::new();
            view.distribute(&context, &service, round_id)
                .await
                .map_err(|err| anyhow!(err))?;
            show_banner(&mut view.banner);
        }

        Command::Networks | Command::Keys { .. } => {}
    }

    Ok(())
}

fn command_tab(command: &Command) -> Option<Tab> {
    match command {
        Command::Rounds | Command::Round { .. } | Command::Contribute { .. } => Some(Tab::Rounds),
        Command::Project { .. } => Some(Tab::Projects),
        Command::Stats { .. } | Command::Contributions { .. } => Some(Tab::Dashboard),
        Command::AddProject { .. } | Command::CreateRound { .. } | Command::Distribute { .. } => {
            Some(Tab::Admin)
        }
        Command::Networks | Command::Keys { .. } => None,
    }
}

fn show_banner(banner: &mut BannerSlot) {
    match banner.visible(Instant::now()) {
        Some(b) if b.kind == BannerKind::Error => eprintln!("{}", b.text),
        Some(b) => println!("{}", b.text),
        None => {}
    }
}

fn needs_wallet(command: &Command) -> bool {
    matches!(
        command,
        Command::Contribute { .. }
            | Command::AddProject { .. }
            | Command::CreateRound { .. }
            | Command::Distribute { .. }
    )
}

async fn unlock_wallet(
    keystore: &KeystoreExtension,
    context: &mut ChainContext,
    account: Option<&str>,
) -> anyhow::Result<()> {
    if keystore.list()?.is_empty() {
        bail!("No keys found. Create one with `sustained keys generate <name>`");
    }

    let passphrase = rpassword::prompt_password("Keystore passphrase: ")?;
    let unlocked = keystore.unlock(&passphrase)?;
    debug!("Unlocked {unlocked} keys");

    let preferred = SETTINGS
        .app
        .preferred_wallet
        .as_deref()
        .unwrap_or(KEYSTORE_SOURCE);
    let account = account
        .map(|a| {
            a.parse::<AccountId>()
                .with_context(|| format!("Invalid account {a}"))
        })
        .transpose()?;

    let mut wizard = ConnectionWizard::new();
    context
        .connect_through(&mut wizard, preferred, account.as_ref())
        .await?;

    if let Some(selected) = context.selected_account() {
        info!(
            "Acting as {} with balance {}",
            selected.display_name(),
            context.balance().unwrap_or("unknown")
        );
    }

    Ok(())
}

fn run_keys(keystore: &KeystoreExtension, command: &KeysCommand, json: bool) -> anyhow::Result<()> {
    match command {
        KeysCommand::Generate { name } => {
            let passphrase = new_passphrase()?;
            let account = keystore.generate(name, &passphrase)?;
            println!("Created {} {}", account.display_name(), account.address);
        }

        KeysCommand::Import { name, seed } => {
            let bytes = hex::decode(seed.trim_start_matches("0x")).context("Seed must be hex")?;
            let seed: [u8; 32] = bytes
                .try_into()
                .map_err(|_| anyhow!("Seed must be 32 bytes"))?;
            let passphrase = new_passphrase()?;
            let account = keystore.import(name, &seed, &passphrase)?;
            println!("Imported {} {}", account.display_name(), account.address);
        }

        KeysCommand::List => {
            let accounts = keystore.list()?;
            if json {
                return print_json(&accounts);
            }

            for account in accounts {
                println!("{}  {}", account.address, account.display_name());
            }
        }
    }

    Ok(())
}

fn new_passphrase() -> anyhow::Result<String> {
    let passphrase = rpassword::prompt_password("New passphrase: ")?;
    let confirm = rpassword::prompt_password("Repeat passphrase: ")?;

    if passphrase != confirm {
        bail!("Passphrases do not match");
    }

    Ok(passphrase)
}

fn resolve_user(context: &ChainContext, address: Option<&str>) -> anyhow::Result<AccountId> {
    match address {
        Some(address) => address
            .parse()
            .with_context(|| format!("Invalid address {address}")),
        None => {
            let saved = context
                .selected_account()
                .map(|a| a.address)
                .or_else(saved_account);
            saved.ok_or_else(|| anyhow!("No account given and none selected"))
        }
    }
}

fn saved_account() -> Option<AccountId> {
    let store = FileStore::open(&SETTINGS.data_dir()).ok()?;
    store
        .get(sustained::storage::SELECTED_ACCOUNT_KEY)?
        .parse()
        .ok()
}

fn print_networks(json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&all_networks());
    }

    for network in all_networks() {
        println!(
            "{:<10} {:<18} {:<4} {:>2} decimals  {}  {}",
            network.id,
            network.name,
            network.symbol,
            network.decimals,
            network.chain_type,
            network.http_endpoint()
        );
    }

    Ok(())
}

fn print_round(round: &Round, network: &NetworkConfig, now: Timestamp) {
    let status = round.status(now);
    let remaining = if status == RoundStatus::Active {
        format!(", {} left", format_time_remaining(round.time_remaining(now)))
    } else {
        String::new()
    };

    println!(
        "Round #{} [{status}{remaining}] pool {} projects {:?}",
        round.round_id,
        amount(round.matching_pool, network),
        round.eligible_projects
    );
}

fn print_round_data(data: &RoundData, network: &NetworkConfig, now: Timestamp) {
    print_round(&data.round_info, network, now);
    println!(
        "  {} contributed by {} contributors",
        amount(data.total_contributed(), network),
        data.unique_contributors()
    );

    if let Some(alpha) = data.current_alpha {
        println!("  matching factor {:.2}", f64::from(alpha) / 10_000.0);
    }

    for project in &data.projects {
        let title = mock::project_meta(project.project.project_id).map_or("", |m| m.title);
        println!(
            "  #{} {title}: raised {} match {}",
            project.project.project_id,
            amount(project.project.total_contributions, network),
            amount(project.scaled_match.unwrap_or(0), network)
        );
    }
}

fn amount(value: Balance, network: &NetworkConfig) -> String {
    format_balance_with_symbol(value, network.decimals, network.symbol)
}

fn format_timestamp(timestamp: Timestamp) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map_or_else(|| timestamp.to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

fn now() -> Timestamp {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn network_help_names_the_http_transport() {
        let cmd = Cli::command();
        let arg = cmd
            .get_arguments()
            .find(|arg| arg.get_id() == "network")
            .unwrap();
        let help = arg.get_long_help().or_else(|| arg.get_help()).unwrap().to_string();

        assert!(help.contains("HTTP JSON-RPC"));
        assert!(help.contains("`wss://` is dialed as `https://`"));
    }

    #[test]
    fn admin_commands_open_the_admin_tab() {
        let cli = Cli::try_parse_from(["sustained", "distribute", "1"]).unwrap();
        assert_eq!(command_tab(&cli.command), Some(Tab::Admin));

        let cli = Cli::try_parse_from(["sustained", "networks"]).unwrap();
        assert_eq!(command_tab(&cli.command), None);
    }
}
