mod commands;
mod playbook;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use commands::apply::WaitArgs;
use cumulus_cloud::Reconciler;
use cumulus_cloud_ionos::{Credentials, IonosClient, registry};
use cumulus_inventory::{InventoryConfig, InventoryCredentials};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "cumulus")]
#[command(version, about = "Declarative provisioning for IONOS Cloud", long_about = None)]
struct Cli {
    #[command(flatten)]
    auth: AuthArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct AuthArgs {
    /// API token
    #[arg(long, env = "IONOS_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Account username (with --password, when no token is set)
    #[arg(long, env = "IONOS_USERNAME", global = true)]
    username: Option<String>,

    /// Account password
    #[arg(long, env = "IONOS_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Cloud API base URL
    #[arg(long, env = "IONOS_CLOUD_API_URL", global = true)]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile every resource declared in a playbook
    Apply {
        /// Playbook file (YAML)
        file: PathBuf,
        /// Seconds to wait for each provider operation
        #[arg(long, default_value_t = 600)]
        wait_timeout: u64,
        /// Return as soon as mutations are issued, without polling
        #[arg(long)]
        no_wait: bool,
    },
    /// Delete every resource declared in a playbook
    Destroy {
        /// Playbook file (YAML)
        file: PathBuf,
        /// Seconds to wait for each provider operation
        #[arg(long, default_value_t = 600)]
        wait_timeout: u64,
        /// Return as soon as mutations are issued, without polling
        #[arg(long)]
        no_wait: bool,
    },
    /// List Postgres cluster backups as JSON
    Backups {
        /// Restrict to one cluster (id or display name)
        #[arg(long)]
        cluster: Option<String>,
    },
    /// Print the grouped server inventory as JSON
    Inventory {
        /// Inventory config file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Bypass the cache and fetch live data
        #[arg(long)]
        refresh: bool,
    },
    /// Print version information
    Version,
}

/// Flags and environment beat config-file values
fn resolve_credentials(
    auth: &AuthArgs,
    config: Option<&InventoryConfig>,
) -> anyhow::Result<InventoryCredentials> {
    if let Some(token) = &auth.token {
        return Ok(InventoryCredentials::Token(token.clone()));
    }
    if let (Some(username), Some(password)) = (&auth.username, &auth.password) {
        return Ok(InventoryCredentials::Basic {
            username: username.clone(),
            password: password.clone(),
        });
    }
    if let Some(config) = config {
        return Ok(config.credentials()?);
    }
    anyhow::bail!(
        "no credentials: set --token or --username/--password \
         (or IONOS_TOKEN / IONOS_USERNAME / IONOS_PASSWORD)"
    )
}

fn client_credentials(credentials: &InventoryCredentials) -> Credentials {
    match credentials {
        InventoryCredentials::Token(token) => Credentials::Token(token.clone()),
        InventoryCredentials::Basic { username, password } => Credentials::Basic {
            username: username.clone(),
            password: password.clone(),
        },
    }
}

fn client_for(auth: &AuthArgs, config: Option<&InventoryConfig>) -> anyhow::Result<IonosClient> {
    let credentials = resolve_credentials(auth, config)?;
    let api_url = auth
        .api_url
        .clone()
        .or_else(|| config.and_then(|c| c.api_url.clone()));
    Ok(IonosClient::new(client_credentials(&credentials), api_url)?)
}

fn reconciler_for(client: Arc<IonosClient>) -> Reconciler {
    Reconciler::new(registry(client.clone()), client)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("cumulus {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Apply {
            file,
            wait_timeout,
            no_wait,
        } => {
            let playbook = playbook::Playbook::load(&file)?;
            let client = Arc::new(client_for(&cli.auth, None)?);
            let reconciler = reconciler_for(client);
            let wait = WaitArgs {
                wait: !no_wait,
                timeout: Duration::from_secs(wait_timeout),
            };
            commands::apply::handle(&reconciler, &playbook, wait).await
        }
        Commands::Destroy {
            file,
            wait_timeout,
            no_wait,
        } => {
            let playbook = playbook::Playbook::load(&file)?;
            let client = Arc::new(client_for(&cli.auth, None)?);
            let reconciler = reconciler_for(client);
            let wait = WaitArgs {
                wait: !no_wait,
                timeout: Duration::from_secs(wait_timeout),
            };
            commands::destroy::handle(&reconciler, &playbook, wait).await
        }
        Commands::Backups { cluster } => {
            let client = Arc::new(client_for(&cli.auth, None)?);
            commands::backups::handle(client, cluster.as_deref()).await
        }
        Commands::Inventory { config, refresh } => {
            let inventory_config = match &config {
                Some(path) => InventoryConfig::load(path).with_context(|| {
                    format!("could not load inventory config {}", path.display())
                })?,
                None => InventoryConfig::from_env(),
            };
            let credentials = resolve_credentials(&cli.auth, Some(&inventory_config))?;
            let account = credentials.account_key();
            let api_url = cli
                .auth
                .api_url
                .clone()
                .or_else(|| inventory_config.api_url.clone());
            let client = IonosClient::new(client_credentials(&credentials), api_url)?;
            commands::inventory::handle(&client, &inventory_config, refresh, &account).await
        }
    }
}
