use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::time::Duration;
use stratus_registry::{METADATA_USER_DATA_URL, NetworkKind, SettingsFetcher, classify_network};

#[derive(Parser)]
#[command(name = "stratus-agent", version)]
#[command(about = "Reads the bootstrap settings of this VM from the registry", long_about = None)]
struct Cli {
    /// Metadata URL serving the instance user data
    #[arg(
        long,
        env = "STRATUS_METADATA_URL",
        default_value = METADATA_USER_DATA_URL,
        global = true
    )]
    metadata_url: String,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 300, global = true)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the user data stored in instance metadata
    UserData,
    /// Fetch the agent settings from the registry and print them
    Settings,
    /// Show how each network of the settings gets its address
    Networks,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries JSON, logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::debug!("Reading user data from {}", cli.metadata_url);
    let fetcher = SettingsFetcher::with_timeout(Duration::from_secs(cli.timeout))?
        .metadata_url(cli.metadata_url);

    match cli.command {
        Commands::UserData => {
            let user_data = fetcher.user_data().await?;
            println!("{}", serde_json::to_string_pretty(&user_data)?);
        }
        Commands::Settings => {
            let settings = fetcher
                .settings()
                .await
                .context("Failed to load agent settings")?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        Commands::Networks => {
            let settings = fetcher
                .settings()
                .await
                .context("Failed to load agent settings")?;

            let mut unsupported = 0;
            for (name, network) in &settings.networks {
                match classify_network(network) {
                    Ok(NetworkKind::Dynamic) => {
                        println!("{} {} {}", "✓".green(), name.bold(), "dynamic (DHCP)".cyan())
                    }
                    Ok(NetworkKind::Vip) => {
                        println!("{} {} {}", "✓".green(), name.bold(), "vip".cyan())
                    }
                    Err(e) => {
                        tracing::warn!("Network `{}' is not supported: {}", name, e);
                        unsupported += 1;
                        println!("{} {} {}", "✗".red(), name.bold(), e.to_string().red());
                    }
                }
            }

            if unsupported > 0 {
                anyhow::bail!("{} network(s) cannot be configured on this VM", unsupported);
            }
        }
    }

    Ok(())
}
