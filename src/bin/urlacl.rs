use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use urlacl::store::{ConfigStore, FileStore};
use urlacl::{AccessRights, AccessRule, ClientConfig, Sid, UrlAclClient, UrlReservation};

/// Manage http.sys URL reservations.
///
/// EXAMPLES:
///     urlacl list                                       Show all reservations
///     urlacl add http://+:8080/api/ NS                  Let NETWORK SERVICE listen
///     urlacl grant http://+:8080/api/ BU --rights both  Add a rule
///     urlacl delete http://+:8080/api/                  Remove the reservation
///
/// ENVIRONMENT VARIABLES:
///     URLACL_LOG                Log filter (e.g. 'urlacl=debug')
///     URLACL_API_VERSION        HTTP Server API version, 'major.minor'
///     URLACL_MAX_BUFFER_LEN     Largest query buffer in bytes
///     URLACL_RESOLVE_ACCOUNTS   Translate SIDs to account names (true/false)
#[derive(Parser)]
#[command(name = "urlacl")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, env = "URLACL_CONFIG")]
    config: Option<PathBuf>,
    /// Use a JSON file as the reservation store instead of http.sys
    #[arg(long, global = true, env = "URLACL_STORE_FILE")]
    store_file: Option<PathBuf>,
    /// Log debug output to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every URL reservation
    #[command(visible_alias = "ls")]
    List {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show the reservation for one URL prefix
    Show {
        url: String,
        #[arg(long)]
        json: bool,
    },
    /// Register a new reservation
    Add {
        url: String,
        /// SID (S-1-5-...) or SDDL alias (NS, BU, WD, ...)
        principal: Sid,
        #[arg(long, short = 'r', default_value = "listen")]
        rights: AccessRights,
    },
    /// Grant rights on an existing reservation
    Grant {
        url: String,
        principal: Sid,
        #[arg(long, short = 'r', default_value = "listen")]
        rights: AccessRights,
    },
    /// Revoke rights on an existing reservation
    Revoke {
        url: String,
        principal: Sid,
        #[arg(long, short = 'r', default_value = "listen-and-delegate")]
        rights: AccessRights,
    },
    /// Delete a reservation
    #[command(visible_alias = "rm")]
    Delete { url: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "urlacl=debug" } else { "urlacl=warn" };
    let filter = EnvFilter::try_from_env("URLACL_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<ClientConfig> {
    let config = match path {
        Some(path) => ClientConfig::from_path(path)?,
        None => ClientConfig::default(),
    };
    Ok(config.apply_env()?)
}

fn open_store(store_file: Option<PathBuf>) -> Result<Box<dyn ConfigStore>> {
    if let Some(path) = store_file {
        tracing::debug!(path = %path.display(), "using file store");
        return Ok(Box::new(FileStore::new(path)));
    }
    native_store()
}

#[cfg(windows)]
fn native_store() -> Result<Box<dyn ConfigStore>> {
    Ok(Box::new(urlacl::store::NativeStore::new()))
}

#[cfg(not(windows))]
fn native_store() -> Result<Box<dyn ConfigStore>> {
    bail!("the http.sys store is only available on Windows; pass --store-file to use a JSON store")
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref()).context("loading configuration")?;
    let client = UrlAclClient::with_config(open_store(cli.store_file)?, config);

    match cli.command {
        Commands::List { json } => {
            let reservations = client.reservations()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reservations)?);
            } else {
                for reservation in &reservations {
                    print_reservation(reservation);
                }
            }
        }
        Commands::Show { url, json } => {
            let Some(reservation) = client.reservation(&url)? else {
                bail!("no URL reservation for '{}'", url);
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&reservation)?);
            } else {
                print_reservation(&reservation);
            }
        }
        Commands::Add { url, principal, rights } => {
            let reservation = client.register(&url, AccessRule::new(principal, rights))?;
            println!("Reserved {}", reservation);
        }
        Commands::Grant { url, principal, rights } => {
            let mut reservation = find(&client, &url)?;
            client.add_access_rule(&mut reservation, AccessRule::new(principal, rights))?;
            println!("Updated {}", reservation);
        }
        Commands::Revoke { url, principal, rights } => {
            let mut reservation = find(&client, &url)?;
            let rule = AccessRule::new(principal, rights);
            if !client.remove_access_rule(&mut reservation, &rule)? {
                eprintln!("warning: {} held none of the rights '{}'", rule.identity, rights);
            }
            println!("Updated {}", reservation);
        }
        Commands::Delete { url } => {
            client.delete_url(&url)?;
            println!("Deleted {}", url);
        }
    }
    Ok(())
}

fn find<S: ConfigStore>(client: &UrlAclClient<S>, url: &str) -> Result<UrlReservation> {
    client
        .reservation(url)?
        .with_context(|| format!("no URL reservation for '{}'", url))
}

fn print_reservation(reservation: &UrlReservation) {
    println!("{}", reservation.url());
    for rule in reservation.access_rules() {
        println!("    {:<40} {}", rule.identity.to_string(), rule.rights);
    }
    println!("    SDDL: {}", reservation.rules().to_sddl());
}
