//! Permissioned Registry Command Line Interface
//!
//! Operates a sled-backed registry in a local data directory. Every command
//! acts as the account given with `--as` and prints a JSON document holding
//! the result and the events the command emitted.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use permreg_registry::{
    LoggingConfig, PermissionedRegistry, RegisterRequest, RegistryConfig, RegistryEvent,
};
use permreg_storage::SledStorage;
use permreg_types::{
    label_to_canonical_id, Address, CanonicalId, Clock, Role, RoleBitmap, SystemClock, TokenId,
    DEFAULT_OWNER_ROLES, ID_BYTES,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_DATA_DIR: &str = "permreg-data";
const ONE_YEAR: u64 = 365 * 24 * 60 * 60;

#[derive(Parser)]
#[command(name = "permreg-cli")]
#[command(about = "Permissioned name registry command line interface", long_about = None)]
#[command(version)]
struct Cli {
    /// Registry database directory (overrides storage.path)
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Account performing the operation
    #[arg(long = "as", value_name = "ADDRESS")]
    caller: Option<Address>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grant every role and admin role on the root resource to an account
    Init {
        #[arg(long)]
        admin: Address,
    },
    /// Register a name
    Register {
        label: String,
        #[arg(long)]
        owner: Address,
        /// Comma-separated role names, `_admin` suffix for admin bits
        #[arg(long)]
        roles: Option<String>,
        #[arg(long)]
        subregistry: Option<Address>,
        #[arg(long)]
        resolver: Option<Address>,
        #[command(flatten)]
        expiry: ExpiryArgs,
    },
    /// Reserve a name without an owner
    Reserve {
        label: String,
        #[arg(long)]
        resolver: Option<Address>,
        #[command(flatten)]
        expiry: ExpiryArgs,
    },
    /// Extend the expiry of a live name
    Renew {
        name: NameRef,
        /// New expiry (unix seconds)
        #[arg(long)]
        expiry: u64,
    },
    /// Expire a name now and retire its token
    Unregister { name: NameRef },
    /// Expire a name now and burn its token
    Burn { name: NameRef },
    /// Set or clear the resolver
    SetResolver {
        name: NameRef,
        /// Omit to clear
        resolver: Option<Address>,
    },
    /// Set or clear the subregistry
    SetSubregistry {
        name: NameRef,
        /// Omit to clear
        subregistry: Option<Address>,
    },
    /// Grant roles on a name, or on the root with --root
    Grant(RoleArgs),
    /// Revoke roles on a name, or on the root with --root
    Revoke(RoleArgs),
    /// Transfer one or more tokens
    Transfer {
        /// Current owner, defaults to the acting account
        #[arg(long)]
        from: Option<Address>,
        #[arg(long)]
        to: Address,
        #[arg(required = true)]
        names: Vec<NameRef>,
    },
    /// Approve or disapprove an operator for all of the acting account's tokens
    Approve {
        operator: Address,
        #[arg(long)]
        revoke: bool,
    },
    /// Show the stored entry of a name
    Entry { name: NameRef },
    /// Show the current owner of a token
    OwnerOf { name: NameRef },
    /// Show the lifecycle status of a name
    Status { name: NameRef },
    /// Show the roles an account holds on a name
    Roles { name: NameRef, account: Address },
    /// Print the effective configuration as TOML
    Config {
        /// Print built-in defaults instead
        #[arg(long)]
        defaults: bool,
    },
}

#[derive(Args)]
struct ExpiryArgs {
    /// Absolute expiry (unix seconds)
    #[arg(long, conflicts_with = "duration")]
    expiry: Option<u64>,
    /// Lifetime in seconds from now
    #[arg(long, default_value_t = ONE_YEAR)]
    duration: u64,
}

impl ExpiryArgs {
    fn resolve(&self, now: u64) -> u64 {
        self.expiry
            .unwrap_or_else(|| now.saturating_add(self.duration))
    }
}

#[derive(Args)]
struct RoleArgs {
    /// Comma-separated role names
    roles: String,
    account: Address,
    /// Name to act on
    #[arg(long, required_unless_present = "root", conflicts_with = "root")]
    name: Option<NameRef>,
    /// Act on the root resource
    #[arg(long)]
    root: bool,
}

/// A name given either as a label or as a `0x`-prefixed 32-byte id.
#[derive(Debug, Clone)]
enum NameRef {
    Label(String),
    Id(TokenId),
}

impl FromStr for NameRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.starts_with("0x") && s.len() == 2 + ID_BYTES * 2 {
            return Ok(NameRef::Id(s.parse()?));
        }
        // reject bad labels up front
        label_to_canonical_id(s)?;
        Ok(NameRef::Label(s.to_string()))
    }
}

impl NameRef {
    fn canonical(&self) -> Result<CanonicalId> {
        Ok(match self {
            NameRef::Label(label) => label_to_canonical_id(label)?,
            NameRef::Id(id) => id.canonical_id(),
        })
    }

    /// The given id, or the name's current token for a label.
    fn token_id(&self, registry: &PermissionedRegistry) -> Result<TokenId> {
        Ok(match self {
            NameRef::Label(label) => registry.get_token_id(label_to_canonical_id(label)?)?,
            NameRef::Id(id) => *id,
        })
    }
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .init(),
        _ => registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
    }
}

fn parse_roles(list: &str) -> Result<RoleBitmap> {
    let roles = Role::parse_list(list)?;
    if roles.is_empty() {
        bail!("no roles given");
    }
    Ok(roles)
}

fn role_names(bitmap: RoleBitmap) -> Vec<String> {
    bitmap
        .roles()
        .into_iter()
        .map(|r| r.name().to_string())
        .chain(
            bitmap
                .admin_roles()
                .into_iter()
                .map(|r| format!("{}_admin", r.name())),
        )
        .collect()
}

fn open_registry(cli: &Cli, config: RegistryConfig) -> Result<(PermissionedRegistry, Arc<SledStorage>)> {
    let path = cli
        .data_dir
        .clone()
        .or_else(|| config.storage.path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let store = Arc::new(
        SledStorage::new(&path)
            .with_context(|| format!("failed to open registry database at {}", path.display()))?,
    );
    debug!("Using registry database at {}", path.display());
    let registry = PermissionedRegistry::new(store.clone(), Arc::new(SystemClock), config);
    Ok((registry, store))
}

fn print(result: Value, events: Vec<RegistryEvent>) -> Result<()> {
    let doc = json!({ "result": result, "events": events });
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = RegistryConfig::load(cli.config.as_deref())?;
    init_logging(&config.logging);

    if let Commands::Config { defaults } = &cli.command {
        let shown = if *defaults {
            RegistryConfig::default()
        } else {
            config
        };
        print!("{}", shown.to_toml_string()?);
        return Ok(());
    }

    let (mut registry, store) = open_registry(&cli, config)?;
    let caller = || {
        cli.caller
            .ok_or_else(|| anyhow!("this command needs an acting account (--as <ADDRESS>)"))
    };
    let now = SystemClock.now();

    let result = match &cli.command {
        Commands::Init { admin } => {
            let change = registry.initialize_root(admin, RoleBitmap::ALL)?;
            info!("Initialised root roles for {}", admin);
            json!({ "admin": admin, "roles": role_names(change.added) })
        }
        Commands::Register {
            label,
            owner,
            roles,
            subregistry,
            resolver,
            expiry,
        } => {
            let roles = match roles {
                Some(list) => Role::parse_list(list)?,
                None => DEFAULT_OWNER_ROLES,
            };
            let request = RegisterRequest {
                label: label.clone(),
                owner: *owner,
                subregistry: *subregistry,
                resolver: *resolver,
                roles,
                expiry: expiry.resolve(now),
            };
            let token_id = registry.register(&caller()?, request)?;
            json!({ "token_id": token_id, "resource": registry.get_resource(token_id)? })
        }
        Commands::Reserve {
            label,
            resolver,
            expiry,
        } => {
            let token_id = registry.reserve(&caller()?, label, *resolver, expiry.resolve(now))?;
            json!({ "token_id": token_id })
        }
        Commands::Renew { name, expiry } => {
            registry.renew(&caller()?, name.canonical()?, *expiry)?;
            json!({ "expiry": expiry })
        }
        Commands::Unregister { name } => {
            registry.unregister(&caller()?, name.canonical()?)?;
            Value::Null
        }
        Commands::Burn { name } => {
            registry.burn(&caller()?, name.canonical()?)?;
            Value::Null
        }
        Commands::SetResolver { name, resolver } => {
            registry.set_resolver(&caller()?, name.canonical()?, *resolver)?;
            json!({ "resolver": resolver })
        }
        Commands::SetSubregistry { name, subregistry } => {
            registry.set_subregistry(&caller()?, name.canonical()?, *subregistry)?;
            json!({ "subregistry": subregistry })
        }
        Commands::Grant(args) => {
            let roles = parse_roles(&args.roles)?;
            let change = match &args.name {
                Some(name) if !args.root => {
                    registry.grant_roles(&caller()?, name.canonical()?, roles, &args.account)?
                }
                _ => registry.grant_root_roles(&caller()?, roles, &args.account)?,
            };
            json!({ "resource": change.resource, "added": role_names(change.added) })
        }
        Commands::Revoke(args) => {
            let roles = parse_roles(&args.roles)?;
            let change = match &args.name {
                Some(name) if !args.root => {
                    registry.revoke_roles(&caller()?, name.canonical()?, roles, &args.account)?
                }
                _ => registry.revoke_root_roles(&caller()?, roles, &args.account)?,
            };
            json!({ "resource": change.resource, "removed": role_names(change.removed) })
        }
        Commands::Transfer { from, to, names } => {
            let caller = caller()?;
            let from = from.unwrap_or(caller);
            let ids = names
                .iter()
                .map(|n| n.token_id(&registry))
                .collect::<Result<Vec<_>>>()?;
            if let [single] = ids.as_slice() {
                registry.safe_transfer_from(&caller, &from, to, *single)?;
            } else {
                registry.safe_batch_transfer_from(&caller, &from, to, &ids)?;
            }
            json!({ "token_ids": ids })
        }
        Commands::Approve { operator, revoke } => {
            registry.set_approval_for_all(&caller()?, operator, !revoke)?;
            json!({ "operator": operator, "approved": !revoke })
        }
        Commands::Entry { name } => {
            let canonical = name.canonical()?;
            json!({
                "canonical_id": canonical,
                "token_id": registry.get_token_id(canonical)?,
                "resource": registry.get_resource(canonical)?,
                "entry": registry.get_entry(canonical)?,
            })
        }
        Commands::OwnerOf { name } => {
            let token_id = name.token_id(&registry)?;
            json!({
                "token_id": token_id,
                "owner": registry.owner_of(&token_id)?,
                "latest_owner": registry.latest_owner_of(token_id)?,
            })
        }
        Commands::Status { name } => {
            let canonical = name.canonical()?;
            json!({
                "status": registry.get_status(canonical)?,
                "expiry": registry.get_expiry(canonical)?,
            })
        }
        Commands::Roles { name, account } => {
            let canonical = name.canonical()?;
            let held = registry.roles_of(canonical, account)?;
            json!({
                "resource": registry.get_resource(canonical)?,
                "account": account,
                "roles": role_names(held),
                "holders": registry.get_assignee_count(canonical, RoleBitmap::ALL)?.to_string(),
            })
        }
        Commands::Config { .. } => Value::Null,
    };

    store.flush()?;
    print(result, registry.drain_events())
}
