//! shadowfax command-line client.
//!
//! Manages a home directory holding the key vault, its salt file, and the
//! contact book, and talks to a relay server:
//!
//! ```text
//! sf name add <name> <addr>   assign a name to an address
//! sf name list                list name assignments
//! sf addr create              generate a new address
//! sf addr default             print the current address
//! sf addr list                list all addresses in the vault
//! sf msg push <recipient>     send stdin (or --file) to a recipient
//! sf msg pop                  drain and print the inbox
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shadowfax_client::Client;
use shadowfax_crypto::{KeyPair, PublicKey};
use shadowfax_store::{Contacts, SaltFile, Vault};

const SALT_FILE_NAME: &str = "vault.salt";
const VAULT_DB_NAME: &str = "vault";
const CONTACTS_DB_NAME: &str = "contacts";

/// shadowfax client
///
/// Sends and receives end-to-end encrypted messages through a relay.
#[derive(Parser, Debug)]
#[command(name = "sf")]
#[command(version, about, long_about = None)]
struct Args {
    /// shadowfax home directory
    #[arg(long, env = "SHADOWFAX_HOME")]
    homedir: Option<PathBuf>,

    /// Server URL
    #[arg(
        short = 'u',
        long,
        env = "SHADOWFAX_SERVER",
        default_value = "https://localhost:8443"
    )]
    url: String,

    /// Public key of the shadowfax server (skips the /publickey fetch)
    #[arg(long, env = "SHADOWFAX_SERVER_KEY")]
    server_key: Option<String>,

    /// Log filter (tracing EnvFilter syntax)
    #[arg(long, env = "SF_LOG", default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Contact names
    Name {
        #[command(subcommand)]
        command: NameCommand,
    },
    /// Addresses
    Addr {
        #[command(subcommand)]
        command: AddrCommand,
    },
    /// Messages
    Msg {
        #[command(subcommand)]
        command: MsgCommand,
    },
}

#[derive(Subcommand, Debug)]
enum NameCommand {
    /// Assign a name to an address
    Add {
        /// Contact name
        name: String,
        /// Contact address (Base58 public key)
        addr: String,
    },
    /// List name assignments
    List,
}

#[derive(Subcommand, Debug)]
enum AddrCommand {
    /// Create a new address
    Create,
    /// Show the default address
    Default,
    /// List all addresses in the vault
    List,
}

#[derive(Subcommand, Debug)]
enum MsgCommand {
    /// Push a message
    Push {
        /// Sender address (defaults to the vault's current address)
        #[arg(short = 's', long)]
        sender: Option<String>,
        /// Read message contents from a file instead of stdin
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,
        /// Message recipient (contact name or Base58 address)
        recipient: String,
    },
    /// Pop messages
    Pop,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let homedir = args.homedir.clone().unwrap_or_else(default_homedir);
    ensure_homedir(&homedir)?;

    match &args.command {
        Command::Name {
            command: NameCommand::Add { name, addr },
        } => {
            let contacts = open_contacts(&homedir)?;
            let key = PublicKey::decode(addr).context("invalid contact address")?;
            contacts.put(name, &key)?;
        }
        Command::Name {
            command: NameCommand::List,
        } => {
            let contacts = open_contacts(&homedir)?;
            for info in contacts.current()? {
                println!("{:<20} {:<50}", info.name, info.address.encode());
            }
        }
        Command::Addr {
            command: AddrCommand::Create,
        } => {
            let vault = unlock_vault(&homedir)?;
            let keypair = KeyPair::generate();
            vault.put(&keypair)?;

            let contacts = open_contacts(&homedir)?;
            contacts.put("me", keypair.public_key())?;
            println!("{}", keypair.public_key().encode());
        }
        Command::Addr {
            command: AddrCommand::Default,
        } => {
            let vault = unlock_vault(&homedir)?;
            println!("{}", vault.current()?.public_key().encode());
        }
        Command::Addr {
            command: AddrCommand::List,
        } => {
            let vault = unlock_vault(&homedir)?;
            vault.each(|keypair| {
                println!("{}", keypair.public_key().encode());
                Ok(())
            })?;
        }
        Command::Msg {
            command:
                MsgCommand::Push {
                    sender,
                    file,
                    recipient,
                },
        } => {
            let vault = unlock_vault(&homedir)?;
            let keypair = match sender {
                Some(addr) => {
                    let key = PublicKey::decode(addr).context("invalid sender address")?;
                    vault.get(&key)?
                }
                None => vault.current()?,
            };

            let contacts = open_contacts(&homedir)?;
            let recipient_key = resolve_recipient(&contacts, recipient)?;

            let contents = read_contents(file.as_deref())?;

            let client = new_client(&args, keypair).await?;
            client.push(&recipient_key.encode(), &contents).await?;
        }
        Command::Msg {
            command: MsgCommand::Pop,
        } => {
            let vault = unlock_vault(&homedir)?;
            let keypair = vault.current()?;

            let client = new_client(&args, keypair).await?;
            let inbox = client.pop().await?;
            for (i, msg) in inbox.messages.iter().enumerate() {
                println!(
                    "{} {} {} {}",
                    i,
                    msg.id,
                    msg.sender,
                    String::from_utf8_lossy(&msg.contents)
                );
            }
            for failure in &inbox.failures {
                eprintln!(
                    "dropped message {} from {}: {}",
                    failure.id, failure.sender, failure.error
                );
            }
        }
    }

    Ok(())
}

fn default_homedir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".shadowfax"),
        None => PathBuf::from(".shadowfax"),
    }
}

fn ensure_homedir(homedir: &Path) -> Result<()> {
    std::fs::create_dir_all(homedir)
        .with_context(|| format!("cannot create homedir {}", homedir.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(homedir, std::fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

fn open_contacts(homedir: &Path) -> Result<Contacts> {
    let path = homedir.join(CONTACTS_DB_NAME);
    let db = sled::open(&path)
        .with_context(|| format!("cannot open contacts {}", path.display()))?;
    Ok(Contacts::open(&db)?)
}

/// Prompt for the passphrase and unlock (or initialize) the vault.
///
/// A fresh vault asks for confirmation and writes the salt file; an
/// existing one verifies the passphrase against the stored verifier before
/// the vault database is opened.
fn unlock_vault(homedir: &Path) -> Result<Vault> {
    let salt_path = homedir.join(SALT_FILE_NAME);

    let passphrase = rpassword::prompt_password("Passphrase: ")?;
    let salt_file = if salt_path.exists() {
        SaltFile::load(&salt_path)?
    } else {
        let confirm = rpassword::prompt_password("Confirm: ")?;
        if confirm != passphrase {
            bail!("passphrases did not match");
        }
        let salt_file = SaltFile::create(passphrase.as_bytes());
        salt_file.store(&salt_path)?;
        salt_file
    };

    let key = salt_file.unlock(passphrase.as_bytes())?;

    let vault_path = homedir.join(VAULT_DB_NAME);
    let db = sled::open(&vault_path)
        .with_context(|| format!("cannot open vault {}", vault_path.display()))?;
    Ok(Vault::open(&db, key)?)
}

/// Resolve a recipient argument: a contact name first, a raw Base58
/// address as a fallback.
fn resolve_recipient(contacts: &Contacts, recipient: &str) -> Result<PublicKey> {
    match contacts.key(recipient) {
        Ok(key) => Ok(key),
        Err(_) => PublicKey::decode(recipient)
            .with_context(|| format!("unknown contact or invalid address {recipient:?}")),
    }
}

fn read_contents(file: Option<&Path>) -> Result<Vec<u8>> {
    let mut contents = Vec::new();
    match file {
        Some(path) => {
            contents = std::fs::read(path)
                .with_context(|| format!("cannot read message file {}", path.display()))?;
        }
        None => {
            std::io::stdin()
                .read_to_end(&mut contents)
                .context("cannot read message from stdin")?;
        }
    }
    Ok(contents)
}

async fn new_client(args: &Args, keypair: KeyPair) -> Result<Client> {
    let server_key = match &args.server_key {
        Some(encoded) => PublicKey::decode(encoded).context("invalid server key")?,
        None => {
            let http = reqwest::Client::new();
            Client::fetch_server_key(&args.url, &http).await?
        }
    };
    Ok(Client::new(keypair, &args.url, server_key))
}
