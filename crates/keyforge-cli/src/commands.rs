//! CLI command implementations.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::{Confirm, Password};
use keyforge_crypto::keystore::{self, KeystoreDocument};
use keyforge_crypto::{signer, ChildNumber, DerivationPath, HDNode, Mnemonic, Wallet};
use keyforge_types::{Address, Hash, Signature, Transaction, TransactionRequest};
use rand::rngs::OsRng;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

use crate::config::CliConfig;
use crate::output::*;

/// Main CLI.
#[derive(Parser)]
#[command(name = "keyforge")]
#[command(about = "Mnemonics, HD accounts, keystores and transaction signing")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Config file (defaults to ~/.keyforge/config.toml)
    #[arg(short, long, global = true, env = "KEYFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Chain ID, overrides the config file
    #[arg(long, global = true)]
    pub chain_id: Option<u64>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Mnemonic phrases
    #[command(subcommand)]
    Mnemonic(MnemonicCommands),

    /// Derive account addresses from a mnemonic
    Derive {
        /// Derivation path of the first account
        #[arg(short, long)]
        path: Option<String>,
        /// Number of consecutive accounts
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,
        #[command(flatten)]
        source: MnemonicSource,
        /// Also print private keys (WARNING: exposes keys)
        #[arg(long)]
        show_private_key: bool,
    },

    /// Print the extended public key at a path
    Xpub {
        /// Derivation path
        #[arg(short, long, default_value = "m/44'/60'/0'/0")]
        path: String,
        #[command(flatten)]
        source: MnemonicSource,
    },

    /// Encrypted keystore files
    #[command(subcommand)]
    Keystore(KeystoreCommands),

    /// Sign a JSON transaction request with a keystore account
    SignTx {
        /// Keystore file
        #[arg(short, long)]
        keystore: PathBuf,
        /// Transaction request JSON file
        request: PathBuf,
        /// Read the keystore password from a file
        #[arg(long)]
        password_file: Option<PathBuf>,
        /// Sign without replay protection when the request has no chainId
        #[arg(long)]
        legacy: bool,
    },

    /// Verify a 65-byte signature against an address
    VerifySig {
        /// Expected signer address
        address: String,
        /// Signature as 0x-prefixed hex (r || s || v)
        signature: String,
        /// Personal message (EIP-191)
        #[arg(long, conflicts_with = "digest", required_unless_present = "digest")]
        message: Option<String>,
        /// Raw 32-byte digest
        #[arg(long)]
        digest: Option<String>,
    },
}

/// Mnemonic commands.
#[derive(Subcommand)]
pub enum MnemonicCommands {
    /// Generate a new mnemonic
    New {
        /// Number of words (12, 15, 18, 21 or 24)
        #[arg(short, long, default_value = "12")]
        words: usize,
    },
    /// Check a mnemonic without printing it
    Check {
        #[command(flatten)]
        source: MnemonicSource,
    },
}

/// Keystore commands.
#[derive(Subcommand)]
pub enum KeystoreCommands {
    /// Encrypt a mnemonic account or private key into a keystore file
    Encrypt {
        /// Output file (defaults to the configured keystore directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Derivation path for mnemonic accounts
        #[arg(short, long)]
        path: Option<String>,
        /// Import a raw private key instead of a mnemonic
        #[arg(long)]
        private_key: bool,
        #[command(flatten)]
        source: MnemonicSource,
        /// Read the keystore password from a file
        #[arg(long)]
        password_file: Option<PathBuf>,
    },
    /// Decrypt a keystore file and show its account
    Decrypt {
        /// Keystore file
        file: PathBuf,
        /// Read the keystore password from a file
        #[arg(long)]
        password_file: Option<PathBuf>,
        /// Print the private key (WARNING: exposes key)
        #[arg(long)]
        show_private_key: bool,
    },
}

/// Where to read a mnemonic from.
#[derive(clap::Args, Clone, Debug, Default)]
pub struct MnemonicSource {
    /// Read the mnemonic from a file instead of prompting
    #[arg(long)]
    pub mnemonic_file: Option<PathBuf>,
    /// Prompt for a BIP-39 passphrase
    #[arg(long)]
    pub passphrase: bool,
}

/// Execute a CLI command.
pub fn execute(cmd: Commands, config: &CliConfig) -> anyhow::Result<()> {
    match cmd {
        Commands::Mnemonic(cmd) => execute_mnemonic(cmd, config),
        Commands::Derive {
            path,
            count,
            source,
            show_private_key,
        } => {
            let base = resolve_path(path.as_deref(), config)?;
            let (mnemonic, passphrase) = read_mnemonic(&source)?;
            let root = HDNode::from_seed(&mnemonic.to_seed(&passphrase))?;
            let accounts = derive_accounts(&root, &base, count)?;
            print_accounts(&accounts);

            if show_private_key && confirm("Print private keys to the terminal?")? {
                for (path, _) in &accounts {
                    let node = root.derive_path(path)?;
                    let key = node
                        .private_key_bytes()
                        .ok_or_else(|| anyhow::anyhow!("node has no private key"))?;
                    println!("{}  0x{}", path, hex::encode(&key[..]));
                }
            }
            Ok(())
        }
        Commands::Xpub { path, source } => {
            let path: DerivationPath = path.parse()?;
            let (mnemonic, passphrase) = read_mnemonic(&source)?;
            let node = HDNode::from_seed(&mnemonic.to_seed(&passphrase))?.derive_path(&path)?;
            println!("{}", node.to_xpub());
            Ok(())
        }
        Commands::Keystore(cmd) => execute_keystore(cmd, config),
        Commands::SignTx {
            keystore: keystore_file,
            request,
            password_file,
            legacy,
        } => {
            let default_chain = (!legacy).then_some(config.chain_id);
            let tx = load_request(&request, default_chain)?;
            let doc = KeystoreDocument::load(&keystore_file)
                .with_context(|| format!("loading keystore {}", keystore_file.display()))?;
            let password = read_password(password_file.as_deref(), false)?;
            let wallet = keystore::decrypt(&doc, &password)?;

            let signed = wallet.sign_transaction(&tx)?;
            print_info(&format!("{}", tx));
            print_info(&format!("tx hash {}", signed.hash()));
            println!("{}", signed.to_hex());
            Ok(())
        }
        Commands::VerifySig {
            address,
            signature,
            message,
            digest,
        } => {
            let address: Address = address.parse()?;
            let signature = parse_signature(&signature)?;
            let digest = match (message, digest) {
                (Some(message), _) => signer::hash_message(message.as_bytes()),
                (None, Some(digest)) => digest.parse::<Hash>()?,
                (None, None) => anyhow::bail!("either --message or --digest is required"),
            };
            if signer::verify(&address, &digest, &signature) {
                print_success(&format!("Signature is valid for {}", address));
                Ok(())
            } else {
                anyhow::bail!("Signature does not match {}", address)
            }
        }
    }
}

fn execute_mnemonic(cmd: MnemonicCommands, config: &CliConfig) -> anyhow::Result<()> {
    match cmd {
        MnemonicCommands::New { words } => {
            let mnemonic = Mnemonic::generate(words, &mut OsRng)?;
            let wallet =
                Wallet::from_mnemonic(mnemonic, "", config.derivation_path()?)?;
            let phrase = wallet
                .export_phrase()
                .ok_or_else(|| anyhow::anyhow!("generated wallet has no mnemonic"))?;

            print_warning("Write these words down and keep them offline.");
            println!("{}", phrase.as_str().bold());
            print_info(&format!(
                "{} {}",
                config.default_path,
                wallet.address()
            ));
        }
        MnemonicCommands::Check { source } => {
            let (mnemonic, _) = read_mnemonic(&MnemonicSource {
                passphrase: false,
                ..source
            })?;
            print_success(&format!("Valid {}-word mnemonic", mnemonic.word_count()));
        }
    }
    Ok(())
}

fn execute_keystore(cmd: KeystoreCommands, config: &CliConfig) -> anyhow::Result<()> {
    match cmd {
        KeystoreCommands::Encrypt {
            out,
            path,
            private_key,
            source,
            password_file,
        } => {
            let wallet = if private_key {
                let input = Zeroizing::new(
                    Password::new()
                        .with_prompt("Private key (hex)")
                        .interact()?,
                );
                Wallet::from_private_key(&*parse_private_key(&input)?)?
            } else {
                let path = resolve_path(path.as_deref(), config)?;
                let (mnemonic, passphrase) = read_mnemonic(&source)?;
                if !passphrase.is_empty() {
                    print_warning(
                        "The passphrase is not stored. The keystore will hold this account's key only.",
                    );
                }
                Wallet::from_mnemonic(mnemonic, &passphrase, path)?
            };

            let options = config.keystore_options()?;
            let password = read_password(password_file.as_deref(), true)?;
            let doc = keystore::encrypt(&wallet, &password, &options, &mut OsRng)?;

            let out = match out {
                Some(out) => out,
                None => {
                    std::fs::create_dir_all(&config.keystore_dir)?;
                    config.keystore_dir.join(keystore_file_name(&wallet.address()))
                }
            };
            doc.save(&out)
                .with_context(|| format!("writing {}", out.display()))?;
            print_success(&format!(
                "Saved {} to {}",
                format_address_short(&wallet.address()),
                out.display()
            ));
        }
        KeystoreCommands::Decrypt {
            file,
            password_file,
            show_private_key,
        } => {
            let doc = KeystoreDocument::load(&file)
                .with_context(|| format!("loading keystore {}", file.display()))?;
            let password = read_password(password_file.as_deref(), false)?;
            let wallet = keystore::decrypt(&doc, &password)?;

            println!("Address: {}", wallet.address().to_string().bright_cyan());
            match wallet.path() {
                Some(path) => println!("Path:    {}", path),
                None => println!("Path:    {}", "(bare key)".dimmed()),
            }
            if show_private_key && confirm("Print the private key to the terminal?")? {
                println!("Key:     {}", wallet.export_private_key_hex()?.as_str());
            }
        }
    }
    Ok(())
}

/// Addresses for `count` consecutive siblings starting at `base`.
pub fn derive_accounts(
    root: &HDNode,
    base: &DerivationPath,
    count: u32,
) -> anyhow::Result<Vec<(DerivationPath, Address)>> {
    let (parent_path, first) = match (base.parent(), base.as_slice().last()) {
        (Some(parent), Some(first)) => (parent, *first),
        _ => return Ok(vec![(base.clone(), root.address())]),
    };
    let parent = root.derive_path(&parent_path)?;

    let mut accounts = Vec::with_capacity(count as usize);
    for offset in 0..count {
        let index = first
            .index()
            .checked_add(offset)
            .ok_or_else(|| anyhow::anyhow!("account index overflow"))?;
        let child = if first.is_hardened() {
            ChildNumber::hardened(index)?
        } else {
            ChildNumber::normal(index)?
        };
        let node = parent.derive_child(child)?;
        accounts.push((parent_path.child(child), node.address()));
    }
    Ok(accounts)
}

/// Read a transaction request, filling in `default_chain_id` when absent.
pub fn load_request(path: &Path, default_chain_id: Option<u64>) -> anyhow::Result<Transaction> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let request: TransactionRequest =
        serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))?;
    let mut tx = Transaction::try_from(request)?;
    if tx.chain_id.is_none() {
        tx.chain_id = default_chain_id;
        tx.validate()?;
    }
    Ok(tx)
}

pub fn parse_private_key(input: &str) -> anyhow::Result<Zeroizing<[u8; 32]>> {
    let hex_str = input.trim();
    let hex_str = hex_str
        .strip_prefix("0x")
        .or_else(|| hex_str.strip_prefix("0X"))
        .unwrap_or(hex_str);
    let bytes = Zeroizing::new(hex::decode(hex_str).context("private key is not hex")?);
    if bytes.len() != 32 {
        anyhow::bail!("Invalid private key length: expected 64 hex chars (32 bytes)");
    }
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&bytes);
    Ok(key)
}

pub fn parse_signature(input: &str) -> anyhow::Result<Signature> {
    let hex_str = input.trim().trim_start_matches("0x");
    let bytes = hex::decode(hex_str).context("signature is not hex")?;
    Ok(Signature::from_slice(&bytes)?)
}

/// File name for a keystore written to the keystore directory.
pub fn keystore_file_name(address: &Address) -> String {
    format!("keyforge--{}.json", address.to_hex())
}

fn resolve_path(path: Option<&str>, config: &CliConfig) -> anyhow::Result<DerivationPath> {
    match path {
        Some(p) => Ok(p.parse()?),
        None => config.derivation_path(),
    }
}

/// Read a mnemonic from `source`, and a passphrase if requested.
fn read_mnemonic(source: &MnemonicSource) -> anyhow::Result<(Mnemonic, Zeroizing<String>)> {
    let phrase = match &source.mnemonic_file {
        Some(path) => Zeroizing::new(
            std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?,
        ),
        None => Zeroizing::new(Password::new().with_prompt("Mnemonic").interact()?),
    };
    let mnemonic = Mnemonic::parse(&phrase)?;

    let passphrase = if source.passphrase {
        Zeroizing::new(
            Password::new()
                .with_prompt("BIP-39 passphrase")
                .allow_empty_password(true)
                .interact()?,
        )
    } else {
        Zeroizing::new(String::new())
    };
    Ok((mnemonic, passphrase))
}

/// Read a password from a file (first line) or prompt for it.
pub fn read_password(file: Option<&Path>, confirm: bool) -> anyhow::Result<Zeroizing<String>> {
    if let Some(path) = file {
        let contents = Zeroizing::new(
            std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?,
        );
        let line = contents.lines().next().unwrap_or("");
        return Ok(Zeroizing::new(line.to_string()));
    }

    let mut prompt = Password::new();
    prompt = prompt.with_prompt("Keystore password");
    if confirm {
        prompt = prompt.with_confirmation("Confirm password", "Passwords don't match");
    }
    Ok(Zeroizing::new(prompt.interact()?))
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}
