//! Kreg Market CLI - browse the catalog and manage a cart from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Browse
//! kreg products --category Dairy
//! kreg search milk
//! kreg category Dairy --limit 4
//!
//! # Account
//! kreg login -e ann@example.com          # password from KREG_PASSWORD or --password
//! kreg whoami
//!
//! # Cart
//! kreg cart add 64f1c0ffee
//! kreg cart update 64f1c0ffee 3
//! kreg cart show
//! ```
//!
//! Session and cart mirror live in `KREG_DATA_DIR` (default `.kreg`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use clap::{Parser, Subcommand};
use kreg_storefront::api::HttpApi;
use kreg_storefront::config::ClientConfig;
use kreg_storefront::store::FileStore;
use kreg_storefront::sync::CartSync;
use secrecy::SecretString;

mod commands;

#[derive(Parser)]
#[command(name = "kreg")]
#[command(author, version, about = "Kreg Market storefront client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the catalog
    Products {
        /// Only show products in this category
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show one product
    Product {
        /// Product id
        id: String,
    },
    /// Search product names, descriptions and categories
    Search {
        /// Search text
        query: String,
    },
    /// Browse a category grouped by subcategory
    Category {
        /// Category name (exact match)
        name: String,

        /// Show only the first N products
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Log in and keep the session
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "KREG_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "KREG_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the session and clear the local cart
    Logout,
    /// Show the current session
    Whoami,
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add one unit of a product
    Add { id: String },
    /// Set the quantity of a line (0 or less removes it)
    Update {
        id: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove { id: String },
    /// Empty the cart
    Clear,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kreg_storefront=info,kreg_cli=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::from_env()?;
    let api = HttpApi::new(&config)?;
    let sync = CartSync::new(api, Arc::new(FileStore::new(&config.data_dir)));

    match cli.command {
        Commands::Products { category } => {
            commands::catalog::products(&sync, category.as_deref()).await?;
        }
        Commands::Product { id } => commands::catalog::product(&sync, &id).await?,
        Commands::Search { query } => {
            commands::catalog::search(&sync, &query, config.search_debounce).await?;
        }
        Commands::Category { name, limit } => {
            commands::catalog::category(&sync, &name, limit).await?;
        }
        Commands::Login { email, password } => {
            commands::account::login(&sync, &email, &SecretString::from(password)).await?;
        }
        Commands::Register {
            name,
            email,
            password,
        } => {
            commands::account::register(&sync, &name, &email, &SecretString::from(password))
                .await?;
        }
        Commands::Logout => commands::account::logout(&sync),
        Commands::Whoami => commands::account::whoami(&sync),
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&sync).await,
            CartAction::Add { id } => commands::cart::add(&sync, &id).await?,
            CartAction::Update { id, quantity } => {
                commands::cart::update(&sync, &id, quantity).await?;
            }
            CartAction::Remove { id } => commands::cart::remove(&sync, &id).await?,
            CartAction::Clear => commands::cart::clear(&sync).await?,
        },
    }
    Ok(())
}
