//! Shopfront CLI - browse the catalog, manage the cart and place orders.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password from SHOPFRONT_PASSWORD or prompted on stdin)
//! shopfront login -e ada@example.com
//!
//! # Browse
//! shopfront products list --search pineapple
//! shopfront products show 7
//!
//! # Cart
//! shopfront cart add 7 -q 2
//! shopfront cart set 12 3
//! shopfront cart show
//!
//! # Checkout
//! shopfront checkout --address "1 Main St" --payment paypal
//!
//! # Admin
//! shopfront admin orders status 42 shipped
//! ```
//!
//! # Commands
//!
//! - `login` / `logout` / `register` / `whoami` / `profile` - Account
//! - `products` / `categories` - Catalog
//! - `cart` - Cart contents
//! - `checkout` / `orders` - Ordering
//! - `admin` - Product, category and order management (admin accounts only)
//! - `health` - Backend reachability
//!
//! See `shopfront_client::config` for the environment variables.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use shopfront_client::ClientConfig;
use shopfront_client::types::UpdateCategoryRequest;
use shopfront_core::{CartItemId, CategoryId, OrderId, OrderStatus, PaymentMethod, ProductId};

mod commands;

use commands::{CliError, Context};

#[derive(Parser)]
#[command(name = "shopfront")]
#[command(author, version, about = "Shopfront command-line storefront")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Password (prompted on stdin when omitted)
        #[arg(long, env = "SHOPFRONT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Create an account (does not sign in)
    Register {
        #[arg(short, long)]
        email: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(long)]
        phone: Option<String>,

        /// Default shipping address
        #[arg(long)]
        address: Option<String>,

        /// Password (prompted on stdin when omitted)
        #[arg(long, env = "SHOPFRONT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Show the signed-in user
    Whoami {
        /// Re-fetch the profile from the backend
        #[arg(long)]
        refresh: bool,
    },
    /// Update the signed-in user's profile
    Profile(ProfileArgs),
    /// Browse products
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
    /// List categories
    Categories,
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Turn the cart into an order
    Checkout {
        /// Shipping address (defaults to the profile address)
        #[arg(long)]
        address: Option<String>,

        /// `credit_card`, `debit_card`, `paypal` or `cash_on_delivery`
        #[arg(long, default_value_t = PaymentMethod::default())]
        payment: PaymentMethod,
    },
    /// Order history
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Catalog and order management
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Check that the backend is reachable
    Health,
}

#[derive(Args)]
struct ProfileArgs {
    #[arg(long)]
    first_name: Option<String>,

    #[arg(long)]
    last_name: Option<String>,

    #[arg(long)]
    phone: Option<String>,

    #[arg(long)]
    address: Option<String>,
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List products
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 10)]
        limit: u32,

        /// Restrict to one category
        #[arg(long)]
        category: Option<CategoryId>,

        /// Name search
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show one product
    Show {
        id: ProductId,

        /// Bypass the local catalog cache
        #[arg(long)]
        refresh: bool,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add a product
    Add {
        product_id: ProductId,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Change the quantity of a cart line
    Set { item_id: CartItemId, quantity: u32 },
    /// Remove a cart line
    Remove { item_id: CartItemId },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List your orders
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Show one order
    Show { id: OrderId },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Manage products
    Product {
        #[command(subcommand)]
        action: AdminProductAction,
    },
    /// Manage categories
    Category {
        #[command(subcommand)]
        action: AdminCategoryAction,
    },
    /// Manage orders
    Orders {
        #[command(subcommand)]
        action: AdminOrdersAction,
    },
}

#[derive(Subcommand)]
enum AdminCategoryAction {
    /// Create a category
    Create {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        image: Option<String>,
    },
    /// Change the given fields of a category
    Update {
        id: CategoryId,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        image: Option<String>,
    },
    /// Delete a category with no products
    Delete { id: CategoryId },
}

#[derive(Subcommand)]
enum AdminProductAction {
    /// Create a product
    Create(ProductFields),
    /// Replace a product's fields
    Update {
        id: ProductId,

        #[command(flatten)]
        fields: ProductFields,
    },
    /// Delete a product
    Delete { id: ProductId },
}

#[derive(Args)]
struct ProductFields {
    #[arg(short, long)]
    name: String,

    #[arg(short, long, default_value = "")]
    description: String,

    /// Unit price, e.g. `19.99`
    #[arg(short, long)]
    price: Decimal,

    #[arg(short, long)]
    stock: u32,

    #[arg(short, long)]
    category: CategoryId,

    /// Image URL or path
    #[arg(long)]
    image: Option<String>,
}

#[derive(Subcommand)]
enum AdminOrdersAction {
    /// List every customer's orders
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 20)]
        limit: u32,

        /// Only orders in this status
        #[arg(long)]
        status: Option<OrderStatus>,
    },
    /// Move an order to a new status
    Status { id: OrderId, status: OrderStatus },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = ClientConfig::from_env();

    // Sentry first so the tracing layer has a client to report to
    let sentry_guard = config.as_ref().ok().and_then(init_sentry);
    init_tracing();

    let result = match config {
        Ok(config) => run(cli, &config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        // process::exit skips destructors; flush pending Sentry events first
        drop(sentry_guard);
        std::process::exit(1);
    }
}

/// Initialize Sentry error tracking. Returns `None` without a DSN.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    config.sentry_dsn.as_ref().map(|dsn| {
        sentry::init((
            dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: config.sentry_environment.clone().map(Into::into),
                attach_stacktrace: true,
                ..Default::default()
            },
        ))
    })
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shopfront_client=info,shopfront_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

/// Errors and warnings become Sentry events; info and debug become
/// breadcrumbs on the next event.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

async fn run(cli: Cli, config: &ClientConfig) -> Result<(), CliError> {
    let ctx = Context::new(config)?;

    match cli.command {
        Commands::Login { email, password } => {
            commands::auth::login(&ctx, &email, password).await?;
        }
        Commands::Logout => commands::auth::logout(&ctx).await,
        Commands::Register {
            email,
            first_name,
            last_name,
            phone,
            address,
            password,
        } => {
            let account = commands::auth::NewAccount {
                email,
                first_name,
                last_name,
                phone,
                address,
            };
            commands::auth::register(&ctx, account, password).await?;
        }
        Commands::Whoami { refresh } => commands::auth::whoami(&ctx, refresh).await?,
        Commands::Profile(args) => {
            let update = shopfront_client::types::UpdateProfileRequest {
                first_name: args.first_name,
                last_name: args.last_name,
                phone: args.phone,
                address: args.address,
            };
            commands::auth::update_profile(&ctx, &update).await?;
        }
        Commands::Products { action } => match action {
            ProductsAction::List {
                page,
                limit,
                category,
                search,
            } => {
                let query = shopfront_client::types::ProductQuery {
                    page: Some(page),
                    limit: Some(limit),
                    category_id: category,
                    search,
                };
                commands::catalog::list_products(&ctx, &query).await?;
            }
            ProductsAction::Show { id, refresh } => {
                commands::catalog::show_product(&ctx, id, refresh).await?;
            }
        },
        Commands::Categories => commands::catalog::list_categories(&ctx).await?,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&ctx).await?,
            CartAction::Add {
                product_id,
                quantity,
            } => commands::cart::add(&ctx, product_id, quantity).await?,
            CartAction::Set { item_id, quantity } => {
                commands::cart::set_quantity(&ctx, item_id, quantity).await?;
            }
            CartAction::Remove { item_id } => commands::cart::remove(&ctx, item_id).await?,
            CartAction::Clear => commands::cart::clear(&ctx).await?,
        },
        Commands::Checkout { address, payment } => {
            commands::orders::checkout(&ctx, address, payment).await?;
        }
        Commands::Orders { action } => match action {
            OrdersAction::List { page, limit } => {
                commands::orders::list(&ctx, page, limit).await?;
            }
            OrdersAction::Show { id } => commands::orders::show(&ctx, id).await?,
        },
        Commands::Admin { action } => match action {
            AdminAction::Product { action } => match action {
                AdminProductAction::Create(fields) => {
                    commands::admin::create_product(&ctx, fields.into_input()).await?;
                }
                AdminProductAction::Update { id, fields } => {
                    commands::admin::update_product(&ctx, id, fields.into_input()).await?;
                }
                AdminProductAction::Delete { id } => {
                    commands::admin::delete_product(&ctx, id).await?;
                }
            },
            AdminAction::Category { action } => match action {
                AdminCategoryAction::Create {
                    name,
                    description,
                    image,
                } => {
                    let input = commands::admin::category_input(&name, description, image)?;
                    commands::admin::create_category(&ctx, input).await?;
                }
                AdminCategoryAction::Update {
                    id,
                    name,
                    description,
                    image,
                } => {
                    let update = UpdateCategoryRequest {
                        name,
                        description,
                        image,
                    };
                    commands::admin::update_category(&ctx, id, update).await?;
                }
                AdminCategoryAction::Delete { id } => {
                    commands::admin::delete_category(&ctx, id).await?;
                }
            },
            AdminAction::Orders { action } => match action {
                AdminOrdersAction::List {
                    page,
                    limit,
                    status,
                } => commands::admin::list_orders(&ctx, page, limit, status).await?,
                AdminOrdersAction::Status { id, status } => {
                    commands::admin::set_order_status(&ctx, id, status).await?;
                }
            },
        },
        Commands::Health => commands::health(&ctx).await?,
    }
    Ok(())
}

impl ProductFields {
    fn into_input(self) -> commands::admin::ProductDraft {
        commands::admin::ProductDraft {
            name: self.name,
            description: self.description,
            price: self.price,
            stock: self.stock,
            image: self.image,
            category_id: self.category,
        }
    }
}
