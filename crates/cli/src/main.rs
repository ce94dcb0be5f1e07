//! Elvora CLI - storefront and back-office client for the hosted shop.
//!
//! # Usage
//!
//! ```bash
//! # Browse and buy
//! elvora products --category Women
//! elvora product 12
//! elvora cart add 12 --size M
//! elvora checkout --first-name Amina ... --postal-code 10000
//! elvora orders --follow
//!
//! # Back office
//! elvora admin login -e admin@elvora.ma
//! elvora admin dashboard
//! elvora admin watch
//! ```
//!
//! # Commands
//!
//! - `products`, `product` - browse the catalog
//! - `cart` - edit the cart persisted in the data directory
//! - `checkout` - place a cash-on-delivery order
//! - `orders` - orders placed from this device
//! - `admin` - session, dashboard, order desk and catalog management
//!
//! Configuration is read from the environment, see [`config`].

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use elvora_core::{Category, OrderStatus};
use elvora_storefront::checkout::DEFAULT_COUNTRY;
use elvora_storefront::{BrowseFilter, CheckoutForm, SortBy};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod error;
mod supabase;

use commands::Context;
use commands::admin::{MediaPaths, ProductFields};
use config::CliConfig;
use error::CliError;

#[derive(Parser)]
#[command(name = "elvora")]
#[command(author, version, about = "Elvora storefront and back-office client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog products
    Products {
        /// Only these categories (repeatable)
        #[arg(short, long)]
        category: Vec<Category>,

        /// Only these product types (repeatable)
        #[arg(short = 't', long = "type")]
        product_type: Vec<String>,

        /// Sort order
        #[arg(short, long, value_enum, default_value_t = SortArg::Relevant)]
        sort: SortArg,
    },
    /// Show one product and related products
    Product {
        /// Product identifier
        id: String,
    },
    /// Edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Place an order for the cart (cash on delivery)
    Checkout(CheckoutArgs),
    /// Orders placed from this device
    Orders {
        /// Keep running and print status changes
        #[arg(short, long)]
        follow: bool,
    },
    /// Back-office commands
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Relevant,
    PriceLow,
    PriceHigh,
}

impl From<SortArg> for SortBy {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Relevant => Self::Relevant,
            SortArg::PriceLow => Self::PriceLow,
            SortArg::PriceHigh => Self::PriceHigh,
        }
    }
}

#[derive(Subcommand)]
enum CartAction {
    /// Add a product in a size
    Add {
        id: String,
        #[arg(short, long)]
        size: String,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Remove a line
    Remove {
        id: String,
        #[arg(short, long)]
        size: String,
    },
    /// Set the quantity of a line
    Set {
        id: String,
        #[arg(short, long)]
        size: String,
        quantity: u32,
    },
    /// Empty the cart
    Clear,
    /// Print the cart
    Show,
}

#[derive(clap::Args)]
struct CheckoutArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    address: String,
    #[arg(long)]
    city: String,
    #[arg(long)]
    postal_code: String,
    #[arg(long, default_value = DEFAULT_COUNTRY)]
    country: String,
}

impl From<CheckoutArgs> for CheckoutForm {
    fn from(args: CheckoutArgs) -> Self {
        Self {
            first_name: args.first_name,
            last_name: args.last_name,
            email: args.email,
            phone: args.phone,
            address: args.address,
            city: args.city,
            postal_code: args.postal_code,
            country: args.country,
        }
    }
}

#[derive(Subcommand)]
enum AdminAction {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "ELVORA_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out
    Logout,
    /// Order counters and order list
    Dashboard {
        /// Filter by customer name, order number or phone
        #[arg(short, long)]
        search: Option<String>,
        /// Also list products
        #[arg(short, long)]
        products: bool,
    },
    /// Follow orders and products live
    Watch,
    /// Change the status of an order
    Status { id: String, status: OrderStatus },
    /// Delete an order
    DeleteOrder { id: String },
    /// Create a product
    ProductAdd {
        name: String,
        price: Decimal,
        category: Category,
        #[command(flatten)]
        details: ProductDetailArgs,
        #[command(flatten)]
        media: MediaArgs,
    },
    /// Update a product; omitted fields and media are kept
    ProductUpdate {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        price: Option<Decimal>,
        #[arg(long)]
        category: Option<Category>,
        #[command(flatten)]
        details: ProductDetailArgs,
        #[command(flatten)]
        media: MediaArgs,
    },
    /// Delete a product
    ProductDelete { id: String },
}

#[derive(clap::Args)]
struct ProductDetailArgs {
    /// Product type, e.g. "T-shirt" (empty to clear)
    #[arg(long = "type")]
    product_type: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// Offered sizes, comma-separated
    #[arg(long, value_delimiter = ',')]
    sizes: Vec<String>,
}

#[derive(clap::Args)]
struct MediaArgs {
    /// Main image file
    #[arg(long)]
    image: Option<PathBuf>,
    /// Gallery image file (repeatable)
    #[arg(long)]
    gallery: Vec<PathBuf>,
    /// 360° video file
    #[arg(long)]
    video: Option<PathBuf>,
}

impl From<MediaArgs> for MediaPaths {
    fn from(args: MediaArgs) -> Self {
        Self {
            image: args.image,
            gallery: args.gallery,
            video: args.video,
        }
    }
}

impl ProductDetailArgs {
    fn into_fields(
        self,
        name: Option<String>,
        price: Option<Decimal>,
        category: Option<Category>,
    ) -> ProductFields {
        ProductFields {
            name,
            price,
            category,
            product_type: self.product_type,
            description: self.description,
            sizes: self
                .sizes
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CliConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = CliConfig::from_env();

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // Defaults to info for every elvora crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "elvora=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(config) => run(cli, &config).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.is_remote() {
                sentry::capture_error(&e);
            }
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: &CliConfig) -> Result<(), CliError> {
    let ctx = Context::new(config)?;

    match cli.command {
        Commands::Products {
            category,
            product_type,
            sort,
        } => {
            let filter = BrowseFilter {
                categories: category,
                types: product_type,
                sort: sort.into(),
            };
            commands::shop::products(&ctx, &filter).await
        }
        Commands::Product { id } => commands::shop::product(&ctx, &id).await,
        Commands::Cart { action } => match action {
            CartAction::Add { id, size, quantity } => {
                commands::shop::cart_add(&ctx, &id, &size, quantity).await
            }
            CartAction::Remove { id, size } => commands::shop::cart_remove(&ctx, &id, &size),
            CartAction::Set { id, size, quantity } => {
                commands::shop::cart_set(&ctx, &id, &size, quantity)
            }
            CartAction::Clear => commands::shop::cart_clear(&ctx),
            CartAction::Show => commands::shop::cart(&ctx),
        },
        Commands::Checkout(args) => commands::shop::checkout(&ctx, &args.into()).await,
        Commands::Orders { follow } => commands::shop::orders(&ctx, follow).await,
        Commands::Admin { action } => run_admin(&ctx, action).await,
    }
}

async fn run_admin(ctx: &Context, action: AdminAction) -> Result<(), CliError> {
    match action {
        AdminAction::Login { email, password } => {
            commands::admin::login(ctx, &email, &password).await
        }
        AdminAction::Logout => commands::admin::logout(ctx).await,
        AdminAction::Dashboard { search, products } => {
            commands::admin::dashboard(ctx, search.as_deref(), products).await
        }
        AdminAction::Watch => commands::admin::watch(ctx).await,
        AdminAction::Status { id, status } => commands::admin::set_status(ctx, &id, status).await,
        AdminAction::DeleteOrder { id } => commands::admin::delete_order(ctx, &id).await,
        AdminAction::ProductAdd {
            name,
            price,
            category,
            details,
            media,
        } => {
            let fields = details.into_fields(None, None, None);
            commands::admin::product_add(ctx, name, price, category, fields, media.into()).await
        }
        AdminAction::ProductUpdate {
            id,
            name,
            price,
            category,
            details,
            media,
        } => {
            let fields = details.into_fields(name, price, category);
            commands::admin::product_update(ctx, &id, fields, media.into()).await
        }
        AdminAction::ProductDelete { id } => commands::admin::product_delete(ctx, &id).await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_products_filters_parse() {
        let cli = Cli::try_parse_from([
            "elvora", "products", "-c", "women", "-c", "Kids", "--type", "Robe", "--sort", "price-low",
        ])
        .unwrap();
        let Commands::Products {
            category,
            product_type,
            sort,
        } = cli.command
        else {
            panic!("expected products command");
        };
        assert_eq!(category, vec![Category::Women, Category::Kids]);
        assert_eq!(product_type, vec!["Robe"]);
        assert_eq!(SortBy::from(sort), SortBy::PriceLow);
    }

    #[test]
    fn test_checkout_defaults_country() {
        let cli = Cli::try_parse_from([
            "elvora",
            "checkout",
            "--first-name",
            "Amina",
            "--last-name",
            "Berrada",
            "--email",
            "amina@mail.ma",
            "--phone",
            "0611223344",
            "--address",
            "12 rue Atlas",
            "--city",
            "Rabat",
            "--postal-code",
            "10000",
        ])
        .unwrap();
        let Commands::Checkout(args) = cli.command else {
            panic!("expected checkout command");
        };
        let form = CheckoutForm::from(args);
        assert_eq!(form.country, DEFAULT_COUNTRY);
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_admin_status_parses_wire_value() {
        let cli = Cli::try_parse_from(["elvora", "admin", "status", "42", "shipped"]).unwrap();
        let Commands::Admin {
            action: AdminAction::Status { id, status },
        } = cli.command
        else {
            panic!("expected admin status command");
        };
        assert_eq!(id, "42");
        assert_eq!(status, OrderStatus::Shipped);
    }

    #[test]
    fn test_product_update_sizes_are_split() {
        let cli = Cli::try_parse_from([
            "elvora", "admin", "product-update", "7", "--sizes", "S, M,,XL", "--price", "199.5",
        ])
        .unwrap();
        let Commands::Admin {
            action:
                AdminAction::ProductUpdate {
                    price, details, ..
                },
        } = cli.command
        else {
            panic!("expected product-update command");
        };
        let fields = details.into_fields(None, price, None);
        assert_eq!(fields.sizes, vec!["S", "M", "XL"]);
        assert_eq!(fields.price, Some(Decimal::new(1995, 1)));
    }
}
