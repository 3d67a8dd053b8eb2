//! CLI commands for the marketplace client
//!
//! User-facing output uses writeln! to stdout; diagnostics go through tracing.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::app_state::AppState;
use crate::media::{ImageFile, ImageSize, SizeHint};
use crate::models::{Credentials, NewAccount, NewProduct, Order, ProductQuery, TopUpForm};
use crate::resource::Resource;
use crate::session::SessionState;
use crate::stock::{self, StockMode};

/// Digital goods marketplace client
#[derive(Parser, Debug)]
#[command(name = "digimart", version, about)]
pub struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = "DIGIMART_API_URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and cache the session.
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Create an account, then log in.
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Log out and clear the cached session.
    Logout,
    /// Show the current session.
    Whoami,
    /// Keep the session check running and print every change until Ctrl-C.
    Watch,
    /// Show balance, payment methods and top-up requests.
    Balance,
    /// Show today's top-up quota.
    Quota,
    /// Request a balance top-up with a payment receipt.
    TopUp {
        #[arg(short, long)]
        amount: f64,
        /// Payment method id
        #[arg(short, long)]
        method: String,
        /// Receipt image (jpeg, png or webp, at most 5 MB)
        #[arg(short, long)]
        receipt: PathBuf,
    },
    /// Browse the catalog.
    Products(ProductArgs),
    /// Manage the cart.
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Pay for the cart from the wallet.
    Checkout,
    /// List orders, or show one.
    Orders { id: Option<String> },
    /// Validate a stock-code block without submitting it.
    StockCheck(StockArgs),
    /// Seller tools.
    Seller {
        #[command(subcommand)]
        action: SellerAction,
    },
    /// Print optimized delivery URLs for an image.
    ImageUrl {
        /// Hosted image URL or bare identifier
        source: String,
        /// Preset variant: small, medium or large
        #[arg(long)]
        size: Option<ImageSize>,
        /// Square thumbnail edge in pixels
        #[arg(long)]
        thumbnail: Option<u32>,
    },
}

#[derive(Args, Debug, Default)]
pub struct ProductArgs {
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub page: Option<u32>,
    #[arg(long)]
    pub limit: Option<u32>,
}

/// Where stock codes come from and how they are sold.
#[derive(Args, Debug)]
pub struct StockArgs {
    /// File with one code per line; reads stdin when omitted
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Sell each code up to this many times (shared-reusable)
    #[arg(long)]
    pub usage_cap: Option<u32>,
}

impl StockArgs {
    fn mode(&self) -> StockMode {
        match self.usage_cap {
            Some(usage_cap) => StockMode::SharedReusable { usage_cap },
            None => StockMode::SingleUse,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum CartAction {
    /// Add a product to the cart.
    Add {
        product_id: String,
        #[arg(short, long, default_value_t = 1)]
        quantity: u64,
    },
    /// Remove a cart line.
    Remove { item_id: String },
    /// Show the cart.
    Show,
}

#[derive(Subcommand, Debug)]
pub enum SellerAction {
    /// Create a listing with its stock codes.
    AddProduct {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        category: String,
        #[arg(long)]
        image_url: Option<String>,
        #[command(flatten)]
        stock: StockArgs,
    },
    /// List orders for your products.
    Orders,
    /// Mark an order delivered.
    Deliver { order_id: String },
    /// Show sales totals.
    Dashboard,
}

/// Execute a command against the shared state.
pub async fn run(command: Command, state: &AppState) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password } => login(state, email, password).await,
        Command::Register {
            username,
            email,
            password,
        } => register(state, username, email, password).await,
        Command::Logout => logout(state).await,
        Command::Whoami => whoami(state),
        Command::Watch => watch(state).await,
        Command::Balance => balance(state).await,
        Command::Quota => quota(state).await,
        Command::TopUp {
            amount,
            method,
            receipt,
        } => top_up(state, amount, method, &receipt).await,
        Command::Products(args) => products(state, args).await,
        Command::Cart { action } => cart(state, action).await,
        Command::Checkout => checkout(state).await,
        Command::Orders { id } => orders(state, id).await,
        Command::StockCheck(args) => stock_check(args).await,
        Command::Seller { action } => seller(state, action).await,
        Command::ImageUrl {
            source,
            size,
            thumbnail,
        } => image_url(state, &source, size, thumbnail),
    }
}

// ===== Session Commands =====

async fn login(state: &AppState, email: String, password: String) -> anyhow::Result<()> {
    let user = state
        .session
        .login(&Credentials { email, password })
        .await?;
    let mut out = io::stdout();
    writeln!(out, "Logged in as {} ({:?})", user.username, user.role)?;
    Ok(())
}

async fn register(
    state: &AppState,
    username: String,
    email: String,
    password: String,
) -> anyhow::Result<()> {
    let user = state
        .session
        .register(&NewAccount {
            username,
            email,
            password,
        })
        .await?;
    let mut out = io::stdout();
    writeln!(out, "Account created. Logged in as {}", user.username)?;
    Ok(())
}

async fn logout(state: &AppState) -> anyhow::Result<()> {
    state.session.logout().await;
    let mut out = io::stdout();
    writeln!(out, "Logged out")?;
    Ok(())
}

fn whoami(state: &AppState) -> anyhow::Result<()> {
    let mut out = io::stdout();
    if !state.session.check_now() {
        writeln!(out, "Not logged in")?;
        return Ok(());
    }
    match state.session.current_user() {
        Some(user) => {
            writeln!(out, "User:  {}", user.username)?;
            writeln!(out, "Id:    {}", user.id)?;
            if let Some(email) = &user.email {
                writeln!(out, "Email: {}", email)?;
            }
            writeln!(out, "Role:  {:?}", user.role)?;
        }
        None => writeln!(out, "Not logged in")?,
    }
    Ok(())
}

async fn watch(state: &AppState) -> anyhow::Result<()> {
    let mut rx = state.session.watch();
    print_session(&rx.borrow_and_update())?;

    if let Err(e) = state.session.refresh_balance().await {
        tracing::warn!(error = %e, "Initial balance fetch failed");
    }

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();
                print_session(&snapshot)?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping session watch");
                break;
            }
        }
    }
    Ok(())
}

fn print_session(state: &SessionState) -> anyhow::Result<()> {
    let mut out = io::stdout();
    let who = state
        .user
        .as_ref()
        .map(|u| u.username.as_str())
        .unwrap_or("-");
    writeln!(
        out,
        "[{}] loading={} authenticated={} user={} balance={:.2}",
        chrono::Local::now().format("%H:%M:%S"),
        state.is_loading,
        state.is_authenticated,
        who,
        state.balance
    )?;
    Ok(())
}

// ===== Wallet Commands =====

async fn balance(state: &AppState) -> anyhow::Result<()> {
    let overview = state.wallet.overview().await;
    let mut out = io::stdout();

    match &overview.balance {
        Resource::Ready(balance) => writeln!(out, "Balance: {:.2}", balance)?,
        other => writeln!(out, "Balance: {}", describe(other))?,
    }

    writeln!(out, "\nPayment methods:")?;
    match &overview.payment_methods {
        Resource::Ready(methods) if methods.is_empty() => writeln!(out, "  (none)")?,
        Resource::Ready(methods) => {
            for method in methods.iter().filter(|m| m.active) {
                writeln!(out, "  {}  {}", method.id, method.name)?;
                if !method.instructions.is_empty() {
                    writeln!(out, "      {}", method.instructions)?;
                }
            }
        }
        other => writeln!(out, "  {}", describe(other))?,
    }

    writeln!(out, "\nTop-up requests:")?;
    match &overview.requests {
        Resource::Ready(requests) if requests.is_empty() => writeln!(out, "  (none)")?,
        Resource::Ready(requests) => {
            for request in requests {
                writeln!(
                    out,
                    "  {}  {:>10.2}  {:?}  {}",
                    request.id,
                    request.amount,
                    request.status,
                    request.created_at.format("%Y-%m-%d %H:%M")
                )?;
            }
        }
        other => writeln!(out, "  {}", describe(other))?,
    }

    print_usage(&mut out, &overview.usage)?;
    Ok(())
}

async fn quota(state: &AppState) -> anyhow::Result<()> {
    let usage = state.wallet.refresh_usage().await;
    let mut out = io::stdout();
    print_usage(&mut out, &usage)?;
    Ok(())
}

fn print_usage(out: &mut impl Write, usage: &crate::quota::DailyUsage) -> io::Result<()> {
    writeln!(
        out,
        "\nToday: {:.2} of {:.2} requested ({:.2} left), {} of {} requests ({} left)",
        usage.used_amount,
        usage.max_amount,
        usage.remaining_amount(),
        usage.used_requests,
        usage.max_requests,
        usage.remaining_requests()
    )
}

async fn top_up(
    state: &AppState,
    amount: f64,
    method: String,
    receipt: &Path,
) -> anyhow::Result<()> {
    let receipt = ImageFile::from_path(receipt).await?;
    let outcome = state
        .wallet
        .submit_top_up(
            TopUpForm {
                amount,
                payment_method_id: method,
            },
            receipt,
        )
        .await?;

    let mut out = io::stdout();
    writeln!(
        out,
        "Top-up request {} submitted ({:.2}, {:?})",
        outcome.request.id, outcome.request.amount, outcome.request.status
    )?;
    print_usage(&mut out, &outcome.usage)?;
    Ok(())
}

// ===== Shop Commands =====

async fn products(state: &AppState, args: ProductArgs) -> anyhow::Result<()> {
    let query = ProductQuery {
        search: args.search,
        category: args.category,
        page: args.page,
        limit: args.limit,
    };
    let products = state.shop.browse(&query).await?;
    let mut out = io::stdout();
    if products.is_empty() {
        writeln!(out, "No products found")?;
        return Ok(());
    }
    for product in products {
        writeln!(
            out,
            "{}  {:<40} {:>10.2}  stock {}{}",
            product.id,
            product.title,
            product.price,
            product.stock,
            if product.premium { "  [premium]" } else { "" }
        )?;
        if let Some(image) = product.image_url.as_deref() {
            if state.media.is_hosted_url(image) {
                if let Some(id) = state.media.extract_identifier(image) {
                    writeln!(out, "    {}", state.media.build_thumbnail(&id, None))?;
                }
            }
        }
    }
    Ok(())
}

async fn cart(state: &AppState, action: CartAction) -> anyhow::Result<()> {
    let mut out = io::stdout();
    match action {
        CartAction::Add {
            product_id,
            quantity,
        } => {
            state.shop.add_to_cart(&product_id, quantity).await?;
            writeln!(out, "Added {} x {}", quantity, product_id)?;
        }
        CartAction::Remove { item_id } => {
            state.shop.remove_from_cart(&item_id).await?;
            writeln!(out, "Removed {}", item_id)?;
        }
        CartAction::Show => {
            let cart = state.shop.cart().await?;
            if cart.is_empty() {
                writeln!(out, "Cart is empty")?;
                return Ok(());
            }
            for item in &cart.items {
                writeln!(
                    out,
                    "{}  {:<40} {:>3} x {:>10.2}",
                    item.id, item.title, item.quantity, item.price
                )?;
            }
            writeln!(out, "Total: {:.2}", cart.total())?;
        }
    }
    Ok(())
}

async fn checkout(state: &AppState) -> anyhow::Result<()> {
    let order = state.shop.checkout().await?;
    let mut out = io::stdout();
    writeln!(out, "Order {} created, total {:.2}", order.id, order.total_amount)?;
    writeln!(out, "Balance: {:.2}", state.session.state().balance)?;
    Ok(())
}

async fn orders(state: &AppState, id: Option<String>) -> anyhow::Result<()> {
    let mut out = io::stdout();
    match id {
        Some(id) => {
            let order = state.shop.order(&id).await?;
            print_order(&mut out, &order)?;
            for code in &order.delivered_codes {
                writeln!(out, "    {}", code)?;
            }
        }
        None => {
            let orders = state.shop.orders().await?;
            if orders.is_empty() {
                writeln!(out, "No orders yet")?;
            }
            for order in &orders {
                print_order(&mut out, order)?;
            }
        }
    }
    Ok(())
}

fn print_order(out: &mut impl Write, order: &Order) -> io::Result<()> {
    let created = order
        .created_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    writeln!(
        out,
        "{}  {:?}  {:>10.2}  {} items  {}",
        order.id,
        order.status,
        order.total_amount,
        order.items.len(),
        created
    )
}

// ===== Seller Commands =====

async fn stock_check(args: StockArgs) -> anyhow::Result<()> {
    let text = read_stock(args.file.as_deref()).await?;
    let summary = stock::summarize(&text, args.mode());
    let mut out = io::stdout();
    writeln!(out, "{}", summary.message)?;
    if !summary.valid {
        anyhow::bail!("stock block rejected ({} codes read)", summary.code_count);
    }
    Ok(())
}

async fn seller(state: &AppState, action: SellerAction) -> anyhow::Result<()> {
    let mut out = io::stdout();
    match action {
        SellerAction::AddProduct {
            title,
            description,
            price,
            category,
            image_url,
            stock,
        } => {
            let text = read_stock(stock.file.as_deref()).await?;
            let product = state
                .seller
                .create_product(
                    NewProduct {
                        title,
                        description,
                        price,
                        category,
                        image_url,
                    },
                    &text,
                    stock.mode(),
                )
                .await?;
            writeln!(out, "Listing {} created: {}", product.id, product.title)?;
        }
        SellerAction::Orders => {
            for order in &state.seller.orders().await? {
                print_order(&mut out, order)?;
            }
        }
        SellerAction::Deliver { order_id } => {
            let orders = state.seller.deliver_order(&order_id).await?;
            writeln!(out, "Order {} delivered", order_id)?;
            for order in &orders {
                print_order(&mut out, order)?;
            }
        }
        SellerAction::Dashboard => {
            let dashboard = state.seller.dashboard().await?;
            writeln!(out, "Products:       {}", dashboard.total_products)?;
            writeln!(out, "Orders:         {}", dashboard.total_orders)?;
            writeln!(out, "Pending orders: {}", dashboard.pending_orders)?;
            writeln!(out, "Revenue:        {:.2}", dashboard.total_revenue)?;
        }
    }
    Ok(())
}

async fn read_stock(file: Option<&Path>) -> anyhow::Result<String> {
    match file {
        Some(path) => Ok(tokio::fs::read_to_string(path).await?),
        None => {
            use tokio::io::AsyncReadExt;
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            Ok(text)
        }
    }
}

// ===== Media Commands =====

fn image_url(
    state: &AppState,
    source: &str,
    size: Option<ImageSize>,
    thumbnail: Option<u32>,
) -> anyhow::Result<()> {
    let media = &state.media;
    let mut out = io::stdout();

    let identifier = if source.starts_with("http://") || source.starts_with("https://") {
        if !media.is_hosted_url(source) {
            writeln!(out, "{}", source)?;
            return Ok(());
        }
        media
            .extract_identifier(source)
            .ok_or_else(|| anyhow::anyhow!("could not find an image identifier in {}", source))?
    } else {
        source.to_string()
    };

    match (size, thumbnail) {
        (Some(size), _) => writeln!(out, "{}", media.build_sized_variant(&identifier, size))?,
        (None, Some(edge)) => writeln!(out, "{}", media.build_thumbnail(&identifier, Some(edge)))?,
        (None, None) => {
            writeln!(out, "original:  {}", media.build_url(&identifier, SizeHint::default()))?;
            writeln!(out, "thumbnail: {}", media.build_thumbnail(&identifier, None))?;
            for size in [ImageSize::Small, ImageSize::Medium, ImageSize::Large] {
                writeln!(
                    out,
                    "{:<9}  {}",
                    format!("{:?}:", size).to_lowercase(),
                    media.build_sized_variant(&identifier, size)
                )?;
            }
        }
    }
    Ok(())
}

fn describe<T>(resource: &Resource<T>) -> &str {
    match resource {
        Resource::Loading => "loading",
        Resource::Failed(message) => message.as_str(),
        Resource::Ready(_) => "ok",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_cart_command() {
        let cli = Cli::try_parse_from(["digimart", "cart", "add", "p-1", "--quantity", "3"]).unwrap();
        match cli.command {
            Command::Cart {
                action: CartAction::Add {
                    product_id,
                    quantity,
                },
            } => {
                assert_eq!(product_id, "p-1");
                assert_eq!(quantity, 3);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn usage_cap_selects_shared_mode() {
        let cli = Cli::try_parse_from(["digimart", "stock-check", "--usage-cap", "10"]).unwrap();
        let Command::StockCheck(args) = cli.command else {
            panic!("expected stock-check");
        };
        assert_eq!(args.mode(), StockMode::SharedReusable { usage_cap: 10 });

        let cli = Cli::try_parse_from(["digimart", "stock-check"]).unwrap();
        let Command::StockCheck(args) = cli.command else {
            panic!("expected stock-check");
        };
        assert_eq!(args.mode(), StockMode::SingleUse);
    }

    #[test]
    fn image_size_is_parsed_from_name() {
        let cli = Cli::try_parse_from(["digimart", "image-url", "products/abc", "--size", "medium"])
            .unwrap();
        let Command::ImageUrl { size, .. } = cli.command else {
            panic!("expected image-url");
        };
        assert_eq!(size, Some(ImageSize::Medium));
    }

    #[test]
    fn describe_reports_failure_message() {
        let failed: Resource<u32> = Resource::Failed("offline".into());
        assert_eq!(describe(&failed), "offline");
        assert_eq!(describe(&Resource::<u32>::Loading), "loading");
    }
}
