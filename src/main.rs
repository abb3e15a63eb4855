// src/main.rs
//
// =============================================================================
// CNCMARKET: COMMANDER & ENTRY POINT (v 0.3 )
// =============================================================================
//
// The wiring center.
//
// Modes:
// 1. BROWSE:  Terminal library view on top of the incremental loader.
// 2. QUERY:   search / show / filters for scripting.
// 3. ACCOUNT: login / logout / licenses / trial / download.
// 4. DEALER:  mine / publish / delete.
// 5. ADMIN:   review / moderate / hide.
//
// Role checks here only mirror the browser's navigation gating; the backend
// enforces authorization.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::Level;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cncmarket::backend::{CatalogBackend, MemoryBackend};
use cncmarket::client::HttpBackend;
use cncmarket::config::{ClientConfig, Session};
use cncmarket::core::{
    format_enum, parse_wire, review_queue, AuthUser, ContentCategory, ContentType, FilterCriteria,
    MachineType, Product, ProductDraft, ProductId, PublicationStatus, SortDirection, SortKey,
    StatusCounts,
};
use cncmarket::loader::CatalogLoader;
use cncmarket::logs::{LogBuffer, TuiLogger};
use cncmarket::tui::BrowserApp;

// ============================================================================
// 1. CLI DEFINITION
// ============================================================================

#[derive(Parser)]
#[command(name = "cncmarket", version, about = "CNC content marketplace client")]
struct Cli {
    /// YAML client config.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config and environment).
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Entries per page (overrides config and environment).
    #[arg(long, global = true)]
    page_size: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Default)]
struct FilterArgs {
    /// Free-text search on name, manufacturer and owner.
    #[arg(long)]
    query: Option<String>,

    #[arg(long, value_parser = parse_wire::<ContentCategory>)]
    category: Option<ContentCategory>,

    #[arg(long, value_parser = parse_wire::<ContentType>)]
    content_type: Option<ContentType>,

    #[arg(long, value_parser = parse_wire::<MachineType>)]
    machine_type: Option<MachineType>,

    /// "Provided by" in the browser.
    #[arg(long)]
    manufacturer: Option<String>,

    #[arg(long)]
    controller: Option<String>,

    #[arg(long)]
    axes: Option<u32>,

    #[arg(long)]
    owner: Option<String>,

    /// Sort by creation date instead of popularity.
    #[arg(long)]
    recent: bool,

    /// Ascending instead of descending.
    #[arg(long)]
    asc: bool,
}

impl FilterArgs {
    fn criteria(self) -> FilterCriteria {
        FilterCriteria {
            query: self.query,
            category: self.category,
            content_type: self.content_type,
            machine_type: self.machine_type,
            machine_manufacturer: self.manufacturer,
            controller_manufacturer: self.controller,
            number_of_axes: self.axes,
            content_owner: self.owner,
            sort: if self.recent { SortKey::CreatedAt } else { SortKey::DownloadCount },
            direction: if self.asc { SortDirection::Asc } else { SortDirection::Desc },
        }
        .normalized()
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the catalog interactively.
    Browse {
        /// Browse a local JSON product list instead of the backend.
        #[arg(long)]
        fixture: Option<PathBuf>,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Print one page of search results.
    Search {
        #[command(flatten)]
        filters: FilterArgs,

        #[arg(long, default_value_t = 0)]
        page: usize,
    },

    /// Show a product in detail.
    Show { id: i64 },

    /// List the values offered by each filter.
    Filters,

    /// Log in and remember the session.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },

    /// Forget the session.
    Logout,

    /// Dealer: list my products.
    Mine,

    /// Dealer: create or update a product from a YAML draft.
    Publish {
        #[arg(long)]
        file: PathBuf,

        /// Update this product instead of creating one.
        #[arg(long)]
        id: Option<i64>,

        /// Save as draft instead of submitting for review.
        #[arg(long)]
        draft: bool,
    },

    /// Dealer/Admin: delete a product.
    Delete { id: i64 },

    /// Admin: list every product by status tab, e.g. what awaits review.
    Review {
        /// Only this status (all statuses when omitted).
        #[arg(long, value_parser = parse_wire::<PublicationStatus>)]
        status: Option<PublicationStatus>,

        /// Free-text search on name, manufacturer and owner.
        #[arg(long)]
        query: Option<String>,
    },

    /// Admin: hide a product from the public catalog (back to draft).
    Hide { id: i64 },

    /// Admin: change a product's publication status.
    Moderate {
        id: i64,
        #[arg(long, value_parser = parse_wire::<PublicationStatus>)]
        status: PublicationStatus,
    },

    /// Record a download.
    Download { id: i64 },

    /// Request a trial license.
    Trial { id: i64 },

    /// List my licenses.
    Licenses,
}

// ============================================================================
// 2. ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The browser captures logs itself; anything on stderr would tear the screen.
    if !matches!(cli.command, Commands::Browse { .. }) {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    if let Some(size) = cli.page_size {
        config.page_size = size;
    }
    config.validate()?;

    let ctx = Runtime::new(config)?;

    match cli.command {
        Commands::Browse { fixture, filters } => run_browser(&ctx, fixture, filters).await,
        Commands::Search { filters, page } => run_search(&ctx, filters, page).await,
        Commands::Show { id } => run_show(&ctx, ProductId(id)).await,
        Commands::Filters => run_filters(&ctx).await,
        Commands::Login { username, password } => run_login(&ctx, &username, &password).await,
        Commands::Logout => {
            Session::clear(&ctx.config.session_path())?;
            log::info!("Logged out.");
            Ok(())
        }
        Commands::Mine => run_mine(&ctx).await,
        Commands::Publish { file, id, draft } => run_publish(&ctx, &file, id.map(ProductId), draft).await,
        Commands::Delete { id } => run_delete(&ctx, ProductId(id)).await,
        Commands::Review { status, query } => run_review(&ctx, status, query.as_deref()).await,
        Commands::Hide { id } => run_moderate(&ctx, ProductId(id), PublicationStatus::Draft).await,
        Commands::Moderate { id, status } => run_moderate(&ctx, ProductId(id), status).await,
        Commands::Download { id } => {
            ctx.require_session()?;
            ctx.http()?.record_download(ProductId(id)).await?;
            log::info!("Download of {} recorded.", id);
            Ok(())
        }
        Commands::Trial { id } => run_trial(&ctx, ProductId(id)).await,
        Commands::Licenses => run_licenses(&ctx).await,
    }
}

// ============================================================================
// 3. RUNTIME (Config + Session)
// ============================================================================

struct Runtime {
    config: ClientConfig,
    session: Option<AuthUser>,
}

impl Runtime {
    fn new(config: ClientConfig) -> Result<Self> {
        let session = Session::load(&config.session_path())?;
        if let Some(user) = &session {
            log::debug!("Session: {} ({:?})", user.username, user.role);
        }
        Ok(Self { config, session })
    }

    fn http(&self) -> Result<HttpBackend> {
        HttpBackend::new(&self.config, self.session.as_ref().map(|u| u.token.clone()))
    }

    fn require_session(&self) -> Result<&AuthUser> {
        self.session
            .as_ref()
            .ok_or_else(|| anyhow!("Not logged in. Run `cncmarket login` first."))
    }

    fn require_author(&self) -> Result<&AuthUser> {
        let user = self.require_session()?;
        if !user.can_author() {
            return Err(anyhow!("{} is not a dealer, vendor or admin", user.username));
        }
        Ok(user)
    }

    fn require_admin(&self) -> Result<&AuthUser> {
        let user = self.require_session()?;
        if !user.is_admin() {
            return Err(anyhow!("{} is not an admin", user.username));
        }
        Ok(user)
    }
}

// ============================================================================
// 4. BROWSER
// ============================================================================

async fn run_browser(ctx: &Runtime, fixture: Option<PathBuf>, filters: FilterArgs) -> Result<()> {
    let log_buf = LogBuffer::new(200);
    TuiLogger::init(log_buf.clone(), Level::Info).ok();

    let (backend, source): (Arc<dyn CatalogBackend>, String) = match fixture {
        Some(path) => (
            Arc::new(MemoryBackend::from_file(&path)?),
            format!("fixture {}", path.display()),
        ),
        None => {
            let http = ctx.http()?;
            if !http.is_authenticated() {
                log::info!("Browsing anonymously");
            }
            (Arc::new(http), ctx.config.api_url.clone())
        }
    };

    // The browser still works without filter options; only the cycling
    // filters (provider, axes, owner) stay empty.
    let options = match backend.filters().await {
        Ok(o) => o,
        Err(e) => {
            log::warn!("Filter options unavailable: {}", e);
            Default::default()
        }
    };

    let loader = CatalogLoader::new(backend, ctx.config.page_size);
    let mut app = BrowserApp::new(loader, options, log_buf, source);
    let criteria = filters.criteria();
    tokio::task::block_in_place(|| app.run(criteria))
}

// ============================================================================
// 5. QUERY
// ============================================================================

fn print_table(products: &[Product]) {
    println!(
        "{:>6}  {:<36} {:<20} {:<16} {:>4} {:>10} {:>6}",
        "ID", "NAME", "CONTENT", "PROVIDED BY", "AXES", "PRICE", "DL"
    );
    for p in products {
        println!(
            "{:>6}  {:<36} {:<20} {:<16} {:>4} {:>10} {:>6}",
            p.id,
            truncate(&p.name, 36),
            p.content_type.map(|t| t.label()).unwrap_or("-"),
            truncate(&p.machine_manufacturer, 16),
            p.number_of_axes.map(|a| a.to_string()).unwrap_or_default(),
            p.price_label(),
            p.download_count
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

async fn run_search(ctx: &Runtime, filters: FilterArgs, page: usize) -> Result<()> {
    let criteria = filters.criteria();
    let size = ctx.config.page_size;
    let result = ctx
        .http()?
        .search(&criteria, page, size)
        .await
        .context("Search failed")?;

    print_table(&result.content);
    println!(
        "\nPage {} of {} ({} matching, {} filters, sorted by {})",
        page + 1,
        result.total_pages.max(1),
        result.total_elements,
        criteria.active_filter_count(),
        criteria.sort.label()
    );
    Ok(())
}

async fn run_show(ctx: &Runtime, id: ProductId) -> Result<()> {
    let p = ctx.http()?.product(id).await?;

    let row = |k: &str, v: &str| {
        if !v.is_empty() {
            println!("{:<18} {}", k, v);
        }
    };

    println!("{}\n", p.name);
    row("Content", p.content_type.map(|t| t.label()).unwrap_or_default());
    row("Category", p.category.map(|c| c.label()).unwrap_or_default());
    row("Status", p.publication_status.map(|s| s.label()).unwrap_or_default());
    row("Price", &p.price_label());
    row("Trial", &p.trial_days.filter(|d| *d > 0).map(|d| format!("{} days", d)).unwrap_or_default());
    row("Verified", if p.is_verified() { "yes, on equipment" } else { "" });
    row("Downloads", &p.download_count.to_string());
    row("Machine", &format!("{} {} {}", p.machine_manufacturer, p.machine_series, p.machine_model).trim().to_string());
    row("Machine type", p.machine_type.map(|t| t.label()).unwrap_or_default());
    row("Axes", &p.number_of_axes.map(|a| a.to_string()).unwrap_or_default());
    row("Controller", &p.controller_line());
    row("Min. software", &p.min_software_version);
    row("Owner", &p.product_owner);
    row("Author", &p.author_name);
    row("Supported codes", &p.supported_codes);
    row("Kit contents", &p.kit_contents);
    if let Some(at) = p.published_at {
        row("Published", &at.format("%Y-%m-%d").to_string());
    }
    if !p.description.is_empty() {
        println!("\n{}", p.description);
    }
    if !p.sample_output_code.is_empty() {
        println!("\n--- sample output ---\n{}", p.sample_output_code);
    }
    Ok(())
}

async fn run_filters(ctx: &Runtime) -> Result<()> {
    let o = ctx.http()?.filters().await?;

    let show = |name: &str, values: Vec<String>| {
        println!("{:<24} {}", name, values.join(", "));
    };
    let pretty = |values: &[String]| values.iter().map(|v| format_enum(v)).collect::<Vec<_>>();

    show("Categories", pretty(&o.categories));
    show("Content types", pretty(&o.content_types));
    show("Machine types", pretty(&o.machine_types));
    show("Machine manufacturers", o.machine_manufacturers.clone());
    show("Controller manufacturers", o.controller_manufacturers.clone());
    show("Axes", o.number_of_axes.iter().map(|a| a.to_string()).collect());
    show("Owners", o.content_owners.clone());
    Ok(())
}

// ============================================================================
// 6. ACCOUNT
// ============================================================================

async fn run_login(ctx: &Runtime, username: &str, password: &str) -> Result<()> {
    let anonymous = HttpBackend::new(&ctx.config, None)?;
    let user = anonymous.login(username, password).await.context("Login failed")?;
    Session::save(&ctx.config.session_path(), &user)?;
    log::info!("Logged in as {} ({:?})", user.username, user.role);
    Ok(())
}

async fn run_trial(ctx: &Runtime, id: ProductId) -> Result<()> {
    let user = ctx.require_session()?;
    let license = ctx.http()?.issue_trial(user.user_id, id).await?;
    match license.expires_at {
        Some(at) => log::info!("Trial license issued for {} (expires {})", license.product_name, at.format("%Y-%m-%d")),
        None => log::info!("Trial license issued for {}", license.product_name),
    }
    Ok(())
}

async fn run_licenses(ctx: &Runtime) -> Result<()> {
    let user = ctx.require_session()?;
    let licenses = ctx.http()?.user_licenses(user.user_id).await?;
    if licenses.is_empty() {
        println!("No licenses.");
    }
    for l in licenses {
        println!(
            "{:>6}  {:<36} {:<10} {}",
            l.product_id,
            truncate(&l.product_name, 36),
            l.license_type,
            l.expires_at
                .map(|at| format!("expires {}", at.format("%Y-%m-%d")))
                .unwrap_or_else(|| "perpetual".into())
        );
    }
    Ok(())
}

// ============================================================================
// 7. DEALER & ADMIN
// ============================================================================

async fn run_mine(ctx: &Runtime) -> Result<()> {
    ctx.require_author()?;
    let http = ctx.http()?;

    // Older backends lack /products/my; the full list is the fallback.
    let products = match http.my_products().await {
        Ok(p) => p,
        Err(e) => {
            log::warn!("/products/my failed ({}); falling back to all products", e);
            http.all_products().await?
        }
    };

    print_table(&products);
    println!("\n{}", StatusCounts::tally(&products));
    Ok(())
}

async fn run_publish(ctx: &Runtime, file: &Path, id: Option<ProductId>, as_draft: bool) -> Result<()> {
    ctx.require_author()?;

    let raw = std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let mut draft: ProductDraft =
        serde_yaml::from_str(&raw).with_context(|| format!("Invalid draft {}", file.display()))?;
    draft.validate().map_err(|e| anyhow!("Invalid draft: {}", e))?;
    draft.publication_status = Some(if as_draft {
        PublicationStatus::Draft
    } else {
        PublicationStatus::PendingReview
    });

    let http = ctx.http()?;
    let saved = match id {
        Some(id) => http.update_product(id, &draft).await?,
        None => http.create_product(&draft).await?,
    };
    log::info!(
        "Saved \"{}\" as {} ({})",
        saved.name,
        saved.id,
        saved.publication_status.map(|s| s.label()).unwrap_or("unknown status")
    );
    Ok(())
}

async fn run_delete(ctx: &Runtime, id: ProductId) -> Result<()> {
    ctx.require_author()?;
    ctx.http()?.delete_product(id).await?;
    log::info!("Product {} deleted.", id);
    Ok(())
}

async fn run_review(ctx: &Runtime, status: Option<PublicationStatus>, query: Option<&str>) -> Result<()> {
    ctx.require_admin()?;
    let products = ctx.http()?.all_products().await.context("Failed to load products")?;

    let queue = review_queue(&products, status, query);
    println!(
        "{:>6}  {:<36} {:<16} {:<16} {:<15}",
        "ID", "NAME", "PROVIDED BY", "OWNER", "STATUS"
    );
    for p in &queue {
        println!(
            "{:>6}  {:<36} {:<16} {:<16} {:<15}",
            p.id,
            truncate(&p.name, 36),
            truncate(&p.machine_manufacturer, 16),
            truncate(&p.product_owner, 16),
            p.publication_status.map(|s| s.label()).unwrap_or("-")
        );
    }
    if queue.is_empty() {
        println!("Nothing here.");
    }
    println!("\n{}", StatusCounts::tally(&products));
    Ok(())
}

async fn run_moderate(ctx: &Runtime, id: ProductId, status: PublicationStatus) -> Result<()> {
    ctx.require_admin()?;
    let p = ctx.http()?.update_status(id, status).await?;
    match status {
        PublicationStatus::Published => log::info!("\"{}\" published and visible to customers", p.name),
        PublicationStatus::Rejected => log::info!("\"{}\" rejected", p.name),
        PublicationStatus::Draft => log::info!("\"{}\" hidden from public", p.name),
        _ => log::info!("\"{}\" moved to {}", p.name, status.label()),
    }
    Ok(())
}
