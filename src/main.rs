use clap::{Args, Parser, Subcommand};
use mealpay::application::checkout::{CheckoutPayment, CheckoutService, build_draft};
use mealpay::application::orchestrator::{FallbackSwitch, PaymentOrchestrator};
use mealpay::config::{BackendConfig, ProviderConfig, ServerMode};
use mealpay::domain::auth::{User, UserMetadata};
use mealpay::domain::order::{OrderSummary, PaymentMethod};
use mealpay::domain::payment::{CardDetails, PaymentLinkRequest};
use mealpay::domain::ports::{OrderStoreRef, SessionRef, TransportBox};
use mealpay::error::PaymentError;
use mealpay::infrastructure::in_memory::{InMemoryOrderStore, StaticSession};
use mealpay::infrastructure::supabase::{AuthClient, SupabaseClient};
use mealpay::infrastructure::transports::{AppServerTransport, EdgeFunctionTransport};
use mealpay::infrastructure::tropipay::TropipayService;
use mealpay::interfaces::csv::meal_writer::MealWriter;
use mealpay::interfaces::json::document_reader::read_document_file;
use miette::{IntoDiagnostic, Result};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate an order summary and print its meals as CSV
    Validate {
        /// Order summary JSON file
        summary: PathBuf,
    },
    /// Place an order from a summary and pay for it
    Checkout(CheckoutArgs),
    /// Create a hosted payment link straight with the provider
    PaymentLink(PaymentLinkArgs),
}

#[derive(Args)]
struct CheckoutArgs {
    /// Order summary JSON file
    summary: PathBuf,

    /// Payment method: card or tropipay
    #[arg(long)]
    method: String,

    #[arg(long)]
    card_number: Option<String>,

    #[arg(long)]
    expiry_date: Option<String>,

    #[arg(long)]
    cvv: Option<String>,

    /// Public address the payer returns to after paying by link
    #[arg(long, default_value = "http://localhost:8080")]
    origin: String,

    /// Application server used when the hosted function is unavailable
    #[arg(long, env = "APP_SERVER_URL", default_value = "http://localhost:3000")]
    app_server_url: String,

    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: Option<String>,

    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    supabase_anon_key: Option<String>,

    /// Sign in with this account (hosted backend only)
    #[arg(long, requires = "password")]
    email: Option<String>,

    #[arg(long, env = "MEALPAY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// User the order belongs to when not signing in
    #[arg(long, default_value = "local-user")]
    user_id: String,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[derive(Args)]
struct PaymentLinkArgs {
    /// Payment link request JSON file
    request: PathBuf,

    #[arg(long, env = "TROPIPAY_CLIENT_ID")]
    client_id: Option<String>,

    #[arg(long, env = "TROPIPAY_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Selects the provider environment; anything but "production" is development
    #[arg(long, env = "APP_ENV", default_value = "development")]
    app_env: String,

    /// Overrides the provider base URL
    #[arg(long, env = "TROPIPAY_BASE_URL")]
    provider_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Validate { summary } => validate(summary),
        Command::Checkout(args) => checkout(args).await,
        Command::PaymentLink(args) => payment_link(args).await,
    }
}

fn validate(path: PathBuf) -> Result<()> {
    let summary: OrderSummary = read_document_file(path).into_diagnostic()?;
    let draft = build_draft(&summary, &local_user("local-user")).into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = MealWriter::new(stdout.lock());
    writer.write_meals(&draft.meals).into_diagnostic()?;
    Ok(())
}

async fn checkout(args: CheckoutArgs) -> Result<()> {
    let payment = match args.method.parse::<PaymentMethod>().into_diagnostic()? {
        PaymentMethod::Card => CheckoutPayment::Card(card_details(&args).into_diagnostic()?),
        PaymentMethod::Tropipay => CheckoutPayment::Tropipay,
    };
    let summary: OrderSummary = read_document_file(&args.summary).into_diagnostic()?;

    let fallback: TransportBox = Box::new(AppServerTransport::new(args.app_server_url.clone()));
    let switch = FallbackSwitch::new();
    let backend =
        BackendConfig::from_parts(args.supabase_url.clone(), args.supabase_anon_key.clone())
            .into_diagnostic()?;

    let (orchestrator, user) = match backend {
        Some(config) => {
            let (session, user): (SessionRef, User) = match (&args.email, &args.password) {
                (Some(email), Some(password)) => {
                    let session = AuthClient::new(config.clone())
                        .sign_in(email, password)
                        .await
                        .into_diagnostic()?;
                    let user = session.user.clone();
                    let session: SessionRef = Arc::new(session);
                    (session, user)
                }
                _ => {
                    let session: SessionRef = Arc::new(StaticSession::anonymous());
                    (session, local_user(&args.user_id))
                }
            };
            let client = Arc::new(SupabaseClient::new(config, session.clone()));
            let orchestrator = PaymentOrchestrator::new(client.clone(), session, fallback, switch)
                .with_primary(Box::new(EdgeFunctionTransport::new(client)));
            orchestrator.probe_primary().await;
            (orchestrator, user)
        }
        None => {
            info!("no hosted backend configured, using local order storage");
            let store = open_local_store(args.db_path.clone())?;
            let orchestrator = PaymentOrchestrator::new(
                store,
                Arc::new(StaticSession::anonymous()),
                fallback,
                switch,
            );
            (orchestrator, local_user(&args.user_id))
        }
    };

    let service = CheckoutService::new(orchestrator);
    let outcome = service
        .submit(&summary, payment, &user, &args.origin)
        .await
        .into_diagnostic()?;
    let status = service
        .orchestrator()
        .order(&outcome.order_id)
        .await
        .into_diagnostic()?
        .map(|order| order.status.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("order: {}", outcome.order_id);
    println!("status: {status}");
    if let Some(reference) = &outcome.reference {
        println!("reference: {reference}");
    }
    if let Some(url) = &outcome.redirect_url {
        println!("redirect: {url}");
    }
    Ok(())
}

async fn payment_link(args: PaymentLinkArgs) -> Result<()> {
    let request: PaymentLinkRequest = read_document_file(&args.request).into_diagnostic()?;
    let config = ProviderConfig {
        client_id: args.client_id,
        client_secret: args.client_secret,
        mode: ServerMode::from_env_name(&args.app_env),
        base_url: args.provider_url,
    };

    let service = TropipayService::shared(&config).into_diagnostic()?;
    let response = service
        .create_payment_link(&request)
        .await
        .into_diagnostic()?;
    println!("{}", serde_json::to_string_pretty(&response).into_diagnostic()?);
    Ok(())
}

fn card_details(args: &CheckoutArgs) -> Result<CardDetails, PaymentError> {
    match (&args.card_number, &args.expiry_date, &args.cvv) {
        (Some(card_number), Some(expiry_date), Some(cvv)) => Ok(CardDetails {
            card_number: card_number.clone(),
            expiry_date: expiry_date.clone(),
            cvv: cvv.clone(),
        }),
        _ => Err(PaymentError::ValidationError(
            "card payments need --card-number, --expiry-date and --cvv".to_string(),
        )),
    }
}

fn local_user(id: &str) -> User {
    User {
        id: id.to_string(),
        email: None,
        confirmed_at: None,
        user_metadata: UserMetadata::default(),
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_local_store(db_path: Option<PathBuf>) -> Result<OrderStoreRef> {
    use mealpay::infrastructure::rocksdb::RocksDBOrderStore;

    match db_path {
        Some(path) => Ok(Arc::new(RocksDBOrderStore::open(path).into_diagnostic()?)),
        None => Ok(Arc::new(InMemoryOrderStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_local_store(db_path: Option<PathBuf>) -> Result<OrderStoreRef> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemoryOrderStore::new()))
}
