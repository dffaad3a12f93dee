use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

mod api;
mod config;
mod db;
mod error;
mod feedback;
mod identity;
mod models;
mod queries;
mod responder;
mod seed;
mod store;

use api::{AppState, SessionPolicy};
use config::{DatabaseArgs, ResponderArgs, ServeArgs};
use feedback::FeedbackWorkflow;
use identity::{GoTrueGateway, IdentityGateway, MemoryGateway};
use queries::QueryWorkflow;
use responder::{KeywordResponder, Responder};
use store::{MemoryStore, Store};

#[derive(Parser)]
#[command(name = "helpdesk")]
#[command(about = "Query routing backend for the university helpdesk", long_about = None)]
struct Cli {
    #[command(flatten)]
    database: DatabaseArgs,
    #[command(flatten)]
    responder: ResponderArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve(ServeArgs),
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo queries and feedback
    Seed,
    /// Answer a query locally with the configured keyword table
    Ask {
        /// Query text
        text: String,
    },
    /// List feedback waiting for a faculty response
    Pending,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => serve(args, &cli.database, &cli.responder).await?,
        Commands::InitDb => {
            let pool = connect(&cli.database).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&cli.database).await?;
            let store: Arc<dyn Store> = Arc::new(db::PgStore::new(pool));
            let queries = QueryWorkflow::new(store.clone(), load_responder(&cli.responder)?);
            let feedback = FeedbackWorkflow::new(store);

            let summary = seed::seed(&queries, &feedback).await?;
            println!(
                "Seed data inserted: {} queries, {} flagged, {} addressed.",
                summary.queries, summary.flagged, summary.addressed
            );
        }
        Commands::Ask { text } => {
            let answer = load_responder(&cli.responder)?.respond(&text);
            println!("{}", answer.response_text);
            println!("(confidence {:.2})", answer.confidence);
        }
        Commands::Pending => {
            let pool = connect(&cli.database).await?;
            let feedback = FeedbackWorkflow::new(Arc::new(db::PgStore::new(pool)));
            let pending = feedback.list_pending().await?;

            if pending.is_empty() {
                println!("No feedback waiting for review.");
                return Ok(());
            }

            println!("Feedback waiting for review:");
            for item in pending.iter() {
                println!(
                    "- {} on \"{}\" ({}): {}",
                    item.id, item.query.query_text, item.created_at, item.feedback_text
                );
            }
        }
    }

    Ok(())
}

async fn connect(database: &DatabaseArgs) -> anyhow::Result<PgPool> {
    let database_url = database
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(database.max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

fn load_responder(args: &ResponderArgs) -> anyhow::Result<Arc<dyn Responder>> {
    let table = match &args.responses {
        Some(path) => KeywordResponder::from_path(path)?,
        None => KeywordResponder::builtin()?,
    };
    info!(keywords = table.keyword_count(), "Keyword table loaded");

    Ok(Arc::new(
        table.with_confidences(args.match_confidence, args.fallback_confidence),
    ))
}

async fn serve(
    args: ServeArgs,
    database: &DatabaseArgs,
    responder: &ResponderArgs,
) -> anyhow::Result<()> {
    let (store, gateway): (Arc<dyn Store>, Arc<dyn IdentityGateway>) = if args.in_memory {
        warn!("Running in memory: queries, feedback and accounts are lost on exit");
        (Arc::new(MemoryStore::new()), Arc::new(MemoryGateway::new()))
    } else {
        let pool = connect(database).await?;
        let auth_url = args
            .auth_url
            .as_deref()
            .context("SUPABASE_URL must be set to the auth gateway project URL")?;
        let auth_key = args
            .auth_key
            .clone()
            .context("SUPABASE_KEY must be set to the auth gateway API key")?;

        (
            Arc::new(db::PgStore::new(pool)),
            Arc::new(GoTrueGateway::new(auth_url, auth_key)?),
        )
    };

    let state = AppState {
        queries: QueryWorkflow::new(store.clone(), load_responder(responder)?),
        feedback: FeedbackWorkflow::new(store),
        identity: gateway,
        sessions: SessionPolicy {
            secure_cookies: args.secure_cookies,
            auto_confirm_domain: args.auto_confirm_domain.clone(),
        },
    };

    let app = api::build_router(state, &args.cors_origins());
    api::serve(app, &args.address()).await
}
