// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments,
// resolves Settings, opens the store and hands off to Layer 2.
// Nothing here computes; it routes and prints.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;
pub mod render;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use commands::{
    BackupArgs, Commands, DashboardArgs, HistoryArgs, InsightsArgs, PredictArgs, PurgeArgs,
    TrainArgs, UploadArgs,
};

use crate::application::{
    admin_use_case,
    dashboard_use_case::DashboardUseCase,
    insight_use_case::InsightUseCase,
    predict_use_case::PredictUseCase,
    train_use_case::TrainUseCase,
    upload_use_case::UploadUseCase,
};
use crate::data::loader::{CsvLoader, CsvSource};
use crate::infra::settings::Settings;
use crate::infra::store::SqliteStore;
use crate::infra::suggestion_client::OpenRouterClient;

#[derive(Parser, Debug)]
#[command(
    name = "survey-insights",
    version,
    about = "Upload survey CSVs, train a classifier on them and ask for insights."
)]
pub struct Cli {
    /// Settings file (default: ./survey-insights.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database file; overrides settings and DATABASE_URL
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Resolve settings, then dispatch to the matching use case
    pub async fn run(self) -> Result<()> {
        let mut settings = Settings::load(self.config.as_deref())?;
        if let Some(db) = self.database {
            settings.database_path = db;
        }

        match self.command {
            Commands::Upload(args)    => run_upload(settings, args),
            Commands::Train(args)     => run_train(settings, args),
            Commands::Predict(args)   => run_predict(settings, args),
            Commands::Insights(args)  => run_insights(settings, args).await,
            Commands::Dashboard(args) => run_dashboard(settings, args).await,
            Commands::History(args)   => run_history(settings, args),
            Commands::Purge(args)     => run_purge(settings, args),
            Commands::Backup(args)    => run_backup(settings, args),
            Commands::Config          => run_config(settings),
        }
    }
}

fn open_store(settings: &Settings) -> Result<SqliteStore> {
    SqliteStore::open(&settings.database_path).with_context(|| {
        format!("cannot open database '{}'", settings.database_path.display())
    })
}

fn suggestion_client(settings: &Settings) -> Result<OpenRouterClient> {
    Ok(OpenRouterClient::new(settings.suggestion.clone())?)
}

fn run_upload(mut settings: Settings, args: UploadArgs) -> Result<()> {
    args.pipeline.apply(&mut settings.pipeline);
    let mut store = open_store(&settings)?;

    let loader = CsvLoader::new(settings.pipeline.ingest_options());
    let report = UploadUseCase::new(&mut store).execute(&CsvSource::new(&args.file, loader))?;

    print!("{}", render::render_upload(&report));
    Ok(())
}

fn run_train(mut settings: Settings, args: TrainArgs) -> Result<()> {
    args.pipeline.apply(&mut settings.pipeline);
    let mut store = open_store(&settings)?;
    let loader    = CsvLoader::new(settings.pipeline.ingest_options());

    if let Some(file) = &args.file {
        let report = UploadUseCase::new(&mut store)
            .execute(&CsvSource::new(file, loader.clone()))?;
        println!("Uploaded {} rows as batch {}", report.batch.row_count, report.batch.id);
    }

    let report = TrainUseCase::new(settings.pipeline.clone(), &settings.reports_dir)
        .execute_on_latest_upload(&mut store, loader)?;

    print!("{}", render::render_train(&report));
    Ok(())
}

fn run_predict(settings: Settings, args: PredictArgs) -> Result<()> {
    let mut store = open_store(&settings)?;
    let mut use_case = PredictUseCase::new(&mut store);

    let report = match &args.file {
        Some(file) => use_case.execute(&CsvSource::new(file, PredictUseCase::loader()))?,
        None       => use_case.execute_on_latest_upload()?,
    };

    print!("{}", render::render_predict(&report));
    Ok(())
}

async fn run_insights(settings: Settings, args: InsightsArgs) -> Result<()> {
    let store = open_store(&settings)?;

    // Survey statistics enrich the prompt when the latest upload is readable
    let survey = DashboardUseCase::new(&store).execute()?.survey;

    let use_case = InsightUseCase::new(suggestion_client(&settings)?).with_category(args.category);
    let insight  = use_case.execute(&store, survey.as_ref()).await?;

    print!("{}", render::render_insight(&insight));
    Ok(())
}

async fn run_dashboard(settings: Settings, args: DashboardArgs) -> Result<()> {
    let store     = open_store(&settings)?;
    let use_case  = DashboardUseCase::new(&store);

    let dashboard = if args.with_insights {
        let insights = InsightUseCase::new(suggestion_client(&settings)?);
        use_case.execute_with_insight(&insights).await?
    } else {
        use_case.execute()?
    };

    print!("{}", render::render_dashboard(&dashboard));
    Ok(())
}

fn run_history(settings: Settings, args: HistoryArgs) -> Result<()> {
    let store   = open_store(&settings)?;
    let entries = admin_use_case::model_history(&store, Some(args.limit))?;
    print!("{}", render::render_history(&entries));
    Ok(())
}

fn run_purge(settings: Settings, args: PurgeArgs) -> Result<()> {
    if !args.yes {
        bail!("purge deletes every uploaded survey row; pass --yes to confirm");
    }
    let mut store = open_store(&settings)?;
    let deleted   = admin_use_case::purge_surveys(&mut store)?;
    println!("Deleted {deleted} survey rows.");
    Ok(())
}

fn run_backup(settings: Settings, args: BackupArgs) -> Result<()> {
    let store  = open_store(&settings)?;
    let target = args.out.unwrap_or_else(|| settings.reports_dir.clone());
    let report = admin_use_case::backup(&store, &target)?;

    println!(
        "Backup written to {}: {} surveys, {} models, {} predictions, {} insights",
        report.directory.display(),
        report.surveys,
        report.models,
        report.predictions,
        report.insights
    );
    Ok(())
}

fn run_config(settings: Settings) -> Result<()> {
    let shown = toml::to_string_pretty(&settings.masked()).context("cannot format settings")?;
    print!("{shown}");
    if settings.suggestion.api_key.is_none() {
        println!("\n# OPENROUTER_API_KEY is not set; insights are unavailable.");
    }
    Ok(())
}
