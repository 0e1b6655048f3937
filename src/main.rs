use clap::{Parser, Subcommand};
use tracing::info;

use cinerec_api::{
    api::{create_router, AppState},
    config::Config,
    db::{run_import, ImportOptions},
    services::{train, TrainingOptions},
};

#[derive(Parser, Debug)]
#[command(name = "cinerec-api")]
#[command(about = "Movie recommendations from genre similarity and rating history")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit both models from the dataset and write artifacts
    Train {
        /// Skip k-fold cross-validation of the rating model
        #[arg(long, default_value_t = false)]
        skip_validation: bool,
    },
    /// Load artifacts and serve recommendations over HTTP
    Serve,
    /// Mirror the dataset into PostgreSQL
    Import {
        /// Empty the movies, users and ratings tables first
        #[arg(long, default_value_t = false)]
        reset: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Train { skip_validation } => {
            let options = TrainingOptions {
                validate: !skip_validation,
                folds: config.cv_folds,
            };
            // Training is CPU-bound; keep it off the async workers
            let report =
                tokio::task::spawn_blocking(move || train(&config, options)).await??;
            info!(
                items = report.items,
                interactions = report.interactions,
                skipped_rows = report.skipped_rows,
                "Training finished"
            );
            if let Some(validation) = report.validation {
                for fold in &validation.folds {
                    info!(fold = fold.fold, rmse = fold.rmse, mae = fold.mae, "Fold");
                }
                info!(
                    mean_rmse = validation.mean_rmse,
                    mean_mae = validation.mean_mae,
                    "Cross-validation"
                );
            }
        }
        Command::Serve => {
            let state = AppState::load(&config)?;
            let app = create_router(state);

            let addr = format!("{}:{}", config.host, config.port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!(addr = %addr, "Server listening");
            axum::serve(listener, app).await?;
        }
        Command::Import { reset } => {
            let report = run_import(&config, ImportOptions { reset }).await?;
            info!(
                deleted = report.deleted,
                movies = report.movies,
                users = report.users,
                ratings = report.ratings,
                skipped_rows = report.skipped_rows,
                "Import finished"
            );
        }
    }

    Ok(())
}
