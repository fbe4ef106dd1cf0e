//! bucketsum - Dense hour/day/month bucketed sums over timestamped records

use bucketsum::{
    backend::Backend,
    cli::{Cli, Command},
    error::Result,
    output::get_formatter,
    request::RequestHandler,
};
use clap::Parser;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Environment fallbacks for the flags may come from a .env file
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    // Initialize logging. The --quiet flag should override RUST_LOG.
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("warn")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bucketsum=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    let aggregator = cli.query.aggregator();
    let backend_config = cli.backend_config();

    match cli.command {
        Command::Query { range, json } => {
            info!("Running {} query from {} to {}", range.group, range.from, range.upto);

            let store = Backend::from_config(&backend_config)?;
            let points = aggregator
                .aggregate_points(&store, &range.from, &range.upto, &range.group)
                .await?;

            // Piped output is meant for other programs
            let json = json || !is_terminal::is_terminal(std::io::stdout());
            print!("{}", with_newline(get_formatter(json).format_points(&points)));
        }
        Command::Labels { range, json } => {
            let labels = aggregator.labels(&range.from, &range.upto, &range.group)?;
            let json = json || !is_terminal::is_terminal(std::io::stdout());
            print!("{}", with_newline(get_formatter(json).format_labels(&labels)));
        }
        Command::Serve => {
            let store = Backend::from_config(&backend_config)?;
            info!("Serving requests on stdio with the {} datastore", store.name());

            let handler = RequestHandler::new(store, aggregator);
            handler
                .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                .await?;
        }
    }

    Ok(())
}

fn with_newline(mut output: String) -> String {
    if !output.ends_with('\n') {
        output.push('\n');
    }
    output
}
