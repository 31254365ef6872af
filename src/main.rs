use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use dealwizard::commands::{
    build_index, ingest_catalog, recommend_laptop, search_laptops, show_history, show_status,
};
use dealwizard::config::{Config, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "dealwizard")]
#[command(about = "Laptop recommendations from natural-language queries")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding model, the chat model and search settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Replace the laptop catalog with the rows of a CSV file
    Ingest {
        /// Path to the catalog CSV
        csv: PathBuf,
    },
    /// Embed the catalog and rebuild the search index
    BuildIndex,
    /// Search the catalog
    Search {
        query: String,
        /// Number of nearest neighbours to filter (defaults to search.top_k)
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Search, then get a written recommendation
    Recommend {
        query: String,
        /// User whose history records the query (defaults to search.default_user)
        #[arg(long)]
        user: Option<String>,
    },
    /// Show past queries and recommendations
    History {
        #[arg(long)]
        user: Option<String>,
    },
    /// Show catalog, index and model service status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Ingest { csv } => {
            ingest_catalog(&Config::load_default()?, &csv).await?;
        }
        Commands::BuildIndex => {
            build_index(&Config::load_default()?).await?;
        }
        Commands::Search { query, k } => {
            search_laptops(Config::load_default()?, &query, k).await?;
        }
        Commands::Recommend { query, user } => {
            recommend_laptop(Config::load_default()?, &query, user.as_deref()).await?;
        }
        Commands::History { user } => {
            show_history(&Config::load_default()?, user.as_deref()).await?;
        }
        Commands::Status => {
            show_status(&Config::load_default()?).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn status_command() {
        let cli = Cli::try_parse_from(["dealwizard", "status"]).expect("should parse");
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn build_index_is_kebab_case() {
        let cli = Cli::try_parse_from(["dealwizard", "build-index"]).expect("should parse");
        assert!(matches!(cli.command, Commands::BuildIndex));
    }

    #[test]
    fn ingest_takes_a_path() {
        let cli =
            Cli::try_parse_from(["dealwizard", "ingest", "data/laptops.csv"]).expect("should parse");
        match cli.command {
            Commands::Ingest { csv } => assert_eq!(csv, PathBuf::from("data/laptops.csv")),
            _ => panic!("expected ingest"),
        }
    }

    #[test]
    fn search_with_k() {
        let cli = Cli::try_parse_from(["dealwizard", "search", "light gaming laptop", "-k", "10"])
            .expect("should parse");
        match cli.command {
            Commands::Search { query, k } => {
                assert_eq!(query, "light gaming laptop");
                assert_eq!(k, Some(10));
            }
            _ => panic!("expected search"),
        }

        let cli = Cli::try_parse_from(["dealwizard", "search", "anything"]).expect("should parse");
        assert!(matches!(cli.command, Commands::Search { k: None, .. }));
    }

    #[test]
    fn recommend_with_user() {
        let cli = Cli::try_parse_from([
            "dealwizard",
            "recommend",
            "laptop for college",
            "--user",
            "user123",
        ])
        .expect("should parse");
        match cli.command {
            Commands::Recommend { query, user } => {
                assert_eq!(query, "laptop for college");
                assert_eq!(user.as_deref(), Some("user123"));
            }
            _ => panic!("expected recommend"),
        }
    }

    #[test]
    fn history_user_is_optional() {
        let cli = Cli::try_parse_from(["dealwizard", "history"]).expect("should parse");
        assert!(matches!(cli.command, Commands::History { user: None }));
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["dealwizard", "config", "--show"]).expect("should parse");
        assert!(matches!(cli.command, Commands::Config { show: true }));
    }

    #[test]
    fn search_requires_a_query() {
        let err = Cli::try_parse_from(["dealwizard", "search"])
            .err()
            .expect("should fail");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn invalid_command() {
        let err = Cli::try_parse_from(["dealwizard", "checkout"])
            .err()
            .expect("should fail");
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }
}
