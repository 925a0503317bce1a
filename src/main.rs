use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use feedkeep::config::Config;
use feedkeep::feed::{build_client, fetch_and_classify, ParsedFeed};
use feedkeep::intake::{IntakeFlow, SubmitOutcome};
use feedkeep::storage::{Database, DatabaseError};
use feedkeep::util::{strip_control_chars, truncate_chars, validate_feed_url};

/// Get the config directory path (~/.config/feedkeep/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedkeep"))
}

#[derive(Parser, Debug)]
#[command(name = "feedkeep", about = "Subscribe to syndication feeds with format detection")]
struct Args {
    /// Database file (overrides config)
    #[arg(long, value_name = "FILE", global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and classify a feed URL, then save it as a subscribed source
    Add {
        /// Feed URL to subscribe to
        url: String,

        /// Use this title instead of the feed's channel title
        #[arg(long)]
        title: Option<String>,

        /// Classify only; do not persist anything
        #[arg(long)]
        no_save: bool,
    },

    /// List subscribed feed sources in the order they were added
    List {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch a subscribed source and print its items
    Items {
        /// Source id (see `feedkeep list`)
        id: i64,
    },

    /// Delete a subscribed feed source
    Remove {
        /// Source id (see `feedkeep list`)
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    // Set up config directory
    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // User-only access on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    let config = Config::load(&config_dir.join("config.toml")).context("Failed to load config")?;

    // Database path precedence: --db flag > config > default location
    let db_path = args
        .db
        .clone()
        .or_else(|| config.db_path.clone())
        .unwrap_or_else(|| config_dir.join("sources.db"));
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;

    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(e @ DatabaseError::Locked) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    match args.command {
        Command::Add {
            url,
            title,
            no_save,
        } => run_add(&config, db, &url, title.as_deref(), no_save).await,
        Command::List { json } => run_list(db, json).await,
        Command::Items { id } => run_items(&config, db, id).await,
        Command::Remove { id } => run_remove(db, id).await,
    }
}

/// Drive the intake flow for one URL: fetch, classify, and (for RSS) save.
async fn run_add(
    config: &Config,
    db: Database,
    url: &str,
    title: Option<&str>,
    no_save: bool,
) -> Result<()> {
    let client = build_client(&config.user_agent).context("Failed to build HTTP client")?;
    let mut flow = IntakeFlow::new(client, db, config.url_policy(), config.fetch_limits());

    flow.edit_url(url);
    if let Some(title) = title {
        flow.edit_title(title);
    }

    // First submission: fetch and classify
    match flow.submit().await? {
        SubmitOutcome::Classified { title } => {
            if title.is_empty() {
                println!("Classified as RSS (channel has no title)");
            } else {
                println!("Classified as RSS: {}", title);
            }
        }
        SubmitOutcome::NotActionable { format } => {
            println!("Feed classified as {}; only RSS sources can be subscribed", format);
            return Ok(());
        }
        SubmitOutcome::FetchFailed { message } => {
            anyhow::bail!("Fetch failed: {} (URL and title left unchanged; retry with the same command)", message);
        }
        SubmitOutcome::Saved { .. } => anyhow::bail!("unexpected save before classification"),
    }

    if no_save {
        println!("Not saved (--no-save)");
        return Ok(());
    }

    // Second submission: persist the classified source
    match flow.submit().await? {
        SubmitOutcome::Saved { id } => {
            println!("Saved feed source #{}", id);
            Ok(())
        }
        other => anyhow::bail!("Unexpected outcome while saving: {:?}", other),
    }
}

async fn run_list(db: Database, json: bool) -> Result<()> {
    let sources = db.list_sources().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }

    if sources.is_empty() {
        println!("No subscribed feeds. Add one with: feedkeep add <url>");
        return Ok(());
    }

    for source in &sources {
        let title = if source.title.is_empty() {
            "(untitled)"
        } else {
            source.title.as_str()
        };
        println!("#{:<4} {}  {}", source.id, title, source.url);
    }
    Ok(())
}

/// Fetch a saved source and print its RSS items.
async fn run_items(config: &Config, db: Database, id: i64) -> Result<()> {
    let source = db
        .get_source(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No feed source with id {}", id))?;

    // Saved URLs were validated at intake, but the database may predate the
    // current policy; re-validate rather than trusting stored data.
    let url = validate_feed_url(&source.url, &config.url_policy())
        .with_context(|| format!("Stored URL is not fetchable: {}", source.url))?;

    let client = build_client(&config.user_agent).context("Failed to build HTTP client")?;
    let parsed = fetch_and_classify(&client, &url, &config.fetch_limits())
        .await
        .with_context(|| format!("Failed to fetch {}", source.url))?;

    let channel = match parsed {
        ParsedFeed::Rss { channel } => channel,
        other => anyhow::bail!(
            "Feed at {} is no longer RSS (classified as {})",
            source.url,
            other.format()
        ),
    };

    if channel.items.is_empty() {
        println!("Feed has no items");
        return Ok(());
    }

    for (n, item) in channel.items.iter().enumerate() {
        let title = item.title.as_deref().unwrap_or("Untitled");
        println!("{:>3}. {}", n + 1, title);
        if let Some(content) = &item.content {
            let clean = strip_control_chars(content);
            println!("     {}", truncate_chars(clean.trim(), 120));
        }
    }
    Ok(())
}

async fn run_remove(db: Database, id: i64) -> Result<()> {
    if db.delete_source(id).await? {
        println!("Removed feed source #{}", id);
        Ok(())
    } else {
        anyhow::bail!("No feed source with id {}", id);
    }
}
