use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use newsdeck::config::Config;
use newsdeck::engagement::Outcome;
use newsdeck::feed::Tab;
use newsdeck::filter::{Category, SearchQuery};
use newsdeck::model::{Article, ArticleId};
use newsdeck::session::Session;
use newsdeck::util::display_line;
use newsdeck::NewsDesk;

const TITLE_WIDTH: usize = 96;

/// Get the default config file path (~/.config/newsdeck/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("newsdeck")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(name = "newsdeck", about = "Headlines, trending stories and bookmarks from a news backend")]
struct Args {
    /// Config file (defaults to ~/.config/newsdeck/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Top headlines for a country, category, source and query
    Headlines {
        /// Two-letter country code; detected from your location when omitted
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        category: Option<Category>,
        /// Channel identifier (see `channels`)
        #[arg(long)]
        source: Option<String>,
        #[arg(long, short)]
        query: Option<String>,
    },
    /// Globally trending stories (ignores filters)
    Trending,
    /// List available source channels
    Channels,
    /// Keyword search over stored articles
    Search {
        keywords: String,
        /// Earliest publication date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Latest publication date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long, default_value_t = SearchQuery::DEFAULT_LIMIT)]
        limit: u32,
    },
    /// Headlines picked from your preferences (requires sign-in)
    Personalized {
        /// Upstream provider: newsapi or gnews
        #[arg(long, default_value = "newsapi")]
        source: String,
    },
    /// Show your bookmarked articles
    Bookmarks,
    /// Show articles you have read recently
    History,
    /// Like an article
    Like { url: String },
    /// Dislike an article
    Dislike { url: String },
    /// Record an article as read and open it in the browser
    Read {
        url: String,
        /// Record only, don't open the browser
        #[arg(long)]
        no_open: bool,
    },
    /// Print share links for an article
    Share {
        url: String,
        #[arg(long, default_value = "")]
        title: String,
    },
    /// Bookmark an article (or remove the bookmark)
    Bookmark {
        url: String,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long)]
        remove: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let session = Session::from_env_or(config.api_token.as_deref());
    let desk = NewsDesk::new(&config, session).context("Failed to initialize news client")?;

    match args.command {
        Command::Headlines {
            country,
            category,
            source,
            query,
        } => {
            let feed = desk.feed();
            match country {
                Some(country) => {
                    let spec = feed.filter().with_country(&country)?;
                    feed.set_filter(spec).await?;
                }
                None => {
                    if let Some(country) = desk.bootstrap_location().await {
                        println!("Showing headlines for detected country: {country}");
                    }
                }
            }

            let mut spec = feed.filter().with_category(category);
            if let Some(source) = &source {
                spec = spec.with_source(source);
            }
            if let Some(query) = &query {
                spec = spec.with_query(query);
            }
            if feed.set_filter(spec).await?.is_none() && feed.view(Tab::Headlines).filter.is_none() {
                feed.refresh().await.context("Failed to fetch headlines")?;
            }
            print_articles(&desk, &feed.articles(Tab::Headlines)).await;
        }
        Command::Trending => {
            let feed = desk.feed();
            feed.set_active_tab(Tab::Trending)
                .await
                .context("Failed to fetch trending stories")?;
            print_articles(&desk, &feed.articles(Tab::Trending)).await;
        }
        Command::Channels => {
            let channels = desk.feed().channels().await.context("Failed to fetch channels")?;
            for channel in channels.iter() {
                println!("{channel}");
            }
        }
        Command::Search {
            keywords,
            from,
            to,
            source,
            limit,
        } => {
            let query = SearchQuery {
                start_date: from,
                end_date: to,
                source,
                limit,
                ..SearchQuery::keywords(&keywords)
            };
            desk.feed().search(query).await.context("Search failed")?;
            print_articles(&desk, &desk.feed().search_results().articles).await;
        }
        Command::Personalized { source } => {
            desk.feed()
                .personalized(&source)
                .await
                .context("Failed to fetch personalized headlines")?;
            print_articles(&desk, &desk.feed().personalized_results().articles).await;
        }
        Command::History => {
            let history = desk.engagement().sync_read_history().await?;
            if history.is_empty() {
                println!("Nothing read yet.");
            }
            for (i, id) in history.iter().enumerate() {
                println!("{:>3}. {id}", i + 1);
            }
        }
        Command::Bookmarks => {
            let bookmarks = desk.engagement().sync_bookmarks().await?;
            if bookmarks.is_empty() {
                println!("No bookmarks yet.");
            }
            print_articles(&desk, &bookmarks).await;
        }
        Command::Like { url } => {
            let outcome = desk.engagement().like(&ArticleId::new(&url)).await?;
            report("Liked", outcome);
        }
        Command::Dislike { url } => {
            let outcome = desk.engagement().dislike(&ArticleId::new(&url)).await?;
            report("Disliked", outcome);
        }
        Command::Read { url, no_open } => {
            let outcome = desk.engagement().mark_read(&ArticleId::new(&url)).await?;
            report("Marked as read", outcome);
            if !no_open {
                open::that(&url).with_context(|| format!("Failed to open {url} in browser"))?;
            }
        }
        Command::Share { url, title } => {
            let links = desk
                .engagement()
                .share(&ArticleId::new(&url), &title)
                .await?;
            for (platform, link) in links {
                println!("{platform:>10}  {link}");
            }
        }
        Command::Bookmark { url, title, remove } => {
            let article = Article {
                url: Some(url.clone()),
                title,
                ..Article::default()
            };
            let outcome = desk
                .engagement()
                .toggle_bookmark(&ArticleId::new(&url), &article, remove)
                .await?;
            report(if remove { "Bookmark removed" } else { "Bookmarked" }, outcome);
        }
    }

    Ok(())
}

fn report(action: &str, outcome: Outcome) {
    match outcome {
        Outcome::Applied => println!("{action}."),
        Outcome::Unchanged => println!("Nothing to do: already in that state."),
        Outcome::Debounced => println!("Already in progress."),
    }
}

async fn print_articles(desk: &NewsDesk, articles: &[Article]) {
    let images = desk.images().resolve_all(articles).await;

    for (i, (article, image)) in articles.iter().zip(&images).enumerate() {
        println!("{:>3}. {}", i + 1, display_line(&article.title, TITLE_WIDTH));

        let source = article.source_name().unwrap_or("unknown source");
        let published = article
            .published()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "     {} | {} | {}{}",
            display_line(source, 40),
            published,
            image.label,
            article
                .status
                .as_deref()
                .map(|status| format!(" | {status}"))
                .unwrap_or_default()
        );

        if let Some(summary) = article.summary_text() {
            println!("     {}", display_line(summary, TITLE_WIDTH));
        }
        if let Some(url) = &article.url {
            println!("     {url}");
        }
        println!("     image: {} ({:?})", image.url, image.source);
    }
}
