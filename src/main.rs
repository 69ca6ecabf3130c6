mod db;
mod page;
mod parser;
mod scraper;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use url::Url;

use crate::parser::sections::{Section, DEFAULT_IMAGE_BASE_URL};

#[derive(Parser)]
#[command(name = "medium_scraper", about = "Medium article scraper")]
struct Cli {
    /// SQLite database path
    #[arg(long, global = true, env = "MEDIUM_DB_PATH", default_value = db::DEFAULT_DB_PATH)]
    db: PathBuf,
    /// Base URL image ids are joined onto
    #[arg(long, global = true, env = "MEDIUM_IMAGE_BASE", default_value = DEFAULT_IMAGE_BASE_URL)]
    image_base: Url,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch article pages and store the parsed articles
    Scrape {
        /// Article URLs, each fetched once
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Parse a saved page (HTML or graph JSON) and print the article as JSON
    Parse {
        file: PathBuf,
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Stored articles overview table
    List {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Print the sections of a stored article
    Show {
        /// Post id, e.g. d5564a551783
        id: String,
    },
    /// Show scraping statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scrape { urls } => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let client = scraper::build_client()?;
            println!("Scraping {} page(s)...", urls.len());
            let stats = scraper::scrape_articles(&conn, &client, &urls, &cli.image_base).await?;
            println!(
                "Done: {} fetched ({} saved, {} without article, {} errors).",
                stats.total, stats.saved, stats.empty, stats.errors
            );
            Ok(())
        }
        Commands::Parse { file, pretty } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let graph = page::load_graph(&text)?;
            match parser::parse_article(&graph, &cli.image_base) {
                Some(article) => {
                    let json = if pretty {
                        serde_json::to_string_pretty(&article)?
                    } else {
                        serde_json::to_string(&article)?
                    };
                    println!("{}", json);
                }
                None => eprintln!("No article found in {}", file.display()),
            }
            Ok(())
        }
        Commands::List { limit } => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, limit)?;
            if rows.is_empty() {
                println!("No articles stored. Run 'scrape' first.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<12} | {:<40} | {:<10} | {:>6} | {:>8}",
                "#", "Id", "Title", "Published", "Claps", "Sections"
            );
            println!("{}", "-".repeat(96));

            for (i, r) in rows.iter().enumerate() {
                let claps = r.clap_count.map(|c| c.to_string()).unwrap_or_else(|| "-".into());
                let published: String = r.publish_date.chars().take(10).collect();
                println!(
                    "{:>3} | {:<12} | {:<40} | {:<10} | {:>6} | {:>8}",
                    i + 1,
                    truncate(&r.id, 12),
                    truncate(&r.title, 40),
                    published,
                    claps,
                    r.section_count
                );
            }

            println!("\n{} articles | show one with: show <id>", rows.len());
            Ok(())
        }
        Commands::Show { id } => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let Some(row) = db::fetch_article(&conn, &id)? else {
                println!("No article with id {}.", id);
                return Ok(());
            };
            println!("{}", row.title);
            if !row.subtitle.is_empty() {
                println!("{}", row.subtitle);
            }
            println!("{} | {} claps | {}", row.publish_date, row.clap_count.unwrap_or(0), row.url);

            for section in db::fetch_sections(&conn, &id)? {
                print_section(&section);
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Fetches:   {}", s.fetches);
            println!("Errors:    {}", s.errors);
            println!("Articles:  {}", s.articles);
            println!("Sections:  {}", s.sections);
            println!("Images:    {}", s.images);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_section(section: &Section) {
    match (&section.topic, &section.header_kind) {
        (Some(topic), Some(kind)) => println!("\n[{}] {}", kind, topic),
        _ => println!("\n[-]"),
    }
    for line in &section.body_lines {
        println!("  {}", truncate(line, 100));
    }
    for (url, caption) in section.image_urls.iter().zip(&section.image_captions) {
        if caption.is_empty() {
            println!("  img: {}", url);
        } else {
            println!("  img: {} ({})", url, truncate(caption, 60));
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
