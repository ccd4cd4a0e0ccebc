mod db;
mod parser;
mod scraper;
mod toc;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};

use parser::Document;

#[derive(Parser)]
#[command(
    name = "municode_scraper",
    about = "Municode code-of-ordinances scraper and parser via spider.cloud"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a municode section URL into structured documents
    Scrape {
        /// Municode URL to scrape (must carry a nodeId)
        url: String,
        /// Output directory
        #[arg(short, long, default_value = "data")]
        output: PathBuf,
        /// Also save structured JSON next to the HTML
        #[arg(long)]
        json: bool,
        /// Scrape every document reachable from the codes TOC
        #[arg(long)]
        full: bool,
    },
    /// Parse saved HTML (a file, or every *.html in a directory)
    Parse {
        /// Input HTML file or directory
        input: PathBuf,
        /// Output JSON file (default: <input>.parsed.json), or directory
        /// when the input is a directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show page-cache and output statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scrape {
            url,
            output,
            json,
            full,
        } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let mut collector = scraper::Collector::new()?;

            if full {
                let documents = collector.scrape_full(&conn, &url).await?;
                println!("Scraped {} documents", documents.len());
                for doc in &documents {
                    save_outputs(doc, &output, json)?;
                }
                Ok(())
            } else {
                match collector.scrape_section(&conn, &url).await? {
                    Some(doc) => {
                        println!(
                            "Scraped document: {} ({} sections)",
                            doc.title,
                            doc.sections.len()
                        );
                        save_outputs(&doc, &output, json)
                    }
                    None => {
                        println!("No content scraped from {}", url);
                        Ok(())
                    }
                }
            }
        }
        Commands::Parse { input, output } => parse_command(&input, output.as_deref()),
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Pages:     {}", s.pages);
            println!("Visited:   {}", s.visited);
            println!("Fetched:   {}", s.fetched);
            println!("Errors:    {}", s.errors);
            println!("Documents: {}", s.documents);
            println!("Sections:  {}", s.sections);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn save_outputs(doc: &Document, output: &Path, json: bool) -> anyhow::Result<()> {
    let stem = safe_filename(&doc.title);
    let html_path = output.join(format!("{}.html", stem));
    doc.save_html(&html_path)?;
    println!("Saved {}", html_path.display());
    if json {
        let json_path = output.join(format!("{}.json", stem));
        doc.save_json(&json_path)?;
        println!("Saved {}", json_path.display());
    }
    Ok(())
}

fn parse_command(input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    if input.is_dir() {
        return parse_directory(input, output);
    }

    let doc = parser::parse_file(input, None)?;
    println!(
        "Parsed document: {} ({} sections)",
        doc.title,
        doc.sections.len()
    );
    let out_path = match output {
        Some(path) => path.to_path_buf(),
        None => input.with_extension("parsed.json"),
    };
    doc.save_json(&out_path)?;
    println!("Saved to: {}", out_path.display());
    Ok(())
}

fn parse_directory(input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let mut files: Vec<PathBuf> = std::fs::read_dir(input)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "html"))
        .collect();
    files.sort();

    if files.is_empty() {
        println!("No .html files in {}", input.display());
        return Ok(());
    }
    println!("Parsing {} files...", files.len());

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    // Independent files, one hierarchy state each, safe to parallelize.
    let results: Vec<anyhow::Result<usize>> = files
        .par_iter()
        .map(|file| {
            let doc = parser::parse_file(file, None)?;
            doc.save_json(&json_output_path(file, output))?;
            pb.inc(1);
            Ok(doc.sections.len())
        })
        .collect();
    pb.finish_and_clear();

    let mut parsed = 0usize;
    let mut sections = 0usize;
    let mut errors = 0usize;
    for (file, result) in files.iter().zip(&results) {
        match result {
            Ok(count) => {
                parsed += 1;
                sections += count;
            }
            Err(e) => {
                errors += 1;
                println!("  {} failed: {}", file.display(), e);
            }
        }
    }
    println!(
        "Parsed {} files ({} sections, {} errors)",
        parsed, sections, errors
    );
    Ok(())
}

fn json_output_path(file: &Path, output: Option<&Path>) -> PathBuf {
    match output {
        Some(dir) => {
            let stem = file
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "document".to_string());
            dir.join(format!("{}.parsed.json", stem))
        }
        None => file.with_extension("parsed.json"),
    }
}

fn safe_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
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
