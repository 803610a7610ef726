//! # docqa CLI
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa init` | Create the SQLite database and run schema migrations |
//! | `docqa upload <file>` | Validate, store, and ingest a PDF, DOCX, or TXT file |
//! | `docqa list` | List uploaded documents |
//! | `docqa get <id>` | Show one document record |
//! | `docqa delete <id>` | Delete a document's chunks, file, and record |
//! | `docqa query "<question>"` | Ask a question about the uploaded documents |
//! | `docqa serve` | Start the HTTP API |

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use docqa::app::App;
use docqa::config::{self, Config};
use docqa::models::{Document, Query};
use docqa::{db, logging, migrate, server};

/// docqa: ask questions about your documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Document question answering with retrieval-augmented generation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Upload and ingest a document.
    Upload {
        /// Path to a .pdf, .docx, or .txt file.
        file: PathBuf,
    },

    /// List uploaded documents, newest first.
    List,

    /// Show a document record.
    Get {
        /// Document id.
        id: String,
    },

    /// Delete a document.
    Delete {
        /// Document id.
        id: String,
    },

    /// Ask a question.
    Query {
        /// The question.
        query: String,

        /// Restrict retrieval to this document (repeatable).
        #[arg(long = "doc")]
        documents: Vec<String>,

        /// Number of chunks to retrieve (1-10). Defaults to `[retrieval] default_top_k`.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Start the HTTP API on `[server] bind`.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => run_init(&cfg).await?,
        Commands::Upload { file } => run_upload(cfg, &file).await?,
        Commands::List => {
            let app = App::open_without_models(cfg).await?;
            print_documents(&app.service.list().await?);
            app.close().await;
        }
        Commands::Get { id } => {
            let app = App::open_without_models(cfg).await?;
            print_document(&app.service.get(&id).await?);
            app.close().await;
        }
        Commands::Delete { id } => {
            let app = App::open_without_models(cfg).await?;
            let report = app.service.delete(&id).await?;
            println!("Deleted document {}", id);
            println!("  index entries: {}", done(report.index_deleted));
            println!("  stored file:   {}", done(report.file_deleted));
            println!("  record:        {}", done(report.record_deleted));
            app.close().await;
        }
        Commands::Query {
            query,
            documents,
            top_k,
        } => {
            let top_k = top_k.unwrap_or(cfg.retrieval.default_top_k);
            let app = App::open(cfg).await?;
            let mut q = Query::new(query).with_top_k(top_k);
            if !documents.is_empty() {
                q = q.with_documents(documents);
            }
            let answer = app.engine.answer(&q).await?;

            println!("{}", answer.answer);
            if !answer.sources.is_empty() {
                println!();
                println!("Sources:");
                for (i, source) in answer.sources.iter().enumerate() {
                    println!(
                        "[{}] {} (chunk {})",
                        i + 1,
                        source.filename.as_deref().unwrap_or("(unknown)"),
                        source
                            .chunk_index
                            .map(|c| c.to_string())
                            .unwrap_or_else(|| "?".to_string())
                    );
                    println!("    {}", source.content.replace('\n', " "));
                }
            }
            app.close().await;
        }
        Commands::Serve => {
            let app = App::open(cfg).await?;
            server::run_server(app).await?;
        }
    }

    Ok(())
}

async fn run_init(cfg: &Config) -> Result<()> {
    let pool = db::connect(cfg).await?;
    migrate::run_migrations(&pool).await?;
    pool.close().await;
    std::fs::create_dir_all(&cfg.storage.upload_dir).with_context(|| {
        format!(
            "cannot create upload directory {}",
            cfg.storage.upload_dir.display()
        )
    })?;
    println!("Database initialized at {}", cfg.db.path.display());
    Ok(())
}

async fn run_upload(cfg: Config, file: &Path) -> Result<()> {
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("not a file path: {}", file.display()))?;
    let bytes = std::fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;

    let app = App::open(cfg).await?;
    let doc = app.service.upload(&filename, &bytes).await?;
    println!("Uploaded {}", doc.filename);
    println!("  id:     {}", doc.id);
    println!("  status: {}", doc.status);
    println!("  pages:  {}", doc.page_count);
    println!("  chunks: {}", doc.chunk_count);
    app.close().await;
    Ok(())
}

fn print_documents(docs: &[Document]) {
    if docs.is_empty() {
        println!("No documents.");
        return;
    }
    println!(
        "{:<36}  {:<10}  {:>5}  {:>6}  {}",
        "ID", "STATUS", "PAGES", "CHUNKS", "FILENAME"
    );
    for doc in docs {
        println!(
            "{:<36}  {:<10}  {:>5}  {:>6}  {}",
            doc.id,
            doc.status.as_str(),
            doc.page_count,
            doc.chunk_count,
            doc.filename
        );
    }
}

fn print_document(doc: &Document) {
    println!("id:          {}", doc.id);
    println!("filename:    {}", doc.filename);
    println!("status:      {}", doc.status);
    println!("file_size:   {}", doc.file_size);
    println!("pages:       {}", doc.page_count);
    println!("chunks:      {}", doc.chunk_count);
    println!(
        "uploaded_at: {}",
        doc.upload_date.format("%Y-%m-%dT%H:%M:%SZ")
    );
}

fn done(ok: bool) -> &'static str {
    if ok {
        "removed"
    } else {
        "FAILED"
    }
}
