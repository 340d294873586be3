//! Purpose: `leafsync` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Commands emit stable stdout formats (human or JSON by flags).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: All store mutations go through the `api::Dashboard` facade.

use std::io::{self, IsTerminal};
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::aot::Shell;
use serde_json::{Value, json};

use leafsync::api::{
    Dashboard, Draft, Error, ErrorKind, MetadataClient, MirrorClient, PageView, Record,
    to_exit_code,
};

mod collection;
mod command_dispatch;
mod config;
mod serve;

use config::Endpoints;

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }
}

#[derive(Parser)]
#[command(
    name = "leafsync",
    version,
    about = "Sync and manage Cassandra Leaves records across both backing stores"
)]
struct Cli {
    /// Metadata service base url (or LEAFSYNC_METADATA_URL).
    #[arg(long, global = true, value_name = "URL")]
    metadata_url: Option<String>,

    /// Document-store mirror base url (or LEAFSYNC_MIRROR_URL).
    #[arg(long, global = true, value_name = "URL")]
    mirror_url: Option<String>,

    /// Bearer token for both stores (or LEAFSYNC_TOKEN).
    #[arg(long, global = true, value_name = "TOKEN")]
    token: Option<String>,

    /// Always emit JSON, even on a terminal.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List records, one page at a time.
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value = "")]
        query: String,
    },
    /// Search records by title.
    Search {
        query: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Show one record from the mirror.
    Show { id: String },
    /// Create a record in both stores.
    Add {
        #[arg(long)]
        title: String,
        #[arg(long = "domain")]
        domain_name: String,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Update a record in both stores (full replace).
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long = "domain")]
        domain_name: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Delete a record from both stores.
    Rm {
        id: String,
        /// Confirm the staged delete.
        #[arg(long)]
        yes: bool,
    },
    /// Pull every page from the metadata service into the mirror.
    Sync {
        /// Records per fetched page.
        #[arg(long)]
        page_size: Option<u32>,
    },
    /// Run the document-store mirror proxy.
    Serve {
        #[arg(long, default_value = "127.0.0.1:9800")]
        bind: String,
        /// Collection file; defaults to ~/.leafsync/leaves.json.
        #[arg(long)]
        data_file: Option<PathBuf>,
        #[arg(long)]
        allow_non_loopback: bool,
        #[arg(long, default_value_t = 1024 * 1024)]
        max_body_bytes: u64,
        #[arg(long = "cors-origin")]
        cors_origins: Vec<String>,
    },
    /// Generate shell completions.
    Completion { shell: Shell },
    /// Print version information.
    Version,
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = Cli::parse();
    let endpoints = Endpoints::resolve(
        cli.metadata_url.clone(),
        cli.mirror_url.clone(),
        cli.token.clone(),
    );
    command_dispatch::dispatch_command(cli.command, endpoints, cli.json)
}

fn metadata_client(endpoints: &Endpoints) -> Result<MetadataClient, Error> {
    let mut client = MetadataClient::new(endpoints.require_metadata()?)?;
    if let Some(token) = &endpoints.token {
        client = client.with_token(token.clone());
    }
    Ok(client)
}

fn mirror_client(endpoints: &Endpoints) -> Result<MirrorClient, Error> {
    let mut client = MirrorClient::new(endpoints.require_mirror()?)?;
    if let Some(token) = &endpoints.token {
        client = client.with_token(token.clone());
    }
    Ok(client)
}

fn build_dashboard(endpoints: &Endpoints) -> Result<Dashboard<MetadataClient, MirrorClient>, Error> {
    Ok(Dashboard::new(
        metadata_client(endpoints)?,
        mirror_client(endpoints)?,
    ))
}

fn use_json(json_flag: bool) -> bool {
    json_flag || !io::stdout().is_terminal()
}

fn emit_json(value: Value) {
    println!("{value}");
}

fn emit_page_human(view: &PageView) {
    println!("{:<12} {:<48} {}", "ID", "TITLE", "DOMAIN");
    for record in &view.records {
        println!(
            "{:<12} {:<48} {}",
            record.id,
            truncate(&record.title, 48),
            record.domain_name
        );
    }
    println!(
        "page {} of {} ({} records)",
        view.page, view.total_pages, view.total_records
    );
}

fn emit_record_human(record: &Record) {
    println!("id:        {}", record.id);
    println!("title:     {}", record.title);
    println!("domain:    {}", record.domain_name);
    if !record.url.is_empty() {
        println!("url:       {}", record.url);
    }
    if !record.tags.is_empty() {
        println!("tags:      {}", record.tags.join(", "));
    }
    if !record.language.is_empty() {
        println!("language:  {}", record.language);
    }
    if !record.updated_at.is_empty() {
        println!("updated:   {}", record.updated_at);
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn page_json(view: &PageView) -> Value {
    json!({
        "page": view.page,
        "total_pages": view.total_pages,
        "total_records": view.total_records,
        "records": view.records,
    })
}

fn error_json(err: &Error) -> Value {
    let mut body = serde_json::Map::new();
    body.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    body.insert(
        "message".to_string(),
        json!(err.message().unwrap_or("error")),
    );
    if let Some(hint) = err.hint() {
        body.insert("hint".to_string(), json!(hint));
    }
    if let Some(id) = err.id() {
        body.insert("id".to_string(), json!(id));
    }
    if let Some(status) = err.status() {
        body.insert("status".to_string(), json!(status));
    }
    if let Some(attempts) = err.attempts() {
        body.insert("attempts".to_string(), json!(attempts));
    }
    json!({ "error": Value::Object(body) })
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("error: {err}");
        if let Some(hint) = err.hint() {
            eprintln!("hint: {hint}");
        }
        return;
    }
    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn parse_bind(bind: &str) -> Result<SocketAddr, Error> {
    bind.parse().map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid bind address")
            .with_hint("Use a host:port value like 127.0.0.1:9800.")
    })
}
