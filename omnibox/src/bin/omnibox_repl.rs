//! Interactive omnibox over a SQLite history file.
//!
//! Every stdin line is fed to the engine as typed input and each streamed
//! result list is printed. An empty line simulates focusing the address bar.
//!
//! Commands:
//!     :open N          open match N of the latest list in the current tab
//!     :visit URL [T]   record a typed visit to URL (optional title T)
//!     :refresh         rebuild the in-memory index now
//!     :quit
//!
//! Usage:
//!     cargo run --bin omnibox-repl -- --db history.sqlite --seed-demo

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use omnibox::frecency::VisitType;
use omnibox::memory::{InMemoryBookmarkStore, StaticTabRegistry};
use omnibox::{
    logging, runtime, Bookmark, Collaborators, HistoryRow, InputReason, Navigator, Omnibox, OmniboxConfig,
    OpenDisposition, OpenTab, ResultsListener, ResultsUpdate, SqliteHistoryStore, SystemClock,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the SQLite history database (created if missing)
    #[arg(short, long, default_value = "omnibox_history.sqlite")]
    db: PathBuf,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Insert a handful of demo history rows, tabs and bookmarks
    #[arg(long)]
    seed_demo: bool,

    /// Print updates as JSON lines
    #[arg(long)]
    json: bool,
}

struct PrintingListener {
    json: bool,
}

impl ResultsListener for PrintingListener {
    fn on_results(&self, update: &ResultsUpdate) {
        if self.json {
            if let Ok(line) = serde_json::to_string(update) {
                println!("{}", line);
            }
            return;
        }
        let status = if update.done { "done" } else { "partial" };
        println!("── query {} ({}) ──", update.query_id, status);
        for (i, m) in update.matches.iter().enumerate() {
            let inline = m.inline_completion.as_deref().unwrap_or("");
            let default = if m.is_default { "*" } else { " " };
            println!(
                "{}{:>2} {:>5} {:<18} {} [{}] {}",
                default,
                i,
                m.relevance,
                m.match_type.as_str(),
                m.contents,
                m.destination_url,
                inline
            );
        }
    }
}

struct PrintingNavigator;

impl Navigator for PrintingNavigator {
    fn navigate(&self, url: &str, disposition: OpenDisposition) {
        println!("→ navigate {} ({:?})", url, disposition);
    }

    fn switch_to_tab(&self, tab_id: i64) {
        println!("→ switch to tab {}", tab_id);
    }
}

const DEMO_HISTORY: &[(&str, &str, u32, u32, i64)] = &[
    ("https://github.com/rust-lang/rust", "rust-lang/rust: Empowering everyone", 42, 6, 0),
    ("https://doc.rust-lang.org/std/", "std - Rust", 25, 2, 1),
    ("https://docs.rs/tokio", "tokio - Rust", 12, 0, 2),
    ("https://crates.io", "crates.io: Rust Package Registry", 9, 3, 3),
    ("https://news.ycombinator.com", "Hacker News", 60, 20, 0),
    ("https://example.com", "Example Domain", 3, 1, 10),
    ("https://en.wikipedia.org/wiki/Inverted_index", "Inverted index - Wikipedia", 1, 0, 40),
];

fn seed_demo(db: &SqliteHistoryStore) -> Result<()> {
    let now = Utc::now().timestamp();
    for (url, title, visits, typed, age_days) in DEMO_HISTORY {
        let last = now - age_days * 86_400;
        db.insert_row(&HistoryRow {
            id: 0,
            url: url.to_string(),
            title: title.to_string(),
            visit_count: *visits,
            typed_count: *typed,
            last_visit_time: last,
            last_visit_type: if *typed > 0 { VisitType::Typed } else { VisitType::Link },
            first_visit_time: last - 30 * 86_400,
        })
        .with_context(|| format!("Failed to insert demo row {}", url))?;
    }
    Ok(())
}

fn demo_tabs() -> Vec<OpenTab> {
    vec![
        OpenTab {
            id: 1,
            title: "Inbox".into(),
            url: "https://mail.example.com/inbox".into(),
            space_id: "default".into(),
        },
        OpenTab {
            id: 2,
            title: "Rust Playground".into(),
            url: "https://play.rust-lang.org".into(),
            space_id: "default".into(),
        },
    ]
}

fn demo_bookmarks() -> Vec<Bookmark> {
    vec![Bookmark {
        id: 1,
        url: "https://doc.rust-lang.org/book/".into(),
        title: "The Rust Programming Language".into(),
    }]
}

fn main() -> Result<()> {
    logging::init_tracing();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => OmniboxConfig::load(path).context("Failed to load config")?,
        None => OmniboxConfig::default(),
    };
    let db = SqliteHistoryStore::open(&args.db).context("Failed to open history database")?;
    if args.seed_demo {
        seed_demo(&db)?;
    }

    let (tabs, bookmarks) = if args.seed_demo {
        (demo_tabs(), demo_bookmarks())
    } else {
        (Vec::new(), Vec::new())
    };
    let omnibox = Omnibox::new(
        Collaborators {
            history: Arc::new(db.clone()),
            tabs: Arc::new(StaticTabRegistry::new(tabs)),
            bookmarks: Some(Arc::new(InMemoryBookmarkStore::new(bookmarks))),
            clock: Arc::new(SystemClock),
            listener: Arc::new(PrintingListener { json: args.json }),
            navigator: Some(Arc::new(PrintingNavigator)),
        },
        config,
    )
    .context("Failed to build omnibox")?;

    let stdin = io::stdin();
    print_prompt()?;
    for line in stdin.lock().lines() {
        let line = line?;
        match run_command(&omnibox, &db, &line) {
            Ok(true) => break,
            Ok(false) => {}
            Err(e) => eprintln!("error: {:#}", e),
        }
        print_prompt()?;
    }
    Ok(())
}

fn print_prompt() -> Result<()> {
    print!("> ");
    io::stdout().flush()?;
    Ok(())
}

/// Returns true when the user asked to quit.
fn run_command(omnibox: &Omnibox, db: &SqliteHistoryStore, line: &str) -> Result<bool> {
    let Some(command) = line.strip_prefix(':') else {
        let reason = if line.is_empty() { InputReason::Focus } else { InputReason::Keystroke };
        omnibox.handle_input(line, reason);
        return Ok(false);
    };

    let mut parts = command.splitn(3, ' ');
    match parts.next().unwrap_or_default() {
        "quit" | "q" => return Ok(true),
        "open" => {
            let n: usize = parts.next().context("usage: :open N")?.parse().context("N must be a number")?;
            let matches = omnibox.current_matches();
            let Some(m) = matches.get(n) else {
                bail!("no match {} in the current list", n);
            };
            omnibox.open_match(m, OpenDisposition::Current)?;
        }
        "visit" => {
            let url = parts.next().context("usage: :visit URL [title]")?;
            let title = parts.next().unwrap_or_default();
            let row = db.record_visit(url, title, VisitType::Typed, Utc::now().timestamp())?;
            omnibox.on_url_visited(&row);
            println!("recorded visit #{} to {}", row.visit_count, row.url);
        }
        "refresh" => {
            let outcome = runtime::handle().block_on(omnibox.refresh_index())?;
            println!("{:?}", outcome);
        }
        other => bail!("unknown command :{}", other),
    }
    Ok(false)
}
