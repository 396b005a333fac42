use std::error::Error;

use atty::Stream;
use clap::{Args, Parser, Subcommand, ValueEnum};
use keyword_suggest::config::{
    DEFAULT_GOOGLE_BASE_URL, DEFAULT_GOOGLE_SEARCH_URL, DEFAULT_NOTE_BASE_URL,
    DEFAULT_NOTE_SEARCH_URL, DEFAULT_TIMEOUT_MS,
};
use keyword_suggest::query::{DEFAULT_SIZE, MAX_SIZE};
use keyword_suggest::{
    FetchMode, FetcherTable, Service, SuggestConfig, SuggestController, SuggestQuery,
    SuggestionRow,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "keyword-suggest",
    about = "Explore keyword and hashtag suggestions from Note and Google",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    backend: BackendArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct BackendArgs {
    /// Base URL of the Note API.
    #[arg(long, global = true, env = "NOTE_BASE_URL", default_value = DEFAULT_NOTE_BASE_URL)]
    note_base_url: String,
    /// Base URL of the Google-suggest-compatible endpoint.
    #[arg(long, global = true, env = "GOOGLE_BASE_URL", default_value = DEFAULT_GOOGLE_BASE_URL)]
    google_base_url: String,
    /// Note search page used for pivots; `{query}` and `{size}` are substituted.
    #[arg(long, global = true, env = "NOTE_SEARCH_URL", default_value = DEFAULT_NOTE_SEARCH_URL)]
    note_search_url: String,
    /// Google search page used for pivots; `{query}` and `{size}` are substituted.
    #[arg(long, global = true, env = "GOOGLE_SEARCH_URL", default_value = DEFAULT_GOOGLE_SEARCH_URL)]
    google_search_url: String,
    /// Per-request timeout in milliseconds.
    #[arg(long, global = true, env = "SUGGEST_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,
}

impl BackendArgs {
    fn to_config(&self) -> Result<SuggestConfig, keyword_suggest::ConfigError> {
        SuggestConfig::builder()
            .note_base_url(&self.note_base_url)
            .google_base_url(&self.google_base_url)
            .note_search_url(&self.note_search_url)
            .google_search_url(&self.google_search_url)
            .timeout_ms(self.timeout_ms)
            .build()
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch suggestions for a keyword.
    Suggest {
        /// Keyword to look up. Leading `#` characters are dropped for Note.
        #[arg(required = true)]
        query: Vec<String>,
        /// Backend to ask.
        #[arg(short, long, value_enum, default_value_t = ServiceArg::Note)]
        service: ServiceArg,
        /// Maximum number of suggestions (ignored for related hashtags).
        #[arg(short = 'n', long, default_value_t = DEFAULT_SIZE,
              value_parser = clap::value_parser!(u32).range(1..=MAX_SIZE as i64))]
        size: u32,
        /// Ask Note for related hashtags instead of prefix suggestions.
        #[arg(long)]
        related: bool,
    },
    /// Decode a page query string into its canonical state.
    Decode {
        /// Query string such as `service=Google&query=rust&size=10`.
        query_string: String,
    },
    /// Serve the suggestion pages over HTTP.
    #[cfg(feature = "web")]
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        /// Page styling.
        #[arg(long, value_enum, default_value_t = ThemeArg::Tailwind)]
        theme: ThemeArg,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ServiceArg {
    Note,
    Google,
}

impl From<ServiceArg> for Service {
    fn from(value: ServiceArg) -> Self {
        match value {
            ServiceArg::Note => Service::Note,
            ServiceArg::Google => Service::Google,
        }
    }
}

#[cfg(feature = "web")]
#[derive(Copy, Clone, Debug, ValueEnum)]
enum ThemeArg {
    Tailwind,
    Bootstrap,
}

#[cfg(feature = "web")]
impl From<ThemeArg> for keyword_suggest::web::WebTheme {
    fn from(value: ThemeArg) -> Self {
        match value {
            ThemeArg::Tailwind => Self::Tailwind,
            ThemeArg::Bootstrap => Self::Bootstrap,
        }
    }
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.command);
    match cli.command {
        Command::Suggest {
            query,
            service,
            size,
            related,
        } => {
            let config = cli.backend.to_config()?;
            let initial = SuggestQuery {
                service: service.into(),
                size,
                related,
                ..SuggestQuery::default()
            };
            runtime()?.block_on(handle_suggest(&config, initial, &query.join(" "), cli.json))
        }
        Command::Decode { query_string } => handle_decode(&query_string, cli.json),
        #[cfg(feature = "web")]
        Command::Serve { addr, theme } => {
            let config = cli.backend.to_config()?;
            let web = keyword_suggest::web::WebConfig {
                addr,
                theme: theme.into(),
            };
            runtime()?.block_on(keyword_suggest::web::serve(web, config))?;
            Ok(())
        }
    }
}

fn init_tracing(command: &Command) {
    let default_level = match command {
        #[cfg(feature = "web")]
        Command::Serve { .. } => "info",
        _ => "warn",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}

async fn handle_suggest(
    config: &SuggestConfig,
    initial: SuggestQuery,
    raw_query: &str,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let fetchers = FetcherTable::from_config(config)?;
    let mut controller = SuggestController::new(fetchers, initial);
    controller.set_query(raw_query).await;
    let state = controller.state();
    let rows = controller.rows();

    if as_json {
        let payload = json!({
            "state": state,
            "mode": FetchMode::for_query(state),
            "count": rows.len(),
            "results": rows,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_rows(state, &rows);
    }
    Ok(())
}

fn handle_decode(query_string: &str, as_json: bool) -> Result<(), Box<dyn Error>> {
    let state = SuggestQuery::decode(query_string);
    if as_json {
        let payload = json!({
            "state": state,
            "canonical": state.encode(),
            "href": state.href(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("service  {}", state.service);
        println!("query    {:?}", state.query);
        println!("size     {}", state.size);
        println!(
            "related  {}{}",
            state.related,
            if state.service == Service::Note {
                ""
            } else {
                " (ignored)"
            }
        );
        println!("href     {}", state.href());
    }
    Ok(())
}

fn print_rows(state: &SuggestQuery, rows: &[SuggestionRow]) {
    if rows.is_empty() {
        println!("No suggestions for \"{}\".", state.query);
        return;
    }
    if !stdout_is_tty() {
        for row in rows {
            println!("{}\t{}\t{}", row.name, row.count_label, row.pivot_href);
        }
        return;
    }
    let width = rows
        .iter()
        .map(|row| row.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("KEYWORD".len());
    println!(
        "{} suggestions for \"{}\" ({}):",
        rows.len(),
        state.query,
        FetchMode::for_query(state)
    );
    println!("{:<width$}  {:>8}  {}", "KEYWORD", "ARTICLES", "SEARCH", width = width);
    println!("{:-<width$}  {:->8}  {}", "", "", "------", width = width);
    for row in rows {
        println!(
            "{:<width$}  {:>8}  {}",
            row.name,
            row.count_label,
            row.pivot_href,
            width = width
        );
    }
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}
