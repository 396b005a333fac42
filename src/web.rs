use crate::{
    FetcherTable, SearchQuery, Service, SuggestConfig, SuggestController, SuggestQuery,
    SuggestQueryPatch, SuggestionRow, normalize_search_input,
    query::{SIZE_OPTIONS, SUGGEST_PATH},
};
use askama::Template;
use axum::{
    Json, Router,
    extract::{RawQuery, State},
    response::{Html, IntoResponse, Redirect},
    routing::get,
};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::info;

type SharedState = Arc<AppState>;

const TAILWIND_TAG: &str =
    r#"<script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>"#;
const BOOTSTRAP_CSS_TAG: &str = r#"<link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">"#;

#[derive(Clone)]
pub struct AppState {
    pub fetchers: FetcherTable,
    pub config: Arc<SuggestConfig>,
    pub theme: WebTheme,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum WebTheme {
    #[default]
    Tailwind,
    Bootstrap,
}

impl fmt::Display for WebTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebTheme::Tailwind => write!(f, "tailwind"),
            WebTheme::Bootstrap => write!(f, "bootstrap"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Chrome {
    use_bootstrap: bool,
    body_class: &'static str,
    main_class: &'static str,
    card_class: &'static str,
    eyebrow_class: &'static str,
    headline_class: &'static str,
    lede_class: &'static str,
    button_class: &'static str,
    pill_class: &'static str,
    pill_active_class: &'static str,
    table_row_class: &'static str,
}

impl Chrome {
    fn new(theme: WebTheme) -> Self {
        match theme {
            WebTheme::Tailwind => Self {
                use_bootstrap: false,
                body_class: "bg-slate-50 text-slate-900",
                main_class: "min-h-screen flex flex-col items-center justify-start py-10 px-4",
                card_class: "max-w-3xl w-full space-y-6",
                eyebrow_class: "uppercase tracking-wide text-sm text-slate-500",
                headline_class: "text-3xl font-extrabold tracking-tight",
                lede_class: "text-lg text-slate-600",
                button_class: "inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors",
                pill_class: "px-3 py-1 rounded-full border bg-white text-slate-900 shadow-sm hover:shadow",
                pill_active_class: "px-3 py-1 rounded-full border bg-slate-900 text-white",
                table_row_class: "border-b border-slate-200",
            },
            WebTheme::Bootstrap => Self {
                use_bootstrap: true,
                body_class: "bg-light text-dark",
                main_class: "container py-5",
                card_class: "mx-auto col-lg-8",
                eyebrow_class: "text-uppercase text-muted mb-2",
                headline_class: "display-6 fw-bold",
                lede_class: "lead mb-4",
                button_class: "btn btn-primary",
                pill_class: "btn btn-sm btn-outline-secondary",
                pill_active_class: "btn btn-sm btn-secondary active",
                table_row_class: "",
            },
        }
    }

    fn head_tags(&self) -> &'static str {
        if self.use_bootstrap {
            BOOTSTRAP_CSS_TAG
        } else {
            TAILWIND_TAG
        }
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub theme: WebTheme,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            theme: WebTheme::default(),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
    Client(reqwest::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
            WebError::Client(err) => write!(f, "failed to build HTTP client: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

impl From<reqwest::Error> for WebError {
    fn from(value: reqwest::Error) -> Self {
        WebError::Client(value)
    }
}

pub async fn serve(config: WebConfig, suggest: SuggestConfig) -> Result<(), WebError> {
    let fetchers = FetcherTable::from_config(&suggest)?;
    info!(
        %config.addr,
        theme = %config.theme,
        note = suggest.note_base_url(),
        google = suggest.google_base_url(),
        timeout_ms = suggest.request_timeout().as_millis() as u64,
        "Binding HTTP listener"
    );
    let state = Arc::new(AppState {
        fetchers,
        config: Arc::new(suggest),
        theme: config.theme,
    });
    let router = build_router(state);
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route(SUGGEST_PATH, get(suggest_html))
        .route("/suggestKeywords/submit", get(submit_query))
        .route("/search", get(search_redirect))
        .route("/api/suggest", get(api_suggest))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn home(State(state): State<SharedState>) -> impl IntoResponse {
    Html(render_home(state.theme))
}

fn render_home(theme: WebTheme) -> String {
    let chrome = Chrome::new(theme);
    let note_href = SuggestQuery::default().href();
    let google_href = SuggestQuery {
        service: Service::Google,
        ..SuggestQuery::default()
    }
    .href();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Keyword Suggest</title>
    {head_tags}
  </head>
  <body class="{body_class}">
    <main class="{main_class}">
      <div class="{card_class}">
        <div>
          <p class="{eyebrow_class}">keyword-suggest v{version}</p>
          <h1 class="{headline_class}">Find the keywords and hashtags people are searching for.</h1>
          <p class="{lede_class}">Type a keyword to see Note hashtag suggestions, related hashtags, or Google keyword suggestions.</p>
        </div>
        <div class="flex flex-wrap gap-3 d-flex">
          <a href="{note_href}" class="{button_class}">Note hashtags</a>
          <a href="{google_href}" class="{button_class}">Google keywords</a>
        </div>
      </div>
    </main>
  </body>
</html>"#,
        head_tags = chrome.head_tags(),
        body_class = chrome.body_class,
        main_class = chrome.main_class,
        card_class = chrome.card_class,
        eyebrow_class = chrome.eyebrow_class,
        headline_class = chrome.headline_class,
        lede_class = chrome.lede_class,
        button_class = chrome.button_class,
        version = env!("CARGO_PKG_VERSION"),
        note_href = note_href,
        google_href = google_href,
    )
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "keyword-suggest" }))
}

async fn suggest_html(
    State(state): State<SharedState>,
    RawQuery(raw): RawQuery,
) -> impl IntoResponse {
    let controller = load_suggestions(&state, raw.as_deref().unwrap_or_default()).await;
    let page = SuggestPagePayload::new(controller.state(), controller.rows());
    let template = SuggestTemplate {
        chrome: Chrome::new(state.theme),
        page: &page,
    };
    Html(
        template
            .render()
            .unwrap_or_else(|err| render_error_page(state.theme, err.to_string())),
    )
}

/// Search-bar target: normalizes the raw input and redirects to the canonical
/// page URL, which becomes the browser-history entry.
async fn submit_query(RawQuery(raw): RawQuery) -> Redirect {
    let submitted = SuggestQuery::decode(raw.as_deref().unwrap_or_default());
    let query = normalize_search_input(submitted.service, &submitted.query);
    let next = SuggestQueryPatch::query(query).apply(&submitted);
    Redirect::to(&next.href())
}

async fn search_redirect(
    State(state): State<SharedState>,
    RawQuery(raw): RawQuery,
) -> Redirect {
    let search = SearchQuery::decode(raw.as_deref().unwrap_or_default());
    if search.query.trim().is_empty() {
        let back = SuggestQuery {
            service: search.service,
            size: search.size,
            ..SuggestQuery::default()
        };
        return Redirect::to(&back.href());
    }
    let destination = state
        .config
        .search_page_url(search.service, &search.query, search.size);
    info!(service = %search.service, query = %search.query, %destination, "Pivoting to full search");
    Redirect::to(&destination)
}

#[derive(Debug, Clone, Serialize)]
struct SuggestResponsePayload {
    state: SuggestQuery,
    count: usize,
    results: Vec<SuggestionRow>,
}

async fn api_suggest(
    State(state): State<SharedState>,
    RawQuery(raw): RawQuery,
) -> Json<SuggestResponsePayload> {
    let controller = load_suggestions(&state, raw.as_deref().unwrap_or_default()).await;
    let results = controller.rows();
    Json(SuggestResponsePayload {
        state: controller.state().clone(),
        count: results.len(),
        results,
    })
}

async fn load_suggestions(state: &AppState, raw_query: &str) -> SuggestController {
    let mut controller = SuggestController::from_url(state.fetchers.clone(), raw_query);
    controller.refresh().await;
    controller
}

#[derive(Debug, Clone)]
struct OptionLink {
    label: String,
    href: String,
    active: bool,
}

impl OptionLink {
    fn new(state: &SuggestQuery, patch: SuggestQueryPatch, label: impl Into<String>) -> Self {
        let target = patch.apply(state);
        Self {
            label: label.into(),
            active: target == *state,
            href: target.href(),
        }
    }
}

#[derive(Debug, Clone)]
struct SuggestPagePayload {
    state: SuggestQuery,
    rows: Vec<SuggestionRow>,
    service_links: Vec<OptionLink>,
    /// Empty in related-hashtag mode, which ignores the size.
    size_links: Vec<OptionLink>,
    /// Empty unless the service is Note.
    related_links: Vec<OptionLink>,
}

impl SuggestPagePayload {
    fn new(state: &SuggestQuery, rows: Vec<SuggestionRow>) -> Self {
        let service_links = Service::ALL
            .into_iter()
            .map(|service| OptionLink::new(state, SuggestQueryPatch::service(service), service.as_str()))
            .collect();
        let size_links = if state.related_active() {
            Vec::new()
        } else {
            SIZE_OPTIONS
                .into_iter()
                .map(|size| OptionLink::new(state, SuggestQueryPatch::size(size), size.to_string()))
                .collect()
        };
        let related_links = match state.service {
            Service::Note => vec![
                OptionLink::new(state, SuggestQueryPatch::related(false), "Suggested hashtags"),
                OptionLink::new(state, SuggestQueryPatch::related(true), "Related hashtags"),
            ],
            Service::Google => Vec::new(),
        };
        Self {
            state: state.clone(),
            rows,
            service_links,
            size_links,
            related_links,
        }
    }
}

fn render_error_page(theme: WebTheme, message: impl Into<String>) -> String {
    let chrome = Chrome::new(theme);
    let message = message.into();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Keyword Suggest • Error</title>
    {head_tags}
  </head>
  <body class="{body_class}">
    <main class="{main_class}">
      <div class="{card_class}">
        <h1 class="{headline_class}">Something went wrong</h1>
        <p class="{lede_class}">{message}</p>
        <a href="/" class="{button_class}">Back to home</a>
      </div>
    </main>
  </body>
</html>"#,
        head_tags = chrome.head_tags(),
        body_class = chrome.body_class,
        main_class = chrome.main_class,
        card_class = chrome.card_class,
        headline_class = chrome.headline_class,
        lede_class = chrome.lede_class,
        button_class = chrome.button_class,
        message = xml_escape(&message),
    )
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// Hrefs hold percent-encoded components only and count labels are digits or "N/A";
// both are emitted unescaped.
#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Keyword Suggest{% if page.state.query.len() > 0 %} • {{ page.state.query }}{% endif %}</title>
    {{ chrome.head_tags()|safe }}
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }} space-y-6">
        <div>
          <p class="{{ chrome.eyebrow_class }}"><a href="/">keyword-suggest</a></p>
          <h1 class="{{ chrome.headline_class }}">Keyword suggestions</h1>
          <p class="{{ chrome.lede_class }}">Enter a keyword to see keyword or hashtag suggestions.</p>
        </div>

        <form method="get" action="/suggestKeywords/submit" class="flex gap-2 d-flex" role="search">
          <input type="hidden" name="service" value="{{ page.state.service }}">
          <input type="hidden" name="size" value="{{ page.state.size }}">
          <input type="hidden" name="related" value="{{ page.state.related }}">
          <input type="search" name="query" value="{{ page.state.query }}" placeholder="Keyword" class="form-control flex-1 rounded-md border px-3 py-2" autofocus>
          <button type="submit" class="{{ chrome.button_class }}">Search</button>
        </form>

        <nav class="flex flex-wrap gap-2 d-flex" aria-label="Service">
          {% for link in page.service_links %}
          <a href="{{ link.href|safe }}" class="{% if link.active %}{{ chrome.pill_active_class }}{% else %}{{ chrome.pill_class }}{% endif %}">{{ link.label }}</a>
          {% endfor %}
        </nav>

        <div class="flex flex-wrap gap-6 d-flex">
          {% if !page.size_links.is_empty() %}
          <div>
            <p class="text-sm text-slate-500 mb-1">Results</p>
            <div class="flex gap-2 d-flex">
              {% for link in page.size_links %}
              <a href="{{ link.href|safe }}" class="{% if link.active %}{{ chrome.pill_active_class }}{% else %}{{ chrome.pill_class }}{% endif %}">{{ link.label }}</a>
              {% endfor %}
            </div>
          </div>
          {% endif %}
          {% if !page.related_links.is_empty() %}
          <div>
            <p class="text-sm text-slate-500 mb-1">Hashtag type</p>
            <div class="flex gap-2 d-flex">
              {% for link in page.related_links %}
              <a href="{{ link.href|safe }}" class="{% if link.active %}{{ chrome.pill_active_class }}{% else %}{{ chrome.pill_class }}{% endif %}">{{ link.label }}</a>
              {% endfor %}
            </div>
          </div>
          {% endif %}
        </div>

        <hr>
        <p id="result-count">Results: {{ page.rows.len() }}</p>
        <div class="bg-white shadow rounded overflow-hidden">
          <table class="min-w-full table">
            <thead class="bg-slate-100 text-left">
              <tr>
                <th class="px-4 py-2">Keyword</th>
                <th class="px-4 py-2">Articles</th>
                <th class="px-4 py-2">Search</th>
              </tr>
            </thead>
            <tbody>
              {% for row in page.rows %}
              <tr class="{{ chrome.table_row_class }}">
                <td class="px-4 py-2">{{ row.name }}</td>
                <td class="px-4 py-2">{{ row.count_label|safe }}</td>
                <td class="px-4 py-2"><a href="{{ row.pivot_href|safe }}" class="text-blue-700 hover:underline" title="Search for {{ row.name }}">🔎</a></td>
              </tr>
              {% endfor %}
            </tbody>
          </table>
        </div>
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct SuggestTemplate<'a> {
    chrome: Chrome,
    page: &'a SuggestPagePayload,
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;
    use crate::fetch::{FetchError, SuggestionResult, SuggestionSource};
    use async_trait::async_trait;
    use axum::{
        body::{self, Body},
        http::{Request, StatusCode, header},
    };
    use tower::ServiceExt;

    struct Fixed(Vec<SuggestionResult>);

    #[async_trait]
    impl SuggestionSource for Fixed {
        async fn fetch(
            &self,
            _query: &str,
            _limit: Option<u32>,
        ) -> Result<Vec<SuggestionResult>, FetchError> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl SuggestionSource for Failing {
        async fn fetch(
            &self,
            _query: &str,
            _limit: Option<u32>,
        ) -> Result<Vec<SuggestionResult>, FetchError> {
            Err(FetchError::Payload {
                url: "mock".into(),
                reason: "unavailable".into(),
            })
        }
    }

    fn test_router() -> Router {
        let hashtags = vec![
            SuggestionResult::counted("cat", 42),
            SuggestionResult::keyword("catlover"),
        ];
        let fetchers = FetcherTable::new(
            Arc::new(Failing),
            Arc::new(Fixed(hashtags)),
            Arc::new(Fixed(vec![SuggestionResult::counted("pets", 3)])),
        );
        let state = Arc::new(AppState {
            fetchers,
            config: Arc::new(SuggestConfig::default()),
            theme: WebTheme::Tailwind,
        });
        build_router(state)
    }

    async fn get_text(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn redirect_target(router: Router, uri: &str) -> String {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        response.headers()[header::LOCATION]
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn suggest_page_renders_rows_and_pivot_links() {
        let (status, html) = get_text(
            test_router(),
            "/suggestKeywords?service=Note&query=cats&size=10&related=false",
        )
        .await;
        assert!(status.is_success());
        assert!(html.contains("Results: 2"));
        assert!(html.contains("<td class=\"px-4 py-2\">N/A</td>"));
        assert!(html.contains("/search?service=Note&query=cat&size=10"));
        assert!(html.contains("/search?service=Note&query=catlover&size=10"));
        assert!(html.contains("Related hashtags"));
    }

    #[tokio::test]
    async fn related_mode_hides_size_options() {
        let (_, html) = get_text(
            test_router(),
            "/suggestKeywords?service=Note&query=cats&related=true",
        )
        .await;
        assert!(html.contains("Results: 1"));
        assert!(!html.contains(">Results</p>"));
        assert!(html.contains(">pets</td>"));
    }

    #[tokio::test]
    async fn google_hides_related_option_and_swallows_failures() {
        let (status, html) =
            get_text(test_router(), "/suggestKeywords?service=Google&query=cats").await;
        assert!(status.is_success());
        assert!(html.contains("Results: 0"));
        assert!(!html.contains("Hashtag type"));
        assert!(html.contains(">Results</p>"));
    }

    #[tokio::test]
    async fn empty_query_renders_empty_table() {
        let (status, html) = get_text(test_router(), "/suggestKeywords").await;
        assert!(status.is_success());
        assert!(html.contains("Results: 0"));
    }

    #[tokio::test]
    async fn submit_normalizes_and_redirects() {
        let target = redirect_target(
            test_router(),
            "/suggestKeywords/submit?service=Note&size=10&related=false&query=%23%23foo+",
        )
        .await;
        assert_eq!(
            target,
            "/suggestKeywords?service=Note&query=foo&size=10&related=false"
        );
    }

    #[tokio::test]
    async fn search_pivots_to_configured_page() {
        let target = redirect_target(
            test_router(),
            "/search?service=Google&query=rust%20lang&size=10",
        )
        .await;
        assert_eq!(target, "https://www.google.com/search?q=rust%20lang&num=10");

        let target = redirect_target(test_router(), "/search?service=Google&size=15").await;
        assert_eq!(
            target,
            "/suggestKeywords?service=Google&query=&size=15&related=false"
        );
    }

    #[tokio::test]
    async fn api_suggest_returns_rows() {
        let (status, body) = get_text(test_router(), "/api/suggest?query=cats&size=10").await;
        assert!(status.is_success());
        let payload: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(payload["count"], 2);
        assert_eq!(payload["state"]["service"], "Note");
        assert_eq!(payload["results"][1]["count_label"], "N/A");
        assert_eq!(
            payload["results"][0]["pivot_href"],
            "/search?service=Note&query=cat&size=10"
        );
    }

    #[tokio::test]
    async fn api_suggest_answers_ok_when_the_source_fails() {
        let (status, body) =
            get_text(test_router(), "/api/suggest?service=Google&query=rust").await;
        assert_eq!(status, StatusCode::OK);
        let payload: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(payload["count"], 0);
        assert_eq!(payload["state"]["service"], "Google");
        assert_eq!(payload["results"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let (status, body) = get_text(test_router(), "/healthz").await;
        assert!(status.is_success());
        assert!(body.contains("\"ok\""));
    }
}
