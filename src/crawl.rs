//! Breadth-first web crawler feeding pages to the index.

use chrono::{SecondsFormat, Utc};
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use url::Url;

use crate::documents::{truncate_chars, Document, MAX_TITLE_CHARS};

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_PAGE_TEXT_CHARS: usize = 5000;
const MIN_PAGE_TEXT_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub max_depth: usize,
    pub max_pages: usize,
    pub same_domain_only: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_pages: 100,
            same_domain_only: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlReport {
    pub visited: usize,
    pub indexed: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub title: Option<String>,
    pub text: String,
    /// Raw `href` values in document order.
    pub hrefs: Vec<String>,
}

fn is_hidden_element(name: &str) -> bool {
    matches!(name, "script" | "style")
}

/// Title, visible text and outgoing links of an HTML page. Script and style
/// contents are excluded and whitespace is collapsed.
pub fn parse_page(html: &str) -> Page {
    let document = Html::parse_document(html);

    let mut words: Vec<&str> = vec![];
    for node in document.tree.root().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|e| is_hidden_element(e.name()))
                .unwrap_or(false)
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }

    let title = Selector::parse("title").ok().and_then(|selector| {
        document
            .select(&selector)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    });

    let hrefs = match Selector::parse("a[href]") {
        Ok(selector) => document
            .select(&selector)
            .filter_map(|a| a.value().attr("href"))
            .map(str::to_string)
            .collect(),
        Err(_) => vec![],
    };

    Page {
        title,
        text: words.join(" "),
        hrefs,
    }
}

fn same_site(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

/// Resolve `href` against the page, keeping only http(s) links (on the start
/// site when `same_domain_only`). Fragments are dropped.
pub fn resolve_link(page: &Url, href: &str, start: &Url, same_domain_only: bool) -> Option<Url> {
    let mut link = page.join(href).ok()?;
    link.set_fragment(None);

    if !matches!(link.scheme(), "http" | "https") {
        return None;
    }
    if same_domain_only && !same_site(&link, start) {
        return None;
    }
    Some(link)
}

fn page_document(url: &str, depth: usize, page: Page) -> Document {
    let title = page.title.unwrap_or_else(|| url.to_string());

    Document::new(truncate_chars(&page.text, MAX_PAGE_TEXT_CHARS))
        .with_url(url)
        .with_title(truncate_chars(&title, MAX_TITLE_CHARS))
        .with_meta("depth", depth)
        .with_meta(
            "crawled_at",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        )
}

/// Crawl from `start_url`. `fetch` returns a page body, `sink` receives
/// every page worth indexing. Failures of either are logged and counted.
pub fn crawl<F, S>(
    start_url: &str,
    options: &CrawlOptions,
    mut fetch: F,
    mut sink: S,
) -> anyhow::Result<CrawlReport>
where
    F: FnMut(&str) -> anyhow::Result<String>,
    S: FnMut(Document) -> anyhow::Result<()>,
{
    let mut start = Url::parse(start_url)?;
    start.set_fragment(None);

    let mut report = CrawlReport::default();
    let mut visited: HashSet<String> = HashSet::new();
    let mut to_visit: VecDeque<(Url, usize)> = VecDeque::from([(start.clone(), 0)]);

    while let Some((url, depth)) = to_visit.pop_front() {
        if visited.len() >= options.max_pages {
            break;
        }
        if depth > options.max_depth || visited.contains(url.as_str()) {
            continue;
        }

        log::info!("crawling {url} (depth {depth})");
        let body = match fetch(url.as_str()) {
            Ok(body) => body,
            Err(err) => {
                log::error!("error crawling {url}: {err}");
                report.errors += 1;
                continue;
            }
        };
        visited.insert(url.to_string());
        report.visited += 1;

        let page = parse_page(&body);
        let links: Vec<Url> = if depth < options.max_depth {
            page.hrefs
                .iter()
                .filter_map(|href| resolve_link(&url, href, &start, options.same_domain_only))
                .filter(|link| !visited.contains(link.as_str()))
                .collect()
        } else {
            vec![]
        };

        if page.text.chars().count() > MIN_PAGE_TEXT_CHARS {
            match sink(page_document(url.as_str(), depth, page)) {
                Ok(()) => report.indexed += 1,
                Err(err) => {
                    log::error!("error indexing {url}: {err}");
                    report.errors += 1;
                }
            }
        }

        to_visit.extend(links.into_iter().map(|link| (link, depth + 1)));
    }

    log::info!("crawl complete, visited {} pages", report.visited);
    Ok(report)
}

/// Fetch a page with a blocking client, failing on non-2xx statuses.
pub fn fetch_page(client: &reqwest::blocking::Client, url: &str) -> anyhow::Result<String> {
    let resp = client.get(url).send()?.error_for_status()?;
    Ok(resp.text()?)
}
