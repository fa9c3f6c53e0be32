use indexmap::IndexSet;
use scraper::Html;
use tokio::time::sleep;
use url::Url;

use crate::config::Config;
use crate::crawler::fetcher::BrowserSession;
use crate::crawler::locator::{HtmlLocator, Located, Locator, Role, TextMatch};
use crate::crawler::models::DetailRecord;
use crate::events::{Observer, ScrapeEvent};

/// One way of finding an element on a detail view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Role(Role),
    Tag(String),
    Label(TextMatch),
    Attribute { name: String, value: TextMatch },
}

impl Probe {
    pub fn attribute(name: impl Into<String>, value: TextMatch) -> Self {
        Probe::Attribute {
            name: name.into(),
            value,
        }
    }

    fn locate<L: Locator>(&self, locator: &L) -> Option<Located> {
        match self {
            Probe::Role(role) => locator.find_by_role(*role),
            Probe::Tag(tag) => locator.find_by_tag(tag),
            Probe::Label(label) => locator.find_by_label(label),
            Probe::Attribute { name, value } => locator.find_by_attribute(name, value),
        }
    }
}

/// Where each field lives on a listing's detail view.
///
/// Defaults follow the current Google Maps place panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailMarkup {
    pub title: Probe,
    /// Container holding the rating and review count, as `(attribute, match)`.
    pub summary_scope: Option<(String, TextMatch)>,
    pub rating: Probe,
    pub review_count: Probe,
    pub category: Probe,
    pub address: Probe,
    pub address_prefix: String,
    pub phone: Probe,
    pub phone_prefix: String,
    pub website: Probe,
}

impl Default for DetailMarkup {
    fn default() -> Self {
        Self {
            title: Probe::Tag("h1".into()),
            summary_scope: Some(("class".into(), TextMatch::contains("F7nice"))),
            rating: Probe::attribute("aria-hidden", TextMatch::exact("true")),
            review_count: Probe::Label(TextMatch::contains("review")),
            category: Probe::attribute("jsaction", TextMatch::contains("category")),
            address: Probe::attribute("data-item-id", TextMatch::exact("address")),
            address_prefix: "Address:".into(),
            phone: Probe::attribute("data-item-id", TextMatch::contains("phone")),
            phone_prefix: "Phone:".into(),
            website: Probe::attribute("data-item-id", TextMatch::exact("authority")),
        }
    }
}

/// Fields whose raw text needs parsing and can therefore be malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailField {
    Rating,
    ReviewCount,
}

/// Output of [`parse_detail`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDetail {
    pub record: DetailRecord,
    /// Fields that were present but could not be parsed, with their raw text.
    pub malformed: Vec<(DetailField, String)>,
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn strip_label(label: &str, prefix: &str) -> Option<String> {
    let label = label.trim_start();
    non_empty(label.strip_prefix(prefix).unwrap_or(label))
}

/// Leading number of a rating label, decimal-comma tolerant, in `[0, 5]`.
pub fn parse_rating(raw: &str) -> Option<f64> {
    let number: String = raw
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | ','))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    number
        .parse::<f64>()
        .ok()
        .filter(|v| (0.0..=5.0).contains(v))
}

/// Digits of an accessibility label such as `"1,234 reviews"`.
pub fn parse_review_count(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Extract a listing from a rendered detail view.
///
/// Every field is looked up on its own; a miss only blanks that field.
pub fn parse_detail(html: &str, markup: &DetailMarkup) -> ParsedDetail {
    let doc = Html::parse_document(html);
    let locator = HtmlLocator::new(&doc);
    let mut parsed = ParsedDetail::default();

    let title = markup
        .title
        .locate(&locator)
        .and_then(|el| non_empty(el.text()));

    let summary = match &markup.summary_scope {
        Some((name, value)) => locator.within(name, value),
        None => Some(locator),
    };

    let rating = summary
        .as_ref()
        .and_then(|scope| markup.rating.locate(scope))
        .and_then(|el| non_empty(el.text()))
        .and_then(|raw| {
            let value = parse_rating(&raw);
            if value.is_none() {
                parsed.malformed.push((DetailField::Rating, raw));
            }
            value
        });

    let review_count = summary
        .as_ref()
        .and_then(|scope| markup.review_count.locate(scope))
        .and_then(|el| el.attr("aria-label").map(str::to_string))
        .and_then(|raw| {
            let value = parse_review_count(&raw);
            if value.is_none() {
                parsed.malformed.push((DetailField::ReviewCount, raw));
            }
            value
        });

    let category = markup
        .category
        .locate(&locator)
        .and_then(|el| non_empty(el.text()));

    let address = markup
        .address
        .locate(&locator)
        .and_then(|el| el.attr("aria-label").and_then(|l| strip_label(l, &markup.address_prefix)));

    let phone = markup
        .phone
        .locate(&locator)
        .and_then(|el| el.attr("aria-label").and_then(|l| strip_label(l, &markup.phone_prefix)));

    let website = markup
        .website
        .locate(&locator)
        .and_then(|el| el.attr("href").map(str::to_string));

    parsed.record = DetailRecord {
        title,
        rating,
        review_count,
        category,
        address,
        phone,
        website,
    };
    parsed
}

/// Wait for the detail view of `url` to render, then parse it.
///
/// Never fails: a view that does not become ready, or cannot be read,
/// yields an empty record and is reported to `observer`.
pub async fn extract_detail<S: BrowserSession>(
    session: &mut S,
    cfg: &Config,
    observer: &dyn Observer,
    url: &str,
) -> DetailRecord {
    match session
        .wait_for(&cfg.heading_selector, cfg.detail_wait, cfg.poll_interval)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            observer.on_event(&ScrapeEvent::DetailTimeout {
                url: url.to_string(),
            });
            return DetailRecord::default();
        }
        Err(e) => {
            observer.on_event(&ScrapeEvent::DetailUnreadable {
                url: url.to_string(),
                error: e.to_string(),
            });
            return DetailRecord::default();
        }
    }

    sleep(cfg.detail_stabilize).await;

    let html = match session.content().await {
        Ok(html) => html,
        Err(e) => {
            observer.on_event(&ScrapeEvent::DetailUnreadable {
                url: url.to_string(),
                error: e.to_string(),
            });
            return DetailRecord::default();
        }
    };

    let parsed = parse_detail(&html, &cfg.markup);
    for (field, raw) in parsed.malformed {
        observer.on_event(&ScrapeEvent::FieldMalformed {
            url: url.to_string(),
            field,
            raw,
        });
    }
    parsed.record
}

/// Listing URLs inside the results feed, first-seen order, duplicates removed.
///
/// The feed is the first element whose `scope.0` attribute matches `scope.1`.
/// Relative hrefs are resolved against `base`; anchors that cannot be turned
/// into a URL are skipped.
pub fn collect_links(
    html: &str,
    base: Option<&Url>,
    scope: (&str, &TextMatch),
    path_fragment: &str,
) -> Vec<String> {
    let doc = Html::parse_document(html);
    let locator = HtmlLocator::new(&doc);
    let Some(feed) = locator.within(scope.0, scope.1) else {
        return Vec::new();
    };

    let mut links = IndexSet::new();
    for anchor in feed.find_all_by_attribute("href", &TextMatch::contains(path_fragment)) {
        let Some(href) = anchor.attr("href") else {
            continue;
        };
        let resolved = match (Url::parse(href), base) {
            (Ok(url), _) => url.to_string(),
            (Err(url::ParseError::RelativeUrlWithoutBase), Some(base)) => match base.join(href) {
                Ok(url) => url.to_string(),
                Err(_) => continue,
            },
            _ => continue,
        };
        links.insert(resolved);
    }

    links.into_iter().collect()
}
