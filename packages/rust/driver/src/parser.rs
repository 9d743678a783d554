//! Selector-based extraction from the site's rendered pages.
//!
//! Each parser works on an already-parsed [`Html`] document and knows the
//! class names the site uses for one panel:
//!
//! | Panel                | Container                                               |
//! |----------------------|---------------------------------------------------------|
//! | address autocomplete | `.ds-autocomplete-suggestions .autocomplete-suggestion` |
//! | building list        | `.ddiv-build-content`                                   |
//! | detail tabs          | `.mfs-agent-main-tab-div`                               |

use std::sync::LazyLock;

use propcrawl_shared::{Building, CrawlItem, MISSING_VALUE, ResolvedAddress};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e}"))
}

pub(crate) static SUGGESTION_PANEL: LazyLock<Selector> =
    LazyLock::new(|| selector(".ds-autocomplete-suggestions"));
static SUGGESTION: LazyLock<Selector> =
    LazyLock::new(|| selector(".ds-autocomplete-suggestions .autocomplete-suggestion"));
static SUB_VALUE: LazyLock<Selector> = LazyLock::new(|| selector(".sub-value"));

static BUILDING: LazyLock<Selector> = LazyLock::new(|| selector(".ddiv-build-content"));
static BUILDING_TOP: LazyLock<Selector> = LazyLock::new(|| selector(".ddiv-build-content-top"));
static BUILDING_BOTTOM: LazyLock<Selector> =
    LazyLock::new(|| selector(".ddiv-build-content-bottom"));
static BUILDING_TITLE: LazyLock<Selector> =
    LazyLock::new(|| selector(".ddiv-build-content-title"));

pub(crate) static DETAIL_TAB: LazyLock<Selector> =
    LazyLock::new(|| selector(".mfs-agent-main-tab-div"));
static TAB_TEXT: LazyLock<Selector> = LazyLock::new(|| selector(".ifs-tab-txt"));
static TAB_VALUE: LazyLock<Selector> = LazyLock::new(|| selector(".ifs-tab-txt.rfc-dusk"));
static VALUE_SPAN_WITH_ID: LazyLock<Selector> = LazyLock::new(|| selector("span[id]"));
static VALUE_SPAN: LazyLock<Selector> = LazyLock::new(|| selector("span"));

/// Whitespace-collapsed text content of an element.
fn text_of(el: ElementRef<'_>) -> String {
    collapse(&el.text().collect::<String>())
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text(el: ElementRef<'_>, sel: &Selector) -> Option<String> {
    el.select(sel).next().map(text_of)
}

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

/// Parse the address autocomplete panel.
///
/// Returns `None` when the panel has not been rendered. Each suggestion's
/// locator is its `data-index` attribute, falling back to its position.
pub fn parse_addresses(doc: &Html) -> Option<Vec<ResolvedAddress>> {
    doc.select(&SUGGESTION_PANEL).next()?;

    let addresses = doc
        .select(&SUGGESTION)
        .enumerate()
        .filter_map(|(idx, el)| {
            let locator = el
                .value()
                .attr("data-index")
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map_or_else(|| idx.to_string(), str::to_string);

            let full = text_of(el);
            let label = match first_text(el, &SUB_VALUE).filter(|s| !s.is_empty()) {
                Some(sub) => format!("{} / {sub}", collapse(&full.replace(&sub, ""))),
                None => full,
            };

            if label.is_empty() {
                warn!(%locator, "skipping suggestion without text");
                return None;
            }
            Some(ResolvedAddress::new(label, locator))
        })
        .collect::<Vec<_>>();

    debug!(count = addresses.len(), "parsed address suggestions");
    Some(addresses)
}

// ---------------------------------------------------------------------------
// Buildings
// ---------------------------------------------------------------------------

/// Parse the building list shown for the address at `address_locator`.
///
/// Labels read `top(bottom)`, with ` [title]` appended when the card has a
/// title. Locators are `<address locator>/<position>`.
pub fn parse_buildings(doc: &Html, address_locator: &str) -> Vec<Building> {
    doc.select(&BUILDING)
        .enumerate()
        .filter_map(|(idx, el)| {
            let top = first_text(el, &BUILDING_TOP);
            let bottom = first_text(el, &BUILDING_BOTTOM);
            let (Some(top), Some(bottom)) = (top, bottom) else {
                warn!(position = idx, "skipping building card without top/bottom text");
                return None;
            };

            let mut label = format!("{top}({bottom})");
            if let Some(title) = first_text(el, &BUILDING_TITLE).filter(|t| !t.is_empty()) {
                label.push_str(&format!(" [{title}]"));
            }
            Some(Building::new(label, format!("{address_locator}/{idx}")))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Details
// ---------------------------------------------------------------------------

/// Parse the detail tabs of an opened building.
///
/// Returns `None` when no tab has been rendered. Tabs without a title are
/// dropped; tabs without a value report [`MISSING_VALUE`].
pub fn parse_details(doc: &Html) -> Option<Vec<CrawlItem>> {
    let mut tabs = doc.select(&DETAIL_TAB).peekable();
    tabs.peek()?;

    let items = tabs
        .filter_map(|tab| {
            let title = first_text(tab, &TAB_TEXT).unwrap_or_default();
            if title.is_empty() {
                return None;
            }

            let content = detail_value(tab).unwrap_or_else(|| {
                warn!(%title, "detail tab has no value");
                MISSING_VALUE.to_string()
            });
            Some(CrawlItem::new(title, content))
        })
        .collect();
    Some(items)
}

/// Value cell of a tab: the `.rfc-dusk` cell, else the second text cell.
fn detail_value(tab: ElementRef<'_>) -> Option<String> {
    let cell = tab
        .select(&TAB_VALUE)
        .next()
        .or_else(|| tab.select(&TAB_TEXT).nth(1))?;

    cell.select(&VALUE_SPAN_WITH_ID)
        .next()
        .or_else(|| cell.select(&VALUE_SPAN).next())
        .map(text_of)
        .filter(|v| !v.is_empty())
}
