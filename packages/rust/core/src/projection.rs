//! Projects a crawl result onto a saved list of field titles.

use propcrawl_shared::CrawlItem;

/// Shown in place of a field the crawl did not produce.
pub const FIELD_ABSENT: &str = "항목 없음";

/// One requested field and the value found for it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedField {
    pub title: String,
    pub content: Option<String>,
}

impl ProjectedField {
    pub fn display_content(&self) -> &str {
        self.content.as_deref().unwrap_or(FIELD_ABSENT)
    }
}

/// Pick the requested titles out of `items`, in request order.
///
/// Titles are compared exactly after trimming; the first matching item wins.
/// Blank titles are skipped.
pub fn project_fields<S: AsRef<str>>(items: &[CrawlItem], titles: &[S]) -> Vec<ProjectedField> {
    titles
        .iter()
        .map(|t| t.as_ref().trim())
        .filter(|t| !t.is_empty())
        .map(|title| ProjectedField {
            title: title.to_string(),
            content: items
                .iter()
                .find(|item| item.title == title)
                .map(|item| item.content.clone()),
        })
        .collect()
}
