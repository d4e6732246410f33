//! Per-platform source parsers and the [`Scraper`] that drives them.
//!
//! A platform is a [`SourceParser`]: it knows how to build a search URL and how
//! to turn the returned page text into [`JobRecord`]s. Fetching, error capture
//! and the `has_more` hint live in [`Scraper`] so every platform behaves the same.

pub mod linkedin;
pub mod zhaopin;

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::extract::{
    MAX_TAGS, clean_text, extract_education, extract_experience, extract_salary, extract_tags,
    merge_tags, regex,
};
use crate::models::{JobRecord, ScraperOutcome};
use crate::traits::{Capability, ToolClient};

pub use linkedin::LinkedInParser;
pub use zhaopin::ZhaopinParser;

/// The closed set of supported listing platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Zhaopin,
    LinkedIn,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Zhaopin, Source::LinkedIn];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Zhaopin => "zhaopin",
            Source::LinkedIn => "linkedin",
        }
    }

    pub fn parser(&self) -> &'static dyn SourceParser {
        match self {
            Source::Zhaopin => &ZhaopinParser,
            Source::LinkedIn => &LinkedInParser,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zhaopin" => Ok(Source::Zhaopin),
            "linkedin" => Ok(Source::LinkedIn),
            other => Err(AppError::Generic(format!(
                "Unknown source '{other}'. Expected one of: zhaopin, linkedin"
            ))),
        }
    }
}

/// Platform-specific knowledge: URL shape, page layout, detail layout.
pub trait SourceParser: Send + Sync {
    fn source(&self) -> Source;

    /// Record count of a typical full result page. A page at least this full
    /// suggests another page exists; it is a hint, not a pagination signal.
    fn full_page_threshold(&self) -> usize;

    fn build_search_url(&self, query: &str, location: &str, page: u32) -> String;

    /// Split page text into listing blocks and parse each one. Blocks without
    /// a title and URL are dropped.
    fn parse_search_results(&self, text: &str) -> Vec<JobRecord>;

    /// Merge a detail page into an existing record.
    fn parse_detail(&self, text: &str, job: JobRecord) -> JobRecord;

    /// Post-parse narrowing by the requested location.
    fn refine(&self, jobs: Vec<JobRecord>, _location: &str) -> Vec<JobRecord> {
        jobs
    }
}

/// Runs one platform's search through a [`ToolClient`].
pub struct Scraper<'a, C> {
    parser: &'static dyn SourceParser,
    client: &'a C,
}

impl<'a, C: ToolClient> Scraper<'a, C> {
    pub fn new(source: Source, client: &'a C) -> Self {
        Self {
            parser: source.parser(),
            client,
        }
    }

    pub fn source(&self) -> Source {
        self.parser.source()
    }

    /// Fetch and parse one result page.
    ///
    /// Never fails: a remote error comes back as an outcome with no jobs and
    /// `error` set, so one platform cannot abort a multi-platform search.
    pub async fn search(&self, query: &str, location: &str, page: u32) -> ScraperOutcome {
        let page = page.max(1);
        let source = self.parser.source();
        let url = self.parser.build_search_url(query, location, page);
        tracing::info!(source = %source, page, "Searching {}", url);

        match self.client.invoke(&Capability::scrape(&url)).await {
            Ok(text) => {
                let jobs = self.parser.parse_search_results(&text);
                let parsed = jobs.len();
                let has_more = parsed >= self.parser.full_page_threshold();
                let jobs = self.parser.refine(jobs, location);
                tracing::info!(
                    source = %source,
                    parsed,
                    kept = jobs.len(),
                    has_more,
                    "Parsed search results"
                );
                ScraperOutcome::success(source.as_str(), page, jobs, has_more)
            }
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "Search failed");
                ScraperOutcome::failure(source.as_str(), page, e.to_string())
            }
        }
    }

    /// Fetch a listing's detail page and merge it into the record.
    pub async fn fetch_detail(&self, job: JobRecord) -> Result<JobRecord, AppError> {
        tracing::info!(source = %self.parser.source(), id = %job.id, "Fetching detail page");
        let text = self.client.invoke(&Capability::scrape(&job.url)).await?;
        Ok(self.parser.parse_detail(&text, job))
    }
}

// ---------------------------------------------------------------------------
// Shared detail-page helpers
// ---------------------------------------------------------------------------

/// Cap on a stored description.
const MAX_DESCRIPTION_CHARS: usize = 5000;

static BULLET: LazyLock<Regex> = LazyLock::new(|| regex(r"^\s*(?:[-*•·]|[0-9]{1,2}\s*[.、)）])\s*(.+)$"));

/// Text of the first section introduced by one of `headings`, up to the next
/// markdown heading.
pub(crate) fn section_after(text: &str, headings: &[&str]) -> Option<String> {
    let start = headings.iter().filter_map(|h| text.find(h)).min()?;
    let rest = &text[start..];
    let body_start = rest.find('\n').map_or(rest.len(), |i| i + 1);

    let mut lines = Vec::new();
    for line in rest[body_start..].lines() {
        if line.trim_start().starts_with('#') && !lines.is_empty() {
            break;
        }
        lines.push(line);
    }
    let section = lines.join("\n").trim().to_string();
    (!section.is_empty()).then_some(section)
}

/// Bullet or numbered lines of a section, cleaned.
pub(crate) fn bullet_lines(section: &str) -> Vec<String> {
    section
        .lines()
        .filter_map(|line| BULLET.captures(line))
        .map(|caps| clean_text(&caps[1]))
        .filter(|line| !line.is_empty())
        .collect()
}

/// Merge a detail page into `job`: description and requirements from the first
/// matching section, plus any field the search page did not carry.
pub(crate) fn merge_detail(text: &str, mut job: JobRecord, headings: &[&str]) -> JobRecord {
    if let Some(section) = section_after(text, headings) {
        let requirements = bullet_lines(&section);
        if !requirements.is_empty() {
            job.requirements = requirements;
        }
        let description: String = clean_text(&section)
            .chars()
            .take(MAX_DESCRIPTION_CHARS)
            .collect();
        job.description = Some(description);
    }

    if job.salary_range.is_none() {
        job.salary_range = extract_salary(text);
    }
    if job.experience.is_none() {
        job.experience = extract_experience(text);
    }
    if job.education.is_none() {
        job.education = extract_education(text);
    }

    let source_text = job.description.as_deref().unwrap_or(text);
    merge_tags(&mut job.tags, extract_tags(source_text));
    job.tags.truncate(MAX_TAGS);
    job
}
