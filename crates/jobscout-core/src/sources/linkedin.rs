//! LinkedIn guest job search API.
//!
//! The guest API only honours the country-wide geo id, so searches always ask
//! for China and [`SourceParser::refine`] narrows to the requested city.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

use super::{Source, SourceParser, merge_detail};
use crate::extract::{
    MAX_TAGS, clean_text, extract_tags, normalize_location, parse_relative_date, regex,
};
use crate::models::JobRecord;

const BASE_URL: &str = "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search";
const CHINA_GEO_ID: &str = "102890883";
const PAGE_SIZE: u32 = 25;

/// Location when a listing names none.
const COUNTRY: &str = "China";

const DETAIL_HEADINGS: &[&str] = &["About the job", "Job description", "Description"];

/// Lines under a listing that are never its location.
const NON_LOCATION_MARKERS: &[&str] = &["ago", "applicant", "actively", "promoted", "benefit"];

const CITY_PATTERNS: &[&[&str]] = &[
    &["beijing", "北京"],
    &["shanghai", "上海"],
    &["shenzhen", "深圳"],
    &["guangzhou", "广州"],
];

static BLOCK_START: LazyLock<Regex> = LazyLock::new(|| regex(r"\n\*\s+\["));
static TITLE_LINK: LazyLock<Regex> = LazyLock::new(|| regex(r"^([^\]\[\n]*)\]\((https?://[^)\s]+)\)"));
static COMPANY: LazyLock<Regex> =
    LazyLock::new(|| regex(r"####\s+(?:\[([^\]]+)\]|([^\n\[]+))"));
static LOCATION_HINT: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"(?i)(china|中国|district|province|city|area|beijing|shanghai|shenzhen|guangzhou|北京|上海|深圳|广州)")
});

pub struct LinkedInParser;

impl LinkedInParser {
    fn parse_block(&self, block: &str) -> Option<JobRecord> {
        let Some(caps) = TITLE_LINK.captures(block) else {
            tracing::debug!("Dropping listing block without title link");
            return None;
        };
        let url = caps[2].to_string();
        if !url.contains("/jobs/view/") {
            return None;
        }
        let raw_title = caps[1].trim();
        let title = urlencoding::decode(raw_title)
            .map(|t| t.trim().to_string())
            .unwrap_or_else(|_| raw_title.to_string());
        if title.is_empty() {
            tracing::debug!(url = %url, "Dropping listing block without title");
            return None;
        }

        let body = &block[caps.get(0).map_or(0, |m| m.end())..];
        let mut job = JobRecord::new(title.as_str(), url, Source::LinkedIn.as_str());

        if let Some(company) = COMPANY
            .captures(body)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
        {
            job.company = company.as_str().trim().to_string();
        }
        job.location = normalize_location(find_location(body).unwrap_or(COUNTRY));
        job.posted_date = parse_relative_date(body, Utc::now());
        job.tags = extract_tags(&format!("{title} {}", clean_text(body)));
        job.tags.truncate(MAX_TAGS);
        Some(job)
    }
}

/// First plain line that names a place, or failing that the first plain line.
fn find_location(body: &str) -> Option<&str> {
    let candidates: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty()
                && !line.starts_with(['#', '[', '!', '*', '-'])
                && !line.contains("](")
                && line.chars().next().is_some_and(char::is_alphabetic)
        })
        .filter(|line| {
            let lower = line.to_lowercase();
            !NON_LOCATION_MARKERS.iter().any(|m| lower.contains(m))
        })
        .collect();

    candidates
        .iter()
        .find(|line| LOCATION_HINT.is_match(line))
        .or_else(|| candidates.first())
        .copied()
}

impl SourceParser for LinkedInParser {
    fn source(&self) -> Source {
        Source::LinkedIn
    }

    fn full_page_threshold(&self) -> usize {
        PAGE_SIZE as usize
    }

    fn build_search_url(&self, query: &str, _location: &str, page: u32) -> String {
        let start = (page.max(1) - 1) * PAGE_SIZE;
        format!(
            "{BASE_URL}?keywords={}&location={COUNTRY}&geoId={CHINA_GEO_ID}&start={start}",
            urlencoding::encode(query)
        )
    }

    fn parse_search_results(&self, text: &str) -> Vec<JobRecord> {
        let text = format!("\n{text}");
        BLOCK_START
            .split(&text)
            .skip(1)
            .filter_map(|block| self.parse_block(block))
            .collect()
    }

    fn parse_detail(&self, text: &str, job: JobRecord) -> JobRecord {
        merge_detail(text, job, DETAIL_HEADINGS)
    }

    /// Keep listings in the requested city. `China`, `中国` or an empty
    /// location keep everything.
    fn refine(&self, jobs: Vec<JobRecord>, location: &str) -> Vec<JobRecord> {
        let wanted = location.trim().to_lowercase();
        if wanted.is_empty() || wanted == "china" || wanted == "中国" {
            return jobs;
        }

        let patterns: Vec<&str> = CITY_PATTERNS
            .iter()
            .find(|aliases| aliases.iter().any(|a| wanted.contains(a)))
            .map(|aliases| aliases.to_vec())
            .unwrap_or_else(|| vec![wanted.as_str()]);

        jobs.into_iter()
            .filter(|job| {
                let here = job.location.to_lowercase();
                patterns.iter().any(|p| here.contains(p))
            })
            .collect()
    }
}
