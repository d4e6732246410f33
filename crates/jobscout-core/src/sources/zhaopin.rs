//! Zhaopin (智联招聘) search pages.

use std::sync::LazyLock;

use regex::Regex;

use super::{Source, SourceParser, merge_detail};
use crate::extract::{
    MAX_TAGS, clean_text, extract_education, extract_experience, extract_salary, extract_tags,
    normalize_location, regex,
};
use crate::models::JobRecord;

const BASE_URL: &str = "https://sou.zhaopin.com/";

/// Beijing, used when the requested city has no known code.
const DEFAULT_CITY_CODE: &str = "530";

const CITY_CODES: &[(&str, &str)] = &[
    ("beijing", "530"),
    ("北京", "530"),
    ("shanghai", "538"),
    ("上海", "538"),
    ("guangzhou", "763"),
    ("广州", "763"),
    ("shenzhen", "765"),
    ("深圳", "765"),
];

/// Link titles that point at site chrome rather than a listing.
const NAVIGATION_TITLES: &[&str] = &["首页", "职位推荐", "登录", "注册", "收藏", "投递"];

const DETAIL_HEADINGS: &[&str] = &["职位描述", "岗位职责", "任职要求"];

static JOB_LINK: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"\[([^\]]+)\]\((https?://(?:[a-z]+\.)?zhaopin\.com/jobdetail/[^)\s]+)\)")
});
static COMPANY_LINK: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"\[([^\]]+)\]\([^)]*companydetail[^)]*\)")
});
static CITY_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"(?:北京|上海|深圳|广州)(?:[·・\-][^\s·・|\-]+)*")
});

pub struct ZhaopinParser;

fn city_code(location: &str) -> &'static str {
    let lower = location.trim().to_lowercase();
    CITY_CODES
        .iter()
        .find(|(name, _)| lower == *name)
        .or_else(|| CITY_CODES.iter().find(|(name, _)| lower.contains(name)))
        .map_or(DEFAULT_CITY_CODE, |&(_, code)| code)
}

impl ZhaopinParser {
    fn parse_block(&self, title: &str, url: &str, block: &str) -> Option<JobRecord> {
        let title = title.trim();
        if title.is_empty() || url.trim().is_empty() {
            tracing::debug!(url, "Dropping listing block without title");
            return None;
        }

        let mut job = JobRecord::new(title, url, Source::Zhaopin.as_str());
        job.salary_range = extract_salary(block);
        job.experience = extract_experience(block);
        job.education = extract_education(block);
        if let Some(m) = CITY_TOKEN.find(block) {
            job.location = normalize_location(m.as_str());
        }
        if let Some(caps) = COMPANY_LINK.captures(block) {
            job.company = caps[1].trim().to_string();
        }
        job.tags = extract_tags(&format!("{title} {}", clean_text(block)));
        job.tags.truncate(MAX_TAGS);
        Some(job)
    }
}

impl SourceParser for ZhaopinParser {
    fn source(&self) -> Source {
        Source::Zhaopin
    }

    fn full_page_threshold(&self) -> usize {
        15
    }

    /// `jl` city code, `kw` keyword, `p` page, `kt=3` title search.
    fn build_search_url(&self, query: &str, location: &str, page: u32) -> String {
        format!(
            "{BASE_URL}?jl={}&kw={}&p={}&kt=3",
            city_code(location),
            urlencoding::encode(query),
            page.max(1)
        )
    }

    fn parse_search_results(&self, text: &str) -> Vec<JobRecord> {
        let links: Vec<_> = JOB_LINK.captures_iter(text).collect();
        let mut jobs = Vec::with_capacity(links.len());

        for (i, caps) in links.iter().enumerate() {
            let (Some(whole), Some(title), Some(url)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            if NAVIGATION_TITLES.iter().any(|nav| title.as_str().contains(nav)) {
                continue;
            }

            let end = links
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(text.len(), |m| m.start());
            let block = &text[whole.end()..end];

            if let Some(job) = self.parse_block(title.as_str(), url.as_str(), block) {
                jobs.push(job);
            }
        }
        jobs
    }

    fn parse_detail(&self, text: &str, job: JobRecord) -> JobRecord {
        merge_detail(text, job, DETAIL_HEADINGS)
    }
}
