//! Field extractors: stateless text normalization shared by every source parser.
//!
//! Every function here is total. A miss is `None` (or an empty list), never an error.

use std::sync::LazyLock;

use chrono::{DateTime, TimeDelta, Utc};
use regex::{Captures, Regex};

use crate::models::DEFAULT_LOCATION;

/// Parsers keep at most this many tags per record.
pub const MAX_TAGS: usize = 10;

/// Compile a built-in pattern. Only for literals known to be valid.
pub(crate) fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {pattern}: {e}"))
}

const NUM: &str = r"([0-9]+(?:\.[0-9]+)?)";
const SEP: &str = r"\s*[-~～至到]\s*";

static SALARY_WAN: LazyLock<Regex> =
    LazyLock::new(|| regex(&format!(r"(?i){NUM}\s*(万|w(?-u:\b))?{SEP}{NUM}\s*(万|w(?-u:\b))?")));
static SALARY_K: LazyLock<Regex> =
    LazyLock::new(|| regex(&format!(r"(?i){NUM}\s*(k(?-u:\b))?{SEP}{NUM}\s*(k(?-u:\b))?")));
static SALARY_YUAN: LazyLock<Regex> =
    LazyLock::new(|| regex(&format!(r"([0-9]{{4,6}}){SEP}([0-9]{{4,6}})")));

static EXP_RANGE_CN: LazyLock<Regex> = LazyLock::new(|| regex(r"([0-9]+)\s*[-~～至到]\s*([0-9]+)\s*年"));
static EXP_PLUS_CN: LazyLock<Regex> = LazyLock::new(|| regex(r"([0-9]+)\s*年以上"));
static EXP_RANGE_EN: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(?i)([0-9]+)\s*(?:[-~～]|to)\s*([0-9]+)\s*\+?\s*(?:years?|yrs?)\b"));
static EXP_PLUS_EN: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"(?i)(?:([0-9]+)\s*\+\s*(?:years?|yrs?)\b|(?:at least|minimum(?: of)?)\s+([0-9]+)\s*(?:years?|yrs?)\b)")
});

static EDUCATION: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"(?i)(学历不限|不限学历|博士|硕士|本科|大专|ph\.?\s?d\b|master'?s?\b|bachelor'?s?\b|associate degree)")
});

static RANGE_MIN: LazyLock<Regex> = LazyLock::new(|| regex(r"([0-9]+(?:\.[0-9]+)?)\s*[kK]?\s*[-~～至到]"));
static LEADING_NUM: LazyLock<Regex> = LazyLock::new(|| regex(r"^\s*([0-9]+(?:\.[0-9]+)?)"));
static YEARS_RANGE: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(?i)([0-9]+)\s*(?:[-~～至到]|to)\s*([0-9]+)"));
static YEARS_PLUS: LazyLock<Regex> = LazyLock::new(|| regex(r"([0-9]+)\s*(?:\+|年以上)"));
static ANY_NUM: LazyLock<Regex> = LazyLock::new(|| regex(r"([0-9]+)"));

static RELATIVE_EN: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(?i)([0-9]+)\s+(minute|hour|day|week|month)s?\s+ago"));
static RELATIVE_CN: LazyLock<Regex> = LazyLock::new(|| regex(r"([0-9]+)\s*(分钟|小时|天|周|个月)前"));

static MD_LINK: LazyLock<Regex> = LazyLock::new(|| regex(r"\[([^\]]+)\]\([^)]+\)"));
static MD_EMPHASIS: LazyLock<Regex> = LazyLock::new(|| regex(r"[*_]{1,2}([^*_]+)[*_]{1,2}"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| regex(r"\s+"));

// ---------------------------------------------------------------------------
// Salary
// ---------------------------------------------------------------------------

/// Extract a monthly salary range normalized to `"<low>k-<high>k"`.
///
/// Recognized notations, tried in order:
/// 1. ten-thousand units: `2-3万`, `2万-3.5万`, `1.5-3万·16薪`
/// 2. thousands: `20k-35k`, `20-35K`
/// 3. raw monthly yuan: `6000-9000元`
pub fn extract_salary(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }

    if let Some(caps) = first_with_unit(&SALARY_WAN, text) {
        return format_range(&caps[1], &caps[3], 10);
    }
    if let Some(caps) = first_with_unit(&SALARY_K, text) {
        return format_range(&caps[1], &caps[3], 1);
    }
    let caps = SALARY_YUAN.captures(text)?;
    let low: u32 = caps[1].parse().ok()?;
    let high: u32 = caps[2].parse().ok()?;
    Some(format!("{}k-{}k", low / 1000, high / 1000))
}

/// First match where at least one side of the range carries the unit.
fn first_with_unit<'t>(re: &Regex, text: &'t str) -> Option<Captures<'t>> {
    re.captures_iter(text)
        .find(|caps| caps.get(2).is_some() || caps.get(4).is_some())
}

fn format_range(low: &str, high: &str, factor: u32) -> Option<String> {
    let low = scale_truncated(low, factor)?;
    let high = scale_truncated(high, factor)?;
    Some(format!("{low}k-{high}k"))
}

/// `number * factor` truncated toward zero, computed on the decimal digits so
/// that `2.3 * 10` is exactly 23.
fn scale_truncated(number: &str, factor: u32) -> Option<u32> {
    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
    let mut value = int_part.parse::<u32>().ok()?.checked_mul(factor)?;
    let mut scale = factor;
    let mut digits = frac_part.chars();
    while scale >= 10 {
        scale /= 10;
        match digits.next().and_then(|c| c.to_digit(10)) {
            Some(d) => value = value.checked_add(d * scale)?,
            None => break,
        }
    }
    Some(value)
}

// ---------------------------------------------------------------------------
// Experience & education
// ---------------------------------------------------------------------------

const NO_EXPERIENCE_PHRASES: &[&str] = &[
    "经验不限",
    "不限经验",
    "无经验要求",
    "no experience",
    "entry level",
];

/// Extract a required-experience string: `"a-b years"`, `"a+ years"` or `"Entry Level"`.
pub fn extract_experience(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }

    let lower = text.to_lowercase();
    if NO_EXPERIENCE_PHRASES.iter().any(|p| lower.contains(p)) {
        return Some("Entry Level".to_string());
    }

    if let Some(caps) = EXP_RANGE_CN.captures(text) {
        return Some(format!("{}-{} years", &caps[1], &caps[2]));
    }
    if let Some(caps) = EXP_PLUS_CN.captures(text) {
        return Some(format!("{}+ years", &caps[1]));
    }
    if let Some(caps) = EXP_RANGE_EN.captures(text) {
        return Some(format!("{}-{} years", &caps[1], &caps[2]));
    }
    let caps = EXP_PLUS_EN.captures(text)?;
    let years = caps.get(1).or_else(|| caps.get(2))?.as_str();
    Some(format!("{years}+ years"))
}

/// Extract an education requirement in the normalized vocabulary
/// (`Bachelor`, `Master`, `PhD`, `Associate`, `Not Required`).
pub fn extract_education(text: &str) -> Option<String> {
    let found = EDUCATION.find(text)?.as_str().to_lowercase();
    let normalized = match found.as_str() {
        "学历不限" | "不限学历" => "Not Required",
        "博士" => "PhD",
        "硕士" => "Master",
        "本科" => "Bachelor",
        "大专" | "associate degree" => "Associate",
        s if s.starts_with("ph") => "PhD",
        s if s.starts_with("master") => "Master",
        _ => "Bachelor",
    };
    Some(normalized.to_string())
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

struct City {
    name: &'static str,
    aliases: &'static [&'static str],
    districts: &'static [(&'static str, &'static str)],
}

const CITIES: &[City] = &[
    City {
        name: "Beijing",
        aliases: &["北京", "beijing"],
        districts: &[
            ("海淀", "Haidian"),
            ("朝阳", "Chaoyang"),
            ("西城", "Xicheng"),
            ("东城", "Dongcheng"),
            ("丰台", "Fengtai"),
            ("石景山", "Shijingshan"),
            ("大兴", "Daxing"),
            ("通州", "Tongzhou"),
            ("昌平", "Changping"),
            ("顺义", "Shunyi"),
        ],
    },
    City {
        name: "Shanghai",
        aliases: &["上海", "shanghai"],
        districts: &[
            ("浦东", "Pudong"),
            ("徐汇", "Xuhui"),
            ("静安", "Jing'an"),
            ("闵行", "Minhang"),
            ("杨浦", "Yangpu"),
            ("长宁", "Changning"),
        ],
    },
    City {
        name: "Shenzhen",
        aliases: &["深圳", "shenzhen"],
        districts: &[
            ("南山", "Nanshan"),
            ("福田", "Futian"),
            ("宝安", "Bao'an"),
            ("龙岗", "Longgang"),
        ],
    },
    City {
        name: "Guangzhou",
        aliases: &["广州", "guangzhou"],
        districts: &[
            ("天河", "Tianhe"),
            ("海珠", "Haizhu"),
            ("番禺", "Panyu"),
            ("越秀", "Yuexiu"),
        ],
    },
];

/// Normalize free-text location to `"City, District"` or `"City"`.
///
/// Empty input means the default city. Unknown places are returned trimmed.
pub fn normalize_location(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return DEFAULT_LOCATION.to_string();
    }
    let lower = trimmed.to_lowercase();

    let district_of = |city: &City| {
        city.districts
            .iter()
            .find(|(cn, en)| trimmed.contains(cn) || lower.contains(&en.to_lowercase()))
            .map(|(_, en)| format!("{}, {}", city.name, en))
    };

    for city in CITIES {
        if city.aliases.iter().any(|a| lower.contains(a)) {
            return district_of(city).unwrap_or_else(|| city.name.to_string());
        }
    }

    for city in CITIES {
        if let Some((_, en)) = city.districts.iter().find(|(cn, _)| trimmed.contains(cn)) {
            return format!("{}, {}", city.name, en);
        }
    }

    trimmed.to_string()
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Technology vocabulary: `(keyword, canonical tag)`.
const TECH_KEYWORDS: &[(&str, &str)] = &[
    ("Python", "Python"),
    ("Java", "Java"),
    ("JavaScript", "JavaScript"),
    ("TypeScript", "TypeScript"),
    ("Golang", "Go"),
    ("Go", "Go"),
    ("Rust", "Rust"),
    ("C++", "C++"),
    ("C#", "C#"),
    ("Ruby", "Ruby"),
    ("PHP", "PHP"),
    ("Swift", "Swift"),
    ("Kotlin", "Kotlin"),
    ("Scala", "Scala"),
    ("React", "React"),
    ("Vue", "Vue"),
    ("Angular", "Angular"),
    ("Node.js", "Node.js"),
    ("Django", "Django"),
    ("Flask", "Flask"),
    ("FastAPI", "FastAPI"),
    ("SpringBoot", "Spring Boot"),
    ("Spring Boot", "Spring Boot"),
    ("Spring", "Spring"),
    ("Docker", "Docker"),
    ("Kubernetes", "Kubernetes"),
    ("K8s", "Kubernetes"),
    ("AWS", "AWS"),
    ("Azure", "Azure"),
    ("GCP", "GCP"),
    ("MySQL", "MySQL"),
    ("PostgreSQL", "PostgreSQL"),
    ("MongoDB", "MongoDB"),
    ("Redis", "Redis"),
    ("Oracle", "Oracle"),
    ("Elasticsearch", "Elasticsearch"),
    ("Kafka", "Kafka"),
    ("RabbitMQ", "RabbitMQ"),
    ("Hadoop", "Hadoop"),
    ("Spark", "Spark"),
    ("Flink", "Flink"),
    ("Linux", "Linux"),
    ("Git", "Git"),
    ("CI/CD", "CI/CD"),
    ("DevOps", "DevOps"),
    ("Microservices", "Microservices"),
    ("微服务", "Microservices"),
    ("REST", "REST"),
    ("GraphQL", "GraphQL"),
    ("gRPC", "gRPC"),
    ("Machine Learning", "Machine Learning"),
    ("机器学习", "Machine Learning"),
    ("Deep Learning", "Deep Learning"),
    ("深度学习", "Deep Learning"),
    ("ML", "ML"),
    ("AI", "AI"),
    ("人工智能", "AI"),
    ("TensorFlow", "TensorFlow"),
    ("PyTorch", "PyTorch"),
    ("NLP", "NLP"),
    ("Computer Vision", "Computer Vision"),
];

/// Keywords this short must stand alone in ASCII text (`Go` does not fire inside `Google`).
const SHORT_KEYWORD_LEN: usize = 3;

/// Extract technology tags, canonicalized and deduplicated, in order of first
/// appearance in the text. Callers truncate to [`MAX_TAGS`].
pub fn extract_tags(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let lower = text.to_lowercase();

    let mut hits: Vec<(usize, &str)> = TECH_KEYWORDS
        .iter()
        .filter_map(|(keyword, canonical)| {
            first_occurrence(&lower, &keyword.to_lowercase()).map(|pos| (pos, *canonical))
        })
        .collect();
    // Stable: ties keep vocabulary order.
    hits.sort_by_key(|(pos, _)| *pos);

    let mut tags: Vec<String> = Vec::new();
    for (_, canonical) in hits {
        if !tags.iter().any(|t| t.eq_ignore_ascii_case(canonical)) {
            tags.push(canonical.to_string());
        }
    }
    tags
}

fn first_occurrence(haystack: &str, keyword: &str) -> Option<usize> {
    let standalone = keyword.chars().count() <= SHORT_KEYWORD_LEN
        && keyword.chars().all(|c| c.is_ascii_alphanumeric());
    if !standalone {
        return haystack.find(keyword);
    }

    let bytes = haystack.as_bytes();
    haystack.match_indices(keyword).map(|(pos, _)| pos).find(|&pos| {
        let end = pos + keyword.len();
        let before_ok = pos == 0 || !bytes[pos - 1].is_ascii_alphanumeric();
        let after_ok = end >= bytes.len() || !bytes[end].is_ascii_alphanumeric();
        before_ok && after_ok
    })
}

/// Merge `extra` tags into `tags`, keeping order and the [`MAX_TAGS`] cap.
pub fn merge_tags(tags: &mut Vec<String>, extra: Vec<String>) {
    for tag in extra {
        if tags.len() >= MAX_TAGS {
            break;
        }
        if !tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
            tags.push(tag);
        }
    }
}

// ---------------------------------------------------------------------------
// Inverse parsers used by the filter engine
// ---------------------------------------------------------------------------

/// Minimum of a salary range, in thousands (`"20k-35k"` → 20).
pub fn parse_salary_min(salary_range: Option<&str>) -> Option<u32> {
    let salary_range = salary_range?;
    let caps = RANGE_MIN
        .captures(salary_range)
        .or_else(|| LEADING_NUM.captures(salary_range))?;
    scale_truncated(&caps[1], 1)
}

/// Parse an experience string into `(min, max)` years; `max` is `None` for open ranges.
///
/// Accepts normalized values (`"3-5 years"`, `"5+ years"`, `"Entry Level"`) as
/// well as query forms (`"3-5"`, `"5+"`).
pub fn parse_experience_range(text: Option<&str>) -> Option<(u32, Option<u32>)> {
    let text = text?.trim();
    if text.is_empty() {
        return None;
    }
    if text.to_lowercase().contains("entry") || text == "0" {
        return Some((0, Some(0)));
    }
    if let Some(caps) = YEARS_RANGE.captures(text) {
        return Some((caps[1].parse().ok()?, Some(caps[2].parse().ok()?)));
    }
    if let Some(caps) = YEARS_PLUS.captures(text) {
        return Some((caps[1].parse().ok()?, None));
    }
    let caps = ANY_NUM.captures(text)?;
    let years: u32 = caps[1].parse().ok()?;
    Some((years, Some(years)))
}

// ---------------------------------------------------------------------------
// Misc text helpers
// ---------------------------------------------------------------------------

/// Resolve phrases like `"3 days ago"` or `"2天前"` against `now`.
pub fn parse_relative_date(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (amount, unit) = if let Some(caps) = RELATIVE_EN.captures(text) {
        (caps[1].parse::<i64>().ok()?, caps[2].to_lowercase())
    } else {
        let caps = RELATIVE_CN.captures(text)?;
        let unit = match &caps[2] {
            "分钟" => "minute",
            "小时" => "hour",
            "天" => "day",
            "周" => "week",
            _ => "month",
        };
        (caps[1].parse::<i64>().ok()?, unit.to_string())
    };

    let delta = match unit.as_str() {
        "minute" => TimeDelta::try_minutes(amount)?,
        "hour" => TimeDelta::try_hours(amount)?,
        "day" => TimeDelta::try_days(amount)?,
        "week" => TimeDelta::try_weeks(amount)?,
        _ => TimeDelta::try_days(amount.checked_mul(30)?)?,
    };
    now.checked_sub_signed(delta)
}

/// Collapse whitespace and strip markdown links and emphasis.
pub fn clean_text(text: &str) -> String {
    let text = MD_LINK.replace_all(text, "$1");
    let text = MD_EMPHASIS.replace_all(&text, "$1");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}
