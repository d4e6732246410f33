//! Pure record filtering and sorting.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::extract::{parse_experience_range, parse_salary_min};
use crate::models::JobRecord;

/// Optional narrowing applied after a search or listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Comma-separated technology tags; any one matching is enough.
    pub tech: Option<String>,
    /// Minimum monthly salary in thousands.
    pub salary_min: Option<u32>,
    /// `"a-b"` or `"a+"` years.
    pub experience: Option<String>,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        self.tech.is_none() && self.salary_min.is_none() && self.experience.is_none()
    }
}

/// Apply tech, then salary, then experience filtering.
pub fn filter_jobs(jobs: Vec<JobRecord>, criteria: &FilterCriteria) -> Vec<JobRecord> {
    let techs: Vec<String> = criteria
        .tech
        .as_deref()
        .map(|t| {
            t.split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();
    let wanted_experience = parse_experience_range(criteria.experience.as_deref());

    jobs.into_iter()
        .filter(|job| techs.is_empty() || matches_tech(job, &techs))
        .filter(|job| {
            criteria
                .salary_min
                .is_none_or(|min| parse_salary_min(job.salary_range.as_deref()).is_some_and(|s| s >= min))
        })
        .filter(|job| match wanted_experience {
            None => true,
            Some(wanted) => experience_overlaps(wanted, parse_experience_range(job.experience.as_deref())),
        })
        .collect()
}

fn matches_tech(job: &JobRecord, techs: &[String]) -> bool {
    let title = job.title.to_lowercase();
    let description = job.description.as_deref().unwrap_or_default().to_lowercase();
    techs.iter().any(|tech| {
        job.tags.iter().any(|tag| tag.to_lowercase() == *tech)
            || title.contains(tech.as_str())
            || description.contains(tech.as_str())
    })
}

/// Year-range compatibility. `None` max means open-ended; a record without a
/// parsable range is treated as eligible.
pub fn experience_overlaps(
    (req_min, req_max): (u32, Option<u32>),
    job: Option<(u32, Option<u32>)>,
) -> bool {
    let Some((job_min, job_max)) = job else {
        return true;
    };
    match (req_max, job_max) {
        (None, None) => true,
        (None, Some(job_max)) => job_max >= req_min,
        (Some(req_max), None) => req_max >= job_min,
        (Some(req_max), Some(job_max)) => job_min <= req_max && job_max >= req_min,
    }
}

/// Ordering for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    /// Newest fetch first.
    #[default]
    Date,
    /// Highest minimum salary first, unspecified last.
    Salary,
    /// Company name, case-insensitive.
    Company,
}

impl FromStr for SortKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "date" => Ok(SortKey::Date),
            "salary" => Ok(SortKey::Salary),
            "company" => Ok(SortKey::Company),
            other => Err(AppError::Generic(format!(
                "Unknown sort key '{other}'. Expected one of: date, salary, company"
            ))),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortKey::Date => "date",
            SortKey::Salary => "salary",
            SortKey::Company => "company",
        })
    }
}

pub fn sort_jobs(jobs: &mut [JobRecord], key: SortKey) {
    match key {
        SortKey::Date => jobs.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at)),
        SortKey::Salary => jobs.sort_by(|a, b| {
            let a = parse_salary_min(a.salary_range.as_deref());
            let b = parse_salary_min(b.salary_range.as_deref());
            match (a, b) {
                (Some(a), Some(b)) => b.cmp(&a),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }),
        SortKey::Company => {
            jobs.sort_by_cached_key(|j| j.company.to_lowercase());
        }
    }
}
