// Copyright 2026 Muvon Un Limited
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Descriptive sections of a job posting. The set of labels the crawler
/// emits is fixed but postings occasionally carry keys outside it, which
/// round-trip through `Unknown` instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SectionType {
    Description,
    Requirements,
    Income,
    Benefits,
    WorkLocation,
    Perks,
    OtherInfo,
    Unknown(String),
}

impl SectionType {
    pub fn as_key(&self) -> &str {
        match self {
            SectionType::Description => "description",
            SectionType::Requirements => "requirements",
            SectionType::Income => "income",
            SectionType::Benefits => "benefits",
            SectionType::WorkLocation => "work_location",
            SectionType::Perks => "perks",
            SectionType::OtherInfo => "other_info",
            SectionType::Unknown(key) => key,
        }
    }

    /// Human-readable label used in document content and CLI output
    pub fn label(&self) -> String {
        match self {
            SectionType::Description => "Job description".to_string(),
            SectionType::Requirements => "Candidate requirements".to_string(),
            SectionType::Income => "Income".to_string(),
            SectionType::Benefits => "Benefits".to_string(),
            SectionType::WorkLocation => "Work location".to_string(),
            SectionType::Perks => "Perks".to_string(),
            SectionType::OtherInfo => "Other information".to_string(),
            SectionType::Unknown(key) => title_case(key),
        }
    }

    /// Display ordering: known sections in enumeration order, unknowns last
    pub fn order_index(&self) -> usize {
        match self {
            SectionType::Description => 0,
            SectionType::Requirements => 1,
            SectionType::Income => 2,
            SectionType::Benefits => 3,
            SectionType::WorkLocation => 4,
            SectionType::Perks => 5,
            SectionType::OtherInfo => 6,
            SectionType::Unknown(_) => 7,
        }
    }
}

impl From<String> for SectionType {
    fn from(key: String) -> Self {
        match key.as_str() {
            "description" => SectionType::Description,
            "requirements" => SectionType::Requirements,
            "income" => SectionType::Income,
            "benefits" => SectionType::Benefits,
            "work_location" => SectionType::WorkLocation,
            "perks" => SectionType::Perks,
            "other_info" => SectionType::OtherInfo,
            _ => SectionType::Unknown(key),
        }
    }
}

impl From<SectionType> for String {
    fn from(section: SectionType) -> Self {
        section.as_key().to_string()
    }
}

fn title_case(key: &str) -> String {
    key.split(['_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// One descriptive section of a posting, as extracted by the crawler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionContent {
    pub section_type: SectionType,
    pub text: String,
}

/// Salary payout interval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SalaryInterval {
    #[default]
    Month,
    Year,
    Hour,
}

impl SalaryInterval {
    fn suffix(&self) -> &'static str {
        match self {
            SalaryInterval::Month => "/month",
            SalaryInterval::Year => "/year",
            SalaryInterval::Hour => "/hour",
        }
    }
}

/// Salary as advertised; bounds are absolute amounts in `currency`.
/// Every field is optional because many postings only carry free text
/// ("Thoả thuận") or nothing at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Salary {
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub currency: Option<String>,
    pub interval: Option<SalaryInterval>,
    pub raw_text: Option<String>,
}

impl Salary {
    /// Salary line for document content; None when the posting has no
    /// salary information at all (the line is omitted, not printed empty).
    pub fn format_line(&self) -> Option<String> {
        if let Some(raw) = &self.raw_text {
            return Some(format!("Salary: {}", raw));
        }

        let currency = self.currency.as_deref().unwrap_or("VND");
        let suffix = self.interval.unwrap_or_default().suffix();

        match (self.min, self.max) {
            (Some(min), Some(max)) => Some(format!(
                "Salary: {} - {} {} {}",
                group_thousands(min),
                group_thousands(max),
                currency,
                suffix
            )),
            (Some(min), None) => Some(format!(
                "Salary: from {} {} {}",
                group_thousands(min),
                currency,
                suffix
            )),
            (None, Some(max)) => Some(format!(
                "Salary: up to {} {} {}",
                group_thousands(max),
                currency,
                suffix
            )),
            (None, None) => None,
        }
    }

    /// Short salary text for context bundles and job cards
    pub fn format_text(&self) -> String {
        match self.format_line() {
            Some(line) => line.trim_start_matches("Salary: ").to_string(),
            None => "Negotiable".to_string(),
        }
    }
}

fn group_thousands(value: i64) -> String {
    let digits = value.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Experience requirement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Experience {
    pub months: Option<i32>,
    pub raw_text: Option<String>,
}

/// Hiring company info
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Company {
    pub name: Option<String>,
    pub url: Option<String>,
    pub size: Option<String>,
    pub industry: Option<String>,
    pub address: Option<String>,
}

/// Categorical posting attributes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralInfo {
    pub seniority: Option<String>,
    pub education: Option<String>,
    pub headcount: Option<String>,
    pub work_arrangement: Option<String>,
}

/// A raw job posting as produced by the crawler. Read-only to the
/// retrieval core; `id` is stable and unique across re-crawls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub salary: Salary,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub sections: Vec<SectionContent>,
    #[serde(default)]
    pub experience: Experience,
    #[serde(default)]
    pub company: Company,
    #[serde(default)]
    pub general: GeneralInfo,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub crawled_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// A job is active while it has no expiry or the expiry is in the future
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            None => true,
            Some(expiry) => expiry >= now,
        }
    }
}
