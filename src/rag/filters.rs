//! Fail-open predicate passes used by hybrid retrieval.
//!
//! A document is kept only if it passes every applicable check, but an
//! empty filter value always passes, and missing document data passes the
//! salary check (absence of evidence never excludes). Matching is
//! substring-based over normalized text; short filter strings can
//! false-positive inside unrelated words, which is an accepted precision
//! limitation.

use crate::jobs::types::SectionType;
use crate::rag::types::{QueryFilters, RetrievableDocument};

/// Lowercase and collapse whitespace for substring matching
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Location check: any filter location appearing in the document's
/// location list or its content text passes.
pub fn location_pass(doc: &RetrievableDocument, filter_locations: &[String]) -> bool {
    if filter_locations.is_empty() {
        return true;
    }

    let meta_locations = normalize_text(&doc.metadata.locations.join(" "));
    let content = normalize_text(&doc.content);

    filter_locations.iter().any(|location| {
        let needle = normalize_text(location);
        !needle.is_empty() && (meta_locations.contains(&needle) || content.contains(&needle))
    })
}

/// Salary check: pass when the document's advertised interval overlaps
/// the filter interval. A document with no salary data passes, and a
/// missing bound on either side is treated as unbounded.
pub fn salary_pass(
    doc: &RetrievableDocument,
    filter_min: Option<i64>,
    filter_max: Option<i64>,
) -> bool {
    if filter_min.is_none() && filter_max.is_none() {
        return true;
    }

    let salary = &doc.metadata.salary;
    if salary.min.is_none() && salary.max.is_none() {
        return true;
    }

    let low = salary.min.or(salary.max);
    let high = salary.max.or(salary.min);

    if let (Some(f_min), Some(high)) = (filter_min, high) {
        if high < f_min {
            return false;
        }
    }
    if let (Some(f_max), Some(low)) = (filter_max, low) {
        if low > f_max {
            return false;
        }
    }

    true
}

/// Skill check: any filter skill appearing in the description or
/// requirements sections, or in the content text, passes.
pub fn skills_pass(doc: &RetrievableDocument, filter_skills: &[String]) -> bool {
    if filter_skills.is_empty() {
        return true;
    }

    let description = doc
        .metadata
        .section_text(&SectionType::Description)
        .unwrap_or("");
    let requirements = doc
        .metadata
        .section_text(&SectionType::Requirements)
        .unwrap_or("");
    let haystack = normalize_text(&format!(
        "{} {} {}",
        description, requirements, doc.content
    ));

    filter_skills.iter().any(|skill| {
        let needle = normalize_text(skill);
        !needle.is_empty() && haystack.contains(&needle)
    })
}

/// Keyword check: any keyword appearing in the title, company name, or
/// content text passes.
pub fn keyword_pass(doc: &RetrievableDocument, filter_keywords: &[String]) -> bool {
    if filter_keywords.is_empty() {
        return true;
    }

    let haystack = normalize_text(&format!(
        "{} {} {}",
        doc.metadata.title,
        doc.metadata.company.name.as_deref().unwrap_or(""),
        doc.content
    ));

    filter_keywords.iter().any(|keyword| {
        let needle = normalize_text(keyword);
        !needle.is_empty() && haystack.contains(&needle)
    })
}

/// Conjunction of all applicable passes
pub fn passes_filters(doc: &RetrievableDocument, filters: &QueryFilters) -> bool {
    location_pass(doc, &filters.locations)
        && salary_pass(doc, filters.min_salary, filters.max_salary)
        && skills_pass(doc, &filters.skills)
        && keyword_pass(doc, &filters.job_keywords)
}
