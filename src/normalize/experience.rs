use regex::Regex;
use std::sync::OnceLock;

/// Four ordered experience tiers every posting is mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Grade {
    Junior,
    JuniorPlus,
    Middle,
    Senior,
}

impl Grade {
    pub const ALL: [Grade; 4] = [Grade::Junior, Grade::JuniorPlus, Grade::Middle, Grade::Senior];

    pub fn label(&self) -> &'static str {
        match self {
            Grade::Junior => "Junior (no experience)",
            Grade::JuniorPlus => "Junior+ (1-3 years)",
            Grade::Middle => "Middle (3-6 years)",
            Grade::Senior => "Senior (6+ years)",
        }
    }
}

/// Map the source's experience-range text onto a grade. The four phrases the
/// source actually emits are matched directly; anything else falls back to
/// the first number in the text.
pub fn normalize_experience(text: &str) -> Grade {
    let lower = text.to_lowercase();

    if lower.contains("нет опыта") || lower.contains("no experience") {
        return Grade::Junior;
    }
    if lower.contains("от 1 года до 3") {
        return Grade::JuniorPlus;
    }
    if lower.contains("от 3 до 6") {
        return Grade::Middle;
    }
    if lower.contains("более 6") {
        return Grade::Senior;
    }

    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\d+").unwrap());
    match re
        .find(&lower)
        .and_then(|m| m.as_str().parse::<u32>().ok())
    {
        Some(0) | None => Grade::Junior,
        Some(1..=2) => Grade::JuniorPlus,
        Some(3..=5) => Grade::Middle,
        Some(_) => Grade::Senior,
    }
}
