//! Advisory check of which required sections a report covers
//!
//! The report text is never modified. Only markdown headings are scanned,
//! so an unstructured report simply shows every section as missing.

use crate::task::ReportSection;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

const SUMMARY_KEYWORDS: &[&str] = &[
    "summary",
    "conclusion",
    "investment consideration",
    "key takeaway",
    "bottom line",
];

static ATX_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(#{1,6})[ \t]+(.+?)[ \t#]*$").expect("valid ATX heading pattern")
});

static BOLD_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*(?:\d+\.[ \t]*)?\*\*(.+?)\*\*:?[ \t]*$").expect("valid bold heading pattern")
});

struct Heading {
    /// `#` count for ATX headings, `None` for bold lines
    level: Option<usize>,
    text: String,
}

impl Heading {
    fn parse(line: &str) -> Option<Self> {
        if let Some(cap) = ATX_HEADING.captures(line) {
            return Some(Self {
                level: Some(cap[1].len()),
                text: cap[2].to_lowercase(),
            });
        }
        BOLD_HEADING.captures(line).map(|cap| Self {
            level: None,
            text: cap[1].to_lowercase(),
        })
    }

    fn mentions(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.text.contains(k))
    }

    fn is_summary(&self) -> bool {
        self.mentions(SUMMARY_KEYWORDS)
    }

    fn names_section(&self) -> bool {
        ReportSection::ALL.iter().any(|s| self.mentions(s.keywords()))
    }
}

/// Sections found in a report's headings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionCoverage {
    pub present: Vec<ReportSection>,
    pub missing: Vec<ReportSection>,
    /// A summary / investment considerations heading follows the last section
    pub has_summary: bool,
    /// Number of headings found, title included
    pub headings: usize,
}

impl SectionCoverage {
    /// Scan `report` for headings naming each required section
    ///
    /// ATX headings (`## Title`) and lines made only of bold text
    /// (`**Title**`) both count as headings. A leading `#` title is not
    /// matched against sections when deeper headings follow it.
    pub fn inspect(report: &str) -> Self {
        let headings: Vec<Heading> = report
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter_map(Heading::parse)
            .collect();

        let has_title = headings.first().is_some_and(|h| h.level == Some(1))
            && headings.iter().skip(1).any(|h| h.level != Some(1));
        let body = &headings[usize::from(has_title)..];

        let (present, missing): (Vec<_>, Vec<_>) = ReportSection::ALL
            .iter()
            .copied()
            .partition(|section| body.iter().any(|h| h.mentions(section.keywords())));

        // Only a summary placed after every section heading closes the report
        let last_section = body
            .iter()
            .rposition(|h| !h.is_summary() && h.names_section());
        let has_summary = body
            .iter()
            .enumerate()
            .any(|(i, h)| h.is_summary() && Some(i) > last_section);

        Self {
            present,
            missing,
            has_summary,
            headings: headings.len(),
        }
    }

    /// Every section plus the closing summary is present
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.has_summary
    }

    /// Whether the report had any headings to inspect
    pub fn is_structured(&self) -> bool {
        self.headings > 0
    }
}
