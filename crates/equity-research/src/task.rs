//! Research task definition
//!
//! One [`ResearchTaskSpec`] per run: the analyst persona, the ticker-bound
//! goal, the eight required report sections and the execution bounds.

use crate::config::ExecutionBounds;
use minijinja::{Environment, context};
use serde::Serialize;
use thiserror::Error;

pub const ROLE: &str = "Financial Research Specialist";

pub const BACKSTORY: &str = "You are an experienced financial researcher with a knack for \
finding the most relevant information about companies. You know how to \
filter through news and data to identify key developments.";

pub const EXPECTED_OUTPUT: &str = "A comprehensive research report on the company";

const GOAL_TEMPLATE: &str = "Gather comprehensive information about {{ ticker }} for investors";

const DESCRIPTION_TEMPLATE: &str = "\
Research the company {{ ticker }} and gather the following information:
{% for section in sections %}{{ loop.index }}. {{ section }}
{% endfor %}
Be thorough but concise. Focus on information relevant to investors.
Cite your sources where appropriate.

Organize your findings in clear sections with proper headings.

End with a brief summary of key investment considerations.";

const SYSTEM_TEMPLATE: &str = "\
You are a {{ role }}. {{ backstory }}
Your personal goal is: {{ goal }}
You have a limited number of research steps. Use the web_search tool to gather \
facts, then write the report in markdown.";

const USER_TEMPLATE: &str = "\
{{ description }}

This is the expected criteria for your final answer: {{ expected_output }}
You MUST return the actual complete content as the final answer, not a summary.";

/// A coverage area every report must address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ReportSection {
    CompanyOverview,
    RecentNews,
    Competitors,
    ProductsServices,
    StrategicInitiatives,
    FinancialPerformance,
    MarketTrends,
    StrengthsRisks,
}

impl ReportSection {
    /// All required sections, in the order they are requested
    pub const ALL: [Self; 8] = [
        Self::CompanyOverview,
        Self::RecentNews,
        Self::Competitors,
        Self::ProductsServices,
        Self::StrategicInitiatives,
        Self::FinancialPerformance,
        Self::MarketTrends,
        Self::StrengthsRisks,
    ];

    /// Line used in the task description
    pub fn requirement(self) -> &'static str {
        match self {
            Self::CompanyOverview => "Company overview and main business areas",
            Self::RecentNews => "Recent news and developments (last 3 months)",
            Self::Competitors => "Key competitors and market position",
            Self::ProductsServices => "Major products or services",
            Self::StrategicInitiatives => "Recent strategic initiatives",
            Self::FinancialPerformance => "Financial performance overview",
            Self::MarketTrends => "Market trends affecting the company",
            Self::StrengthsRisks => "Analysis of strengths and potential risks",
        }
    }

    /// Short heading-style name
    pub fn title(self) -> &'static str {
        match self {
            Self::CompanyOverview => "Company Overview",
            Self::RecentNews => "Recent News",
            Self::Competitors => "Competitors and Market Position",
            Self::ProductsServices => "Products and Services",
            Self::StrategicInitiatives => "Strategic Initiatives",
            Self::FinancialPerformance => "Financial Performance",
            Self::MarketTrends => "Market Trends",
            Self::StrengthsRisks => "Strengths and Risks",
        }
    }

    /// Lowercase words that identify a heading for this section
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::CompanyOverview => &["overview", "business area", "company profile", "business description"],
            Self::RecentNews => &["news", "recent development", "developments"],
            Self::Competitors => &["competitor", "competition", "competitive", "market position"],
            Self::ProductsServices => &["product", "service", "offering"],
            Self::StrategicInitiatives => &["strateg", "initiative"],
            Self::FinancialPerformance => &["financial", "earnings", "revenue"],
            Self::MarketTrends => &["trend", "industry outlook", "market environment"],
            Self::StrengthsRisks => &["strength", "risk", "swot", "weakness"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("Ticker symbol is empty")]
    EmptyTicker,

    #[error("Failed to render task template: {0}")]
    Template(String),
}

impl From<minijinja::Error> for TaskError {
    fn from(err: minijinja::Error) -> Self {
        Self::Template(err.to_string())
    }
}

/// Immutable description of one research run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResearchTaskSpec {
    pub ticker: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub sections: Vec<ReportSection>,
    pub description: String,
    pub expected_output: String,
    #[serde(skip)]
    pub bounds: ExecutionBounds,
}

impl ResearchTaskSpec {
    /// Build the task for `ticker`
    pub fn build(ticker: &str, bounds: ExecutionBounds) -> Result<Self, TaskError> {
        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(TaskError::EmptyTicker);
        }

        let env = Environment::new();
        let goal = env.render_str(GOAL_TEMPLATE, context! { ticker => &ticker })?;
        let requirements: Vec<&str> = ReportSection::ALL.iter().map(|s| s.requirement()).collect();
        let description = env.render_str(
            DESCRIPTION_TEMPLATE,
            context! { ticker => &ticker, sections => requirements },
        )?;

        Ok(Self {
            ticker,
            role: ROLE.to_string(),
            goal,
            backstory: BACKSTORY.to_string(),
            sections: ReportSection::ALL.to_vec(),
            description,
            expected_output: EXPECTED_OUTPUT.to_string(),
            bounds,
        })
    }

    /// Persona prompt for the executing agent
    pub fn system_prompt(&self) -> Result<String, TaskError> {
        Ok(Environment::new().render_str(
            SYSTEM_TEMPLATE,
            context! { role => &self.role, backstory => &self.backstory, goal => &self.goal },
        )?)
    }

    /// Task message handed to the agent
    pub fn task_prompt(&self) -> Result<String, TaskError> {
        Ok(Environment::new().render_str(
            USER_TEMPLATE,
            context! { description => &self.description, expected_output => &self.expected_output },
        )?)
    }
}
