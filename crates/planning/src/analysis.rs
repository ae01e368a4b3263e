/// Query analysis: intent, entities, complexity, and urgency from raw text.
use serde::{Deserialize, Serialize};

/// What the query wants done. Rule precedence is fixed: navigation wins over
/// analysis, analysis wins over plain lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Navigate,
    Analyze,
    Lookup,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::Analyze => "analyze",
            Self::Lookup => "lookup",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rough effort tier, scaled off word and entity counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Normal,
    High,
}

/// Everything the planner needs to know about one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub query: String,
    pub intent: Intent,
    pub entities: Vec<String>,
    pub complexity: Complexity,
    pub urgency: Urgency,
}

const NAVIGATION_PHRASES: &[&str] = &["go to", "take me", "head to"];
const NAVIGATION_WORDS: &[&str] = &["open", "visit", "navigate"];
const ANALYSIS_PHRASES: &[&str] = &["deep dive", "in depth"];
const ANALYSIS_WORDS: &[&str] = &[
    "analyze", "analyse", "summarize", "summarise", "compare", "explain", "research", "investigate",
];
const URGENT_PHRASES: &[&str] = &["right away", "right now"];
const URGENT_WORDS: &[&str] = &["urgent", "urgently", "immediately", "asap", "now", "quickly"];
const RELAXED_PHRASES: &[&str] = &["no rush", "no hurry"];
const RELAXED_WORDS: &[&str] = &["later", "eventually", "whenever", "sometime", "someday"];

/// How many entities push a query into the analysis intent and the complex
/// tier on their own.
const ENTITY_HEAVY: usize = 3;

/// Analyze a raw query. Pure and deterministic; the same text always yields
/// the same analysis.
pub fn analyze(query: &str) -> QueryAnalysis {
    let lower = query.to_lowercase();
    let tokens: Vec<&str> = lower
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|t| !t.is_empty())
        .collect();
    let entities = extract_entities(query);

    let intent = if matches_any(&lower, &tokens, NAVIGATION_PHRASES, NAVIGATION_WORDS) {
        Intent::Navigate
    } else if matches_any(&lower, &tokens, ANALYSIS_PHRASES, ANALYSIS_WORDS) || entities.len() >= ENTITY_HEAVY {
        Intent::Analyze
    } else {
        Intent::Lookup
    };

    let complexity = if tokens.len() >= 12 || entities.len() >= ENTITY_HEAVY {
        Complexity::Complex
    } else if tokens.len() >= 6 || !entities.is_empty() {
        Complexity::Moderate
    } else {
        Complexity::Simple
    };

    // High outranks low when a query carries both.
    let urgency = if matches_any(&lower, &tokens, URGENT_PHRASES, URGENT_WORDS) {
        Urgency::High
    } else if matches_any(&lower, &tokens, RELAXED_PHRASES, RELAXED_WORDS) {
        Urgency::Low
    } else {
        Urgency::Normal
    };

    QueryAnalysis {
        query: query.to_string(),
        intent,
        entities,
        complexity,
        urgency,
    }
}

/// Single words match whole tokens; phrases match anywhere in the text.
fn matches_any(lower: &str, tokens: &[&str], phrases: &[&str], words: &[&str]) -> bool {
    phrases.iter().any(|p| lower.contains(p)) || words.iter().any(|w| tokens.iter().any(|t| t == w))
}

/// Entities worth carrying into the plan: double-quoted spans, URL-shaped
/// tokens, and capitalized words past the sentence start. Order-preserving
/// and case-insensitively deduplicated.
pub fn extract_entities(query: &str) -> Vec<String> {
    let mut entities = Vec::new();
    for span in quoted_spans(query) {
        push_unique(&mut entities, span);
    }
    for (position, raw) in query.split_whitespace().enumerate() {
        let token = raw.trim_matches(|c: char| !c.is_alphanumeric() && !matches!(c, '.' | '/' | ':' | '-'));
        if token.is_empty() {
            continue;
        }
        if looks_like_url(token) {
            push_unique(&mut entities, token.to_string());
            continue;
        }
        if position > 0 && token.chars().next().is_some_and(char::is_uppercase) {
            let word = token.trim_matches(|c: char| !c.is_alphanumeric());
            if !word.is_empty() {
                push_unique(&mut entities, word.to_string());
            }
        }
    }
    entities
}

fn looks_like_url(token: &str) -> bool {
    if token.starts_with("http://") || token.starts_with("https://") {
        return true;
    }
    token.contains('.')
        && !token.starts_with('.')
        && !token.ends_with('.')
        && token.chars().any(|c| c.is_ascii_alphabetic())
}

fn quoted_spans(query: &str) -> Vec<String> {
    let mut spans = Vec::new();
    let mut current = String::new();
    let mut inside = false;
    for c in query.chars() {
        if c == '"' {
            if inside && !current.trim().is_empty() {
                spans.push(current.trim().to_string());
            }
            current.clear();
            inside = !inside;
        } else if inside {
            current.push(c);
        }
    }
    spans
}

fn push_unique(entities: &mut Vec<String>, candidate: String) {
    if !entities.iter().any(|e| e.eq_ignore_ascii_case(&candidate)) {
        entities.push(candidate);
    }
}
