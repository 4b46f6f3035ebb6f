//! Keyword heuristics for contract language.
//!
//! Every category is a single case-insensitive regex run once over the whole
//! document: a captured trigger keyword followed by the rest of its sentence.
//! Only the keyword as written in the document is kept, and matches are
//! collected into sets, so each distinct spelling is reported once.

use lazy_static::lazy_static;
use regex::Regex;

use crate::types::{Detections, RiskFinding, RiskLevel};

/// A named class of contract language and the pattern that detects it.
#[derive(Debug, Clone, Copy)]
pub struct Category {
    pub name: &'static str,
    pub pattern: &'static str,
    /// One-line explanation shown next to the matches.
    pub context: &'static str,
}

pub const CLAUSE_CATEGORIES: &[Category] = &[
    Category {
        name: "Confidentiality Clause",
        pattern: r"(?i)(confidentiality|non-disclosure)[^.!?]*",
        context: "This clause is important to protect sensitive information shared between parties.",
    },
    Category {
        name: "Liability Clause",
        pattern: r"(?i)(liability|indemnity)[^.!?]*",
        context: "This clause limits the liability of one or both parties in case of damages or losses.",
    },
    Category {
        name: "Termination Clause",
        pattern: r"(?i)(termination|end|expire)[^.!?]*",
        context: "This clause outlines the conditions under which the agreement can be terminated.",
    },
    Category {
        name: "Force Majeure Clause",
        pattern: r"(?i)(force majeure)[^.!?]*",
        context: "This clause protects parties from liability if an unforeseen event prevents them from fulfilling their obligations.",
    },
    Category {
        name: "Governing Law Clause",
        pattern: r"(?i)(governing law|jurisdiction)[^.!?]*",
        context: "This clause specifies the jurisdiction whose laws will govern the agreement.",
    },
    Category {
        name: "Dispute Resolution Clause",
        pattern: r"(?i)(dispute resolution|arbitration|mediation)[^.!?]*",
        context: "This clause outlines the method for resolving disputes that arise from the agreement.",
    },
    Category {
        name: "Amendment Clause",
        pattern: r"(?i)(amendment|modification)[^.!?]*",
        context: "This clause defines how changes to the agreement can be made.",
    },
    Category {
        name: "Warranty Clause",
        pattern: r"(?i)(warranty|guarantee)[^.!?]*",
        context: "This clause provides assurances regarding the quality and performance of the subject matter.",
    },
];

pub const OBLIGATION_CATEGORIES: &[Category] = &[
    Category {
        name: "Payment Obligations",
        pattern: r"(?i)(payment|fee|cost)[^.!?]*",
        context: "This obligation refers to the responsibility of one party to pay fees or costs as required by the agreement.",
    },
    Category {
        name: "Reporting Obligations",
        pattern: r"(?i)(reporting|notification|inform)[^.!?]*",
        context: "This obligation entails the requirement to report or notify the other party about specific events or actions.",
    },
    Category {
        name: "Performance Obligations",
        pattern: r"(?i)(perform|provide|deliver)[^.!?]*",
        context: "This obligation involves ensuring that certain actions or deliverables are completed as specified in the agreement.",
    },
    Category {
        name: "Compliance Obligations",
        pattern: r"(?i)(compliance|law|regulation)[^.!?]*",
        context: "This obligation requires adherence to relevant laws and regulations applicable to the agreement.",
    },
];

/// A configured risk phrase with its static severity tier.
#[derive(Debug, Clone, Copy)]
pub struct RiskPhrase {
    pub phrase: &'static str,
    pub explanation: &'static str,
    pub level: RiskLevel,
}

pub const RISK_PHRASES: &[RiskPhrase] = &[
    RiskPhrase {
        phrase: "penalty",
        explanation: "This indicates financial or legal consequences.",
        level: RiskLevel::High,
    },
    RiskPhrase {
        phrase: "liability",
        explanation: "This suggests potential financial responsibility.",
        level: RiskLevel::Medium,
    },
    RiskPhrase {
        phrase: "default",
        explanation: "This can lead to serious legal consequences.",
        level: RiskLevel::High,
    },
    RiskPhrase {
        phrase: "breach",
        explanation: "This may expose the party to significant penalties.",
        level: RiskLevel::High,
    },
    RiskPhrase {
        phrase: "suspension",
        explanation: "This indicates risks of halting services.",
        level: RiskLevel::Medium,
    },
    RiskPhrase {
        phrase: "should",
        explanation: "This implies a recommendation, which may not be mandatory.",
        level: RiskLevel::Low,
    },
    RiskPhrase {
        phrase: "may be required",
        explanation: "This suggests that obligations could exist under certain conditions.",
        level: RiskLevel::Low,
    },
    RiskPhrase {
        phrase: "indemnify",
        explanation: "This entails a duty to compensate for harm or loss, indicating potential financial risk.",
        level: RiskLevel::High,
    },
    RiskPhrase {
        phrase: "termination for cause",
        explanation: "This indicates a risk of ending the contract due to specific failures.",
        level: RiskLevel::High,
    },
    RiskPhrase {
        phrase: "compliance",
        explanation: "Non-compliance with regulations can lead to legal penalties.",
        level: RiskLevel::High,
    },
];

/// Characters of context kept before / after a risk phrase.
const CONTEXT_BEFORE: usize = 50;
const CONTEXT_AFTER: usize = 200;

fn compile(categories: &[Category]) -> Vec<(&'static str, Regex)> {
    categories
        .iter()
        .map(|c| (c.name, Regex::new(c.pattern).unwrap()))
        .collect()
}

lazy_static! {
    static ref CLAUSE_PATTERNS: Vec<(&'static str, Regex)> = compile(CLAUSE_CATEGORIES);
    static ref OBLIGATION_PATTERNS: Vec<(&'static str, Regex)> = compile(OBLIGATION_CATEGORIES);
    static ref RISK_PATTERNS: Vec<Regex> = RISK_PHRASES
        .iter()
        .map(|r| Regex::new(&format!("(?i){}", regex::escape(r.phrase))).unwrap())
        .collect();
}

fn scan(patterns: &[(&'static str, Regex)], text: &str) -> Detections {
    let mut found = Detections::new();
    for (name, re) in patterns {
        let matches: std::collections::BTreeSet<String> = re
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if !matches.is_empty() {
            found.insert((*name).to_string(), matches);
        }
    }
    found
}

pub fn detect_clauses(text: &str) -> Detections {
    scan(&CLAUSE_PATTERNS, text)
}

pub fn detect_obligations(text: &str) -> Detections {
    scan(&OBLIGATION_PATTERNS, text)
}

pub fn clause_context(name: &str) -> &'static str {
    CLAUSE_CATEGORIES
        .iter()
        .find(|c| c.name == name)
        .map(|c| c.context)
        .unwrap_or("No context available for this clause.")
}

pub fn obligation_context(name: &str) -> &'static str {
    OBLIGATION_CATEGORIES
        .iter()
        .find(|c| c.name == name)
        .map(|c| c.context)
        .unwrap_or("No context available for this obligation.")
}

/// Slice of `text` spanning `before` chars ahead of `at` and `after` chars from it.
fn char_window(text: &str, at: usize, before: usize, after: usize) -> &str {
    let lo = text[..at]
        .char_indices()
        .rev()
        .take(before)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(at);
    let hi = text[at..]
        .char_indices()
        .nth(after)
        .map(|(i, _)| at + i)
        .unwrap_or(text.len());
    &text[lo..hi]
}

/// Report every configured risk phrase present in the document or its summary.
pub fn detect_risks(text: &str, summary: &str) -> Vec<RiskFinding> {
    let mut findings = Vec::new();
    for (risk, re) in RISK_PHRASES.iter().zip(RISK_PATTERNS.iter()) {
        let in_text = re.find(text);
        if in_text.is_none() && !re.is_match(summary) {
            continue;
        }
        let context = in_text
            .map(|m| char_window(text, m.start(), CONTEXT_BEFORE, CONTEXT_AFTER).trim().to_string())
            .unwrap_or_default();
        findings.push(RiskFinding {
            phrase: risk.phrase.to_string(),
            explanation: risk.explanation.to_string(),
            context,
            level: risk.level,
        });
    }
    findings
}

/// Weighted sum of finding tiers (High=3, Medium=2, Low=1).
pub fn risk_score(findings: &[RiskFinding]) -> u32 {
    findings.iter().map(|f| f.level.weight()).sum()
}

/// Number of findings per tier, always in High, Medium, Low order.
pub fn risk_level_counts(findings: &[RiskFinding]) -> Vec<(RiskLevel, usize)> {
    RiskLevel::ALL
        .iter()
        .map(|level| (*level, findings.iter().filter(|f| f.level == *level).count()))
        .collect()
}
