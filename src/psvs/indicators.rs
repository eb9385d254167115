//! Lexical indicator extraction (A/W/E/H/B).
//!
//! Each category is a static table of bilingual phrase patterns. English
//! alternatives are matched on word boundaries; Chinese alternatives are
//! matched as substrings, since CJK text carries no inter-word separators.
//! Extend a category by adding a row to its table.

use once_cell::sync::Lazy;
use regex::Regex;

use super::config::{MIN_MESSAGE_LENGTH_FOR_PSVS_UPDATE, SHORT_RESPONSES};
use super::types::IndicatorScores;

// ============================================================================
// Pattern tables
// ============================================================================

/// How a pattern's alternatives are delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    /// Whole-word match (`\b...\b`).
    Latin,
    /// Substring match.
    Cjk,
}

/// How matches of one pattern turn into score.
#[derive(Debug, Clone, Copy)]
enum Tally {
    /// Fixed increment when the pattern matches at least once.
    Presence(f64),
    /// Increment per occurrence, capped per pattern.
    Occurrences { each: f64, cap: f64 },
}

/// Which field of [`IndicatorScores`] a category feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Agency,
    Withdrawal,
    Extremity,
    Hostility,
    Boundary,
}

struct CategoryTable {
    category: Category,
    tally: Tally,
    patterns: &'static [(Script, &'static str)],
}

const AGENCY: CategoryTable = CategoryTable {
    category: Category::Agency,
    tally: Tally::Presence(0.5),
    patterns: &[
        (Script::Latin, "i will|i'll|i'm going to|i plan to|i'm taking|i decided|i choose"),
        (Script::Latin, "my responsibility|i can|i'm able to|let me|i'll handle"),
        (Script::Latin, "step by step|next step|action plan|i'll start|i'm working on"),
        (Script::Cjk, "我会|我要|我打算|我决定|我选择|我能|我来"),
    ],
};

const WITHDRAWAL: CategoryTable = CategoryTable {
    category: Category::Withdrawal,
    tally: Tally::Presence(0.6),
    patterns: &[
        (Script::Latin, "whatever|doesn't matter|don't care|i don't mind|not sure|maybe later"),
        (Script::Latin, "avoid|ignore|put off|delay|postpone|can't deal|too hard"),
        (Script::Latin, "i give up|no point|why bother|hopeless|helpless"),
        (Script::Cjk, "随便|无所谓|不在乎|算了|懒得|回避|拖延"),
    ],
};

const EXTREMITY: CategoryTable = CategoryTable {
    category: Category::Extremity,
    tally: Tally::Occurrences { each: 0.4, cap: 2.0 },
    patterns: &[
        (Script::Latin, "always|never|everyone|no one|everything|nothing|all or"),
        (Script::Latin, "completely|totally|absolutely|must|can't|impossible"),
        (Script::Latin, "every time|all the time|nobody|everybody"),
        (Script::Cjk, "总是|从不|所有人|没人|一切|什么都|绝对|必须|不可能"),
    ],
};

const HOSTILITY: CategoryTable = CategoryTable {
    category: Category::Hostility,
    tally: Tally::Presence(1.0),
    patterns: &[
        (Script::Latin, "my way or|do it now|you must|you have to|shut up|stupid|idiot"),
        (Script::Latin, "i hate|i'll make you|you better|or else|threaten"),
        (Script::Latin, "pathetic|worthless|useless|disgusting|piece of"),
        (Script::Cjk, "要么|必须|闭嘴|蠢|白痴|恨|威胁|废物|垃圾"),
    ],
};

const BOUNDARY: CategoryTable = CategoryTable {
    category: Category::Boundary,
    tally: Tally::Presence(0.4),
    patterns: &[
        (Script::Latin, "respect|clarify|understand|align|boundary|scope|clear"),
        (Script::Latin, "let's discuss|can we talk|i'd like to|what if|help me understand"),
        (Script::Latin, "i need|i feel|from my perspective|it seems"),
        (Script::Cjk, "尊重|澄清|理解|边界|范围|讨论|我需要|我觉得"),
    ],
};

const TABLES: [CategoryTable; 5] = [AGENCY, WITHDRAWAL, EXTREMITY, HOSTILITY, BOUNDARY];

struct CompiledPattern {
    category: Category,
    tally: Tally,
    regex: Regex,
}

static COMPILED: Lazy<Vec<CompiledPattern>> = Lazy::new(|| {
    TABLES
        .iter()
        .flat_map(|table| {
            table.patterns.iter().map(move |(script, alternatives)| {
                let source = match script {
                    Script::Latin => format!(r"\b(?:{})\b", alternatives),
                    // CJK text has no word breaks, so these match as plain substrings.
                    Script::Cjk => format!("(?:{})", alternatives),
                };
                CompiledPattern {
                    category: table.category,
                    tally: table.tally,
                    regex: Regex::new(&source).unwrap(),
                }
            })
        })
        .collect()
});

// ============================================================================
// Extraction
// ============================================================================

/// Score a message on the five indicator categories.
///
/// Case-insensitive and total: empty or unrecognised input yields all zeros.
/// Every listed pattern contributes independently, so two patterns
/// describing similar ideas both count. Each category is capped at
/// [`IndicatorScores::CAP`] after summation.
pub fn extract(message: &str) -> IndicatorScores {
    let lowered = message.to_lowercase();
    let mut scores = IndicatorScores::zero();

    for pattern in COMPILED.iter() {
        let gained = match pattern.tally {
            Tally::Presence(increment) => {
                if pattern.regex.is_match(&lowered) {
                    increment
                } else {
                    0.0
                }
            }
            Tally::Occurrences { each, cap } => {
                let count = pattern.regex.find_iter(&lowered).count();
                (count as f64 * each).min(cap)
            }
        };

        if gained > 0.0 {
            let slot = match pattern.category {
                Category::Agency => &mut scores.agency,
                Category::Withdrawal => &mut scores.withdrawal,
                Category::Extremity => &mut scores.extremity,
                Category::Hostility => &mut scores.hostility,
                Category::Boundary => &mut scores.boundary,
            };
            *slot += gained;
        }
    }

    scores.capped()
}

/// True when a message is too short or too generic to move the position.
pub fn should_skip_psvs_update(message: &str) -> bool {
    let cleaned = message.trim();

    if cleaned.chars().count() < MIN_MESSAGE_LENGTH_FOR_PSVS_UPDATE {
        return true;
    }

    let lowered = cleaned.to_lowercase();
    SHORT_RESPONSES.contains(&lowered.as_str())
}

// ============================================================================
// Tests
// ============================================================================
