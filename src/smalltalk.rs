//! Small-talk detection.
//!
//! Conversational inputs (greetings, help requests, thanks, farewells,
//! questions about the assistant) are answered with canned text instead of
//! running retrieval and generation. Matching is purely pattern based.
//!
//! [`SmallTalkClassifier`] is the strategy seam used by the query engine;
//! [`KeywordClassifier`] is the built-in implementation.

use regex::Regex;

pub const GREETING_RESPONSE: &str = "Hi there! I can answer questions about the documents you upload. \
Upload PDF, DOCX, or TXT files, then ask me things like 'Summarize section 3', \
'What are the prerequisites?', or 'List the key topics about X'.";

pub const HELP_RESPONSE: &str = "Here's how I can help: upload one or more documents and ask questions. \
I'll retrieve the most relevant snippets and draft a clear answer with sources. \
Try: 'Give me a high-level summary', 'Compare A vs B', or 'Extract deadlines from the syllabus'.";

pub const THANKS_RESPONSE: &str =
    "You're welcome! If you have more questions about your documents, just ask.";

pub const FAREWELL_RESPONSE: &str =
    "Goodbye! Feel free to come back anytime with more documents or questions.";

pub const IDENTITY_RESPONSE: &str = "I'm a document Q&A assistant powered by retrieval-augmented generation (RAG). \
I search your uploaded files for relevant passages and use a language model to compose answers, \
including short source snippets so you can verify them.";

/// Decides whether a query is small talk.
pub trait SmallTalkClassifier: Send + Sync {
    /// Return the canned response for `query`, or `None` if it should go
    /// through retrieval.
    fn classify(&self, query: &str) -> Option<String>;
}

/// Category of a small-talk match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Greeting,
    Help,
    Thanks,
    Farewell,
    Identity,
}

impl Category {
    pub fn response(&self) -> &'static str {
        match self {
            Category::Greeting => GREETING_RESPONSE,
            Category::Help => HELP_RESPONSE,
            Category::Thanks => THANKS_RESPONSE,
            Category::Farewell => FAREWELL_RESPONSE,
            Category::Identity => IDENTITY_RESPONSE,
        }
    }
}

/// Regex and keyword classifier.
///
/// Greetings must make up the whole (trimmed, lower-cased) query. The other
/// categories match when one of their keywords appears as a whole word or
/// phrase, so "thx" matches but "party" does not match "ty".
pub struct KeywordClassifier {
    greeting: Regex,
    rules: Vec<(Category, Regex)>,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        let greeting =
            Regex::new(r"^(hi|hello|hey|yo|hiya|good\s*(morning|afternoon|evening))\b[!. ]*$")
                .expect("static greeting pattern");

        let rules = [
            (
                Category::Help,
                &["help", "what can you do", "how to use", "how do i use", "guide", "instructions"][..],
            ),
            (Category::Thanks, &["thanks", "thank you", "ty", "thx"][..]),
            (Category::Farewell, &["bye", "goodbye", "see you", "cya"][..]),
            (Category::Identity, &["who are you", "what are you", "about you"][..]),
        ]
        .into_iter()
        .map(|(category, keywords)| (category, keyword_pattern(keywords)))
        .collect();

        Self { greeting, rules }
    }

    /// Category of `query`, checked in the order greeting, help, thanks,
    /// farewell, identity.
    pub fn category(&self, query: &str) -> Option<Category> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return None;
        }
        if self.greeting.is_match(&q) {
            return Some(Category::Greeting);
        }
        self.rules
            .iter()
            .find(|(_, pattern)| pattern.is_match(&q))
            .map(|(category, _)| *category)
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SmallTalkClassifier for KeywordClassifier {
    fn classify(&self, query: &str) -> Option<String> {
        let category = self.category(query)?;
        tracing::debug!(?category, "small talk detected");
        Some(category.response().to_string())
    }
}

/// `\b(?:kw1|kw2|...)\b` with internal spaces matching any whitespace run.
fn keyword_pattern(keywords: &[&str]) -> Regex {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|kw| {
            kw.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect();
    Regex::new(&format!(r"\b(?:{})\b", alternatives.join("|"))).expect("static keyword pattern")
}
