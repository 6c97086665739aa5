//! Per-turn visibility filter: which skills the model is offered next.
//!
//! The filter owns no state. Each turn it reads the registry snapshot and the
//! retained history and produces a [`VisibilitySpec`]. Given the same inputs it
//! always produces the same spec.

use std::fmt;
use std::sync::Arc;

use crate::retention::TurnEntry;
use crate::skills::{SkillDescriptor, SkillIndex, Visibility};

/// What the filter sees for one model round.
#[derive(Debug, Clone, Copy)]
pub struct TurnContext<'a> {
    /// The user message that started this turn.
    pub latest_message: &'a str,
    /// Retained history, oldest first.
    pub history: &'a [TurnEntry],
    pub turn: u64,
}

impl<'a> TurnContext<'a> {
    pub fn new(latest_message: &'a str, history: &'a [TurnEntry], turn: u64) -> Self {
        Self {
            latest_message,
            history,
            turn,
        }
    }
}

/// Skills offered for the next model call, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilitySpec {
    pub names: Vec<String>,
    /// The predicate matched nothing and the full allowed set was used instead.
    pub fell_back: bool,
}

impl VisibilitySpec {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// Decides whether a skill is relevant for the current turn.
pub trait SkillPredicate: Send + Sync {
    fn allows(&self, skill: &SkillDescriptor, ctx: &TurnContext<'_>) -> bool;
}

impl<F> SkillPredicate for F
where
    F: Fn(&SkillDescriptor, &TurnContext<'_>) -> bool + Send + Sync,
{
    fn allows(&self, skill: &SkillDescriptor, ctx: &TurnContext<'_>) -> bool {
        self(skill, ctx)
    }
}

/// Wrap a closure as a shared predicate.
pub fn predicate_fn<F>(f: F) -> Arc<dyn SkillPredicate>
where
    F: Fn(&SkillDescriptor, &TurnContext<'_>) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Common words that say nothing about which skill is wanted.
const STOPWORDS: &[&str] = &[
    "and", "are", "can", "for", "from", "have", "how", "now", "please", "the", "this", "that",
    "what", "when", "with", "you", "your",
];

/// Keeps skills whose name, description, tags or operation names contain a word from
/// the latest user message or the last few user entries in history.
#[derive(Debug, Clone)]
pub struct KeywordPredicate {
    /// How many earlier user entries to consider besides the latest message.
    pub lookback: usize,
    /// Words shorter than this are ignored.
    pub min_word_len: usize,
}

impl Default for KeywordPredicate {
    fn default() -> Self {
        Self {
            lookback: 2,
            min_word_len: 3,
        }
    }
}

impl KeywordPredicate {
    fn words(&self, ctx: &TurnContext<'_>) -> Vec<String> {
        let mut texts: Vec<&str> = vec![ctx.latest_message];
        texts.extend(
            ctx.history
                .iter()
                .rev()
                .filter_map(TurnEntry::user_text)
                .filter(|t| *t != ctx.latest_message)
                .take(self.lookback),
        );
        let mut words: Vec<String> = Vec::new();
        for text in texts {
            for w in text.split(|c: char| !c.is_alphanumeric() && c != '_') {
                let w = w.to_lowercase();
                if w.chars().count() >= self.min_word_len
                    && !STOPWORDS.contains(&w.as_str())
                    && !words.contains(&w)
                {
                    words.push(w);
                }
            }
        }
        words
    }
}

impl SkillPredicate for KeywordPredicate {
    fn allows(&self, skill: &SkillDescriptor, ctx: &TurnContext<'_>) -> bool {
        let mut haystack = format!("{} {}", skill.name, skill.description);
        for t in &skill.tags {
            haystack.push(' ');
            haystack.push_str(t);
        }
        for op in skill.operation_names() {
            haystack.push(' ');
            haystack.push_str(op);
        }
        let haystack = haystack.to_lowercase();
        self.words(ctx).iter().any(|w| haystack.contains(w.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    /// When false the filter passes the allowed set through unchanged.
    pub enabled: bool,
    pub allowed_visibilities: Vec<Visibility>,
    /// Offer the full allowed set when the predicate leaves nothing.
    pub fallback_to_allowed: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_visibilities: vec![Visibility::Public],
            fallback_to_allowed: true,
        }
    }
}

#[derive(Clone, Default)]
pub struct VisibilityFilter {
    config: FilterConfig,
    predicate: Option<Arc<dyn SkillPredicate>>,
}

impl fmt::Debug for VisibilityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisibilityFilter")
            .field("config", &self.config)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

impl VisibilityFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            predicate: None,
        }
    }

    pub fn with_predicate(mut self, predicate: Arc<dyn SkillPredicate>) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Compute the skills to offer for this round.
    pub fn compute(&self, ctx: &TurnContext<'_>, index: &SkillIndex) -> VisibilitySpec {
        let allowed = index.list_visible(&self.config.allowed_visibilities);
        let all_names = || allowed.iter().map(|s| s.name.clone()).collect::<Vec<_>>();

        if !self.config.enabled {
            return VisibilitySpec {
                names: all_names(),
                fell_back: false,
            };
        }
        let Some(predicate) = &self.predicate else {
            return VisibilitySpec {
                names: all_names(),
                fell_back: false,
            };
        };

        let names: Vec<String> = allowed
            .iter()
            .filter(|s| predicate.allows(s, ctx))
            .map(|s| s.name.clone())
            .collect();
        if names.is_empty() && self.config.fallback_to_allowed && !allowed.is_empty() {
            log::debug!(
                "turn {}: no skill matched, offering all {} allowed",
                ctx.turn,
                allowed.len()
            );
            return VisibilitySpec {
                names: all_names(),
                fell_back: true,
            };
        }
        log::debug!(
            "turn {}: offering {} of {} allowed skills",
            ctx.turn,
            names.len(),
            allowed.len()
        );
        VisibilitySpec {
            names,
            fell_back: false,
        }
    }
}
