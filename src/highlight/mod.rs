//! Line-by-line markdown highlighting for the note editor.
//!
//! Each call classifies a single line given the block state left by the line
//! before it. Multi-line constructs (quotes, fenced code, `$$` math) are
//! carried between lines through [`BlockState`]; everything else is matched
//! within the line by the item and span rules, then the spell-check pass
//! flags unknown words. Offsets are byte offsets into the line.

mod document;
mod rules;
mod spell;

pub use document::HighlightedDocument;
pub use rules::{BlockRuleSpec, CompiledRules, LineRuleSpec, RuleSet};
pub use spell::Dictionary;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use rules::LineRule;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]+").expect("valid word regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightStyle {
    Quote,
    FencedCode,
    BlockMath,
    ListItem,
    Header,
    HorizontalRule,
    TableOfContents,
    Link,
    LinkReference,
    Emphasis,
    InlineCode,
    InlineMath,
    Misspelled,
}

impl HighlightStyle {
    pub fn is_block(&self) -> bool {
        matches!(self, Self::Quote | Self::FencedCode | Self::BlockMath)
    }

    pub fn is_item(&self) -> bool {
        matches!(
            self,
            Self::ListItem | Self::Header | Self::HorizontalRule | Self::TableOfContents
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyledSpan {
    pub start: usize,
    pub len: usize,
    pub style: HighlightStyle,
}

impl StyledSpan {
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn covers(&self, start: usize, end: usize) -> bool {
        self.start <= start && end <= self.end()
    }
}

/// Which block rule, if any, is still open at the end of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockState {
    #[default]
    Closed,
    /// `rule` is the 0-based slot in the rule table.
    Open { rule: usize },
}

impl BlockState {
    /// 0 when closed, otherwise the 1-based number of the open block rule.
    pub fn tag(&self) -> usize {
        match self {
            Self::Closed => 0,
            Self::Open { rule } => rule + 1,
        }
    }

    pub fn from_tag(tag: usize) -> Self {
        match tag {
            0 => Self::Closed,
            n => Self::Open { rule: n - 1 },
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

/// Result of highlighting one line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineHighlight {
    /// Spans in the order they were applied; later spans paint over earlier ones.
    pub spans: Vec<StyledSpan>,
    pub state: BlockState,
}

impl LineHighlight {
    fn push(&mut self, start: usize, len: usize, style: HighlightStyle) {
        if len > 0 {
            self.spans.push(StyledSpan { start, len, style });
        }
    }

    /// True if some span with `style` covers `start..end`.
    pub fn has(&self, start: usize, end: usize, style: HighlightStyle) -> bool {
        self.spans.iter().any(|s| s.style == style && s.covers(start, end))
    }
}

pub struct Highlighter {
    rules: CompiledRules,
    dictionary: Option<Dictionary>,
}

impl Highlighter {
    pub fn new(rules: &RuleSet) -> Self {
        Self { rules: rules.compile(), dictionary: None }
    }

    pub fn with_dictionary(mut self, dictionary: Dictionary) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    pub fn set_dictionary(&mut self, dictionary: Option<Dictionary>) {
        self.dictionary = dictionary;
    }

    pub fn dictionary(&self) -> Option<&Dictionary> {
        self.dictionary.as_ref()
    }

    pub fn highlight_line(&self, text: &str, previous: BlockState) -> LineHighlight {
        let mut out = LineHighlight::default();
        let mut offset = 0;

        // Inside a block carried over from the previous line.
        if let BlockState::Open { rule } = previous {
            if let Some(block) = self.rules.block(rule) {
                match block.end.find(text) {
                    None => {
                        out.push(0, text.len(), block.style);
                        out.state = previous;
                        self.spellcheck(text, &mut out);
                        return out;
                    }
                    Some(end) => {
                        out.push(0, end.end(), block.style);
                        offset = end.end();
                    }
                }
            }
        }

        // First block starter that matches wins.
        let opened = self
            .rules
            .blocks()
            .find_map(|(index, block)| block.start.find_at(text, offset).map(|m| (index, block, m)));
        if let Some((index, block, start)) = opened {
            match block.end.find_at(text, start.end()) {
                Some(end) => {
                    out.push(start.start(), end.end() - start.start(), block.style);
                    offset = end.end();
                }
                None => {
                    out.push(start.start(), text.len() - start.start(), block.style);
                    out.state = BlockState::Open { rule: index };
                    self.spellcheck(text, &mut out);
                    return out;
                }
            }
        }

        for rule in self.rules.items() {
            apply_all(rule, text, offset, &mut out);
        }
        for rule in self.rules.spans() {
            apply_all(rule, text, offset, &mut out);
        }

        self.spellcheck(text, &mut out);
        out
    }

    fn spellcheck(&self, text: &str, out: &mut LineHighlight) {
        let Some(dictionary) = &self.dictionary else {
            return;
        };
        for word in WORD_RE.find_iter(text) {
            if !dictionary.check(word.as_str()) {
                out.push(word.start(), word.len(), HighlightStyle::Misspelled);
            }
        }
    }
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new(&RuleSet::markdown())
    }
}

/// Styles every match of `rule` from `offset` on, restarting just past each
/// match. `^` still only matches at the very start of the line.
fn apply_all(rule: &LineRule, text: &str, offset: usize, out: &mut LineHighlight) {
    let mut pos = offset;
    while pos <= text.len() {
        let Some(m) = rule.regex.find_at(text, pos) else {
            break;
        };
        out.push(m.start(), m.len(), rule.style);
        pos = if m.end() > m.start() {
            m.end()
        } else {
            match text[m.end()..].chars().next() {
                Some(c) => m.end() + c.len_utf8(),
                None => break,
            }
        };
    }
}
