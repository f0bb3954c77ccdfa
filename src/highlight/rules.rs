use regex::Regex;

use super::HighlightStyle;

/// A rule that may span several lines: opens on `start`, closes on `end`.
#[derive(Debug, Clone)]
pub struct BlockRuleSpec {
    pub name: String,
    pub start: String,
    pub end: String,
    pub style: HighlightStyle,
}

/// A rule matched within a single line.
#[derive(Debug, Clone)]
pub struct LineRuleSpec {
    pub name: String,
    pub pattern: String,
    pub style: HighlightStyle,
}

/// The uncompiled rule table. Block rule order matters: it decides which
/// starter wins on a line and which number a line's block state carries.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub blocks: Vec<BlockRuleSpec>,
    pub items: Vec<LineRuleSpec>,
    pub spans: Vec<LineRuleSpec>,
}

fn block(name: &str, start: &str, end: &str, style: HighlightStyle) -> BlockRuleSpec {
    BlockRuleSpec {
        name: name.to_string(),
        start: start.to_string(),
        end: end.to_string(),
        style,
    }
}

fn line(name: &str, pattern: &str, style: HighlightStyle) -> LineRuleSpec {
    LineRuleSpec { name: name.to_string(), pattern: pattern.to_string(), style }
}

impl RuleSet {
    pub fn markdown() -> Self {
        use HighlightStyle::*;
        Self {
            blocks: vec![
                block("quote", r"^( {0,3})>", r"^\s*$", Quote),
                block("code", r"^```", r"^```\s*$", FencedCode),
                block("block_math", r"\$\$", r"\$\$", BlockMath),
            ],
            items: vec![
                line("list_item", r"^(( {0,3})>)?\s*([*\-+:]|\d+\.)\s", ListItem),
                line("header", r"^(#{1,6}(\s|$)|=+\s*$|-+\s*$)", Header),
                line(
                    "horizontal_rule",
                    r"^ {0,3}((-\s*){3,}|(\*\s*){3,}|(_\s*){3,})$",
                    HorizontalRule,
                ),
                line("toc", r"\[TOC\]", TableOfContents),
            ],
            spans: vec![
                line("link", r"!?\[[^\]\n]*\](\([^)\n]*\)|\[[^\]\n]*\])", Link),
                line(
                    "link_id",
                    r#"^ {0,3}\[[^\]\s]*\]:\s*\S+(\s+("[^"\n]*"|'[^'\n]*'|\([^)\n]*\)))?"#,
                    LinkReference,
                ),
                line(
                    "emphasis",
                    r"\*\*[^\s*](?:[^*]*[^\s*])?\*\*|\*[^\s*](?:[^*]*[^\s*])?\*|__[^\s_](?:[^_]*[^\s_])?__|\b_[^\s_](?:[^_]*[^\s_])?_\b",
                    Emphasis,
                ),
                line("code", r"``[^\n]*?``|`[^`\n]+`", InlineCode),
                line("math", r"\$[^\n$]+\$", InlineMath),
            ],
        }
    }

    /// Compiles every pattern. Invalid rules are logged and dropped; block
    /// rules keep their slot so state numbers stay stable.
    pub fn compile(&self) -> CompiledRules {
        let blocks = self
            .blocks
            .iter()
            .map(|spec| match (Regex::new(&spec.start), Regex::new(&spec.end)) {
                (Ok(start), Ok(end)) => Some(BlockRule { start, end, style: spec.style }),
                (Err(e), _) | (_, Err(e)) => {
                    log::warn!("{}: rule is not valid, skipping it: {e}", spec.name);
                    None
                }
            })
            .collect();

        CompiledRules {
            blocks,
            items: compile_line_rules(&self.items),
            spans: compile_line_rules(&self.spans),
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::markdown()
    }
}

fn compile_line_rules(specs: &[LineRuleSpec]) -> Vec<LineRule> {
    specs
        .iter()
        .filter_map(|spec| match Regex::new(&spec.pattern) {
            Ok(regex) => Some(LineRule { regex, style: spec.style }),
            Err(e) => {
                log::warn!("{}: rule is not valid, skipping it: {e}", spec.name);
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct BlockRule {
    pub start: Regex,
    pub end: Regex,
    pub style: HighlightStyle,
}

#[derive(Debug, Clone)]
pub struct LineRule {
    pub regex: Regex,
    pub style: HighlightStyle,
}

#[derive(Debug, Clone)]
pub struct CompiledRules {
    blocks: Vec<Option<BlockRule>>,
    items: Vec<LineRule>,
    spans: Vec<LineRule>,
}

impl CompiledRules {
    pub fn block(&self, index: usize) -> Option<&BlockRule> {
        self.blocks.get(index).and_then(Option::as_ref)
    }

    /// Valid block rules with their slot index, in table order.
    pub fn blocks(&self) -> impl Iterator<Item = (usize, &BlockRule)> {
        self.blocks
            .iter()
            .enumerate()
            .filter_map(|(i, rule)| rule.as_ref().map(|r| (i, r)))
    }

    pub fn items(&self) -> &[LineRule] {
        &self.items
    }

    pub fn spans(&self) -> &[LineRule] {
        &self.spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_rules_all_compile() {
        let set = RuleSet::markdown();
        let compiled = set.compile();
        assert_eq!(compiled.blocks().count(), set.blocks.len());
        assert_eq!(compiled.items().len(), set.items.len());
        assert_eq!(compiled.spans().len(), set.spans.len());
    }

    #[test]
    fn test_invalid_block_rule_keeps_slot() {
        let mut set = RuleSet::markdown();
        set.blocks[0].start = "(unclosed".to_string();
        let compiled = set.compile();

        assert!(compiled.block(0).is_none());
        assert_eq!(compiled.block(1).map(|r| r.style), Some(HighlightStyle::FencedCode));
        let indices: Vec<usize> = compiled.blocks().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn test_invalid_line_rule_is_dropped() {
        let mut set = RuleSet::markdown();
        set.spans[0].pattern = "[".to_string();
        let compiled = set.compile();
        assert_eq!(compiled.spans().len(), set.spans.len() - 1);
        assert!(compiled.spans().iter().all(|r| r.style != HighlightStyle::Link));
    }

    #[test]
    fn test_emphasis_pattern() {
        let compiled = RuleSet::markdown().compile();
        let emphasis = compiled
            .spans()
            .iter()
            .find(|r| r.style == HighlightStyle::Emphasis)
            .unwrap();

        let m = emphasis.regex.find("# Hello *world*").unwrap();
        assert_eq!((m.start(), m.end()), (8, 15));
        assert_eq!(emphasis.regex.find("**bold** text").map(|m| m.as_str()), Some("**bold**"));
        assert_eq!(emphasis.regex.find("a *b* c").map(|m| m.as_str()), Some("*b*"));
        assert!(emphasis.regex.find("snake_case_name").is_none());
        assert!(emphasis.regex.find("2 * 3 * 4").is_none());
    }
}
