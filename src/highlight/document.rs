use std::ops::Range;

use super::{BlockState, Dictionary, Highlighter, StyledSpan};

/// Document text split into lines, with the block state and spans of every
/// line kept next to it.
pub struct HighlightedDocument {
    highlighter: Highlighter,
    lines: Vec<String>,
    states: Vec<BlockState>,
    spans: Vec<Vec<StyledSpan>>,
}

impl HighlightedDocument {
    pub fn new(highlighter: Highlighter) -> Self {
        let mut doc = Self {
            highlighter,
            lines: Vec::new(),
            states: Vec::new(),
            spans: Vec::new(),
        };
        doc.set_text("");
        doc
    }

    /// Replaces the whole text and highlights it from a clean state.
    pub fn set_text(&mut self, text: &str) {
        self.lines = text
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
            .collect();
        self.rehighlight();
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Highlights every line again, starting from a clean state.
    pub fn rehighlight(&mut self) {
        self.states = vec![BlockState::Closed; self.lines.len()];
        self.spans = vec![Vec::new(); self.lines.len()];
        let mut previous = BlockState::Closed;
        for (i, line) in self.lines.iter().enumerate() {
            let result = self.highlighter.highlight_line(line, previous);
            previous = result.state;
            self.states[i] = result.state;
            self.spans[i] = result.spans;
        }
    }

    /// Swaps the spell-check dictionary and rehighlights everything.
    pub fn set_dictionary(&mut self, dictionary: Option<Dictionary>) {
        self.highlighter.set_dictionary(dictionary);
        self.rehighlight();
    }

    /// Returns the range of lines that were highlighted again.
    pub fn replace_line(&mut self, index: usize, text: &str) -> Range<usize> {
        if index >= self.lines.len() {
            return index..index;
        }
        self.lines[index] = text.to_string();
        self.rehighlight_from(index)
    }

    pub fn insert_line(&mut self, index: usize, text: &str) -> Range<usize> {
        let index = index.min(self.lines.len());
        // Seed the new line with the state the following line was computed
        // from, so the walk stops as soon as nothing downstream changes.
        let seed = self.previous_state(index);
        self.lines.insert(index, text.to_string());
        self.states.insert(index, seed);
        self.spans.insert(index, Vec::new());
        self.rehighlight_from(index)
    }

    pub fn remove_line(&mut self, index: usize) -> Range<usize> {
        if index >= self.lines.len() || self.lines.len() == 1 {
            return index..index;
        }
        self.lines.remove(index);
        let removed = self.states.remove(index);
        self.spans.remove(index);

        if index < self.lines.len() && removed != self.previous_state(index) {
            self.rehighlight_from(index)
        } else {
            index..index
        }
    }

    /// Re-highlights `start`, then keeps going while the block state handed
    /// to the next line differs from the cached one.
    fn rehighlight_from(&mut self, start: usize) -> Range<usize> {
        let mut end = start;
        while end < self.lines.len() {
            let result = self.highlighter.highlight_line(&self.lines[end], self.previous_state(end));
            let changed = result.state != self.states[end];
            self.states[end] = result.state;
            self.spans[end] = result.spans;
            end += 1;
            if !changed {
                break;
            }
        }
        start..end
    }

    fn previous_state(&self, index: usize) -> BlockState {
        match index {
            0 => BlockState::Closed,
            i => self.states[i - 1],
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].is_empty()
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn state(&self, index: usize) -> Option<BlockState> {
        self.states.get(index).copied()
    }

    pub fn states(&self) -> &[BlockState] {
        &self.states
    }

    pub fn spans(&self, index: usize) -> &[StyledSpan] {
        self.spans.get(index).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::HighlightStyle;

    const NOTE: &str = "# Title\n\nSome *text* here.\n\n```python\nprint(\"hi\")\nx = 1\n```\n\n> a quote\n> continues\n\n$$\na^2 + b^2\n$$\nafter";

    fn doc(text: &str) -> HighlightedDocument {
        let mut doc = HighlightedDocument::new(Highlighter::default());
        doc.set_text(text);
        doc
    }

    fn fresh_copy(doc: &HighlightedDocument) -> HighlightedDocument {
        self::doc(&doc.text())
    }

    fn assert_same(a: &HighlightedDocument, b: &HighlightedDocument) {
        assert_eq!(a.states(), b.states());
        for i in 0..a.len() {
            assert_eq!(a.spans(i), b.spans(i), "line {i}");
        }
    }

    #[test]
    fn test_highlighting_is_idempotent() {
        let mut first = doc(NOTE);
        let second = doc(NOTE);
        assert_same(&first, &second);

        first.rehighlight();
        assert_same(&first, &second);
    }

    #[test]
    fn test_states_inside_fenced_code() {
        let d = doc(NOTE);
        let code = BlockState::Open { rule: 1 };
        assert_eq!(d.state(4), Some(code));
        assert_eq!(d.state(5), Some(code));
        assert_eq!(d.state(6), Some(code));
        assert_eq!(d.state(7), Some(BlockState::Closed));
        for i in 5..=6 {
            let line_len = d.line(i).unwrap().len();
            assert!(d.spans(i).iter().any(|s| s.style == HighlightStyle::FencedCode && s.start == 0 && s.len == line_len));
        }
        assert_eq!(d.state(13), Some(BlockState::Open { rule: 2 }));
        assert_eq!(d.state(15), Some(BlockState::Closed));
    }

    #[test]
    fn test_opening_fence_propagates_downstream() {
        let mut d = doc("intro\nplain\n*text*\nmore");
        let touched = d.replace_line(0, "```");
        assert_eq!(touched, 0..4);
        assert!(d.states().iter().all(|s| *s == BlockState::Open { rule: 1 }));
        assert_same(&d, &fresh_copy(&d));

        let touched = d.replace_line(0, "intro");
        assert_eq!(touched, 0..4);
        assert!(d.states().iter().all(|s| *s == BlockState::Closed));
        assert!(d.spans(2).iter().any(|s| s.style == HighlightStyle::Emphasis));
    }

    #[test]
    fn test_local_edit_stops_early() {
        let mut d = doc("a\nb\nc\nd");
        assert_eq!(d.replace_line(1, "*b*"), 1..2);
        assert_same(&d, &fresh_copy(&d));
    }

    #[test]
    fn test_insert_and_remove_lines() {
        let mut d = doc("one\ntwo\nthree");
        d.insert_line(1, "```");
        assert_eq!(d.text(), "one\n```\ntwo\nthree");
        assert_same(&d, &fresh_copy(&d));
        assert_eq!(d.state(3), Some(BlockState::Open { rule: 1 }));

        d.remove_line(1);
        assert_eq!(d.text(), "one\ntwo\nthree");
        assert_same(&d, &fresh_copy(&d));
        assert!(d.states().iter().all(|s| *s == BlockState::Closed));

        assert_eq!(d.insert_line(99, "tail"), 3..4);
        assert_eq!(d.line(3), Some("tail"));
    }

    #[test]
    fn test_dictionary_change_rehighlights() {
        let mut d = doc("hello wrold");
        assert!(d.spans(0).is_empty());

        d.set_dictionary(Some(Dictionary::from_words(["hello", "world"])));
        let misspelled: Vec<_> = d.spans(0).iter().filter(|s| s.style == HighlightStyle::Misspelled).collect();
        assert_eq!(misspelled.len(), 1);
        assert_eq!(misspelled[0].start, 6);

        d.set_dictionary(None);
        assert!(d.spans(0).is_empty());
    }

    #[test]
    fn test_empty_document() {
        let d = HighlightedDocument::new(Highlighter::default());
        assert!(d.is_empty());
        assert_eq!(d.len(), 1);
        assert_eq!(d.text(), "");
    }
}
