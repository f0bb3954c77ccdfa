//! Draws highlighted lines as ANSI-colored text for the terminal.

use crossterm::style::{Attribute, Color, ContentStyle};

use crate::config::{parse_hex_color, HighlightTheme};
use crate::highlight::{HighlightStyle, StyledSpan};

/// Highlight colors parsed from the `[highlight]` table.
#[derive(Debug, Clone)]
pub struct Palette {
    pub quote: Color,
    pub fenced_code: Color,
    pub block_math: Color,
    pub list_item: Color,
    pub header: Color,
    pub horizontal_rule: Color,
    pub table_of_contents: Color,
    pub link: Color,
    pub link_reference: Color,
    pub emphasis: Color,
    pub inline_code: Color,
    pub inline_math: Color,
    pub misspelled: Color,
    pub bold_items: bool,
}

impl Palette {
    pub fn from_theme(theme: &HighlightTheme) -> Self {
        Self {
            quote: parse_hex_color(&theme.quote),
            fenced_code: parse_hex_color(&theme.fenced_code),
            block_math: parse_hex_color(&theme.block_math),
            list_item: parse_hex_color(&theme.list_item),
            header: parse_hex_color(&theme.header),
            horizontal_rule: parse_hex_color(&theme.horizontal_rule),
            table_of_contents: parse_hex_color(&theme.table_of_contents),
            link: parse_hex_color(&theme.link),
            link_reference: parse_hex_color(&theme.link_reference),
            emphasis: parse_hex_color(&theme.emphasis),
            inline_code: parse_hex_color(&theme.inline_code),
            inline_math: parse_hex_color(&theme.inline_math),
            misspelled: parse_hex_color(&theme.misspelled),
            bold_items: theme.bold_items,
        }
    }

    pub fn color(&self, style: HighlightStyle) -> Color {
        match style {
            HighlightStyle::Quote => self.quote,
            HighlightStyle::FencedCode => self.fenced_code,
            HighlightStyle::BlockMath => self.block_math,
            HighlightStyle::ListItem => self.list_item,
            HighlightStyle::Header => self.header,
            HighlightStyle::HorizontalRule => self.horizontal_rule,
            HighlightStyle::TableOfContents => self.table_of_contents,
            HighlightStyle::Link => self.link,
            HighlightStyle::LinkReference => self.link_reference,
            HighlightStyle::Emphasis => self.emphasis,
            HighlightStyle::InlineCode => self.inline_code,
            HighlightStyle::InlineMath => self.inline_math,
            HighlightStyle::Misspelled => self.misspelled,
        }
    }

    /// Resolves the style of every byte of a line of `len` bytes. Spans are
    /// applied in order, so a later span wins over an earlier one.
    pub fn resolve(&self, len: usize, spans: &[StyledSpan]) -> Vec<ContentStyle> {
        let mut styles = vec![ContentStyle::new(); len];
        for span in spans {
            let end = span.end().min(len);
            for style in styles.iter_mut().take(end).skip(span.start) {
                match span.style {
                    HighlightStyle::Misspelled => {
                        style.attributes.set(Attribute::Underlined);
                        style.underline_color = Some(self.misspelled);
                    }
                    other => {
                        style.foreground_color = Some(self.color(other));
                        if self.bold_items && other.is_item() {
                            style.attributes.set(Attribute::Bold);
                        }
                    }
                }
            }
        }
        styles
    }

    /// The line with ANSI escapes, one styled run per change of style.
    pub fn paint_line(&self, text: &str, spans: &[StyledSpan]) -> String {
        if text.is_empty() {
            return String::new();
        }
        let styles = self.resolve(text.len(), spans);
        let mut out = String::new();
        let mut run_start = 0;

        for (i, _) in text.char_indices().skip(1).chain([(text.len(), ' ')]) {
            if i < text.len() && styles[i] == styles[run_start] {
                continue;
            }
            let run = &text[run_start..i];
            if styles[run_start] == ContentStyle::new() {
                out.push_str(run);
            } else {
                out.push_str(&styles[run_start].apply(run).to_string());
            }
            run_start = i;
        }
        out
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::from_theme(&HighlightTheme::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::Highlighter;

    fn span(start: usize, len: usize, style: HighlightStyle) -> StyledSpan {
        StyledSpan { start, len, style }
    }

    #[test]
    fn test_later_span_wins() {
        let palette = Palette::default();
        let spans = [span(0, 10, HighlightStyle::Header), span(2, 3, HighlightStyle::Emphasis)];
        let styles = palette.resolve(10, &spans);

        assert_eq!(styles[0].foreground_color, Some(palette.header));
        assert_eq!(styles[2].foreground_color, Some(palette.emphasis));
        assert_eq!(styles[5].foreground_color, Some(palette.header));
        assert!(styles[0].attributes.has(Attribute::Bold));
        assert!(styles[2].attributes.has(Attribute::Bold));
    }

    #[test]
    fn test_misspelled_keeps_color() {
        let palette = Palette::default();
        let spans = [span(0, 5, HighlightStyle::Link), span(1, 2, HighlightStyle::Misspelled)];
        let styles = palette.resolve(5, &spans);

        assert_eq!(styles[1].foreground_color, Some(palette.link));
        assert!(styles[1].attributes.has(Attribute::Underlined));
        assert!(!styles[0].attributes.has(Attribute::Underlined));
    }

    #[test]
    fn test_bold_items_off() {
        let theme = HighlightTheme { bold_items: false, ..HighlightTheme::default() };
        let palette = Palette::from_theme(&theme);
        let styles = palette.resolve(3, &[span(0, 3, HighlightStyle::ListItem)]);
        assert!(!styles[0].attributes.has(Attribute::Bold));
    }

    #[test]
    fn test_plain_line_is_unchanged() {
        let palette = Palette::default();
        assert_eq!(palette.paint_line("just text", &[]), "just text");
        assert_eq!(palette.paint_line("", &[]), "");
    }

    #[test]
    fn test_paint_keeps_text() {
        let palette = Palette::default();
        let text = "# Hello *wörld*";
        let result = Highlighter::default().highlight_line(text, Default::default());
        let painted = palette.paint_line(text, &result.spans);

        assert!(painted.contains('\x1b'));
        assert!(painted.contains("*wörld*"));
        assert!(painted.contains("Hello "));
    }
}
