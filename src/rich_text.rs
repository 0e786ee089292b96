// ABOUTME: Inline Markdown emphasis handling for slide text
// ABOUTME: Turns **bold**, *italic*, _italic_, `code` and [links](url) into styled runs

use comrak::nodes::{AstNode, NodeValue};
use comrak::{parse_document, Arena, ComrakOptions};

/// A piece of text with uniform formatting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyledRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub monospace: bool,
    /// Hyperlink target, if the run came from `[text](url)`
    pub link: Option<String>,
}

impl StyledRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    fn same_style(&self, other: &StyledRun) -> bool {
        self.bold == other.bold
            && self.italic == other.italic
            && self.monospace == other.monospace
            && self.link == other.link
    }
}

#[derive(Debug, Clone, Default)]
struct Style {
    bold: bool,
    italic: bool,
    link: Option<String>,
}

/// Split raw text into styled runs.
///
/// Inline markup is parsed by comrak, so unmatched or overlapping markers
/// stay literal the way CommonMark leaves them. Text that comrak would read
/// as a block construct (a list item, a heading, a rule) is returned as one
/// plain run. Never fails.
pub fn format(raw: &str) -> Vec<StyledRun> {
    let core = raw.trim();
    if core.is_empty() {
        return vec![StyledRun::plain(raw)];
    }
    let start = raw.len() - raw.trim_start().len();
    let leading = &raw[..start];
    let trailing = &raw[start + core.len()..];

    let arena = Arena::new();
    let options = ComrakOptions::default();
    // `&` is escaped so entity references keep their literal spelling.
    let root = parse_document(&arena, &core.replace('&', "\\&"), &options);

    let mut children = root.children();
    let paragraph = match (children.next(), children.next()) {
        (Some(node), None) if matches!(node.data.borrow().value, NodeValue::Paragraph) => node,
        _ => return vec![StyledRun::plain(raw)],
    };

    let mut runs = Vec::new();
    let plain = Style::default();
    push_run(&mut runs, leading.to_string(), &plain, false);
    for child in paragraph.children() {
        collect_runs(child, &plain, &mut runs);
    }
    push_run(&mut runs, trailing.to_string(), &plain, false);
    if runs.is_empty() {
        runs.push(StyledRun::plain(raw));
    }
    runs
}

/// Concatenated text of a run sequence.
pub fn plain_text(runs: &[StyledRun]) -> String {
    runs.iter().map(|r| r.text.as_str()).collect()
}

fn push_run(out: &mut Vec<StyledRun>, text: String, style: &Style, monospace: bool) {
    if text.is_empty() {
        return;
    }
    let run = StyledRun {
        text,
        bold: style.bold,
        italic: style.italic,
        monospace,
        link: style.link.clone(),
    };
    match out.last_mut() {
        Some(last) if last.same_style(&run) => last.text.push_str(&run.text),
        _ => out.push(run),
    }
}

fn collect_runs<'a>(node: &'a AstNode<'a>, style: &Style, out: &mut Vec<StyledRun>) {
    let inner = match &node.data.borrow().value {
        NodeValue::Text(text) => {
            push_run(out, text.clone(), style, false);
            return;
        }
        // Escapes are not processed inside code spans
        NodeValue::Code(code) => {
            push_run(out, code.literal.replace("\\&", "&"), style, true);
            return;
        }
        NodeValue::HtmlInline(html) => {
            push_run(out, html.clone(), style, false);
            return;
        }
        NodeValue::SoftBreak | NodeValue::LineBreak => {
            push_run(out, "\n".to_string(), style, false);
            return;
        }
        NodeValue::Emph => Style {
            italic: true,
            ..style.clone()
        },
        NodeValue::Strong => Style {
            bold: true,
            ..style.clone()
        },
        NodeValue::Link(link) if !link.url.trim().is_empty() => Style {
            link: Some(link.url.trim().to_string()),
            ..style.clone()
        },
        _ => style.clone(),
    };
    for child in node.children() {
        collect_runs(child, &inner, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn run(text: &str, bold: bool, italic: bool, monospace: bool) -> StyledRun {
        StyledRun {
            text: text.to_string(),
            bold,
            italic,
            monospace,
            link: None,
        }
    }

    #[test]
    fn test_plain_text_is_one_run() {
        for s in ["", "Hello world", "3 * 4 = 12", "snake_case_name", "a_b c_d", "AT&T &amp; co"] {
            assert_eq!(format(s), vec![StyledRun::plain(s)], "input {:?}", s);
        }
    }

    #[test]
    fn test_surrounding_whitespace_is_kept() {
        assert_eq!(format("  indented "), vec![StyledRun::plain("  indented ")]);
        assert_eq!(
            format("    **deep**"),
            vec![run("    ", false, false, false), run("deep", true, false, false)]
        );
    }

    #[test]
    fn test_bold_italic_code() {
        assert_eq!(
            format("a **b** *c* _d_ `e`"),
            vec![
                run("a ", false, false, false),
                run("b", true, false, false),
                run(" ", false, false, false),
                run("c", false, true, false),
                run(" ", false, false, false),
                run("d", false, true, false),
                run(" ", false, false, false),
                run("e", false, false, true),
            ]
        );
    }

    #[test]
    fn test_nested_italic_in_bold() {
        assert_eq!(
            format("**bold *both***"),
            vec![run("bold ", true, false, false), run("both", true, true, false)]
        );
        assert_eq!(format("***all***"), vec![run("all", true, true, false)]);
    }

    #[test]
    fn test_bold_inside_italic() {
        assert_eq!(
            format("*a **b** c*"),
            vec![
                run("a ", false, true, false),
                run("b", true, true, false),
                run(" c", false, true, false),
            ]
        );
    }

    #[test]
    fn test_unmatched_markers_stay_literal() {
        assert_eq!(format("**unclosed"), vec![StyledRun::plain("**unclosed")]);
        assert_eq!(format("a `tick"), vec![StyledRun::plain("a `tick")]);
        assert_eq!(format("* not italic *"), vec![StyledRun::plain("* not italic *")]);
        assert_eq!(format("a * b * c"), vec![StyledRun::plain("a * b * c")]);
    }

    #[test]
    fn test_block_syntax_is_plain_text() {
        for s in ["2024. A year in review", "# not a heading", "---", "> quoted", "[ref]: /url"] {
            assert_eq!(format(s), vec![StyledRun::plain(s)], "input {:?}", s);
        }
    }

    #[test]
    fn test_code_is_opaque() {
        assert_eq!(format("`**x**`"), vec![run("**x**", false, false, true)]);
        assert_eq!(format("`a&b`"), vec![run("a&b", false, false, true)]);
    }

    #[test]
    fn test_link() {
        let runs = format("see [the docs](https://example.com) now");
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[1].text, "the docs");
        assert_eq!(runs[1].link.as_deref(), Some("https://example.com"));
        assert_eq!(plain_text(&runs), "see the docs now");
    }

    #[test]
    fn test_escaped_marker() {
        assert_eq!(format(r"\*literal\*"), vec![StyledRun::plain("*literal*")]);
    }

    #[test]
    fn test_concatenation_drops_only_markers() {
        let runs = format("Mix **bold**, *it*, `code` and _more_.");
        assert_eq!(plain_text(&runs), "Mix bold, it, code and more.");
    }

    #[test]
    fn test_hundreds_of_unclosed_markers_finish_quickly() {
        let started = Instant::now();
        for marker in ["*a ", "_a ", "**a ", "x *"] {
            let text = marker.repeat(500);
            let runs = format(&text);
            assert_eq!(plain_text(&runs), text, "marker {:?}", marker);
            assert!(runs.iter().all(|r| !r.bold && !r.italic));
        }
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    /// Small deterministic generator for marker soups.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> usize {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 33) as usize
        }
    }

    #[test]
    fn test_marker_soup_keeps_every_letter_in_order() {
        let pieces = ["*", "**", "_", "__", "`", "a", "b", " ", "x", "[", "]", "(#)"];
        let mut rng = Lcg(7);
        let started = Instant::now();
        for _ in 0..300 {
            let len = 20 + rng.next() % 400;
            let soup: String = (0..len).map(|_| pieces[rng.next() % pieces.len()]).collect();
            let text = plain_text(&format(&soup));

            // Only markup characters may disappear; letters survive in order
            let letters = |s: &str| s.chars().filter(|c| c.is_alphanumeric()).collect::<String>();
            assert_eq!(letters(&text), letters(&soup), "soup {:?}", soup);
            assert!(text.chars().count() <= soup.chars().count());
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_deep_nesting_finishes_quickly() {
        let started = Instant::now();
        for depth in [50, 200, 400] {
            let text = format!("{}core{}", "*".repeat(depth), "*".repeat(depth));
            let runs = format(&text);
            assert_eq!(plain_text(&runs), "core", "depth {}", depth);
            assert!(runs[0].bold);

            let unbalanced = format!("{}core", "_".repeat(depth));
            assert_eq!(plain_text(&format(&unbalanced)), unbalanced);
        }
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
