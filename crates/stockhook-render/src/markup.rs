//! Minimal structured-text renderer
//!
//! Turns loosely formatted text (the subset of Markdown webhook senders tend to use)
//! into a [`Document`] tree. The tree holds plain, unescaped text only; the page
//! templates escape every string exactly once when they emit HTML, so no input byte
//! can ever become markup.
//!
//! The grammar is fixed and small. Blocks are recognised line by line by a stateful
//! scanner: fenced code, ATX headings, thematic breaks, single-level quotes, ordered
//! and unordered list items, and paragraphs. Inline processing applies code spans,
//! bold, italic and links in that order. There is no auto-linking, no nesting of
//! lists or quotes, no tables and no raw HTML.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}(#{1,6})\s+(.+?)\s*$").expect("heading regex is valid"));

static RULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}(-{3,}|\*{3,})\s*$").expect("rule regex is valid"));

static QUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}>\s?(.*)$").expect("quote regex is valid"));

static ORDERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}(\d+)\.\s+(.+)$").expect("ordered item regex is valid"));

static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}[-*+]\s+(.+)$").expect("bullet item regex is valid"));

const FENCE: &str = "```";

/// Link schemes that may appear in an `href`. Targets without a scheme are relative.
const ALLOWED_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Rendered document: a flat sequence of blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Document {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Heading { level: u8, content: Vec<Inline> },
    Paragraph { content: Vec<Inline> },
    CodeBlock { code: String },
    Rule,
    Quote { content: Vec<Inline> },
    List { ordered: bool, items: Vec<Vec<Inline>> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inline {
    Text { text: String },
    Code { code: String },
    Strong { content: Vec<Inline> },
    Emphasis { content: Vec<Inline> },
    Link { href: String, content: Vec<Inline> },
}

impl Document {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Level and text of an ATX heading line (`## Title`).
pub(crate) fn heading(line: &str) -> Option<(usize, &str)> {
    let caps = HEADING_RE.captures(line)?;
    let level = caps.get(1)?.as_str().len();
    let text = caps.get(2)?.as_str();
    Some((level, text))
}

/// Render `text` into a document tree.
pub fn render(text: &str) -> Document {
    let mut scanner = Scanner::default();
    for line in text.lines() {
        scanner.line(line);
    }
    scanner.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Ordered,
    Unordered,
}

#[derive(Default)]
struct Scanner {
    blocks: Vec<Block>,
    paragraph: Vec<String>,
    list: Option<(ListKind, Vec<Vec<Inline>>)>,
    code: Option<Vec<String>>,
}

impl Scanner {
    fn line(&mut self, line: &str) {
        if line.trim().starts_with(FENCE) {
            match self.code.take() {
                Some(code) => self.push_code(code),
                None => {
                    self.close_open_blocks();
                    self.code = Some(Vec::new());
                }
            }
            return;
        }

        if let Some(code) = self.code.as_mut() {
            code.push(line.to_string());
            return;
        }

        if line.trim().is_empty() {
            self.close_open_blocks();
            return;
        }

        if let Some((level, text)) = heading(line) {
            self.close_open_blocks();
            self.blocks.push(Block::Heading {
                level: level as u8,
                content: parse_inline(text.trim()),
            });
        } else if RULE_RE.is_match(line) {
            self.close_open_blocks();
            self.blocks.push(Block::Rule);
        } else if let Some(caps) = QUOTE_RE.captures(line) {
            self.close_open_blocks();
            let text = caps.get(1).map_or("", |m| m.as_str());
            self.blocks.push(Block::Quote {
                content: parse_inline(text.trim()),
            });
        } else if let Some(item) = ORDERED_RE.captures(line).and_then(|c| c.get(2)) {
            self.push_item(ListKind::Ordered, item.as_str());
        } else if let Some(item) = BULLET_RE.captures(line).and_then(|c| c.get(1)) {
            self.push_item(ListKind::Unordered, item.as_str());
        } else {
            self.close_list();
            self.paragraph.push(line.to_string());
        }
    }

    fn push_item(&mut self, kind: ListKind, text: &str) {
        self.flush_paragraph();
        if self.list.as_ref().is_some_and(|(open, _)| *open != kind) {
            self.close_list();
        }
        let (_, items) = self.list.get_or_insert_with(|| (kind, Vec::new()));
        items.push(parse_inline(text.trim()));
    }

    fn push_code(&mut self, lines: Vec<String>) {
        self.blocks.push(Block::CodeBlock {
            code: lines.join("\n"),
        });
    }

    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        let joined = self
            .paragraph
            .drain(..)
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        self.blocks.push(Block::Paragraph {
            content: parse_inline(&joined),
        });
    }

    fn close_list(&mut self) {
        if let Some((kind, items)) = self.list.take() {
            self.blocks.push(Block::List {
                ordered: kind == ListKind::Ordered,
                items,
            });
        }
    }

    fn close_open_blocks(&mut self) {
        self.flush_paragraph();
        self.close_list();
    }

    fn finish(mut self) -> Document {
        // An unterminated fence still renders what it collected.
        if let Some(code) = self.code.take() {
            self.push_code(code);
        }
        self.close_open_blocks();
        Document {
            blocks: self.blocks,
        }
    }
}

/// Working token of the inline pass: a raw character or an already-built node.
///
/// Nodes are opaque to later stages, so a span can contain a finished node but can
/// never start or end inside one.
#[derive(Debug)]
enum Tok {
    Char(char),
    Node(Inline),
}

impl Tok {
    fn is(&self, c: char) -> bool {
        matches!(self, Tok::Char(t) if *t == c)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Code,
    Strong,
    Emphasis,
    Link,
}

const STAGES: [Stage; 4] = [Stage::Code, Stage::Strong, Stage::Emphasis, Stage::Link];

/// A match found by one stage.
struct Span {
    start: usize,
    inner: Range<usize>,
    end: usize,
    href: Option<String>,
}

/// Parse inline constructs in a single line of text.
pub fn parse_inline(text: &str) -> Vec<Inline> {
    let toks = text.chars().map(Tok::Char).collect();
    collapse(apply(toks, &STAGES))
}

fn apply(mut toks: Vec<Tok>, stages: &[Stage]) -> Vec<Tok> {
    for (i, stage) in stages.iter().enumerate() {
        toks = stage.run(toks, &stages[i + 1..]);
    }
    toks
}

/// Merge runs of characters into text nodes.
fn collapse(toks: Vec<Tok>) -> Vec<Inline> {
    let mut out = Vec::new();
    let mut text = String::new();
    for tok in toks {
        match tok {
            Tok::Char(c) => text.push(c),
            Tok::Node(node) => {
                if !text.is_empty() {
                    out.push(Inline::Text {
                        text: std::mem::take(&mut text),
                    });
                }
                out.push(node);
            }
        }
    }
    if !text.is_empty() {
        out.push(Inline::Text { text });
    }
    out
}

impl Stage {
    /// Replace every match of this stage with a node. The contents of a node are
    /// processed by the stages that follow this one.
    fn run(self, toks: Vec<Tok>, later: &[Stage]) -> Vec<Tok> {
        let spans = self.find_spans(&toks);
        if spans.is_empty() {
            return toks;
        }

        let mut out = Vec::with_capacity(toks.len());
        let mut rest = toks.into_iter();
        let mut pos = 0;
        for span in spans {
            out.extend(rest.by_ref().take(span.start - pos));
            rest.by_ref()
                .take(span.inner.start - span.start)
                .for_each(drop);
            let inner: Vec<Tok> = rest.by_ref().take(span.inner.len()).collect();
            rest.by_ref().take(span.end - span.inner.end).for_each(drop);
            pos = span.end;

            out.push(Tok::Node(self.build(inner, span.href, later)));
        }
        out.extend(rest);
        out
    }

    fn build(self, inner: Vec<Tok>, href: Option<String>, later: &[Stage]) -> Inline {
        match self {
            // Code spans are literal.
            Stage::Code => Inline::Code {
                code: inner
                    .iter()
                    .filter_map(|t| match t {
                        Tok::Char(c) => Some(*c),
                        Tok::Node(_) => None,
                    })
                    .collect(),
            },
            Stage::Strong => Inline::Strong {
                content: collapse(apply(inner, later)),
            },
            Stage::Emphasis => Inline::Emphasis {
                content: collapse(apply(inner, later)),
            },
            Stage::Link => Inline::Link {
                href: href.unwrap_or_default(),
                content: collapse(apply(inner, later)),
            },
        }
    }

    /// Leftmost, non-overlapping matches.
    fn find_spans(self, toks: &[Tok]) -> Vec<Span> {
        let (delim, guarded) = match self {
            Stage::Code => ("`", false),
            Stage::Strong => ("**", false),
            Stage::Emphasis => ("*", true),
            Stage::Link => return find_links(toks),
        };

        let mut spans = Vec::new();
        let mut i = 0;
        while i < toks.len() {
            match find_delimited(toks, i, delim, guarded) {
                Some(span) => {
                    i = span.end;
                    spans.push(span);
                }
                None => i += 1,
            }
        }
        spans
    }
}

fn delimiter_at(toks: &[Tok], at: usize, delim: &str) -> bool {
    let mut chars = delim.chars();
    let matched = chars
        .by_ref()
        .zip(toks.iter().skip(at))
        .all(|(c, tok)| tok.is(c));
    matched && at + delim.chars().count() <= toks.len()
}

/// `<delim>content<delim>` where the content is non-empty and free of the delimiter's
/// first character. A guarded match may not touch another delimiter character on
/// either side, which keeps `*em*` from matching inside `**strong**`.
fn find_delimited(toks: &[Tok], at: usize, delim: &str, guarded: bool) -> Option<Span> {
    let stop = delim.chars().next()?;
    let width = delim.chars().count();

    if !delimiter_at(toks, at, delim) {
        return None;
    }
    if guarded && at > 0 && toks[at - 1].is(stop) {
        return None;
    }

    let inner_start = at + width;
    let inner_end = (inner_start..toks.len())
        .find(|&j| toks[j].is(stop))
        .unwrap_or(toks.len());
    if inner_end == inner_start || !delimiter_at(toks, inner_end, delim) {
        return None;
    }

    let end = inner_end + width;
    if guarded && toks.get(end).is_some_and(|t| t.is(stop)) {
        return None;
    }

    Some(Span {
        start: at,
        inner: inner_start..inner_end,
        end,
        href: None,
    })
}

/// For every position, the index of the first token at or after it that matches
/// `pred`, or `toks.len()` when there is none.
fn next_index(toks: &[Tok], pred: impl Fn(&Tok) -> bool) -> Vec<usize> {
    let mut next = vec![toks.len(); toks.len() + 1];
    for j in (0..toks.len()).rev() {
        next[j] = if pred(&toks[j]) { j } else { next[j + 1] };
    }
    next
}

/// `[label](target)` spans, leftmost and non-overlapping. The target must be plain
/// characters with an allowed scheme.
///
/// Runs in linear time: bracket lookups come from precomputed tables, and a target
/// is parsed once per closing `]` however many `[` share it.
fn find_links(toks: &[Tok]) -> Vec<Span> {
    let next_close = next_index(toks, |t| t.is(']'));
    let next_paren = next_index(toks, |t| t.is(')'));
    let next_node = next_index(toks, |t| matches!(t, Tok::Node(_)));

    let mut cached: Option<(usize, Option<(usize, String)>)> = None;
    let mut spans = Vec::new();
    let mut i = 0;
    while i < toks.len() {
        if !toks[i].is('[') {
            i += 1;
            continue;
        }

        let label_start = i + 1;
        let label_end = next_close[label_start];
        if label_end == toks.len() {
            break;
        }
        if label_end == label_start || !toks.get(label_end + 1).is_some_and(|t| t.is('(')) {
            i += 1;
            continue;
        }

        let target = match &cached {
            Some((end, target)) if *end == label_end => target.clone(),
            _ => {
                let target = link_target(toks, label_end + 2, &next_paren, &next_node);
                cached = Some((label_end, target.clone()));
                target
            }
        };

        match target {
            Some((close, href)) => {
                spans.push(Span {
                    start: i,
                    inner: label_start..label_end,
                    end: close + 1,
                    href: Some(href),
                });
                i = close + 1;
            }
            None => i += 1,
        }
    }
    spans
}

/// Target text starting at `start` up to the next `)`, with the index of that `)`.
fn link_target(
    toks: &[Tok],
    start: usize,
    next_paren: &[usize],
    next_node: &[usize],
) -> Option<(usize, String)> {
    let close = *next_paren.get(start)?;
    if close == toks.len() || next_node[start] < close {
        return None;
    }
    let target: String = toks[start..close]
        .iter()
        .filter_map(|t| match t {
            Tok::Char(c) => Some(*c),
            Tok::Node(_) => None,
        })
        .collect();
    (!target.is_empty() && is_safe_href(&target)).then_some((close, target))
}

/// Relative targets and targets with an allow-listed scheme.
fn is_safe_href(target: &str) -> bool {
    let target = target.trim();
    let scheme_end = target.find(|c: char| matches!(c, ':' | '/' | '?' | '#'));
    match scheme_end {
        Some(idx) if target[idx..].starts_with(':') => {
            let scheme = target[..idx].to_ascii_lowercase();
            ALLOWED_SCHEMES.contains(&scheme.as_str())
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Inline {
        Inline::Text {
            text: s.to_string(),
        }
    }

    #[test]
    fn heading_list_and_escaped_markup() {
        let doc = render("# Hi\n\n- a\n- b\n\n**bold** and <script>");
        assert_eq!(
            doc.blocks,
            vec![
                Block::Heading {
                    level: 1,
                    content: vec![text("Hi")],
                },
                Block::List {
                    ordered: false,
                    items: vec![vec![text("a")], vec![text("b")]],
                },
                Block::Paragraph {
                    content: vec![
                        Inline::Strong {
                            content: vec![text("bold")],
                        },
                        text(" and <script>"),
                    ],
                },
            ]
        );
    }

    #[test]
    fn paragraph_lines_are_joined() {
        let doc = render("  first line  \nsecond line\n\nnext");
        assert_eq!(
            doc.blocks,
            vec![
                Block::Paragraph {
                    content: vec![text("first line second line")],
                },
                Block::Paragraph {
                    content: vec![text("next")],
                },
            ]
        );
    }

    #[test]
    fn fenced_code_is_verbatim() {
        let doc = render("before\n```rust\nlet x = **1**;\n  <b>\n```\nafter");
        assert_eq!(
            doc.blocks,
            vec![
                Block::Paragraph {
                    content: vec![text("before")],
                },
                Block::CodeBlock {
                    code: "let x = **1**;\n  <b>".to_string(),
                },
                Block::Paragraph {
                    content: vec![text("after")],
                },
            ]
        );
    }

    #[test]
    fn unterminated_fence_still_renders() {
        let doc = render("```\ncode");
        assert_eq!(
            doc.blocks,
            vec![Block::CodeBlock {
                code: "code".to_string(),
            }]
        );
    }

    #[test]
    fn heading_levels_and_limits() {
        let doc = render("###### six\n####### seven\n#nospace");
        assert_eq!(
            doc.blocks,
            vec![
                Block::Heading {
                    level: 6,
                    content: vec![text("six")],
                },
                Block::Paragraph {
                    content: vec![text("####### seven #nospace")],
                },
            ]
        );
    }

    #[test]
    fn rules_and_quotes() {
        let doc = render("para\n---\n> quoted *x*\n***");
        assert_eq!(
            doc.blocks,
            vec![
                Block::Paragraph {
                    content: vec![text("para")],
                },
                Block::Rule,
                Block::Quote {
                    content: vec![
                        text("quoted "),
                        Inline::Emphasis {
                            content: vec![text("x")],
                        },
                    ],
                },
                Block::Rule,
            ]
        );
    }

    #[test]
    fn switching_list_kind_starts_new_list() {
        let doc = render("1. one\n2. two\n- dash\n* star\n+ plus");
        assert_eq!(
            doc.blocks,
            vec![
                Block::List {
                    ordered: true,
                    items: vec![vec![text("one")], vec![text("two")]],
                },
                Block::List {
                    ordered: false,
                    items: vec![vec![text("dash")], vec![text("star")], vec![text("plus")]],
                },
            ]
        );
    }

    #[test]
    fn paragraph_line_closes_list() {
        let doc = render("- a\nloose\n- b");
        assert_eq!(doc.blocks.len(), 3);
        assert!(matches!(doc.blocks[1], Block::Paragraph { .. }));
    }

    #[test]
    fn empty_input_is_empty_document() {
        assert!(render("").is_empty());
        assert!(render("\n   \n").is_empty());
    }

    #[test]
    fn code_spans_are_literal() {
        assert_eq!(
            parse_inline("run `**not bold** [x](http://a)` now"),
            vec![
                text("run "),
                Inline::Code {
                    code: "**not bold** [x](http://a)".to_string(),
                },
                text(" now"),
            ]
        );
    }

    #[test]
    fn emphasis_does_not_match_inside_strong_markers() {
        assert_eq!(
            parse_inline("**a*"),
            vec![text("**a*")]
        );
        assert_eq!(
            parse_inline("*one* and **two**"),
            vec![
                Inline::Emphasis {
                    content: vec![text("one")],
                },
                text(" and "),
                Inline::Strong {
                    content: vec![text("two")],
                },
            ]
        );
    }

    #[test]
    fn emphasis_can_wrap_strong() {
        assert_eq!(
            parse_inline("*a **b** c*"),
            vec![Inline::Emphasis {
                content: vec![
                    text("a "),
                    Inline::Strong {
                        content: vec![text("b")],
                    },
                    text(" c"),
                ],
            }]
        );
    }

    #[test]
    fn links() {
        assert_eq!(
            parse_inline("see [the **docs**](https://example.com/a?b=1&c=2)"),
            vec![
                text("see "),
                Inline::Link {
                    href: "https://example.com/a?b=1&c=2".to_string(),
                    content: vec![
                        text("the "),
                        Inline::Strong {
                            content: vec![text("docs")],
                        },
                    ],
                },
            ]
        );

        assert_eq!(
            parse_inline("[rel](/view?id=x)"),
            vec![Inline::Link {
                href: "/view?id=x".to_string(),
                content: vec![text("rel")],
            }]
        );
    }

    #[test]
    fn strong_can_contain_link() {
        assert_eq!(
            parse_inline("**[x](mailto:a@b.c)**"),
            vec![Inline::Strong {
                content: vec![Inline::Link {
                    href: "mailto:a@b.c".to_string(),
                    content: vec![text("x")],
                }],
            }]
        );
    }

    #[test]
    fn unsafe_link_targets_stay_text() {
        for input in [
            "[x](javascript:alert(1))",
            "[x](JavaScript:alert`1`)",
            "[x](data:text/html,hi)",
            "[x](vbscript:msgbox)",
        ] {
            let inlines = parse_inline(input);
            assert!(
                !inlines.iter().any(|i| matches!(i, Inline::Link { .. })),
                "linked {:?}",
                input
            );
        }
    }

    #[test]
    fn link_target_cannot_contain_nodes() {
        let inlines = parse_inline("[x](http://a/`b`)");
        assert!(!inlines.iter().any(|i| matches!(i, Inline::Link { .. })));
    }

    #[test]
    fn unmatched_markers_are_text() {
        assert_eq!(parse_inline("a * b ` c [d] (e)"), vec![text("a * b ` c [d] (e)")]);
        assert_eq!(parse_inline("``"), vec![text("``")]);
        assert_eq!(parse_inline("****"), vec![text("****")]);
    }

    #[test]
    fn serialized_shape() {
        let doc = render("# T\n---");
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "blocks": [
                    {"kind": "heading", "level": 1, "content": [{"kind": "text", "text": "T"}]},
                    {"kind": "rule"}
                ]
            })
        );
    }

    #[test]
    fn unbalanced_brackets_render_in_linear_time() {
        let n = 256 * 1024;
        let inputs = [
            "[".repeat(n),
            format!("{}x](javascript:alert(1))", "[".repeat(n)),
            format!("{}x](", "[".repeat(n)),
            "[a](".repeat(n / 4),
        ];
        for input in inputs {
            let start = std::time::Instant::now();
            let doc = render(&input);
            assert_eq!(doc.blocks.len(), 1);
            assert!(
                start.elapsed() < std::time::Duration::from_secs(5),
                "render took {:?}",
                start.elapsed()
            );
        }
    }

    #[test]
    fn shared_label_end_still_links_from_the_leftmost_bracket() {
        assert_eq!(
            parse_inline("[[x](https://a.b)"),
            vec![Inline::Link {
                href: "https://a.b".to_string(),
                content: vec![text("[x")],
            }]
        );
        assert_eq!(
            parse_inline("[[x](javascript:a) [y](/ok)"),
            vec![
                text("[[x](javascript:a) "),
                Inline::Link {
                    href: "/ok".to_string(),
                    content: vec![text("y")],
                },
            ]
        );
    }
}
