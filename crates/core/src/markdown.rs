//! CommonMark to [`Node`] tree, using mdast type names.

use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};

use crate::node::{Node, Position};

fn options() -> Options {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_FOOTNOTES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);
    opts
}

/// Splits a leading `---` fenced YAML block off `source`, returning the raw
/// block (without fences) and the byte offset where the body starts.
pub fn split_front_matter(source: &str) -> Option<(&str, usize)> {
    let rest = source
        .strip_prefix("---\n")
        .or_else(|| source.strip_prefix("---\r\n"))?;
    let open = source.len() - rest.len();
    let mut offset = 0usize;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let body_start = open + offset + line.len();
            return Some((&rest[..offset], body_start));
        }
        offset += line.len();
    }
    None
}

pub fn parse(source: &str) -> Node {
    let mut builder = TreeBuilder::new(source.len());
    let body_start = match split_front_matter(source) {
        Some((yaml, body_start)) => {
            builder.append(
                Node::leaf("yaml", yaml.trim_end_matches(['\r', '\n'])).with_position(Position {
                    start: 0,
                    end: body_start,
                }),
            );
            body_start
        }
        None => 0,
    };
    let body = &source[body_start..];
    for (event, range) in Parser::new_ext(body, options()).into_offset_iter() {
        let range = (range.start + body_start)..(range.end + body_start);
        builder.event(event, range);
    }
    builder.finish()
}

struct TreeBuilder {
    stack: Vec<Node>,
}

impl TreeBuilder {
    fn new(len: usize) -> Self {
        let root = Node::new("root").with_position(Position { start: 0, end: len });
        Self { stack: vec![root] }
    }

    fn top(&mut self) -> &mut Node {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn event(&mut self, event: Event<'_>, range: Range<usize>) {
        let position = Position {
            start: range.start,
            end: range.end,
        };
        match event {
            Event::Start(tag) => {
                let node = open_tag(tag).with_position(position);
                self.stack.push(node);
            }
            Event::End(_) => self.close(),
            Event::Text(text) => self.text(&text, position),
            Event::SoftBreak => self.text("\n", position),
            Event::Code(code) => {
                self.append(Node::leaf("inlineCode", &*code).with_position(position))
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                if self.top().kind == "html" {
                    let top = self.top();
                    top.value.get_or_insert_with(String::new).push_str(&html);
                } else {
                    self.append(Node::leaf("html", &*html).with_position(position));
                }
            }
            Event::FootnoteReference(label) => self.append(
                Node::new("footnoteReference")
                    .with_attr("label", &*label)
                    .with_position(position),
            ),
            Event::HardBreak => self.append(Node::new("break").with_position(position)),
            Event::Rule => self.append(Node::new("thematicBreak").with_position(position)),
            Event::TaskListMarker(checked) => {
                if let Some(item) = self.stack.iter_mut().rev().find(|n| n.kind == "listItem") {
                    item.attributes.insert("checked".to_string(), checked.into());
                }
            }
            #[allow(unreachable_patterns)]
            _ => {}
        }
    }

    fn text(&mut self, text: &str, position: Position) {
        let top = self.top();
        match top.kind.as_str() {
            "code" | "yaml" => {
                top.value.get_or_insert_with(String::new).push_str(text);
                return;
            }
            "image" => {
                let alt = top
                    .attributes
                    .entry("alt".to_string())
                    .or_insert_with(|| "".into());
                let merged = format!("{}{}", alt.as_str().unwrap_or(""), text);
                *alt = merged.into();
                return;
            }
            _ => {}
        }
        if let Some(last) = top.children.last_mut() {
            if last.kind == "text" {
                last.value.get_or_insert_with(String::new).push_str(text);
                if let Some(pos) = last.position.as_mut() {
                    pos.end = pos.end.max(position.end);
                }
                return;
            }
        }
        top.children.push(Node::text(text).with_position(position));
    }

    fn append(&mut self, node: Node) {
        self.top().children.push(node);
    }

    fn close(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        if let Some(node) = self.stack.pop() {
            self.append(node);
        }
    }

    fn finish(mut self) -> Node {
        while self.stack.len() > 1 {
            self.close();
        }
        self.stack.pop().unwrap_or_else(|| Node::new("root"))
    }
}

fn open_tag(tag: Tag<'_>) -> Node {
    match tag {
        Tag::Paragraph => Node::new("paragraph"),
        Tag::Heading { level, .. } => Node::new("heading").with_attr("depth", level as u64),
        Tag::BlockQuote { .. } => Node::new("blockquote"),
        Tag::CodeBlock(kind) => {
            let mut node = Node::leaf("code", "");
            if let CodeBlockKind::Fenced(info) = kind {
                if let Some(lang) = info.split_whitespace().next() {
                    node = node.with_attr("lang", lang);
                }
            }
            node
        }
        Tag::HtmlBlock => Node::leaf("html", ""),
        Tag::List(start) => {
            let mut node = Node::new("list").with_attr("ordered", start.is_some());
            if let Some(start) = start {
                node = node.with_attr("start", start);
            }
            node
        }
        Tag::Item => Node::new("listItem"),
        Tag::FootnoteDefinition(label) => {
            Node::new("footnoteDefinition").with_attr("label", &*label)
        }
        Tag::Table(_) => Node::new("table"),
        Tag::TableHead => Node::new("tableRow").with_attr("head", true),
        Tag::TableRow => Node::new("tableRow"),
        Tag::TableCell => Node::new("tableCell"),
        Tag::Emphasis => Node::new("emphasis"),
        Tag::Strong => Node::new("strong"),
        Tag::Strikethrough => Node::new("delete"),
        Tag::Link {
            dest_url, title, ..
        } => Node::new("link")
            .with_attr("url", &*dest_url)
            .with_attr("title", &*title),
        Tag::Image {
            dest_url, title, ..
        } => Node::new("image")
            .with_attr("url", &*dest_url)
            .with_attr("title", &*title)
            .with_attr("alt", ""),
        #[allow(unreachable_patterns)]
        _ => Node::new("unknown"),
    }
}
