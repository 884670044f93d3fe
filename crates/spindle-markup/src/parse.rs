//! Markup-to-tree parsing.
//!
//! Accepts the dialect emitted by [`crate::serialize`]. The engine round
//! trip depends on parse(serialize(tree)) reproducing the tree, so the
//! parser is strict about tag structure but permissive about unknown
//! attributes (they are dropped, except `style`).

use smol_str::SmolStr;

use crate::tree::{BlockKind, NodeId, NodeKind, SpanKind, SpanNode, Tree};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),
    #[error("unexpected closing tag </{found}> at byte {at}")]
    UnexpectedClose { found: SmolStr, at: usize },
    #[error("mismatched closing tag at byte {at}: expected </{expected}>, found </{found}>")]
    MismatchedClose {
        expected: SmolStr,
        found: SmolStr,
        at: usize,
    },
    #[error("unknown tag <{tag}> at byte {at}")]
    UnknownTag { tag: SmolStr, at: usize },
}

/// Parse a whole document into a fresh tree.
pub fn parse_document(input: &str) -> Result<Tree, ParseError> {
    let mut tree = Tree::new();
    let roots = parse_fragment(&mut tree, input)?;
    for node in roots {
        let root = tree.root();
        tree.append_child(root, node);
    }
    Ok(tree)
}

/// Parse markup into detached nodes allocated in an existing arena.
///
/// Nothing is attached to the tree; the caller decides where the parsed
/// nodes go, which lets a failed parse leave the tree untouched.
pub fn parse_fragment(tree: &mut Tree, input: &str) -> Result<Vec<NodeId>, ParseError> {
    let mut parser = Parser {
        input,
        pos: 0,
        tree,
    };
    let nodes = parser.parse_nodes(None)?;
    Ok(nodes)
}

struct Parser<'a, 'tree> {
    input: &'a str,
    pos: usize,
    tree: &'tree mut Tree,
}

/// Scanned open tag, before it is mapped to a node kind.
struct OpenTag {
    name: SmolStr,
    data_type: Option<SmolStr>,
    data_marker: Option<SmolStr>,
    data_cmarker: Option<SmolStr>,
    href: Option<SmolStr>,
    src: Option<SmolStr>,
    style: Option<SmolStr>,
    rendered: bool,
    at: usize,
}

impl Parser<'_, '_> {
    /// Parse sibling nodes until `close` (or end of input when `None`).
    fn parse_nodes(&mut self, close: Option<&str>) -> Result<Vec<NodeId>, ParseError> {
        let mut nodes = Vec::new();
        loop {
            if self.pos >= self.input.len() {
                return match close {
                    None => Ok(nodes),
                    Some(_) => Err(ParseError::UnexpectedEof(self.pos)),
                };
            }
            if self.rest().starts_with("</") {
                let at = self.pos;
                let found = self.scan_close_tag()?;
                return match close {
                    Some(expected) if expected == found.as_str() => Ok(nodes),
                    Some(expected) => Err(ParseError::MismatchedClose {
                        expected: SmolStr::new(expected),
                        found,
                        at,
                    }),
                    None => Err(ParseError::UnexpectedClose { found, at }),
                };
            }
            if self.rest().starts_with('<') {
                nodes.push(self.parse_element()?);
            } else {
                nodes.push(self.parse_text());
            }
        }
    }

    fn parse_element(&mut self) -> Result<NodeId, ParseError> {
        let tag = self.scan_open_tag()?;
        let (kind, is_void) = map_tag(&tag)?;
        let node = self.tree.alloc(kind);
        if let Some(style) = tag.style {
            self.tree.set_style(node, Some(style));
        }
        if !is_void {
            let children = self.parse_nodes(Some(tag.name.as_str()))?;
            for child in children {
                self.tree.append_child(node, child);
            }
        }
        Ok(node)
    }

    fn parse_text(&mut self) -> NodeId {
        let rest = self.rest();
        let end = rest.find('<').unwrap_or(rest.len());
        let text = unescape(&rest[..end]);
        self.pos += end;
        self.tree.alloc_text(text)
    }

    fn scan_open_tag(&mut self) -> Result<OpenTag, ParseError> {
        let at = self.pos;
        self.pos += 1; // consume '<'
        let name = self.scan_name();
        if name.is_empty() {
            return Err(ParseError::UnknownTag {
                tag: SmolStr::new(""),
                at,
            });
        }
        let mut tag = OpenTag {
            name,
            data_type: None,
            data_marker: None,
            data_cmarker: None,
            href: None,
            src: None,
            style: None,
            rendered: false,
            at,
        };
        loop {
            self.skip_spaces();
            match self.rest().chars().next() {
                None => return Err(ParseError::UnexpectedEof(self.pos)),
                Some('>') => {
                    self.pos += 1;
                    return Ok(tag);
                }
                Some('/') => {
                    // tolerate "<hr/>" style self-closing
                    self.pos += 1;
                }
                _ => {
                    let (key, value) = self.scan_attribute()?;
                    match key.as_str() {
                        "data-type" => tag.data_type = Some(value),
                        "data-marker" => tag.data_marker = Some(value),
                        "data-cmarker" => tag.data_cmarker = Some(value),
                        "href" => tag.href = Some(value),
                        "src" => tag.src = Some(value),
                        "style" => tag.style = Some(value),
                        "data-rendered" => tag.rendered = value == "true",
                        _ => {}
                    }
                }
            }
        }
    }

    fn scan_close_tag(&mut self) -> Result<SmolStr, ParseError> {
        self.pos += 2; // consume "</"
        let name = self.scan_name();
        if !self.rest().starts_with('>') {
            return Err(ParseError::UnexpectedEof(self.pos));
        }
        self.pos += 1;
        Ok(name)
    }

    fn scan_attribute(&mut self) -> Result<(SmolStr, SmolStr), ParseError> {
        let start = self.pos;
        while self
            .rest()
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            self.pos += 1;
        }
        let key = SmolStr::new(&self.input[start..self.pos]);
        if !self.rest().starts_with("=\"") {
            if key.is_empty() {
                // unrecognizable byte inside a tag; skip it
                let step = self.rest().chars().next().map_or(0, char::len_utf8);
                self.pos += step;
            }
            // bare attribute
            return Ok((key, SmolStr::new("")));
        }
        self.pos += 2;
        let rest = self.rest();
        let end = rest
            .find('"')
            .ok_or(ParseError::UnexpectedEof(self.input.len()))?;
        let value = SmolStr::new(unescape(&rest[..end]));
        self.pos += end + 1;
        Ok((key, value))
    }

    fn scan_name(&mut self) -> SmolStr {
        let start = self.pos;
        while self
            .rest()
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric())
        {
            self.pos += 1;
        }
        SmolStr::new(&self.input[start..self.pos])
    }

    fn skip_spaces(&mut self) {
        while self.rest().starts_with(' ') {
            self.pos += 1;
        }
    }

    fn rest(&self) -> &str {
        &self.input[self.pos..]
    }
}

fn map_tag(tag: &OpenTag) -> Result<(NodeKind, bool), ParseError> {
    let span = |kind: SpanKind| -> NodeKind {
        let base = SpanNode::with_default_markers(kind);
        let (open, close) = match (&tag.data_marker, &tag.data_cmarker) {
            // serializer omits data-cmarker when the runs match
            (Some(open), None) => (open.clone(), open.clone()),
            (Some(open), Some(close)) => (open.clone(), close.clone()),
            (None, Some(close)) => (base.open_marker, close.clone()),
            (None, None) => (base.open_marker, base.close_marker),
        };
        NodeKind::Span(SpanNode {
            kind: base.kind,
            open_marker: open,
            close_marker: close,
        })
    };
    let kind = match tag.name.as_str() {
        "p" => NodeKind::Block(BlockKind::Paragraph),
        "h1" => NodeKind::Block(BlockKind::Heading(1)),
        "h2" => NodeKind::Block(BlockKind::Heading(2)),
        "h3" => NodeKind::Block(BlockKind::Heading(3)),
        "h4" => NodeKind::Block(BlockKind::Heading(4)),
        "h5" => NodeKind::Block(BlockKind::Heading(5)),
        "h6" => NodeKind::Block(BlockKind::Heading(6)),
        "ul" => NodeKind::Block(BlockKind::List { ordered: false }),
        "ol" => NodeKind::Block(BlockKind::List { ordered: true }),
        "li" => NodeKind::Block(BlockKind::ListItem),
        "blockquote" => NodeKind::Block(BlockKind::Blockquote),
        "pre" => NodeKind::Block(BlockKind::CodeFence),
        "table" => NodeKind::Block(BlockKind::Table),
        "tr" => NodeKind::Block(BlockKind::TableRow),
        "th" => NodeKind::Block(BlockKind::TableCell { header: true }),
        "td" => NodeKind::Block(BlockKind::TableCell { header: false }),
        "hr" => return Ok((NodeKind::Block(BlockKind::ThematicBreak), true)),
        "wbr" => return Ok((NodeKind::Marker, true)),
        "em" => span(SpanKind::Emphasis),
        "strong" => span(SpanKind::Strong),
        "s" => span(SpanKind::Strikethrough),
        // inline code carries a marker run; the fence source region does not
        "code" => match tag.data_marker {
            Some(_) => span(SpanKind::Code),
            None => NodeKind::FenceCode,
        },
        "a" => span(SpanKind::Link {
            href: tag.href.clone().unwrap_or_default(),
        }),
        "img" => span(SpanKind::Image {
            src: tag.src.clone().unwrap_or_default(),
        }),
        "span" => match tag.data_type.as_deref() {
            Some("math") => span(SpanKind::Math),
            Some("html") => span(SpanKind::Html),
            Some("code-block-info") => NodeKind::FenceInfo,
            _ => {
                return Err(ParseError::UnknownTag {
                    tag: tag.name.clone(),
                    at: tag.at,
                });
            }
        },
        "div" => match tag.data_type.as_deref() {
            Some("preview") => NodeKind::Preview {
                rendered: tag.rendered,
            },
            Some("link-ref-defs-block") => NodeKind::Block(BlockKind::LinkRefDefs),
            Some("footnotes-block") => NodeKind::Block(BlockKind::FootnoteDefs),
            _ => {
                return Err(ParseError::UnknownTag {
                    tag: tag.name.clone(),
                    at: tag.at,
                });
            }
        },
        _ => {
            return Err(ParseError::UnknownTag {
                tag: tag.name.clone(),
                at: tag.at,
            });
        }
    };
    Ok((kind, false))
}

fn unescape(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_owned();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let replaced = [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
        ]
        .iter()
        .find(|(entity, _)| rest.starts_with(entity));
        match replaced {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
