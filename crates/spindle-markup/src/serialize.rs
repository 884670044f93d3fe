//! Tree-to-markup serialization.
//!
//! The dialect is deliberately small: block tags, inline spans carrying their
//! marker runs as `data-marker`/`data-cmarker` attributes, the `<wbr>` cursor
//! sentinel, and escaped text. [`crate::parse`] accepts exactly what this
//! module emits, which is what makes the engine round trip loss-free.

use std::fmt::Write as _;

use crate::tree::{BlockKind, NodeId, NodeKind, SpanKind, SpanNode, Tree};

/// Escape a text run for element content or an attribute value.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Serialize a node including its own tag.
pub fn outer_markup(tree: &Tree, node: NodeId) -> String {
    let mut out = String::new();
    write_node(tree, node, &mut out);
    out
}

/// Serialize a node's children only.
pub fn inner_markup(tree: &Tree, node: NodeId) -> String {
    let mut out = String::new();
    for &child in tree.children(node) {
        write_node(tree, child, &mut out);
    }
    out
}

fn write_node(tree: &Tree, node: NodeId, out: &mut String) {
    match tree.kind(node) {
        NodeKind::Document => {
            for &child in tree.children(node) {
                write_node(tree, child, out);
            }
        }
        NodeKind::Text(text) => out.push_str(&escape_text(text)),
        NodeKind::Marker => out.push_str("<wbr>"),
        NodeKind::Block(BlockKind::ThematicBreak) => {
            out.push_str("<hr");
            write_style(tree, node, out);
            out.push('>');
        }
        NodeKind::Block(kind) => {
            let (tag, data_type) = block_tag(kind);
            out.push('<');
            out.push_str(tag);
            if let Some(dt) = data_type {
                let _ = write!(out, " data-type=\"{dt}\"");
            }
            write_style(tree, node, out);
            out.push('>');
            for &child in tree.children(node) {
                write_node(tree, child, out);
            }
            let _ = write!(out, "</{tag}>");
        }
        NodeKind::Span(span) => write_span(tree, node, span, out),
        NodeKind::FenceInfo => {
            out.push_str("<span data-type=\"code-block-info\"");
            write_style(tree, node, out);
            out.push('>');
            for &child in tree.children(node) {
                write_node(tree, child, out);
            }
            out.push_str("</span>");
        }
        NodeKind::FenceCode => {
            out.push_str("<code");
            write_style(tree, node, out);
            out.push('>');
            for &child in tree.children(node) {
                write_node(tree, child, out);
            }
            out.push_str("</code>");
        }
        NodeKind::Preview { rendered } => {
            out.push_str("<div data-type=\"preview\"");
            if *rendered {
                out.push_str(" data-rendered=\"true\"");
            }
            write_style(tree, node, out);
            out.push('>');
            for &child in tree.children(node) {
                write_node(tree, child, out);
            }
            out.push_str("</div>");
        }
    }
}

fn write_span(tree: &Tree, node: NodeId, span: &SpanNode, out: &mut String) {
    let tag = span_tag(&span.kind);
    out.push('<');
    out.push_str(tag);
    match &span.kind {
        SpanKind::Math => out.push_str(" data-type=\"math\""),
        SpanKind::Html => out.push_str(" data-type=\"html\""),
        SpanKind::Link { href } => {
            let _ = write!(out, " href=\"{}\"", escape_text(href));
        }
        SpanKind::Image { src } => {
            let _ = write!(out, " src=\"{}\"", escape_text(src));
        }
        _ => {}
    }
    let _ = write!(out, " data-marker=\"{}\"", escape_text(&span.open_marker));
    if span.close_marker != span.open_marker {
        let _ = write!(out, " data-cmarker=\"{}\"", escape_text(&span.close_marker));
    }
    write_style(tree, node, out);
    out.push('>');
    for &child in tree.children(node) {
        write_node(tree, child, out);
    }
    let _ = write!(out, "</{tag}>");
}

fn write_style(tree: &Tree, node: NodeId, out: &mut String) {
    if let Some(style) = tree.style(node) {
        let _ = write!(out, " style=\"{}\"", escape_text(style));
    }
}

pub(crate) fn block_tag(kind: &BlockKind) -> (&'static str, Option<&'static str>) {
    match kind {
        BlockKind::Paragraph => ("p", None),
        BlockKind::Heading(1) => ("h1", None),
        BlockKind::Heading(2) => ("h2", None),
        BlockKind::Heading(3) => ("h3", None),
        BlockKind::Heading(4) => ("h4", None),
        BlockKind::Heading(5) => ("h5", None),
        BlockKind::Heading(_) => ("h6", None),
        BlockKind::List { ordered: true } => ("ol", None),
        BlockKind::List { ordered: false } => ("ul", None),
        BlockKind::ListItem => ("li", None),
        BlockKind::Blockquote => ("blockquote", None),
        BlockKind::CodeFence => ("pre", None),
        BlockKind::Table => ("table", None),
        BlockKind::TableRow => ("tr", None),
        BlockKind::TableCell { header: true } => ("th", None),
        BlockKind::TableCell { header: false } => ("td", None),
        BlockKind::LinkRefDefs => ("div", Some("link-ref-defs-block")),
        BlockKind::FootnoteDefs => ("div", Some("footnotes-block")),
        BlockKind::ThematicBreak => ("hr", None),
    }
}

pub(crate) fn span_tag(kind: &SpanKind) -> &'static str {
    match kind {
        SpanKind::Emphasis => "em",
        SpanKind::Strong => "strong",
        SpanKind::Strikethrough => "s",
        SpanKind::Code => "code",
        SpanKind::Math | SpanKind::Html => "span",
        SpanKind::Link { .. } => "a",
        SpanKind::Image { .. } => "img",
    }
}
