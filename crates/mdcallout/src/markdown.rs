use comrak::nodes::{AstNode, ListType, NodeValue};
use comrak::{format_html, parse_document, Arena, ComrakOptions};

use crate::dom::{escape_text, Element};
use crate::mapping::CalloutMapping;
use crate::render::render;
use crate::sanitize::sanitize_callout_html;
use crate::style::ManagedStyleBlock;

pub(crate) fn comrak_options() -> ComrakOptions<'static> {
    let mut opt = ComrakOptions::default();

    // Extension options
    opt.extension.strikethrough = true;
    opt.extension.table = true;
    opt.extension.autolink = true;
    opt.extension.tasklist = true;
    opt.extension.footnotes = true;

    // Render options - SECURITY: Enable safe HTML rendering
    opt.render.unsafe_ = false; // Disable unsafe HTML execution
    opt.render.escape = true; // Enable HTML escaping to prevent XSS

    opt
}

/// Parses `src` into the element tree the static renderer works on.
///
/// Paragraphs, headings, quotes, lists and basic inline formatting become
/// elements; everything else is kept as comrak-rendered HTML.
pub fn to_dom(src: &str) -> Element {
    let arena = Arena::new();
    let options = comrak_options();
    let root = parse_document(&arena, src, &options);

    let mut fragment = Element::fragment();
    for child in root.children() {
        convert_block(child, &options, &mut fragment);
    }
    fragment
}

/// Renders `src` to sanitized HTML with callout paragraphs marked up.
pub fn to_html(src: &str, mappings: &[CalloutMapping]) -> String {
    let mut dom = to_dom(src);
    render(&mut dom, mappings);
    sanitize_callout_html(&dom.to_html(), mappings)
}

/// Standalone page: the managed style block in the head, the rendered
/// document in the body.
pub fn to_html_document(
    src: &str,
    mappings: &[CalloutMapping],
    styles: &ManagedStyleBlock,
    title: &str,
) -> String {
    let body = to_html(src, mappings);
    let style = styles.to_html().unwrap_or_default();
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n{}\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_text(title),
        style,
        body
    )
}

fn convert_block<'a>(node: &'a AstNode<'a>, options: &ComrakOptions, parent: &mut Element) {
    let value = node.data.borrow().value.clone();
    match value {
        NodeValue::Paragraph => {
            if in_tight_list(node) {
                convert_inlines(node, options, parent);
            } else {
                let mut p = Element::new("p");
                convert_inlines(node, options, &mut p);
                parent.push(p);
            }
        }
        NodeValue::Heading(heading) => {
            let mut h = Element::new(&format!("h{}", heading.level));
            convert_inlines(node, options, &mut h);
            parent.push(h);
        }
        NodeValue::BlockQuote => {
            let mut quote = Element::new("blockquote");
            for child in node.children() {
                convert_block(child, options, &mut quote);
            }
            parent.push(quote);
        }
        NodeValue::List(list) => {
            let mut el = match list.list_type {
                ListType::Bullet => Element::new("ul"),
                ListType::Ordered => Element::new("ol"),
            };
            if list.list_type == ListType::Ordered && list.start != 1 {
                el = el.with_attr("start", &list.start.to_string());
            }
            for child in node.children() {
                convert_block(child, options, &mut el);
            }
            parent.push(el);
        }
        NodeValue::Item(_) => {
            let mut li = Element::new("li");
            for child in node.children() {
                convert_block(child, options, &mut li);
            }
            parent.push(li);
        }
        _ => parent.push_raw(render_raw(node, options)),
    }
}

fn convert_inlines<'a>(node: &'a AstNode<'a>, options: &ComrakOptions, parent: &mut Element) {
    for child in node.children() {
        convert_inline(child, options, parent);
    }
}

fn convert_inline<'a>(node: &'a AstNode<'a>, options: &ComrakOptions, parent: &mut Element) {
    let value = node.data.borrow().value.clone();
    let wrapper = match value {
        NodeValue::Text(text) => {
            parent.push_text(&text);
            return;
        }
        NodeValue::SoftBreak => {
            parent.push_text("\n");
            return;
        }
        NodeValue::LineBreak => {
            parent.push(Element::new("br"));
            parent.push_text("\n");
            return;
        }
        NodeValue::Code(code) => {
            parent.push(Element::new("code").with_text(&code.literal));
            return;
        }
        NodeValue::Emph => Element::new("em"),
        NodeValue::Strong => Element::new("strong"),
        NodeValue::Strikethrough => Element::new("del"),
        NodeValue::Link(link) => {
            let mut a = Element::new("a").with_attr("href", &link.url);
            if !link.title.is_empty() {
                a = a.with_attr("title", &link.title);
            }
            a
        }
        _ => {
            parent.push_raw(render_raw(node, options));
            return;
        }
    };

    let mut el = wrapper;
    convert_inlines(node, options, &mut el);
    parent.push(el);
}

fn in_tight_list<'a>(paragraph: &'a AstNode<'a>) -> bool {
    paragraph
        .parent()
        .and_then(|item| item.parent())
        .map(|list| match list.data.borrow().value {
            NodeValue::List(ref nl) => nl.tight,
            _ => false,
        })
        .unwrap_or(false)
}

fn render_raw<'a>(node: &'a AstNode<'a>, options: &ComrakOptions) -> String {
    let mut html = Vec::new();
    if let Err(e) = format_html(node, options, &mut html) {
        log::warn!("Failed to render markdown node: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&html).trim_end_matches('\n').to_string()
}
