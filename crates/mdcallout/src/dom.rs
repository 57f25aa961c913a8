//! Owned HTML element tree the static renderer mutates in place.

use std::fmt::Write;

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    /// Pre-rendered HTML. Contributes nothing to text content.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub classes: Vec<String>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: Vec::new(),
            classes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// A tagless container that serializes as its children only.
    pub fn fragment() -> Self {
        Self::new("")
    }

    pub fn is_fragment(&self) -> bool {
        self.tag.is_empty()
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.add_class(class);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.push_text(text);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn add_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.classes.push(class.to_string());
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn push_raw(&mut self, html: String) {
        self.children.push(Node::Raw(html));
    }

    /// Appends text, merging with a trailing text node like `Node.normalize()`.
    pub fn push_text(&mut self, text: &str) {
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }

    pub fn prepend(&mut self, node: Node) {
        self.children.insert(0, node);
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(text) => out.push_str(text),
                Node::Element(el) => el.collect_text(out),
                Node::Raw(_) => {}
            }
        }
    }

    /// First non-empty text node in document order.
    pub fn first_text_mut(&mut self) -> Option<&mut String> {
        for child in &mut self.children {
            match child {
                Node::Text(text) if !text.is_empty() => return Some(text),
                Node::Element(el) => {
                    if let Some(text) = el.first_text_mut() {
                        return Some(text);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Calls `f` on every descendant with tag `tag`, without descending into
    /// the matches themselves.
    pub fn for_each_element_mut(&mut self, tag: &str, f: &mut dyn FnMut(&mut Element)) {
        for child in &mut self.children {
            if let Node::Element(el) = child {
                if el.tag == tag {
                    f(el);
                } else {
                    el.for_each_element_mut(tag, f);
                }
            }
        }
    }

    /// Descendant elements with tag `tag`, in document order.
    pub fn find_all(&self, tag: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect_tag(tag, &mut found);
        found
    }

    fn collect_tag<'a>(&'a self, tag: &str, found: &mut Vec<&'a Element>) {
        for child in &self.children {
            if let Node::Element(el) = child {
                if el.tag == tag {
                    found.push(el);
                }
                el.collect_tag(tag, found);
            }
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    pub fn write_html(&self, out: &mut String) {
        if self.is_fragment() {
            self.write_children(out);
            return;
        }

        out.push('<');
        out.push_str(&self.tag);
        if !self.classes.is_empty() {
            let _ = write!(out, " class=\"{}\"", escape_attr(&self.classes.join(" ")));
        }
        for (name, value) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", name, escape_attr(value));
        }
        if VOID_ELEMENTS.contains(&self.tag.as_str()) {
            out.push_str(" />");
            return;
        }
        out.push('>');
        self.write_children(out);
        let _ = write!(out, "</{}>", self.tag);
    }

    fn write_children(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Element(el) => el.write_html(out),
                Node::Text(text) => out.push_str(&escape_text(text)),
                Node::Raw(html) => out.push_str(html),
            }
        }
    }
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
