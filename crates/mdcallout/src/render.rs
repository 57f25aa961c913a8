use crate::dom::{Element, Node};
use crate::mapping::CalloutMapping;
use crate::style::{class_name, CALLOUT_CLASS, EMOJI_CLASS};

/// Marks up every callout paragraph under `root` in place.
///
/// A paragraph matches the first mapping, in declared order, whose prefix
/// and a space start its text. Running this twice over the same tree strips
/// two more characters from every callout, so call it once per fragment.
pub fn render(root: &mut Element, mappings: &[CalloutMapping]) {
    let mut decorated = 0usize;
    root.for_each_element_mut("p", &mut |paragraph| {
        if decorate_paragraph(paragraph, mappings) {
            decorated += 1;
        }
    });
    log::debug!("Rendered {} callout paragraphs", decorated);
}

fn decorate_paragraph(paragraph: &mut Element, mappings: &[CalloutMapping]) -> bool {
    let text = paragraph.text_content();
    let Some(mapping) = mappings.iter().find(|m| matches_text(m, &text)) else {
        return false;
    };

    paragraph.add_class(CALLOUT_CLASS);
    paragraph.add_class(&class_name(&mapping.label));

    if let Some(first) = paragraph.first_text_mut() {
        let cut = first
            .char_indices()
            .nth(2)
            .map_or(first.len(), |(byte, _)| byte);
        first.drain(..cut);
    }

    let marker = Element::new("span")
        .with_class(EMOJI_CLASS)
        .with_text(&mapping.emoji);
    paragraph.prepend(Node::Element(marker));
    true
}

fn matches_text(mapping: &CalloutMapping, text: &str) -> bool {
    match mapping.prefix_char() {
        Some(prefix) => {
            let mut chars = text.chars();
            chars.next() == Some(prefix) && chars.next() == Some(' ')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingTable;

    fn root_with(paragraphs: &[&str]) -> Element {
        let mut root = Element::fragment();
        for text in paragraphs {
            root.push(Element::new("p").with_text(text));
        }
        root
    }

    #[test]
    fn test_note_paragraph() {
        let mut root = root_with(&["; Remember to save"]);
        render(&mut root, MappingTable::defaults().as_slice());

        let p = root.find_all("p")[0];
        assert_eq!(p.classes, vec!["paragraph-callout", "paragraph-callout-note"]);
        assert_eq!(
            p.children[0],
            Node::Element(Element::new("span").with_class(EMOJI_CLASS).with_text("📝"))
        );
        assert_eq!(p.children[1], Node::Text(String::from("Remember to save")));
    }

    #[test]
    fn test_non_matching_paragraph_is_untouched() {
        let mut root = root_with(&["!not a callout", "plain text", ""]);
        let before = root.clone();
        render(&mut root, MappingTable::defaults().as_slice());
        assert_eq!(root, before);
    }

    #[test]
    fn test_first_mapping_wins() {
        let table = MappingTable::new(vec![
            CalloutMapping::new('!', "🚨", "Alert", "red", "red"),
            CalloutMapping::new('!', "🔥", "Fire", "orange", "orange"),
        ]);
        let mut root = root_with(&["! hot"]);
        render(&mut root, table.as_slice());

        let html = root.to_html();
        assert!(html.contains("paragraph-callout-alert"));
        assert!(!html.contains("paragraph-callout-fire"));
        assert!(html.contains("🚨"));
    }

    #[test]
    fn test_prefix_inside_formatting() {
        let mut root = Element::fragment();
        root.push(Element::new("p").with_child(Element::new("strong").with_text("? Why")).with_text(" not"));
        render(&mut root, MappingTable::defaults().as_slice());

        assert_eq!(
            root.to_html(),
            "<p class=\"paragraph-callout paragraph-callout-question\">\
             <span class=\"paragraph-callout-emoji\">❓</span><strong>Why</strong> not</p>"
        );
    }

    #[test]
    fn test_short_first_text_node() {
        // "!" and " x" split across elements: only the first node is trimmed.
        let mut root = Element::fragment();
        root.push(Element::new("p").with_child(Element::new("em").with_text("!")).with_text(" x"));
        render(&mut root, MappingTable::defaults().as_slice());

        let p = root.find_all("p")[0];
        assert_eq!(p.text_content(), "🚨 x");
    }

    #[test]
    fn test_headings_are_not_paragraphs() {
        let mut root = Element::fragment();
        root.push(Element::new("h2").with_text("! Heading"));
        render(&mut root, MappingTable::defaults().as_slice());
        assert_eq!(root.to_html(), "<h2>! Heading</h2>");
    }

    #[test]
    fn test_empty_prefix_never_matches() {
        let table = MappingTable::new(vec![CalloutMapping::placeholder()]);
        let mut root = root_with(&[" leading space"]);
        let before = root.clone();
        render(&mut root, table.as_slice());
        assert_eq!(root, before);
    }
}
