use ammonia::Builder;

use crate::mapping::CalloutMapping;
use crate::style::{class_name, CALLOUT_CLASS, EMOJI_CLASS};

/// Secure sanitization that keeps the callout classes of `mappings`.
///
/// Scripts, event handlers and `javascript:` links are stripped with
/// ammonia's defaults; only the callout classes survive on `p` and `span`.
pub fn sanitize_callout_html(html: &str, mappings: &[CalloutMapping]) -> String {
    let mut paragraph_classes = vec![CALLOUT_CLASS.to_string()];
    paragraph_classes.extend(mappings.iter().map(|m| class_name(&m.label)));

    // The builder borrows the class names, so it must be gone before they are
    let cleaned = Builder::new()
        .add_allowed_classes("p", paragraph_classes.iter().map(String::as_str))
        .add_allowed_classes("span", [EMOJI_CLASS])
        .clean(html)
        .to_string();
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingTable;

    #[test]
    fn test_borrowed_labels_survive_cleaning() {
        let labels = vec![CalloutMapping::new('%', "🔥", "Hot Take", "red", "red")];
        let html = r#"<p class="paragraph-callout paragraph-callout-hot-take">x</p>"#;
        let sanitized = sanitize_callout_html(html, &labels);
        assert_eq!(sanitized, html);
    }

    #[test]
    fn test_without_mappings_only_base_class_is_kept() {
        let html = r#"<p class="paragraph-callout paragraph-callout-alert">x</p>"#;
        let sanitized = sanitize_callout_html(html, MappingTable::new(Vec::new()).as_slice());
        assert_eq!(sanitized, r#"<p class="paragraph-callout">x</p>"#);
    }
}
