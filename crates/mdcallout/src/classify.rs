use crate::mapping::{CalloutMapping, PrefixLookup};

/// Returns the mapping for a callout line: a known prefix character followed
/// by exactly one space. Anything shorter than two characters never matches.
pub fn classify<'m>(line: &str, lookup: &PrefixLookup<'m>) -> Option<&'m CalloutMapping> {
    let mut chars = line.chars();
    let prefix = chars.next()?;
    if chars.next()? != ' ' {
        return None;
    }
    lookup.get(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingTable;

    #[test]
    fn test_callout_lines() {
        let table = MappingTable::defaults();
        let lookup = table.lookup();

        assert_eq!(classify("! Server is down", &lookup).unwrap().label, "Alert");
        assert_eq!(classify("? why", &lookup).unwrap().label, "Question");
        assert_eq!(classify("~ maybe", &lookup).unwrap().label, "Idea");
        assert_eq!(classify("; remember", &lookup).unwrap().label, "Note");
        assert_eq!(classify("! ", &lookup).unwrap().label, "Alert");
    }

    #[test]
    fn test_non_callout_lines() {
        let table = MappingTable::defaults();
        let lookup = table.lookup();

        for line in ["", "!", "!not a callout", "!\tTab", " ! indented", "# ! heading", "x Unknown"] {
            assert!(classify(line, &lookup).is_none(), "{line:?} should not classify");
        }
    }

    #[test]
    fn test_only_second_char_is_checked() {
        let table = MappingTable::defaults();
        assert!(classify("!  two spaces", &table.lookup()).is_some());
    }

    #[test]
    fn test_classify_law_over_all_prefix_positions() {
        let table = MappingTable::defaults();
        let lookup = table.lookup();
        let samples = ['!', '?', '~', ';', 'a', ' ', '🚨', '#'];

        for first in samples {
            for second in samples {
                let line: String = [first, second, 'x'].iter().collect();
                let expected = lookup.get(first).is_some() && second == ' ';
                assert_eq!(classify(&line, &lookup).is_some(), expected, "{line:?}");
            }
        }
    }

    #[test]
    fn test_multibyte_prefix() {
        let mut table = MappingTable::defaults();
        table.push(crate::mapping::CalloutMapping::new('→', "➡️", "Next", "white", "gray"));
        let lookup = table.lookup();

        assert_eq!(classify("→ step two", &lookup).unwrap().label, "Next");
    }
}
