use regex::Regex;
use studybuddy_core::{Result, StudyBuddyError};

/// `1. text`, `1.text`, `12) text`, `**3.** text`, `- text`, `* text`, `• text`.
/// A number glued to its text must not be followed by a digit, so `3.14` is not an item.
const ITEM_PATTERN: &str = r"^\s*(?:(?P<bold>\*\*)?\d{1,3}[.)](?:\*\*)?(?:\s+(?P<spaced>.+?)|(?P<glued>[^\s\d].*?))|[-*•]\s+(?P<bullet>.+?))\s*$";

const EMPHASIS: [&str; 4] = ["**", "__", "*", "_"];

/// Drop markdown emphasis that wraps the whole text; unpaired markers stay.
fn strip_emphasis(text: &str) -> &str {
    let mut text = text.trim();
    loop {
        let inner = EMPHASIS
            .iter()
            .find_map(|marker| text.strip_prefix(marker)?.strip_suffix(marker));
        match inner {
            Some(inner) if !inner.trim().is_empty() => text = inner.trim(),
            _ => return text,
        }
    }
}

/// Pulls question lines out of free-form model output.
#[derive(Debug, Clone)]
pub struct QuestionParser {
    item: Regex,
}

impl QuestionParser {
    pub fn new() -> Result<Self> {
        let item = Regex::new(ITEM_PATTERN).map_err(|e| {
            StudyBuddyError::configuration(format!("invalid question pattern: {}", e))
        })?;
        Ok(Self { item })
    }

    /// Only numbered or bulleted lines count; headings and commentary are dropped.
    /// Markdown emphasis around the question is stripped.
    pub fn parse(&self, response: &str) -> Vec<String> {
        response
            .lines()
            .filter_map(|line| self.item.captures(line))
            .filter_map(|caps| {
                let text = ["spaced", "glued", "bullet"]
                    .iter()
                    .find_map(|name| caps.name(name))?;
                let text = strip_emphasis(text.as_str());
                // `**2. Question?**` opens the bold before the number
                let text = match caps.name("bold") {
                    Some(_) => text.strip_suffix("**").unwrap_or(text).trim_end(),
                    None => text,
                };
                Some(text.to_string())
            })
            .filter(|text| text.chars().any(char::is_alphanumeric))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(response: &str) -> Vec<String> {
        QuestionParser::new().unwrap().parse(response)
    }

    #[test]
    fn test_numbered_lines() {
        let response =
            "QUESTIONS:\n1. What is a cell?\n2) Define osmosis.\n\n10. Why do leaves fall?";
        assert_eq!(
            parse(response),
            vec!["What is a cell?", "Define osmosis.", "Why do leaves fall?"]
        );
    }

    #[test]
    fn test_bullets_and_commentary() {
        let response = "Here are some questions:\n- What is DNA?\n* **What is RNA?**\n• How are proteins made?\nGood luck!";
        assert_eq!(
            parse(response),
            vec!["What is DNA?", "What is RNA?", "How are proteins made?"]
        );
    }

    #[test]
    fn test_markers_without_text_are_ignored() {
        assert!(parse("1.\n-   \n2020 was a year\n3.14 is roughly pi\n2. **").is_empty());
    }

    #[test]
    fn test_number_glued_to_text() {
        assert_eq!(
            parse("1.What is ATP?\n2)Define osmosis."),
            vec!["What is ATP?", "Define osmosis."]
        );
    }

    #[test]
    fn test_bold_numbering() {
        let response = "**1.** Why do cells divide?\n**2. What is mitosis?**\n3. __Name the phases of meiosis.__";
        assert_eq!(
            parse(response),
            vec![
                "Why do cells divide?",
                "What is mitosis?",
                "Name the phases of meiosis."
            ]
        );
    }

    #[test]
    fn test_unpaired_underscores_are_kept() {
        assert_eq!(
            parse("1. When is `__init__` called?\n2. What does __init__\n3. _private_"),
            vec!["When is `__init__` called?", "What does __init__", "private"]
        );
    }
}
