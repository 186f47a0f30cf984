// Example questions offered on the introduction panel and the examples popup

use anyhow::{Context, Result};

const EXAMPLES_JSON: &str = include_str!("../assets/examples.json");

/// Ordered list of suggested questions shipped with the binary.
pub fn load_examples() -> Result<Vec<String>> {
    parse_examples(EXAMPLES_JSON)
}

pub fn parse_examples(json: &str) -> Result<Vec<String>> {
    let examples: Vec<String> =
        serde_json::from_str(json).context("Failed to parse example questions")?;

    Ok(examples
        .into_iter()
        .map(|question| question.trim().to_string())
        .filter(|question| !question.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_examples_parse() {
        let examples = load_examples().unwrap();
        assert!(!examples.is_empty());
        assert!(examples.iter().all(|q| !q.trim().is_empty()));
    }

    #[test]
    fn test_parse_keeps_order_and_drops_blanks() {
        let examples = parse_examples(r#"["  b ", "", "a"]"#).unwrap();
        assert_eq!(examples, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_parse_rejects_non_list() {
        assert!(parse_examples(r#"{"q": "x"}"#).is_err());
    }
}
