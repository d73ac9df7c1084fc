//! Source citation formatting.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static URL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"https?://[^\s\]]+(?:[^\s\]\)])*").ok());

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', ']', ')', '}'];

/// Host part of a URL, lowercased; the input itself when it has no scheme
pub fn domain_of(url: &str) -> String {
    match url.split_once("//") {
        Some((_, rest)) => rest.split('/').next().unwrap_or(rest).to_lowercase(),
        None => url.to_lowercase(),
    }
}

/// Pull distinct source URLs out of free text, one per domain.
pub fn extract_citation_urls(text: &str, limit: usize) -> Vec<String> {
    let Some(pattern) = URL_PATTERN.as_ref() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    for found in pattern.find_iter(text) {
        let url = found.as_str().trim_end_matches(TRAILING_PUNCTUATION);
        if url.len() <= 10 {
            continue;
        }
        if seen.insert(domain_of(url)) {
            urls.push(url.to_string());
            if urls.len() >= limit {
                break;
            }
        }
    }
    urls
}

/// Append `**Sources:** [1] url [2] url` for up to five citations.
///
/// An existing sources line is replaced rather than duplicated.
pub fn append_sources(text: &str, citations: &[String]) -> String {
    let body = match text.find("**Sources:**") {
        Some(start) => {
            let tail = &text[start..];
            let end = tail.find("\n\n").map(|i| start + i).unwrap_or(text.len());
            format!("{}{}", &text[..start], &text[end..]).trim().to_string()
        }
        None => text.to_string(),
    };

    if citations.is_empty() {
        return body;
    }

    let mut out = body;
    out.push_str("\n\n**Sources:** ");
    for (i, url) in citations.iter().take(5).enumerate() {
        out.push_str(&format!("[{}] {} ", i + 1, url));
    }
    out
}

/// Append a numbered list of markdown links for up to six citations
pub fn append_reference_links(text: &str, citations: &[String]) -> String {
    if citations.is_empty() {
        return text.to_string();
    }
    let mut out = text.to_string();
    out.push_str("\n\n**📖 Sources & References:**\n");
    for (i, url) in citations.iter().take(6).enumerate() {
        out.push_str(&format!("[{}] [{}]({})\n", i + 1, domain_of(url), url));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_dedupes_by_domain_and_strips_punctuation() {
        let text = "See https://docs.rust-lang.org/book/ch01.html, and https://docs.rust-lang.org/std. \
                    Also (https://tokio.rs/tokio/tutorial).";
        let urls = extract_citation_urls(text, 5);
        assert_eq!(
            urls,
            vec!["https://docs.rust-lang.org/book/ch01.html", "https://tokio.rs/tokio/tutorial"]
        );
    }

    #[test]
    fn test_extract_respects_limit() {
        let text = "https://a.example.com https://b.example.com https://c.example.com";
        assert_eq!(extract_citation_urls(text, 2).len(), 2);
    }

    #[test]
    fn test_append_sources_replaces_existing_block() {
        let text = "Advice here.\n\n**Sources:** [1] old";
        let out = append_sources(text, &["https://new.dev".to_string()]);
        assert_eq!(out, "Advice here.\n\n**Sources:** [1] https://new.dev ");
        assert_eq!(append_sources("plain", &[]), "plain");
    }

    #[test]
    fn test_reference_links_use_domain_labels() {
        let citations: Vec<String> = (1..=8).map(|i| format!("https://site{}.dev/page", i)).collect();
        let out = append_reference_links("Answer", &citations);
        assert!(out.contains("[1] [site1.dev](https://site1.dev/page)"));
        assert!(out.contains("[6] [site6.dev]"));
        assert!(!out.contains("[7]"));
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("https://Docs.RS/serde"), "docs.rs");
        assert_eq!(domain_of("no-scheme"), "no-scheme");
    }
}
