//! Core metadata files (`PKG-INFO`, `METADATA`): RFC-822 style headers,
//! continuation lines, and an optional free-text body.

use serde_json::Value;

use super::RawMetadata;
use crate::record::IdentityRole;

/// Headers that carry nothing the record models and are dropped quietly.
const IGNORED: &[&str] = &[
    "metadata-version",
    "description-content-type",
    "platform",
    "supported-platform",
    "license-file",
    "dynamic",
];

pub(crate) fn parse(source_id: &str, text: &str) -> RawMetadata {
    let mut raw = RawMetadata::new(source_id);
    let (headers, body) = split_headers(text);

    let mut author = None;
    let mut author_email = None;
    let mut maintainer = None;
    let mut maintainer_email = None;
    let mut unknown: Vec<(String, String)> = Vec::new();

    for (key, value) in headers {
        match key.to_ascii_lowercase().as_str() {
            "name" => raw.name = Some(value),
            "version" => raw.version = Some(value),
            "summary" => raw.summary = Some(value),
            "description" => raw.description = Some(unfold_description(&value)),
            "home-page" => raw.url = Some(value),
            "download-url" => {
                raw.project_urls.insert("Download".to_string(), value);
            }
            "project-url" => {
                if let Some((label, url)) = value.split_once(',') {
                    raw.project_urls
                        .insert(label.trim().to_string(), url.trim().to_string());
                }
            }
            "author" => author = Some(value),
            "author-email" => author_email = Some(value),
            "maintainer" => maintainer = Some(value),
            "maintainer-email" => maintainer_email = Some(value),
            "license" | "license-expression" => raw.license = Some(value),
            "classifier" => raw.classifiers.push(value),
            "keywords" => raw.keywords.push(value),
            "requires-dist" => raw.requirements.push((value, None)),
            "requires-python" => raw.python_requires = Some(value),
            "provides-extra" => raw.provides_extras.push(value),
            lowered if IGNORED.contains(&lowered) => {}
            _ => unknown.push((key, value)),
        }
    }

    raw.add_identities(IdentityRole::Author, author.as_deref(), author_email.as_deref());
    raw.add_identities(
        IdentityRole::Maintainer,
        maintainer.as_deref(),
        maintainer_email.as_deref(),
    );

    let body = body.trim();
    if !body.is_empty() {
        raw.description = Some(body.to_string());
    }

    for (key, value) in unknown {
        let field = key.to_ascii_lowercase();
        match raw.extras.get_mut(&field) {
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None => raw.preserve_unknown(&field, Value::String(value)),
        }
    }

    raw
}

/// Split the header block from the body. Continuation lines (leading
/// whitespace) are appended to the previous header with a newline.
fn split_headers(text: &str) -> (Vec<(String, String)>, String) {
    let mut headers: Vec<(String, String)> = Vec::new();
    let mut lines = text.lines();
    let mut body = String::new();

    for line in lines.by_ref() {
        if line.trim().is_empty() {
            if headers.is_empty() {
                continue;
            }
            break;
        }
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = headers.last_mut() {
                value.push('\n');
                value.push_str(line.trim());
            }
            continue;
        }
        match line.split_once(':') {
            Some((key, value)) => headers.push((key.trim().to_string(), value.trim().to_string())),
            None => tracing::debug!("skipping malformed metadata line '{line}'"),
        }
    }

    for line in lines {
        body.push_str(line);
        body.push('\n');
    }
    (headers, body)
}

/// Older metadata folds description lines as `        |text`.
fn unfold_description(value: &str) -> String {
    value
        .lines()
        .map(|l| l.strip_prefix('|').unwrap_or(l))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PKG_INFO: &str = "\
Metadata-Version: 2.1
Name: Maxia_Pipedrive
Version: 1.5
Summary: Pipedrive API helpers
Home-page: https://example.test/maxia
Author: Jane Doe
Author-email: jane@example.test
License: MIT
Keywords: crm,pipedrive
Classifier: Programming Language :: Python :: 3
Classifier: License :: OSI Approved :: MIT License
Requires-Python: >=3.7
Requires-Dist: requests (>=2.20)
Requires-Dist: pandas; extra == 'data'
Provides-Extra: data
Project-URL: Source, https://example.test/src
X-Custom: one
X-Custom: two

Long description
spanning lines.
";

    #[test]
    fn parses_headers_and_body() {
        let raw = parse("maxia/PKG-INFO", PKG_INFO);
        assert_eq!(raw.name.as_deref(), Some("Maxia_Pipedrive"));
        assert_eq!(raw.version.as_deref(), Some("1.5"));
        assert_eq!(raw.classifiers.len(), 2);
        assert_eq!(raw.requirements.len(), 2);
        assert_eq!(raw.python_requires.as_deref(), Some(">=3.7"));
        assert_eq!(raw.project_urls["Source"], "https://example.test/src");
        assert_eq!(
            raw.description.as_deref(),
            Some("Long description\nspanning lines.")
        );
        assert_eq!(raw.identities.len(), 1);
    }

    #[test]
    fn repeated_unknown_headers_collect_into_array() {
        let raw = parse("maxia/PKG-INFO", PKG_INFO);
        assert_eq!(
            raw.extras["x-custom"],
            Value::Array(vec![Value::String("one".into()), Value::String("two".into())])
        );
        assert_eq!(raw.warnings.len(), 1);
    }

    #[test]
    fn continuation_lines_fold() {
        let raw = parse(
            "x",
            "Name: x\nVersion: 1\nDescription: first\n        |second\n",
        );
        assert_eq!(raw.description.as_deref(), Some("first\nsecond"));
    }
}
