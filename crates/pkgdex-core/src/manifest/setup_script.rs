//! Setup scripts (`setup.py`). The script is tokenized, never executed: the
//! keyword arguments of its single `setup(...)` call are read when they are
//! literals or names bound to literals by earlier top-level assignments.

use std::collections::{BTreeMap, HashMap};

use pkgdex_util::errors::{PkgdexError, PkgdexResult};
use serde_json::Value;

use super::python::{tokenize, Arg, Parser, Token};
use super::{parse_entry_point, parse_entry_points_ini, RawMetadata};
use crate::record::IdentityRole;

/// Build configuration arguments that carry no package metadata.
const IGNORED: &[&str] = &[
    "packages",
    "package_dir",
    "package_data",
    "py_modules",
    "include_package_data",
    "exclude_package_data",
    "zip_safe",
    "data_files",
    "cmdclass",
    "ext_modules",
    "long_description_content_type",
    "options",
];

/// Module prefixes under which `setup` may be called as an attribute.
const SETUP_MODULES: &[&str] = &["setuptools", "core", "distutils"];

pub(crate) fn parse(source_id: &str, text: &str) -> PkgdexResult<RawMetadata> {
    let malformed = |message: String| PkgdexError::MalformedManifest {
        source_id: source_id.to_string(),
        message,
    };

    let tokens = tokenize(text).map_err(|e| malformed(format!("cannot tokenize setup script: {e}")))?;

    let mut env: HashMap<String, Value> = HashMap::new();
    let mut calls: Vec<Vec<Arg>> = Vec::new();
    let mut bindings: Vec<HashMap<String, Value>> = Vec::new();

    for i in 0..tokens.len() {
        let at_line_start = i == 0 || tokens[i - 1] == Token::Newline;
        let Token::Name(name) = &tokens[i] else {
            continue;
        };

        if at_line_start && tokens.get(i + 1) == Some(&Token::Op("=")) {
            let value = Parser::new(&tokens, i + 2)
                .line_expression()
                .and_then(|expr| expr.evaluate(&env).ok());
            match value {
                Some(value) => {
                    env.insert(name.clone(), value);
                }
                None => {
                    env.remove(name);
                }
            }
            continue;
        }

        if name == "setup" && is_setup_call(&tokens, i) {
            let args = Parser::new(&tokens, i + 1)
                .call_arguments()
                .ok_or_else(|| malformed("cannot parse the arguments of setup()".to_string()))?;
            calls.push(args);
            bindings.push(env.clone());
        }
    }

    let (args, env) = match (calls.len(), calls.pop(), bindings.pop()) {
        (1, Some(args), Some(env)) => (args, env),
        (0, ..) => return Err(malformed("no setup() call found".to_string())),
        (n, ..) => {
            return Err(malformed(format!(
                "found {n} setup() calls; expected exactly one"
            )))
        }
    };

    let mut raw = RawMetadata::new(source_id);
    let mut people: BTreeMap<&'static str, String> = BTreeMap::new();

    for arg in args {
        let (key, expr) = match arg {
            Arg::Keyword(key, expr) => (key, expr),
            Arg::DoubleStar(_) => {
                raw.unresolved("**kwargs");
                continue;
            }
            Arg::Star(_) | Arg::Positional(_) => {
                raw.unresolved("positional argument");
                continue;
            }
        };
        if IGNORED.contains(&key.as_str()) {
            continue;
        }
        let value = match expr.evaluate(&env) {
            Ok(value) => value,
            Err(why) => {
                tracing::debug!("{source_id}: setup({key}=...) not evaluated: {why}");
                if key == "version" {
                    raw.version_hint = Some(format!("'version' is not a literal: {why}"));
                }
                raw.unresolved(&key);
                continue;
            }
        };
        apply(&mut raw, &mut people, &key, value);
    }

    raw.add_identities(
        IdentityRole::Author,
        people.get("author").map(String::as_str),
        people.get("author_email").map(String::as_str),
    );
    raw.add_identities(
        IdentityRole::Maintainer,
        people.get("maintainer").map(String::as_str),
        people.get("maintainer_email").map(String::as_str),
    );

    Ok(raw)
}

/// `setup(` that is not a definition and not a method on an unrelated object.
fn is_setup_call(tokens: &[Token], i: usize) -> bool {
    if tokens.get(i + 1) != Some(&Token::Op("(")) {
        return false;
    }
    match i.checked_sub(1).map(|p| &tokens[p]) {
        Some(Token::Name(prev)) if prev == "def" => false,
        Some(Token::Op(".")) => matches!(
            i.checked_sub(2).map(|p| &tokens[p]),
            Some(Token::Name(module)) if SETUP_MODULES.contains(&module.as_str())
        ),
        _ => true,
    }
}

fn apply(
    raw: &mut RawMetadata,
    people: &mut BTreeMap<&'static str, String>,
    key: &str,
    value: Value,
) {
    match key {
        "name" | "version" | "description" | "long_description" | "license" | "url"
        | "download_url" | "python_requires" | "author" | "author_email" | "maintainer"
        | "maintainer_email" => {
            let Some(text) = as_text(&value) else {
                raw.unresolved(key);
                return;
            };
            match key {
                "name" => raw.name = Some(text),
                "version" => raw.version = Some(text),
                "description" => raw.summary = Some(text),
                "long_description" => raw.description = Some(text),
                "license" => raw.license = Some(text),
                "url" => raw.url = Some(text),
                "download_url" => {
                    raw.project_urls.insert("Download".to_string(), text);
                }
                "python_requires" => raw.python_requires = Some(text),
                "author" => {
                    people.insert("author", text);
                }
                "author_email" => {
                    people.insert("author_email", text);
                }
                "maintainer" => {
                    people.insert("maintainer", text);
                }
                _ => {
                    people.insert("maintainer_email", text);
                }
            }
        }
        "classifiers" => raw.classifiers.extend(as_lines(&value)),
        "keywords" => raw.keywords.extend(as_lines(&value)),
        "install_requires" => raw
            .requirements
            .extend(as_lines(&value).into_iter().map(|req| (req, None))),
        "extras_require" => match value {
            Value::Object(map) => {
                for (spec, reqs) in map {
                    let (extra, marker) = match spec.split_once(':') {
                        Some((extra, marker)) => (extra.trim().to_string(), Some(marker.trim().to_string())),
                        None => (spec.trim().to_string(), None),
                    };
                    for req in as_lines(&reqs) {
                        let req = match &marker {
                            Some(m) if req.contains(';') => format!("{req} and ({m})"),
                            Some(m) => format!("{req}; {m}"),
                            None => req,
                        };
                        raw.requirements.push((req, Some(extra.clone())));
                    }
                    raw.provides_extras.push(extra);
                }
            }
            _ => raw.unresolved(key),
        },
        "project_urls" => match value {
            Value::Object(map) => {
                for (label, url) in map {
                    if let Some(url) = as_text(&url) {
                        raw.project_urls.insert(label, url);
                    }
                }
            }
            _ => raw.unresolved(key),
        },
        "entry_points" => match value {
            Value::String(ini) => raw.entry_points.extend(parse_entry_points_ini(&ini)),
            Value::Object(groups) => {
                for (group, entries) in groups {
                    let group_map = raw.entry_points.entry(group).or_default();
                    for line in as_lines(&entries) {
                        if let Some((name, target)) = parse_entry_point(&line) {
                            group_map.insert(name, target);
                        }
                    }
                }
            }
            _ => raw.unresolved(key),
        },
        _ => raw.preserve_unknown(key, value),
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A list of strings, or one string holding one entry per line.
fn as_lines(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect(),
        Value::Array(items) => items.iter().filter_map(as_text).collect(),
        _ => Vec::new(),
    }
}
