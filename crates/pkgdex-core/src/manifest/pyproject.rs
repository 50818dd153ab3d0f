//! The `[project]` table of a `pyproject.toml`.

use std::collections::BTreeMap;

use pkgdex_util::errors::{PkgdexError, PkgdexResult};
use serde::Deserialize;

use super::RawMetadata;
use crate::record::{Identity, IdentityRole};

#[derive(Debug, Deserialize)]
struct PyProject {
    #[serde(default)]
    project: Option<ProjectTable>,
}

#[derive(Debug, Deserialize)]
struct ProjectTable {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    readme: Option<Readme>,
    #[serde(default, rename = "requires-python")]
    requires_python: Option<String>,
    #[serde(default)]
    license: Option<License>,
    #[serde(default)]
    authors: Vec<Person>,
    #[serde(default)]
    maintainers: Vec<Person>,
    #[serde(default)]
    keywords: Option<OneOrMany>,
    #[serde(default)]
    classifiers: Vec<String>,
    #[serde(default)]
    urls: BTreeMap<String, String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default, rename = "optional-dependencies")]
    optional_dependencies: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    scripts: BTreeMap<String, String>,
    #[serde(default, rename = "gui-scripts")]
    gui_scripts: BTreeMap<String, String>,
    #[serde(default, rename = "entry-points")]
    entry_points: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    dynamic: Vec<String>,
    #[serde(flatten)]
    other: BTreeMap<String, toml::Value>,
}

/// `readme = "README.md"` or `readme = { file = ..., text = ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Readme {
    Path(String),
    Table {
        #[serde(default)]
        text: Option<String>,
    },
}

/// `license = "MIT"` or `license = { text = ... }` / `{ file = ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum License {
    Expression(String),
    Table {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        file: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct Person {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

const HOMEPAGE_KEYS: &[&str] = &["homepage", "home-page", "home_page", "home"];

pub(crate) fn parse(source_id: &str, text: &str) -> PkgdexResult<RawMetadata> {
    let malformed = |message: String| PkgdexError::MalformedManifest {
        source_id: source_id.to_string(),
        message,
    };

    let doc: PyProject =
        toml::from_str(text).map_err(|e| malformed(format!("invalid pyproject.toml: {e}")))?;
    let project = doc
        .project
        .ok_or_else(|| malformed("no [project] table".to_string()))?;

    let mut raw = RawMetadata::new(source_id);
    if project.version.is_none() && project.dynamic.iter().any(|f| f == "version") {
        raw.version_hint = Some("'version' is declared dynamic".to_string());
    }

    raw.name = project.name;
    raw.version = project.version;
    raw.summary = project.description;
    raw.description = match project.readme {
        Some(Readme::Table { text }) => text,
        Some(Readme::Path(path)) => {
            raw.extras.insert("readme".to_string(), serde_json::Value::String(path));
            None
        }
        None => None,
    };
    raw.python_requires = project.requires_python;
    raw.license = match project.license {
        Some(License::Expression(expr)) => Some(expr),
        Some(License::Table { text, file }) => text.or(file),
        None => None,
    };

    for (role, people) in [
        (IdentityRole::Author, project.authors),
        (IdentityRole::Maintainer, project.maintainers),
    ] {
        raw.identities.extend(
            people
                .into_iter()
                .filter(|p| p.name.is_some() || p.email.is_some())
                .map(|p| Identity {
                    role,
                    name: p.name,
                    email: p.email,
                }),
        );
    }

    raw.keywords = match project.keywords {
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
        None => Vec::new(),
    };
    raw.classifiers = project.classifiers;

    for (label, url) in project.urls {
        if raw.url.is_none() && HOMEPAGE_KEYS.contains(&label.to_ascii_lowercase().as_str()) {
            raw.url = Some(url);
        } else {
            raw.project_urls.insert(label, url);
        }
    }

    raw.requirements
        .extend(project.dependencies.into_iter().map(|req| (req, None)));
    for (extra, reqs) in project.optional_dependencies {
        raw.requirements
            .extend(reqs.into_iter().map(|req| (req, Some(extra.clone()))));
        raw.provides_extras.push(extra);
    }

    raw.entry_points = project.entry_points;
    if !project.scripts.is_empty() {
        raw.entry_points
            .entry("console_scripts".to_string())
            .or_default()
            .extend(project.scripts);
    }
    if !project.gui_scripts.is_empty() {
        raw.entry_points
            .entry("gui_scripts".to_string())
            .or_default()
            .extend(project.gui_scripts);
    }

    for (field, value) in project.other {
        raw.preserve_unknown(&field, toml_to_json(value));
    }

    Ok(raw)
}

fn toml_to_json(value: toml::Value) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        toml::Value::String(s) => Json::String(s),
        toml::Value::Integer(i) => Json::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f).map_or(Json::Null, Json::Number),
        toml::Value::Boolean(b) => Json::Bool(b),
        toml::Value::Datetime(dt) => Json::String(dt.to_string()),
        toml::Value::Array(items) => Json::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Json::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}
