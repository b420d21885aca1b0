//! webstack.yml accessor
//!
//! The document is held as a `serde_yaml::Value` so that a rewrite keeps keys
//! the tools do not know about and keeps field order. Updates touch single
//! fields addressed by [`EntryLocator`].

use crate::error::StoreError;
use crate::schema::{EntryLocator, NavigationEntry};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

const ROOT_KEY: &str = "webstack";

/// Loaded navigation data file
#[derive(Debug, Clone)]
pub struct Webstack {
    path: PathBuf,
    doc: Value,
    dirty: bool,
}

impl Webstack {
    /// Read and validate the data file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;
        Self::parse(path, &content)
    }

    /// Parse document text; `path` is remembered for [`Webstack::save`]
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Result<Self, StoreError> {
        let path = path.into();
        let doc: Value = serde_yaml::from_str(content).map_err(|source| StoreError::Parse {
            path: path.clone(),
            source,
        })?;

        let store = Self {
            path,
            doc,
            dirty: false,
        };
        if store.taxonomies().is_none() {
            return Err(StoreError::Shape {
                path: store.path.clone(),
                message: format!(
                    "expected a list of taxonomies or a `{}:` list at the top level",
                    ROOT_KEY
                ),
            });
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once any field was changed since loading
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn taxonomies(&self) -> Option<&Vec<Value>> {
        match &self.doc {
            Value::Sequence(seq) => Some(seq),
            Value::Mapping(map) => map.get(ROOT_KEY).and_then(Value::as_sequence),
            _ => None,
        }
    }

    fn taxonomies_mut(&mut self) -> Option<&mut Vec<Value>> {
        match &mut self.doc {
            Value::Sequence(seq) => Some(seq),
            Value::Mapping(map) => map.get_mut(ROOT_KEY).and_then(Value::as_sequence_mut),
            _ => None,
        }
    }

    /// All links with a non-empty URL, in file order
    pub fn entries(&self) -> Vec<NavigationEntry> {
        let mut entries = Vec::new();
        let Some(taxonomies) = self.taxonomies() else {
            return entries;
        };

        for (t_idx, taxonomy) in taxonomies.iter().enumerate() {
            let taxonomy_name =
                str_field(taxonomy, "taxonomy").unwrap_or_else(|| "Unknown".to_string());

            if let Some(terms) = taxonomy.get("list").and_then(Value::as_sequence) {
                for (term_idx, term) in terms.iter().enumerate() {
                    let term_name = str_field(term, "term").unwrap_or_default();
                    collect_links(
                        term,
                        &taxonomy_name,
                        &term_name,
                        t_idx,
                        Some(term_idx),
                        &mut entries,
                    );
                }
            }
            collect_links(taxonomy, &taxonomy_name, "", t_idx, None, &mut entries);
        }

        entries
    }

    fn link_mut(&mut self, loc: &EntryLocator) -> Option<&mut Mapping> {
        let taxonomy = self.taxonomies_mut()?.get_mut(loc.taxonomy)?;
        let holder = match loc.term {
            Some(term) => taxonomy.get_mut("list")?.get_mut(term)?,
            None => taxonomy,
        };
        holder.get_mut("links")?.get_mut(loc.link)?.as_mapping_mut()
    }

    fn set_field(&mut self, loc: &EntryLocator, key: &str, value: Value) -> bool {
        match self.link_mut(loc) {
            Some(link) => {
                link.insert(Value::String(key.to_string()), value);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Set the logo URL; returns false if the locator no longer exists
    pub fn set_logo(&mut self, loc: &EntryLocator, logo: &str) -> bool {
        self.set_field(loc, "logo", Value::String(logo.to_string()))
    }

    /// Blank out a broken logo, keeping the key in place
    pub fn clear_logo(&mut self, loc: &EntryLocator) -> bool {
        self.set_field(loc, "logo", Value::String(String::new()))
    }

    pub fn set_description(&mut self, loc: &EntryLocator, description: &str) -> bool {
        self.set_field(loc, "description", Value::String(description.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String, StoreError> {
        Ok(serde_yaml::to_string(&self.doc)?)
    }

    /// Write the document back to the file it was loaded from
    pub fn save(&self) -> Result<(), StoreError> {
        let yaml = self.to_yaml()?;
        let tmp = self.path.with_extension("yml.tmp");
        std::fs::write(&tmp, yaml)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

fn collect_links(
    holder: &Value,
    taxonomy: &str,
    category: &str,
    t_idx: usize,
    term_idx: Option<usize>,
    out: &mut Vec<NavigationEntry>,
) {
    let Some(links) = holder.get("links").and_then(Value::as_sequence) else {
        return;
    };

    for (link_idx, link) in links.iter().enumerate() {
        let Some(url) = str_field(link, "url").filter(|u| !u.is_empty()) else {
            continue;
        };
        out.push(NavigationEntry {
            taxonomy: taxonomy.to_string(),
            category: category.to_string(),
            title: str_field(link, "title").unwrap_or_else(|| "Unknown".to_string()),
            url,
            logo: str_field(link, "logo"),
            description: str_field(link, "description"),
            locator: Some(EntryLocator {
                taxonomy: t_idx,
                term: term_idx,
                link: link_idx,
            }),
        });
    }
}

/// Scalar field as trimmed text; `null` and missing keys are `None`
fn str_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
