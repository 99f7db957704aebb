//! Title → identifier lookup against the site's game list.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{DispatchError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: String,
    pub title: String,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawEntry {
    #[serde(default, deserialize_with = "loose_id")]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogDocument {
    #[serde(default)]
    game_of_the_week: Option<RawEntry>,
    #[serde(default)]
    previous_games: Vec<RawEntry>,
    #[serde(default)]
    games: Vec<RawEntry>,
}

// ids are usually strings, but hand-edited lists sometimes use bare numbers
fn loose_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Which matching rule produced a [`CatalogMatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    CaseInsensitive,
    Substring,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchTier::Exact => "exact",
            MatchTier::CaseInsensitive => "case-insensitive",
            MatchTier::Substring => "substring",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogMatch {
    pub id: String,
    /// Catalog title that matched, which differs from the query on fuzzy hits.
    pub title: String,
    pub tier: MatchTier,
}

/// General list, featured slot and previous games, concatenated in that order. The order is
/// the tie-break for fuzzy matches.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| DispatchError::Store {
            what: "catalog",
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&text, path)
    }

    pub fn from_json_str(text: &str, source: &Path) -> Result<Self> {
        let doc: CatalogDocument = serde_json::from_str(text).map_err(|e| DispatchError::Store {
            what: "catalog",
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
        let featured = doc.game_of_the_week.filter(|e| e.id.is_some());
        let raw = doc
            .games
            .into_iter()
            .chain(featured)
            .chain(doc.previous_games);
        let mut entries = Vec::new();
        for entry in raw {
            match (entry.id, entry.title) {
                (Some(id), Some(title)) if !id.is_empty() && !title.is_empty() => {
                    entries.push(CatalogEntry { id, title })
                }
                (id, title) => debug!(?id, ?title, "skipping catalog entry without id or title"),
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Recover the catalog id for a display title.
    ///
    /// Tiers run in order over the whole list and the first hit wins: exact title, then
    /// case-insensitive title, then lower-cased containment in either direction. On the
    /// substring tier the earliest catalog entry wins, not the closest title.
    pub fn find_identifier(&self, title: &str) -> Result<CatalogMatch> {
        let hit = |entry: &CatalogEntry, tier| CatalogMatch {
            id: entry.id.clone(),
            title: entry.title.clone(),
            tier,
        };

        if let Some(entry) = self.entries.iter().find(|e| e.title == title) {
            return Ok(hit(entry, MatchTier::Exact));
        }

        let needle = title.to_lowercase();
        if let Some(entry) = self
            .entries
            .iter()
            .find(|e| e.title.to_lowercase() == needle)
        {
            return Ok(hit(entry, MatchTier::CaseInsensitive));
        }

        if let Some(entry) = self.entries.iter().find(|e| {
            let haystack = e.title.to_lowercase();
            haystack.contains(&needle) || needle.contains(&haystack)
        }) {
            warn!(
                query = title,
                matched = %entry.title,
                id = %entry.id,
                "catalog title matched by substring only"
            );
            return Ok(hit(entry, MatchTier::Substring));
        }

        Err(DispatchError::NoMatch {
            title: title.to_string(),
        })
    }
}
