//! Persistent function identifiers.
//!
//! Every function is keyed by a fingerprint (its qualified name): the function
//! name followed by `_` and the pack-format codes of its arguments, or the bare
//! name when it declares no argument list at all. The fingerprint → id table is committed to
//! the source tree so that ids survive independent regenerations by different
//! contributors. Ids are embedded in serialized networks, so an id once
//! persisted is never handed to a different fingerprint.
//!
//! A run loads the table once, [`reconcile`]s it against the metadata model,
//! and writes it back in full with [`IdentifierRegistry::persist`].

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

use indexmap::map::Entry;
use indexmap::IndexMap;
use opgen_model::{FunctionDefinition, MetadataModel};
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};

use crate::error::{Error, IdConflict};
use crate::writer::{self, WriteOutcome};

/// Provenance header written at the top of the persisted table.
pub const REGISTRY_HEADER: &str = "\
# Copyright (c) The opgen developers. All Rights Reserved.
#
# Licensed under the Apache License, Version 2.0 (the \"License\");
# you may not use this file except in compliance with the License.
# You may obtain a copy of the License at
#
#     http://www.apache.org/licenses/LICENSE-2.0
#
# Unless required by applicable law or agreed to in writing, software
# distributed under the License is distributed on an \"AS IS\" BASIS,
# WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
# See the License for the specific language governing permissions and
# limitations under the License.
#
# DO NOT EDIT THIS FILE!
# THIS FILE IS GENERATED BY THE CODE GENERATOR BUT IS COMMITTED INTO
# THE SOURCE TREE TO MAKE FUNCTION IDS PERSIST.
";

/// Computes the fingerprint of a function.
///
/// # Errors
///
/// Returns [`Error::Schema`] if any argument type has no pack-format code.
pub fn fingerprint(function: &FunctionDefinition) -> Result<String, Error> {
    if !function.declares_arguments {
        return Ok(function.name.clone());
    }
    let mut name = format!("{}_", function.name);
    for arg in &function.arguments {
        let code = arg.type_.pack_format().ok_or_else(|| Error::Schema {
            function: function.name.clone(),
            argument: arg.name.clone(),
            type_name: arg.type_.to_string(),
        })?;
        name.push_str(code);
    }
    Ok(name)
}

/// The fingerprint → id table.
///
/// Entries keep the order they were loaded or assigned in; persisting sorts
/// them by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierRegistry {
    entries: IndexMap<String, u32>,
}

impl IdentifierRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the committed table. A missing file is an empty registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is malformed.
    pub fn load(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no identifier registry yet, starting empty");
            return Ok(Self::new());
        }
        let text = fs::read_to_string(path).map_err(Error::io(path))?;
        Self::parse(path, &text)
    }

    /// Parses the text of a committed table read from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryFormat`] if the text is not a mapping of names
    /// to non-negative integers.
    pub fn parse(path: &Path, text: &str) -> Result<Self, Error> {
        let only_comments = text.lines().all(|line| {
            let line = line.trim();
            line.is_empty() || line.starts_with('#')
        });
        if only_comments {
            return Ok(Self::new());
        }
        let RawEntries(raw) = serde_yaml::from_str(text).map_err(|e| Error::RegistryFormat {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut entries = IndexMap::with_capacity(raw.len());
        for (name, id) in raw {
            match entries.entry(name) {
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
                Entry::Occupied(slot) => {
                    return Err(Error::RegistryFormat {
                        path: path.to_path_buf(),
                        message: format!(
                            "`{}` is listed more than once (ids {} and {id}); \
                             keep one entry and correct the file manually",
                            slot.key(),
                            slot.get()
                        ),
                    });
                }
            }
        }
        Ok(Self { entries })
    }

    /// Returns the id assigned to `qualified_name`.
    #[must_use]
    pub fn get(&self, qualified_name: &str) -> Option<u32> {
        self.entries.get(qualified_name).copied()
    }

    /// Returns true if `qualified_name` has an id.
    #[must_use]
    pub fn contains(&self, qualified_name: &str) -> bool {
        self.entries.contains_key(qualified_name)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the registry has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(qualified_name, id)` in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Inserts an entry, replacing any id previously held by `qualified_name`.
    ///
    /// Intended for building registries by hand; [`reconcile`] never replaces
    /// an existing id.
    pub fn insert(&mut self, qualified_name: impl Into<String>, id: u32) {
        self.entries.insert(qualified_name.into(), id);
    }

    /// Returns every id mapped to more than one name, in ascending id order.
    #[must_use]
    pub fn audit(&self) -> Vec<IdConflict> {
        let mut by_id: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for (name, id) in &self.entries {
            by_id.entry(*id).or_default().push(name.clone());
        }
        by_id
            .into_iter()
            .filter(|(_, names)| names.len() > 1)
            .map(|(id, names)| IdConflict { id, names })
            .collect()
    }

    /// Returns the entries sorted by id ascending.
    #[must_use]
    pub fn sorted_by_id(&self) -> Vec<(&str, u32)> {
        let mut entries: Vec<(&str, u32)> = self.iter().collect();
        entries.sort_by_key(|(_, id)| *id);
        entries
    }

    /// Renders the full table: header, blank line, then `name: id` lines
    /// sorted by id.
    #[must_use]
    pub fn to_file_contents(&self) -> String {
        let mut out = String::from(REGISTRY_HEADER);
        out.push('\n');
        for (name, id) in self.sorted_by_id() {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(&id.to_string());
            out.push('\n');
        }
        out
    }

    /// Writes the full table to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdentifierConflict`] without writing if the table
    /// holds duplicate ids, or an I/O error if the file cannot be written.
    pub fn persist(&self, destination: &Path) -> Result<WriteOutcome, Error> {
        let conflicts = self.audit();
        if !conflicts.is_empty() {
            return Err(Error::IdentifierConflict { conflicts });
        }
        let outcome = writer::write_if_changed(destination, &self.to_file_contents())?;
        tracing::debug!(
            path = %destination.display(),
            entries = self.len(),
            ?outcome,
            "persisted identifier registry"
        );
        Ok(outcome)
    }
}

/// The table as written, repeated names included.
struct RawEntries(Vec<(String, u32)>);

impl<'de> Deserialize<'de> for RawEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of qualified names to non-negative ids")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawEntries, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, u32>()? {
                    entries.push(entry);
                }
                Ok(RawEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// A fresh id handed out during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Qualified name that received the id.
    pub qualified_name: String,
    /// The new id.
    pub id: u32,
}

/// What [`reconcile`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// New entries, in assignment order.
    pub assigned: Vec<Assignment>,
    /// Number of functions whose id was already persisted.
    pub retained: usize,
    /// Persisted names with no function in the current metadata. They keep
    /// their ids.
    pub stale: Vec<String>,
    /// Fingerprints produced by more than one definition in the metadata.
    pub duplicate_fingerprints: Vec<String>,
}

/// Reconciles the persisted registry with the metadata model.
///
/// Functions are visited in model order. A fingerprint already present keeps
/// its id; a new one receives the smallest non-negative id not used by any
/// entry of the growing registry. Finally every id is audited for duplicates.
///
/// # Errors
///
/// Returns [`Error::Schema`] if any function has an unmapped argument type
/// (before touching the registry), or [`Error::IdentifierConflict`] listing
/// every id shared by more than one name.
pub fn reconcile(
    model: &MetadataModel,
    mut registry: IdentifierRegistry,
) -> Result<(IdentifierRegistry, Diagnostics), Error> {
    let fingerprints = model
        .functions
        .iter()
        .map(fingerprint)
        .collect::<Result<Vec<_>, _>>()?;

    let mut diagnostics = Diagnostics::default();
    let mut used: BTreeSet<u32> = registry.entries.values().copied().collect();
    let mut next_free = 0u32;
    let mut seen: HashSet<&str> = HashSet::new();

    for name in &fingerprints {
        if !seen.insert(name.as_str()) {
            tracing::warn!(fingerprint = %name, "fingerprint declared more than once");
            diagnostics.duplicate_fingerprints.push(name.clone());
            continue;
        }
        if registry.contains(name) {
            diagnostics.retained += 1;
            continue;
        }
        // The set only grows, so the smallest free id never moves backwards.
        while used.contains(&next_free) {
            next_free += 1;
        }
        used.insert(next_free);
        registry.entries.insert(name.clone(), next_free);
        tracing::debug!(fingerprint = %name, id = next_free, "assigned function id");
        diagnostics.assigned.push(Assignment {
            qualified_name: name.clone(),
            id: next_free,
        });
    }

    diagnostics.stale = registry
        .entries
        .keys()
        .filter(|name| !seen.contains(name.as_str()))
        .cloned()
        .collect();
    for name in &diagnostics.stale {
        tracing::debug!(fingerprint = %name, "registry entry has no current function");
    }

    let conflicts = registry.audit();
    if !conflicts.is_empty() {
        for conflict in &conflicts {
            tracing::error!(id = conflict.id, names = ?conflict.names, "duplicated function id");
        }
        return Err(Error::IdentifierConflict { conflicts });
    }

    Ok((registry, diagnostics))
}
