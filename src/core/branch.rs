//! core::branch
//!
//! Content-addressed branch snapshots and their merge.
//!
//! # Architecture
//!
//! A [`Branch`] is an immutable value: every operation returns a new branch
//! and leaves the receiver untouched, so an older snapshot stays valid (and
//! addressable by [`Branch::hash`]) after the session moves on.
//!
//! Names are kept in two [`NameTable`]s, one per [`Dimension`]. A name table
//! is an observed-remove set: bindings are only ever added, and removing a
//! binding records its tag. That makes [`Branch::merge`] a plain union of
//! four sets, which is associative, commutative and idempotent.
//!
//! # Invariants
//!
//! - `a.merge(&b) == b.merge(&a)`
//! - `a.merge(&b.merge(&c)) == a.merge(&b).merge(&c)`
//! - `a.merge(&a) == a`
//! - `a.merge(&Branch::empty()) == a`
//! - A removal observed by either side survives the merge, so a rename is
//!   never undone by reconciling against the pre-rename snapshot.
//! - Two sides binding one name to different definitions is kept as a
//!   conflicted name, never resolved silently.
//! - A binding made by a rename remembers the tags it replaced. Two sides
//!   renaming the same binding to different names leave one origin with
//!   several visible successors, reported by [`Branch::divergent_renames`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{Hash, Name};

/// File extension of serialized branch snapshots.
pub const BRANCH_FILE_EXTENSION: &str = "ubf";

/// Errors from branch edits.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BranchError {
    /// The name is already bound to a different definition.
    #[error("{dimension} '{name}' already exists with a different definition")]
    NameTaken { dimension: Dimension, name: Name },
}

/// Which namespace a name lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Term,
    Type,
}

impl Dimension {
    /// Lowercase label used in output and hashing.
    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Term => "term",
            Dimension::Type => "type",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A term or type definition, identified by the hash of its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub kind: Dimension,
    pub source: String,
}

impl Definition {
    pub fn new(kind: Dimension, source: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    /// Content reference of this definition.
    pub fn reference(&self) -> Hash {
        Hash::of_parts(&[self.kind.as_str().as_bytes(), self.source.as_bytes()])
    }
}

/// One `name -> reference` binding, made unique by its tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Binding {
    pub name: Name,
    pub reference: Hash,
    pub tag: Hash,
    /// Tags of the bindings this one was renamed from, transitively.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub origins: BTreeSet<Hash>,
}

/// One binding renamed to more than one name by independent edits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DivergentRename {
    pub from: Name,
    pub reference: Hash,
    pub to: BTreeSet<Name>,
}

/// A visible `(name, reference)` pair returned by name resolution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Resolved {
    pub name: Name,
    pub reference: Hash,
}

/// Observed-remove set of name bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameTable {
    added: BTreeSet<Binding>,
    removed: BTreeSet<Hash>,
}

impl NameTable {
    /// Bindings whose tag has not been removed.
    pub fn visible(&self) -> impl Iterator<Item = &Binding> {
        self.added
            .iter()
            .filter(move |binding| !self.removed.contains(&binding.tag))
    }

    /// Every visible name with the distinct references it points to.
    pub fn entries(&self) -> BTreeMap<Name, BTreeSet<Hash>> {
        let mut entries: BTreeMap<Name, BTreeSet<Hash>> = BTreeMap::new();
        for binding in self.visible() {
            entries
                .entry(binding.name.clone())
                .or_default()
                .insert(binding.reference.clone());
        }
        entries
    }

    /// References bound to exactly `name`.
    pub fn references(&self, name: &Name) -> BTreeSet<Hash> {
        self.visible()
            .filter(|binding| &binding.name == name)
            .map(|binding| binding.reference.clone())
            .collect()
    }

    /// Distinct visible `(name, reference)` pairs whose name ends with `query`.
    pub fn resolve(&self, query: &Name) -> BTreeSet<Resolved> {
        self.visible()
            .filter(|binding| binding.name.ends_with(query))
            .map(|binding| Resolved {
                name: binding.name.clone(),
                reference: binding.reference.clone(),
            })
            .collect()
    }

    /// Renamed bindings whose visible successors carry different names.
    pub fn divergent_renames(&self) -> BTreeSet<DivergentRename> {
        let mut successors: BTreeMap<&Hash, BTreeSet<Name>> = BTreeMap::new();
        for binding in self.visible() {
            for origin in &binding.origins {
                successors
                    .entry(origin)
                    .or_default()
                    .insert(binding.name.clone());
            }
        }

        successors
            .into_iter()
            .filter(|(_, names)| names.len() > 1)
            .filter_map(|(origin, to)| {
                let renamed = self.added.iter().find(|binding| &binding.tag == origin)?;
                Some(DivergentRename {
                    from: renamed.name.clone(),
                    reference: renamed.reference.clone(),
                    to,
                })
            })
            .collect()
    }

    /// Number of distinct visible names.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible().next().is_none()
    }

    fn merge(&self, other: &NameTable) -> NameTable {
        NameTable {
            added: self.added.union(&other.added).cloned().collect(),
            removed: self.removed.union(&other.removed).cloned().collect(),
        }
    }

    fn bind(&mut self, name: Name, reference: Hash, tag: Hash, origins: BTreeSet<Hash>) {
        self.added.insert(Binding {
            name,
            reference,
            tag,
            origins,
        });
    }

    /// Remove every visible `(name, reference)` binding, returning the tags
    /// it replaces together with their own origins.
    fn unbind(&mut self, name: &Name, reference: &Hash) -> BTreeSet<Hash> {
        let mut tags = Vec::new();
        let mut origins = BTreeSet::new();
        for binding in self
            .visible()
            .filter(|binding| &binding.name == name && &binding.reference == reference)
        {
            tags.push(binding.tag.clone());
            origins.insert(binding.tag.clone());
            origins.extend(binding.origins.iter().cloned());
        }
        self.removed.extend(tags);
        origins
    }

    fn hash_into(&self, parts: &mut Vec<Vec<u8>>) {
        for binding in &self.added {
            parts.push(binding.name.as_str().as_bytes().to_vec());
            parts.push(binding.reference.as_str().as_bytes().to_vec());
            parts.push(binding.tag.as_str().as_bytes().to_vec());
            parts.push(binding.origins.len().to_string().into_bytes());
            for origin in &binding.origins {
                parts.push(origin.as_str().as_bytes().to_vec());
            }
        }
        parts.push(b"removed".to_vec());
        for tag in &self.removed {
            parts.push(tag.as_str().as_bytes().to_vec());
        }
    }
}

/// An immutable snapshot of named term and type definitions.
///
/// # Example
///
/// ```
/// use trellis::core::branch::{Branch, Definition, Dimension};
/// use trellis::core::types::Name;
///
/// let foo = Name::new("foo").unwrap();
/// let branch = Branch::empty()
///     .add(foo.clone(), Definition::new(Dimension::Term, "foo = 1"))
///     .unwrap();
///
/// assert_eq!(branch.merge(&branch), branch);
/// assert_eq!(branch.merge(&Branch::empty()), branch);
/// assert_eq!(branch.names(Dimension::Term).references(&foo).len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    definitions: BTreeMap<Hash, Definition>,
    terms: NameTable,
    types: NameTable,
}

impl Branch {
    /// The branch with no definitions; the identity of [`Branch::merge`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// Content hash over a canonical encoding of every component.
    pub fn hash(&self) -> Hash {
        let mut parts: Vec<Vec<u8>> = Vec::new();
        parts.push(b"definitions".to_vec());
        for (reference, definition) in &self.definitions {
            parts.push(reference.as_str().as_bytes().to_vec());
            parts.push(definition.kind.as_str().as_bytes().to_vec());
            parts.push(definition.source.as_bytes().to_vec());
        }
        parts.push(b"terms".to_vec());
        self.terms.hash_into(&mut parts);
        parts.push(b"types".to_vec());
        self.types.hash_into(&mut parts);

        let slices: Vec<&[u8]> = parts.iter().map(Vec::as_slice).collect();
        Hash::of_parts(&slices)
    }

    /// File name this snapshot is stored under: `<hash>.ubf`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.hash(), BRANCH_FILE_EXTENSION)
    }

    /// Least upper bound of two branches.
    pub fn merge(&self, other: &Branch) -> Branch {
        let mut definitions = self.definitions.clone();
        for (reference, definition) in &other.definitions {
            definitions
                .entry(reference.clone())
                .or_insert_with(|| definition.clone());
        }
        Branch {
            definitions,
            terms: self.terms.merge(&other.terms),
            types: self.types.merge(&other.types),
        }
    }

    /// Whether every edit in `other` is already part of `self`.
    pub fn includes(&self, other: &Branch) -> bool {
        &self.merge(other) == self
    }

    /// The name table for one dimension.
    pub fn names(&self, dimension: Dimension) -> &NameTable {
        match dimension {
            Dimension::Term => &self.terms,
            Dimension::Type => &self.types,
        }
    }

    fn names_mut(&mut self, dimension: Dimension) -> &mut NameTable {
        match dimension {
            Dimension::Term => &mut self.terms,
            Dimension::Type => &mut self.types,
        }
    }

    /// Look up a definition by reference.
    pub fn definition(&self, reference: &Hash) -> Option<&Definition> {
        self.definitions.get(reference)
    }

    /// Resolve a (possibly suffixed) name within one dimension.
    pub fn resolve(&self, dimension: Dimension, query: &Name) -> BTreeSet<Resolved> {
        self.names(dimension).resolve(query)
    }

    /// Names bound to more than one reference.
    pub fn conflicts(&self, dimension: Dimension) -> BTreeMap<Name, BTreeSet<Hash>> {
        self.names(dimension)
            .entries()
            .into_iter()
            .filter(|(_, references)| references.len() > 1)
            .collect()
    }

    /// Bindings renamed to different names by independent edits.
    pub fn divergent_renames(&self, dimension: Dimension) -> BTreeSet<DivergentRename> {
        self.names(dimension).divergent_renames()
    }

    /// Bind `name` to `definition` in the definition's dimension.
    ///
    /// Adding a binding that already exists returns an unchanged copy.
    ///
    /// # Errors
    ///
    /// Returns [`BranchError::NameTaken`] if `name` is bound to anything else.
    pub fn add(&self, name: Name, definition: Definition) -> Result<Branch, BranchError> {
        let dimension = definition.kind;
        let reference = definition.reference();
        let existing = self.names(dimension).references(&name);

        if existing.contains(&reference) {
            return Ok(self.clone());
        }
        if !existing.is_empty() {
            return Err(BranchError::NameTaken { dimension, name });
        }

        let tag = self.tag_for(&name, &reference);
        let mut next = self.clone();
        next.definitions.insert(reference.clone(), definition);
        next.names_mut(dimension)
            .bind(name, reference, tag, BTreeSet::new());
        Ok(next)
    }

    /// Move the `(from, reference)` binding to `to`.
    pub fn rename(&self, dimension: Dimension, from: &Name, reference: &Hash, to: Name) -> Branch {
        if from == &to {
            return self.clone();
        }
        let tag = self.tag_for(&to, reference);
        let mut next = self.clone();
        let table = next.names_mut(dimension);
        let origins = table.unbind(from, reference);
        table.bind(to, reference.clone(), tag, origins);
        next
    }

    // Tags derive from the pre-edit snapshot so identical edits of identical
    // states coincide and distinct states never collide.
    fn tag_for(&self, name: &Name, reference: &Hash) -> Hash {
        Hash::of_parts(&[
            name.as_str().as_bytes(),
            reference.as_str().as_bytes(),
            self.hash().as_str().as_bytes(),
        ])
    }
}
