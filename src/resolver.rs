//! Read-time resolution across layered sources.
//!
//! Sources are passed highest priority first. The first source that has a
//! key wins; nothing is merged and nothing is mutated.

use crate::document::{Document, FromValue, Value};
use crate::source::{Source, SourceKind};

/// Resolves keys across an ordered list of sources.
///
/// An empty list, or a resolver built with [`Resolver::asset_only`], queries
/// the Asset source alone: packaged configuration wins when no explicit
/// layering is requested.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    asset: &'a Source,
    asset_only: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(asset: &'a Source) -> Self {
        Self {
            asset,
            asset_only: false,
        }
    }

    /// Ignore caller-supplied layering and always query the Asset source.
    pub fn asset_only(mut self, asset_only: bool) -> Self {
        self.asset_only = asset_only;
        self
    }

    pub fn is_asset_only(&self) -> bool {
        self.asset_only
    }

    fn layers<'s>(&'s self, sources: &'s [&'a Source]) -> &'s [&'a Source] {
        if self.asset_only || sources.is_empty() {
            std::slice::from_ref(&self.asset)
        } else {
            sources
        }
    }

    /// First source, in priority order, that has `key`.
    pub fn source_of(&self, key: &str, sources: &[&'a Source]) -> Option<&'a Source> {
        self.layers(sources).iter().copied().find(|s| s.has(key))
    }

    pub fn has_key(&self, key: &str, sources: &[&'a Source]) -> bool {
        self.source_of(key, sources).is_some()
    }

    pub fn get_value(&self, key: &str, sources: &[&'a Source]) -> Option<&'a Value> {
        self.source_of(key, sources)
            .and_then(|s| s.document().get_value(key))
    }

    /// Value of `key` from the winning source, or `default`.
    ///
    /// The winning source is chosen by presence alone. If its value cannot be
    /// coerced to `T`, `default` is returned rather than consulting lower
    /// layers.
    pub fn get<T: FromValue>(&self, key: &str, default: T, sources: &[&'a Source]) -> T {
        match self.source_of(key, sources) {
            Some(source) => source.get(key, default),
            None => default,
        }
    }

    pub fn get_array<T: FromValue>(
        &self,
        key: &str,
        default: Vec<T>,
        sources: &[&'a Source],
    ) -> Vec<T> {
        match self.source_of(key, sources) {
            Some(source) => source.get_array(key, default),
            None => default,
        }
    }

    pub fn get_string(&self, key: &str, sources: &[&'a Source]) -> Option<String> {
        self.source_of(key, sources)
            .and_then(|s| s.get_string(key))
    }

    /// Kind of the source that answers `key`.
    pub fn kind_of(&self, key: &str, sources: &[&'a Source]) -> Option<SourceKind> {
        self.source_of(key, sources).map(Source::kind)
    }

    /// Flatten the layers into one read-only document, as the resolver
    /// would see it. Nested documents are merged key by key.
    pub fn effective(&self, sources: &[&'a Source]) -> Document {
        let mut merged = Document::new();
        for source in self.layers(sources).iter().rev() {
            merged.merge_from(source.document());
        }
        merged.mark_clean();
        merged.set_writable(false);
        merged
    }
}
