//! Page-layout options that only take effect before the first page is written.
//!
//! `page_size`, `auto_vacuum`, `encoding` and `journal_mode` are collected in
//! a [`PendingLayout`] and applied to an open handle before the schema is
//! created. Applying them to an initialized database is not an error: the
//! engine keeps its current values and the returned [`LayoutReport`] shows
//! what actually took effect.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::modes::{AutoVacuum, Encoding, JournalMode, OptionKind};
use crate::opener::EngineHandle;
use crate::options::{Directive, OptionName, OptionRegistry, OptionValue, Phase};

/// Page-layout directives waiting to be applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingLayout {
    entries: BTreeMap<OptionName, OptionValue>,
}

impl PendingLayout {
    /// An empty layout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] unless `bytes` is a power of two
    /// between 512 and 65536.
    pub fn set_page_size(&mut self, bytes: u32) -> Result<&mut Self> {
        let value = OptionRegistry::spec(OptionName::PageSize).parse(&bytes.to_string())?;
        self.entries.insert(OptionName::PageSize, value);
        Ok(self)
    }

    /// Sets the auto-vacuum mode.
    pub fn set_auto_vacuum(&mut self, mode: AutoVacuum) -> &mut Self {
        self.insert(mode)
    }

    /// Sets the text encoding.
    pub fn set_encoding(&mut self, encoding: Encoding) -> &mut Self {
        self.insert(encoding)
    }

    /// Sets the journal mode.
    pub fn set_journal_mode(&mut self, mode: JournalMode) -> &mut Self {
        self.insert(mode)
    }

    /// Sets a page-layout option by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOption`] or [`Error::InvalidValue`] as
    /// [`OptionRegistry::resolve`] does, and [`Error::InvalidValue`] for an
    /// option that is not a page-layout option.
    pub fn set(&mut self, name: &str, raw: &str) -> Result<&mut Self> {
        let directive = OptionRegistry::resolve(name, raw)?;
        if directive.phase() != Phase::Deferred {
            return Err(Error::invalid(name, "not a page-layout option"));
        }
        self.entries.insert(directive.name, directive.value);
        Ok(self)
    }

    fn insert<K: OptionKind>(&mut self, value: K) -> &mut Self {
        self.entries.insert(K::NAME, value.value());
        self
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending directives, in application order.
    pub fn directives(&self) -> impl Iterator<Item = Directive> + '_ {
        self.entries.iter().map(|(name, value)| Directive {
            name: *name,
            value: *value,
        })
    }

    /// Applies the pending directives to `handle` and reads back what the
    /// engine actually uses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Directive`] if the engine rejects a directive and
    /// [`Error::Engine`] if an effective value cannot be read.
    pub fn apply(self, handle: &EngineHandle) -> Result<LayoutReport> {
        let conn = handle.connection();
        let mut entries = Vec::with_capacity(self.entries.len());
        for directive in self.directives() {
            if let Some(sql) = directive.sql() {
                conn.execute_batch(&sql).map_err(|source| Error::Directive {
                    name: directive.name.to_string(),
                    source,
                })?;
            }
            entries.push(LayoutEntry {
                option: directive.name,
                requested: directive.value,
                effective: handle.effective_value(directive.name)?,
            });
        }
        let report = LayoutReport { entries };
        for entry in report.mismatches() {
            log::warn!(
                "{} = {} did not take effect (engine reports {})",
                entry.option,
                entry.requested,
                entry.effective
            );
        }
        Ok(report)
    }
}

/// One page-layout option: what was requested and what the engine uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEntry {
    /// The option.
    pub option: OptionName,
    /// Requested value.
    pub requested: OptionValue,
    /// Value the engine reports after applying the directive.
    pub effective: String,
}

impl LayoutEntry {
    /// Whether the engine uses the requested value.
    #[must_use]
    pub fn took_effect(&self) -> bool {
        if let (OptionName::Encoding, OptionValue::Keyword(token)) = (self.option, self.requested) {
            if let Ok(encoding) = token.parse::<Encoding>() {
                return encoding.is_satisfied_by(&self.effective);
            }
        }
        self.requested
            .to_string()
            .eq_ignore_ascii_case(self.effective.trim())
    }
}

/// Outcome of [`PendingLayout::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutReport {
    entries: Vec<LayoutEntry>,
}

impl LayoutReport {
    /// Every applied option.
    #[must_use]
    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    /// Options the engine ignored.
    pub fn mismatches(&self) -> impl Iterator<Item = &LayoutEntry> {
        self.entries.iter().filter(|entry| !entry.took_effect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_layout_options_accepted() {
        let mut layout = PendingLayout::new();
        layout.set("page_size", "8192").expect("page size");
        layout.set("journal_mode", "WAL").expect("journal mode");
        let err = layout.set("busy_timeout", "10").expect_err("general option");
        assert!(matches!(err, Error::InvalidValue { .. }));
        assert!(layout.set_page_size(3000).is_err());
        assert_eq!(layout.directives().count(), 2);
    }

    #[test]
    fn test_took_effect_normalizes() {
        let entry = |option, requested, effective: &str| LayoutEntry {
            option,
            requested,
            effective: effective.to_owned(),
        };
        assert!(entry(OptionName::JournalMode, OptionValue::Keyword("wal"), "wal").took_effect());
        assert!(entry(OptionName::Encoding, OptionValue::Keyword("UTF-16"), "UTF-16le").took_effect());
        assert!(entry(OptionName::PageSize, OptionValue::Integer(65536), "65536").took_effect());
        assert!(!entry(OptionName::PageSize, OptionValue::Integer(65536), "4096").took_effect());
        assert!(!entry(OptionName::AutoVacuum, OptionValue::Keyword("2"), "0").took_effect());
    }
}
