// ABOUTME: Placeholder resolution for a single slide build
// ABOUTME: Picks the best unclaimed placeholder for a content role with deterministic fallbacks

use crate::errors::{DeckError, Result};
use crate::layouts::{LayoutDescriptor, PlaceholderDescriptor, PlaceholderKind};
use log::debug;
use std::collections::HashSet;
use std::fmt;

/// What a piece of content needs from a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderRole {
    Title,
    Body,
    Picture,
}

impl PlaceholderRole {
    fn kind(self) -> PlaceholderKind {
        match self {
            Self::Title => PlaceholderKind::Title,
            Self::Body => PlaceholderKind::Body,
            Self::Picture => PlaceholderKind::Picture,
        }
    }
}

impl fmt::Display for PlaceholderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind(), f)
    }
}

/// Claim state for one slide's build pass.
///
/// Claims never outlive the pass, so every slide starts from the full
/// inventory of its layout.
#[derive(Debug)]
pub struct ResolutionPass<'a> {
    layout: &'a LayoutDescriptor,
    claimed: HashSet<usize>,
}

impl<'a> ResolutionPass<'a> {
    pub fn new(layout: &'a LayoutDescriptor) -> Self {
        Self {
            layout,
            claimed: HashSet::new(),
        }
    }

    pub fn layout(&self) -> &'a LayoutDescriptor {
        self.layout
    }

    pub fn is_claimed(&self, placeholder: &PlaceholderDescriptor) -> bool {
        self.position_of(placeholder)
            .map_or(false, |pos| self.claimed.contains(&pos))
    }

    fn position_of(&self, placeholder: &PlaceholderDescriptor) -> Option<usize> {
        self.layout
            .placeholders
            .iter()
            .position(|ph| std::ptr::eq(ph, placeholder))
    }

    /// Resolve and claim a placeholder.
    ///
    /// Order: an unclaimed placeholder named `name`; the `ordinal`-th
    /// placeholder of the role's type in index order (the first unclaimed one
    /// at or after that position); the lowest-index unclaimed `Other`
    /// placeholder. Fails with `PlaceholderNotFound` when nothing remains.
    pub fn resolve(
        &mut self,
        role: PlaceholderRole,
        ordinal: usize,
        name: Option<&str>,
    ) -> Result<&'a PlaceholderDescriptor> {
        let layout: &'a LayoutDescriptor = self.layout;
        let placeholders = &layout.placeholders;

        let by_name = name.and_then(|wanted| {
            placeholders
                .iter()
                .enumerate()
                .find(|(pos, ph)| ph.name == wanted && !self.claimed.contains(pos))
        });

        let by_type = || {
            placeholders
                .iter()
                .enumerate()
                .filter(|(_, ph)| ph.kind == role.kind())
                .skip(ordinal)
                .find(|(pos, _)| !self.claimed.contains(pos))
        };

        let by_other = || {
            placeholders
                .iter()
                .enumerate()
                .filter(|(pos, ph)| ph.kind == PlaceholderKind::Other && !self.claimed.contains(pos))
                .min_by_key(|(_, ph)| ph.index)
        };

        let (pos, placeholder, via) = if let Some((pos, ph)) = by_name {
            (pos, ph, "name")
        } else if let Some((pos, ph)) = by_type() {
            (pos, ph, "type")
        } else if let Some((pos, ph)) = by_other() {
            (pos, ph, "other fallback")
        } else {
            return Err(self.not_found(role, ordinal, name));
        };

        self.claimed.insert(pos);
        debug!(
            "Resolved {} #{} on '{}' to '{}' (idx {}) by {}",
            role, ordinal, self.layout.name, placeholder.name, placeholder.index, via
        );
        Ok(placeholder)
    }

    fn not_found(&self, role: PlaceholderRole, ordinal: usize, name: Option<&str>) -> DeckError {
        let wanted = match name {
            Some(name) => format!("{} #{} (name '{}')", role, ordinal + 1, name),
            None => format!("{} #{}", role, ordinal + 1),
        };
        let available = self
            .layout
            .placeholders
            .iter()
            .enumerate()
            .map(|(pos, ph)| {
                format!(
                    "  - name='{}', type={}, idx={}{}",
                    ph.name,
                    ph.kind,
                    ph.index,
                    if self.claimed.contains(&pos) { " (claimed)" } else { "" }
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        DeckError::PlaceholderNotFound {
            layout: self.layout.name.clone(),
            wanted,
            available: if available.is_empty() {
                "  (none)".to_string()
            } else {
                available
            },
        }
    }
}
