//! Filter composition.
//!
//! A [`FilterSpec`] is a plain value: every field is an independent
//! predicate and a row is kept only when all active predicates accept it.
//! Unset fields impose no constraint, so applying the same spec twice, or
//! applying its predicates in any order, gives the same view.

use super::clock::Clock;
use super::dataset::{Dataset, Domain};
use crate::error::{PipelineError, PipelineResult};
use crate::models::Observation;
use chrono::{Datelike, Days, NaiveDate};
use std::collections::BTreeSet;
use tracing::debug;

/// Either every value or an explicit allow-list.
///
/// `All` is the unrestricted sentinel. Building a selection from an empty
/// list yields `All`: an empty selection means "no restriction", never
/// "filter everything out".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl Selection {
    /// Allow-list from names; empty input gives [`Selection::All`].
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        if set.is_empty() {
            Selection::All
        } else {
            Selection::Only(set)
        }
    }

    pub fn is_all(&self) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(set) => set.is_empty(),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(set) => set.is_empty() || set.contains(value),
        }
    }

    /// Names in the allow-list that are missing from `known`.
    fn unknown(&self, known: &BTreeSet<String>) -> Vec<String> {
        match self {
            Selection::All => Vec::new(),
            Selection::Only(set) => set.difference(known).cloned().collect(),
        }
    }

    fn describe(&self, field: &str) -> Option<String> {
        match self {
            Selection::Only(set) if !set.is_empty() => Some(format!(
                "{}: {}",
                field,
                set.iter().cloned().collect::<Vec<_>>().join(", ")
            )),
            _ => None,
        }
    }
}

/// Date restriction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateWindow {
    #[default]
    All,
    /// Explicit range, inclusive on both ends.
    Range { start: NaiveDate, end: NaiveDate },
    /// The last `days` days up to and including today.
    Relative { days: u64 },
}

impl DateWindow {
    /// Resolve to a concrete inclusive date range, if any.
    ///
    /// Relative windows read the clock here, so the result depends on when
    /// the filter is evaluated.
    pub fn resolve(&self, clock: &impl Clock) -> PipelineResult<Option<(NaiveDate, NaiveDate)>> {
        match *self {
            DateWindow::All => Ok(None),
            DateWindow::Range { start, end } => {
                if start > end {
                    return Err(PipelineError::InvalidDateRange { start, end });
                }
                Ok(Some((start, end)))
            }
            DateWindow::Relative { days } => {
                let today = clock.today();
                let cutoff = today
                    .checked_sub_days(Days::new(days))
                    .unwrap_or(NaiveDate::MIN);
                Ok(Some((cutoff, today)))
            }
        }
    }
}

/// Conjunction of independent row predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub groups: Selection,
    pub entities: Selection,
    pub metrics: Selection,
    /// Calendar year of the timestamp; `None` means every year.
    pub year: Option<i32>,
    pub window: DateWindow,
}

impl FilterSpec {
    /// A spec with no active predicate.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = Selection::only(groups);
        self
    }

    pub fn with_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities = Selection::only(entities);
        self
    }

    pub fn with_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = Selection::only(metrics);
        self
    }

    pub fn with_year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    pub fn with_window(mut self, window: DateWindow) -> Self {
        self.window = window;
        self
    }

    /// True when no predicate is active.
    pub fn is_unrestricted(&self) -> bool {
        self.groups.is_all()
            && self.entities.is_all()
            && self.metrics.is_all()
            && self.year.is_none()
            && self.window == DateWindow::All
    }

    /// Check every referenced name against the domain.
    pub fn validate(&self, domain: &Domain) -> PipelineResult<()> {
        let checks = [
            ("group", &self.groups, &domain.groups),
            ("entity", &self.entities, &domain.entities),
            ("metric", &self.metrics, &domain.metrics),
        ];
        for (field, selection, known) in checks {
            let unknown = selection.unknown(known);
            if !unknown.is_empty() {
                return Err(PipelineError::InvalidFilter { field, unknown });
            }
        }
        Ok(())
    }

    /// Evaluate all predicates against one row.
    fn accepts(&self, obs: &Observation, range: Option<(NaiveDate, NaiveDate)>) -> bool {
        if !self.groups.matches(&obs.group_id) || !self.entities.matches(&obs.entity_id) {
            return false;
        }
        if !self.metrics.matches(&obs.metric) {
            return false;
        }
        if let Some(year) = self.year {
            if obs.timestamp.year() != year {
                return false;
            }
        }
        match range {
            Some((start, end)) => {
                let date = obs.date();
                start <= date && date <= end
            }
            None => true,
        }
    }

    /// One line per active predicate, for reports and logs.
    pub fn describe(&self, clock: &impl Clock) -> Vec<String> {
        let mut lines: Vec<String> = [
            self.groups.describe("Groups"),
            self.entities.describe("Entities"),
            self.metrics.describe("Metrics"),
        ]
        .into_iter()
        .flatten()
        .collect();

        if let Some(year) = self.year {
            lines.push(format!("Year: {}", year));
        }
        match self.window {
            DateWindow::All => {}
            DateWindow::Range { start, end } => lines.push(if start == NaiveDate::MIN {
                format!("Dates: until {}", end)
            } else if end == NaiveDate::MAX {
                format!("Dates: from {}", start)
            } else {
                format!("Dates: {} to {}", start, end)
            }),
            DateWindow::Relative { days } => match self.window.resolve(clock) {
                Ok(Some((start, end))) => {
                    lines.push(format!("Last {} days: {} to {}", days, start, end));
                }
                _ => lines.push(format!("Last {} days", days)),
            },
        }
        lines
    }
}

/// Applies [`FilterSpec`]s against an injected clock.
#[derive(Debug, Clone)]
pub struct FilterComposer<C> {
    clock: C,
}

impl<C: Clock> FilterComposer<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Reduce `dataset` to the rows accepted by every active predicate.
    ///
    /// Fails with [`PipelineError::InvalidFilter`] when the spec names a
    /// group, entity or metric the dataset's domain does not contain.
    pub fn apply(&self, dataset: &Dataset, spec: &FilterSpec) -> PipelineResult<Dataset> {
        spec.validate(dataset.domain())?;
        let range = spec.window.resolve(&self.clock)?;

        let rows: Vec<Observation> = dataset
            .rows()
            .iter()
            .filter(|obs| spec.accepts(obs, range))
            .cloned()
            .collect();

        debug!(
            "Filter kept {} of {} observations (range: {:?})",
            rows.len(),
            dataset.len(),
            range
        );

        Ok(dataset.derive(rows))
    }
}
