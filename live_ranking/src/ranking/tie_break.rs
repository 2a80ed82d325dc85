//! Tie-break strategies for runs of equal totals.

use crate::config::TieBreakMethod;
use crate::scoring::Standing;
use enum_dispatch::enum_dispatch;
use std::cmp::Ordering;

/// Ordering rule applied inside a run of equal `total_score`
#[enum_dispatch]
pub trait TieBreaker {
    /// Descending comparison: `Less` means `a` ranks ahead of `b`.
    fn compare(&self, a: &Standing, b: &Standing) -> Ordering;

    fn name(&self) -> &'static str;
}

/// Higher percentage score first
#[derive(Debug, Clone, Copy, Default)]
pub struct PercentageTieBreak;

impl TieBreaker for PercentageTieBreak {
    fn compare(&self, a: &Standing, b: &Standing) -> Ordering {
        b.percentage_score.total_cmp(&a.percentage_score)
    }

    fn name(&self) -> &'static str {
        "PERCENTAGE"
    }
}

/// Higher collective marks first
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectiveMarksTieBreak;

impl TieBreaker for CollectiveMarksTieBreak {
    fn compare(&self, a: &Standing, b: &Standing) -> Ordering {
        b.collective_marks.cmp(&a.collective_marks)
    }

    fn name(&self) -> &'static str {
        "COLLECTIVE_MARKS"
    }
}

/// Higher technical score first
#[derive(Debug, Clone, Copy, Default)]
pub struct TechnicalScoreTieBreak;

impl TieBreaker for TechnicalScoreTieBreak {
    fn compare(&self, a: &Standing, b: &Standing) -> Ordering {
        b.technical_score.cmp(&a.technical_score)
    }

    fn name(&self) -> &'static str {
        "TECHNICAL_SCORE"
    }
}

/// Strategy selected by a configuration's tie-break method
#[enum_dispatch(TieBreaker)]
#[derive(Debug, Clone, Copy)]
pub enum TieBreakStrategy {
    PercentageTieBreak,
    CollectiveMarksTieBreak,
    TechnicalScoreTieBreak,
}

impl From<TieBreakMethod> for TieBreakStrategy {
    fn from(method: TieBreakMethod) -> Self {
        match method {
            TieBreakMethod::Percentage => PercentageTieBreak.into(),
            TieBreakMethod::CollectiveMarks => CollectiveMarksTieBreak.into(),
            TieBreakMethod::TechnicalScore => TechnicalScoreTieBreak.into(),
        }
    }
}

/// Reorders equal-total runs and flags residual ties.
#[derive(Debug, Clone, Copy)]
pub struct TieResolver {
    strategy: TieBreakStrategy,
}

impl TieResolver {
    pub fn new(method: TieBreakMethod) -> Self {
        Self {
            strategy: method.into(),
        }
    }

    pub fn strategy(&self) -> &TieBreakStrategy {
        &self.strategy
    }

    /// Resolve ties in a list already sorted by `total_score` descending.
    ///
    /// Only members of a run of equal totals move, and only relative to each
    /// other. Members still equal under the strategy are flagged `is_tied`
    /// with symmetric `tied_with` lists.
    pub fn resolve(&self, mut standings: Vec<Standing>) -> Vec<Standing> {
        for standing in &mut standings {
            standing.is_tied = false;
            standing.tied_with.clear();
        }

        let mut start = 0;
        while start < standings.len() {
            let total = standings[start].total_score;
            let end = start
                + standings[start..]
                    .iter()
                    .take_while(|s| s.total_score == total)
                    .count();

            if end - start > 1 {
                let run = &mut standings[start..end];
                run.sort_by(|a, b| self.strategy.compare(a, b));
                self.flag_residual_ties(run);
            }
            start = end;
        }

        standings
    }

    fn flag_residual_ties(&self, run: &mut [Standing]) {
        let mut start = 0;
        while start < run.len() {
            let end = start
                + run[start..]
                    .iter()
                    .take_while(|s| self.strategy.compare(&run[start], s) == Ordering::Equal)
                    .count();

            if end - start > 1 {
                let ids: Vec<_> = run[start..end].iter().map(|s| s.participant_id).collect();
                for standing in &mut run[start..end] {
                    standing.is_tied = true;
                    standing.tied_with = ids
                        .iter()
                        .copied()
                        .filter(|id| *id != standing.participant_id)
                        .collect();
                }
            }
            start = end;
        }
    }
}
