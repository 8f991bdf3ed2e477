//! Per-bar trading signals and the emitter that derives them from a rule set.

use std::fmt;

use chrono::NaiveDateTime;

use crate::domain::indicator::IndicatorType;
use crate::domain::rule::{extract_indicators, Rule};
use crate::domain::rule_eval::{evaluate, History};

/// The four signal slots of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    EnterLong,
    EnterShort,
    ExitLong,
    ExitShort,
}

impl SignalKind {
    pub const ALL: [SignalKind; 4] = [
        SignalKind::EnterLong,
        SignalKind::EnterShort,
        SignalKind::ExitLong,
        SignalKind::ExitShort,
    ];

    /// Key used in strategy files and CSV headers.
    pub fn key(&self) -> &'static str {
        match self {
            SignalKind::EnterLong => "enter_long",
            SignalKind::EnterShort => "enter_short",
            SignalKind::ExitLong => "exit_long",
            SignalKind::ExitShort => "exit_short",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignalVector {
    pub enter_long: bool,
    pub enter_short: bool,
    pub exit_long: bool,
    pub exit_short: bool,
}

impl SignalVector {
    pub fn get(&self, kind: SignalKind) -> bool {
        match kind {
            SignalKind::EnterLong => self.enter_long,
            SignalKind::EnterShort => self.enter_short,
            SignalKind::ExitLong => self.exit_long,
            SignalKind::ExitShort => self.exit_short,
        }
    }

    fn set(&mut self, kind: SignalKind, value: bool) {
        match kind {
            SignalKind::EnterLong => self.enter_long = value,
            SignalKind::EnterShort => self.enter_short = value,
            SignalKind::ExitLong => self.exit_long = value,
            SignalKind::ExitShort => self.exit_short = value,
        }
    }

    /// 0/1 export in `enter_long, enter_short, exit_long, exit_short` order.
    pub fn to_bits(&self) -> [u8; 4] {
        SignalKind::ALL.map(|kind| u8::from(self.get(kind)))
    }

    pub fn any(&self) -> bool {
        self.enter_long || self.enter_short || self.exit_long || self.exit_short
    }
}

/// Signals of one bar, tagged with its position in the series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarSignals {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub signals: SignalVector,
}

/// Condition trees per signal slot. A missing tree never fires.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    pub enter_long: Option<Rule>,
    pub enter_short: Option<Rule>,
    pub exit_long: Option<Rule>,
    pub exit_short: Option<Rule>,
}

impl RuleSet {
    pub fn get(&self, kind: SignalKind) -> Option<&Rule> {
        match kind {
            SignalKind::EnterLong => self.enter_long.as_ref(),
            SignalKind::EnterShort => self.enter_short.as_ref(),
            SignalKind::ExitLong => self.exit_long.as_ref(),
            SignalKind::ExitShort => self.exit_short.as_ref(),
        }
    }

    pub fn set(&mut self, kind: SignalKind, rule: Option<Rule>) {
        match kind {
            SignalKind::EnterLong => self.enter_long = rule,
            SignalKind::EnterShort => self.enter_short = rule,
            SignalKind::ExitLong => self.exit_long = rule,
            SignalKind::ExitShort => self.exit_short = rule,
        }
    }

    /// Present rules with their slot.
    pub fn iter(&self) -> impl Iterator<Item = (SignalKind, &Rule)> {
        SignalKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|rule| (kind, rule)))
    }

    /// Indicators referenced by any rule, each paired with the first slot using it.
    pub fn referenced_indicators(&self) -> Vec<(SignalKind, IndicatorType)> {
        let mut out: Vec<(SignalKind, IndicatorType)> = Vec::new();
        for (kind, rule) in self.iter() {
            for indicator in extract_indicators(rule) {
                if !out.iter().any(|(_, seen)| *seen == indicator) {
                    out.push((kind, indicator));
                }
            }
        }
        out
    }
}

/// Policy for bars where both entry rules fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutualExclusion {
    /// Both entries are forced to 0.
    #[default]
    SuppressBoth,
    /// Both entries pass through.
    Disabled,
}

/// Turns a rule set into per-bar signal vectors.
#[derive(Debug, Clone)]
pub struct SignalEmitter {
    rules: RuleSet,
    startup_candle_count: usize,
    mutual_exclusion: MutualExclusion,
}

impl SignalEmitter {
    pub fn new(
        rules: RuleSet,
        startup_candle_count: usize,
        mutual_exclusion: MutualExclusion,
    ) -> Self {
        Self {
            rules,
            startup_candle_count,
            mutual_exclusion,
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Signals for the bar `history` is positioned on.
    pub fn emit(&self, history: &History) -> SignalVector {
        let mut signals = SignalVector::default();
        if history.index() < self.startup_candle_count {
            return signals;
        }
        for (kind, rule) in self.rules.iter() {
            signals.set(kind, evaluate(rule, history));
        }
        if self.mutual_exclusion == MutualExclusion::SuppressBoth
            && signals.enter_long
            && signals.enter_short
        {
            tracing::debug!(
                index = history.index(),
                "both entry rules fired, suppressing entries"
            );
            signals.enter_long = false;
            signals.enter_short = false;
        }
        signals
    }
}
