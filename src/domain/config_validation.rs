//! Strategy file loading and validation.
//!
//! Reads the `[strategy]`, `[indicators]` and `[rules]` sections through a
//! [`ConfigPort`] and collects them into a [`StrategyConfig`]. Every value is
//! checked here; cross-checks between rules and declared indicators happen
//! when the engine is built.

use crate::domain::error::EngineError;
use crate::domain::indicator::IndicatorType;
use crate::domain::rule_parser::{parse, parse_indicator_list};
use crate::domain::signal::{MutualExclusion, RuleSet, SignalKind};
use crate::domain::strategy::{StrategyConfig, Timeframe};
use crate::ports::config_port::ConfigPort;

const STRATEGY: &str = "strategy";
const INDICATORS: &str = "indicators";
const RULES: &str = "rules";

pub fn load_strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, EngineError> {
    let name = required(config, STRATEGY, "name")?;
    let description = config.get_string(STRATEGY, "description").unwrap_or_default();
    let timeframe = load_timeframe(config)?;
    let startup_candle_count = load_startup_candle_count(config)?;
    let mutual_exclusion = load_mutual_exclusion(config)?;
    let rules = load_rules(config)?;
    let indicators = load_indicators(config, &rules)?;

    tracing::debug!(
        source = config.source_name(),
        strategy = %name,
        indicators = indicators.len(),
        rules = rules.iter().count(),
        "loaded strategy"
    );

    Ok(StrategyConfig {
        name,
        description,
        timeframe,
        startup_candle_count,
        indicators,
        rules,
        mutual_exclusion,
    })
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, EngineError> {
    config
        .get_string(section, key)
        .ok_or_else(|| EngineError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> EngineError {
    EngineError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn load_timeframe(config: &dyn ConfigPort) -> Result<Timeframe, EngineError> {
    required(config, STRATEGY, "timeframe")?
        .parse()
        .map_err(|reason: String| invalid(STRATEGY, "timeframe", reason))
}

fn load_startup_candle_count(config: &dyn ConfigPort) -> Result<usize, EngineError> {
    match config.get_string(STRATEGY, "startup_candle_count") {
        None => Ok(0),
        Some(s) => s.parse().map_err(|_| {
            invalid(
                STRATEGY,
                "startup_candle_count",
                format!("expected a non-negative integer, got '{}'", s),
            )
        }),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn load_mutual_exclusion(config: &dyn ConfigPort) -> Result<MutualExclusion, EngineError> {
    let key = "mutually_exclusive_entries";
    match config.get_string(STRATEGY, key) {
        None => Ok(MutualExclusion::default()),
        Some(s) => match parse_bool(&s) {
            Some(true) => Ok(MutualExclusion::SuppressBoth),
            Some(false) => Ok(MutualExclusion::Disabled),
            None => Err(invalid(
                STRATEGY,
                key,
                format!("expected true or false, got '{}'", s),
            )),
        },
    }
}

fn load_rules(config: &dyn ConfigPort) -> Result<RuleSet, EngineError> {
    let mut rules = RuleSet::default();
    for kind in SignalKind::ALL {
        let Some(text) = config.get_string(RULES, kind.key()) else {
            continue;
        };
        let rule = parse(&text).map_err(|err| {
            tracing::warn!(
                rule = kind.key(),
                "rule does not parse:\n{}",
                err.display_with_context(&text)
            );
            EngineError::RuleParse(err)
        })?;
        rules.set(kind, Some(rule));
    }
    if rules.iter().next().is_none() {
        return Err(EngineError::ConfigMissing {
            section: RULES.to_string(),
            key: "enter_long, enter_short, exit_long or exit_short".to_string(),
        });
    }
    Ok(rules)
}

/// Declared indicators, or every referenced one when nothing is declared.
fn load_indicators(
    config: &dyn ConfigPort,
    rules: &RuleSet,
) -> Result<Vec<IndicatorType>, EngineError> {
    let Some(text) = config.get_string(INDICATORS, "declare") else {
        tracing::debug!("no [indicators] declare, using indicators referenced by rules");
        return Ok(rules
            .referenced_indicators()
            .into_iter()
            .map(|(_, indicator)| indicator)
            .collect());
    };
    parse_indicator_list(&text).map_err(|err| {
        tracing::warn!(
            "indicator list does not parse:\n{}",
            err.display_with_context(&text)
        );
        EngineError::RuleParse(err)
    })
}
