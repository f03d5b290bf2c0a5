//! Weighted multi-indicator signal scoring.
//!
//! Each indicator contributes a signed vote; the summed score is classified into
//! LONG/SHORT/NEUTRAL with a confidence label. Scoring needs the current and the
//! previous snapshot because the Stochastic vote looks for a %K/%D crossover.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::snapshot::IndicatorSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Long,
    Short,
    Neutral,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Long => write!(f, "LONG"),
            Signal::Short => write!(f, "SHORT"),
            Signal::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LONG" => Ok(Signal::Long),
            "SHORT" => Ok(Signal::Short),
            "NEUTRAL" => Ok(Signal::Neutral),
            other => Err(format!("unknown signal '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Low => write!(f, "LOW"),
            Confidence::Medium => write!(f, "MEDIUM"),
            Confidence::High => write!(f, "HIGH"),
        }
    }
}

/// Points each component adds or subtracts. A weight of 0 disables the
/// component entirely.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringWeights {
    pub trend: i32,
    pub macd: i32,
    pub rsi: i32,
    pub bollinger: i32,
    pub stochastic: i32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            trend: 1,
            macd: 1,
            rsi: 2,
            bollinger: 1,
            stochastic: 2,
        }
    }
}

impl ScoringWeights {
    /// Largest attainable |score|.
    pub fn max_score(&self) -> i32 {
        self.trend.abs()
            + self.macd.abs()
            + self.rsi.abs()
            + self.bollinger.abs()
            + self.stochastic.abs()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringThresholds {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub stoch_oversold: f64,
    pub stoch_overbought: f64,
    pub signal_threshold: i32,
    pub high_confidence: i32,
    pub medium_confidence: i32,
}

impl Default for ScoringThresholds {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            stoch_oversold: 20.0,
            stoch_overbought: 80.0,
            signal_threshold: 3,
            high_confidence: 4,
            medium_confidence: 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    pub thresholds: ScoringThresholds,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub score: i32,
    pub signal: Signal,
    pub confidence: Confidence,
    pub reasons: Vec<String>,
}

/// Outcome of evaluating one bar.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// The bar or its predecessor has undefined indicators.
    WarmingUp,
    Ready(Classification),
}

impl Evaluation {
    pub fn classification(&self) -> Option<&Classification> {
        match self {
            Evaluation::WarmingUp => None,
            Evaluation::Ready(c) => Some(c),
        }
    }
}

pub fn signal_for_score(score: i32, thresholds: &ScoringThresholds) -> Signal {
    if score >= thresholds.signal_threshold {
        Signal::Long
    } else if score <= -thresholds.signal_threshold {
        Signal::Short
    } else {
        Signal::Neutral
    }
}

pub fn confidence_for_score(score: i32, thresholds: &ScoringThresholds) -> Confidence {
    let magnitude = score.abs();
    if magnitude >= thresholds.high_confidence {
        Confidence::High
    } else if magnitude >= thresholds.medium_confidence {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Score a bar against its predecessor.
pub fn score_snapshot(
    current: &IndicatorSnapshot,
    previous: &IndicatorSnapshot,
    config: &ScoringConfig,
) -> Classification {
    let w = &config.weights;
    let t = &config.thresholds;
    let mut score = 0;
    let mut reasons = Vec::new();

    if w.trend != 0 {
        if current.ema_fast > current.ema_slow {
            score += w.trend;
            reasons.push("EMA trend up".to_string());
        } else {
            score -= w.trend;
            reasons.push("EMA trend down".to_string());
        }
    }

    if w.macd != 0 {
        if current.macd > current.macd_signal {
            score += w.macd;
            reasons.push("MACD above signal".to_string());
        } else {
            score -= w.macd;
            reasons.push("MACD below signal".to_string());
        }
    }

    if w.rsi != 0 {
        if current.rsi < t.rsi_oversold {
            score += w.rsi;
            reasons.push(format!("RSI oversold ({:.1})", current.rsi));
        } else if current.rsi > t.rsi_overbought {
            score -= w.rsi;
            reasons.push(format!("RSI overbought ({:.1})", current.rsi));
        }
    }

    if w.bollinger != 0 {
        if current.close < current.bb_lower {
            score += w.bollinger;
            reasons.push("Price below lower Bollinger band".to_string());
        } else if current.close > current.bb_upper {
            score -= w.bollinger;
            reasons.push("Price above upper Bollinger band".to_string());
        }
    }

    if w.stochastic != 0 {
        let crossed_up = previous.stoch_k < previous.stoch_d && current.stoch_k > current.stoch_d;
        let crossed_down = previous.stoch_k > previous.stoch_d && current.stoch_k < current.stoch_d;
        if crossed_up && current.stoch_k < t.stoch_oversold {
            score += w.stochastic;
            reasons.push("Stochastic bullish crossover".to_string());
        } else if crossed_down && current.stoch_k > t.stoch_overbought {
            score -= w.stochastic;
            reasons.push("Stochastic bearish crossover".to_string());
        }
    }

    let signal = signal_for_score(score, t);
    if signal == Signal::Neutral {
        match score.signum() {
            1 => reasons.push("Bias: bullish".to_string()),
            -1 => reasons.push("Bias: bearish".to_string()),
            _ => {}
        }
    }

    Classification {
        score,
        signal,
        confidence: confidence_for_score(score, t),
        reasons,
    }
}

/// Classify a bar, refusing to score when either snapshot is undefined.
pub fn classify(
    current: Option<&IndicatorSnapshot>,
    previous: Option<&IndicatorSnapshot>,
    config: &ScoringConfig,
) -> Evaluation {
    match (current, previous) {
        (Some(cur), Some(prev)) => Evaluation::Ready(score_snapshot(cur, prev, config)),
        _ => Evaluation::WarmingUp,
    }
}
