//! Cross-instrument market consensus from each instrument's latest signal.

use std::fmt;

use crate::domain::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketSentiment {
    StrongBullish,
    StrongBearish,
    BullishBias,
    BearishBias,
    Neutral,
    NoData,
}

impl fmt::Display for MarketSentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketSentiment::StrongBullish => write!(f, "STRONG BULLISH"),
            MarketSentiment::StrongBearish => write!(f, "STRONG BEARISH"),
            MarketSentiment::BullishBias => write!(f, "BULLISH BIAS"),
            MarketSentiment::BearishBias => write!(f, "BEARISH BIAS"),
            MarketSentiment::Neutral => write!(f, "NEUTRAL"),
            MarketSentiment::NoData => write!(f, "NO DATA"),
        }
    }
}

/// Instruments agreeing on a direction needed for a STRONG label.
pub const STRONG_AGREEMENT: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct LatestSignal {
    pub instrument: String,
    /// `None` when the instrument has no recorded signal yet.
    pub signal: Option<Signal>,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusReport {
    pub sentiment: MarketSentiment,
    pub insight: String,
    pub longs: usize,
    pub shorts: usize,
    pub neutrals: usize,
    pub signals: Vec<LatestSignal>,
}

pub fn assess(signals: Vec<LatestSignal>) -> ConsensusReport {
    let known: Vec<Signal> = signals.iter().filter_map(|s| s.signal).collect();
    let longs = known.iter().filter(|s| **s == Signal::Long).count();
    let shorts = known.iter().filter(|s| **s == Signal::Short).count();
    let neutrals = known.len() - longs - shorts;
    let total = known.len();

    let (sentiment, insight) = if total == 0 {
        (
            MarketSentiment::NoData,
            "No instrument has reported a signal yet.".to_string(),
        )
    } else if longs >= STRONG_AGREEMENT {
        (
            MarketSentiment::StrongBullish,
            format!("{longs}/{total} instruments are signalling LONG."),
        )
    } else if shorts >= STRONG_AGREEMENT {
        (
            MarketSentiment::StrongBearish,
            format!("{shorts}/{total} instruments are signalling SHORT."),
        )
    } else if longs > shorts {
        (
            MarketSentiment::BullishBias,
            "Market leaning bullish.".to_string(),
        )
    } else if shorts > longs {
        (
            MarketSentiment::BearishBias,
            "Market leaning bearish.".to_string(),
        )
    } else {
        (
            MarketSentiment::Neutral,
            "Market is sideways or contradictory.".to_string(),
        )
    };

    ConsensusReport {
        sentiment,
        insight,
        longs,
        shorts,
        neutrals,
        signals,
    }
}
