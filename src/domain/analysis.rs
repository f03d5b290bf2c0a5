//! Human-readable market analysis for the latest bar.

use crate::domain::signal::{Classification, Signal};
use crate::domain::snapshot::IndicatorSnapshot;
use crate::domain::strategy::StrategyConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuggestedStop {
    pub price: f64,
    /// Distance to the stop as a percentage of the current price.
    pub risk_pct: f64,
}

/// Stop a fresh position would get at `price` for a directional signal.
pub fn suggested_stop(signal: Signal, price: f64, atr: f64, multiplier: f64) -> Option<SuggestedStop> {
    let distance = multiplier * atr;
    let stop = match signal {
        Signal::Long => price - distance,
        Signal::Short => price + distance,
        Signal::Neutral => return None,
    };
    Some(SuggestedStop {
        price: stop,
        risk_pct: distance / price * 100.0,
    })
}

pub fn insights(
    snapshot: &IndicatorSnapshot,
    classification: &Classification,
    config: &StrategyConfig,
) -> Vec<String> {
    let thresholds = &config.scoring.thresholds;
    let mut insights = Vec::with_capacity(6);

    let trend = if snapshot.ema_fast > snapshot.ema_slow {
        "BULLISH"
    } else {
        "BEARISH"
    };
    insights.push(format!(
        "{trend} trend (EMA {}/{})",
        config.indicators.ema_fast, config.indicators.ema_slow
    ));

    if snapshot.rsi > thresholds.rsi_overbought {
        insights.push(format!(
            "RSI overbought at {:.1}, potential reversal",
            snapshot.rsi
        ));
    } else if snapshot.rsi < thresholds.rsi_oversold {
        insights.push(format!(
            "RSI oversold at {:.1}, potential buying opportunity",
            snapshot.rsi
        ));
    } else {
        insights.push(format!("RSI neutral at {:.1}", snapshot.rsi));
    }

    if snapshot.macd > 0.0 {
        insights.push(format!("MACD bullish ({:.2})", snapshot.macd));
    } else if snapshot.macd < 0.0 {
        insights.push(format!("MACD bearish ({:.2})", snapshot.macd));
    } else {
        insights.push(format!("MACD flat ({:.2})", snapshot.macd));
    }

    if snapshot.close > snapshot.bb_upper {
        insights.push("Price above upper Bollinger band, strong momentum".to_string());
    } else if snapshot.close < snapshot.bb_lower {
        insights.push("Price below lower Bollinger band, potential reversal".to_string());
    } else {
        insights.push("Price within Bollinger bands".to_string());
    }

    if let Some(bands) = config.volatility {
        insights.push(format!(
            "Volatility: {} (ATR: {:.2})",
            bands.classify(snapshot.atr),
            snapshot.atr
        ));
    }

    match suggested_stop(
        classification.signal,
        snapshot.close,
        snapshot.atr,
        config.atr_multiplier,
    ) {
        Some(stop) => insights.push(format!(
            "Suggested stop: {:.2} ({:.1}% risk)",
            stop.price, stop.risk_pct
        )),
        None => insights.push("No directional signal, no stop suggested".to_string()),
    }

    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::Confidence;
    use crate::domain::state_machine::ExitMode;
    use crate::domain::strategy::VolatilityBands;
    use approx::assert_relative_eq;

    fn snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            close: 100.0,
            rsi: 25.0,
            ema_fast: 99.0,
            ema_slow: 98.0,
            macd: 0.4,
            macd_signal: 0.1,
            bb_upper: 105.0,
            bb_middle: 101.0,
            bb_lower: 97.0,
            stoch_k: 40.0,
            stoch_d: 42.0,
            atr: 2.5,
        }
    }

    fn classification(signal: Signal) -> Classification {
        Classification {
            score: 4,
            signal,
            confidence: Confidence::High,
            reasons: vec![],
        }
    }

    #[test]
    fn suggested_stop_long_and_short() {
        let long = suggested_stop(Signal::Long, 100.0, 2.5, 2.0).unwrap();
        assert_relative_eq!(long.price, 95.0);
        assert_relative_eq!(long.risk_pct, 5.0);
        let short = suggested_stop(Signal::Short, 100.0, 2.5, 2.0).unwrap();
        assert_relative_eq!(short.price, 105.0);
        assert!(suggested_stop(Signal::Neutral, 100.0, 2.5, 2.0).is_none());
    }

    #[test]
    fn insights_cover_each_indicator() {
        let config = StrategyConfig::new("eth", "ETH/USDT", ExitMode::AnyChange);
        let insights = insights(&snapshot(), &classification(Signal::Long), &config);
        assert_eq!(insights.len(), 5);
        assert_eq!(insights[0], "BULLISH trend (EMA 50/200)");
        assert!(insights[1].starts_with("RSI oversold at 25.0"));
        assert_eq!(insights[2], "MACD bullish (0.40)");
        assert_eq!(insights[3], "Price within Bollinger bands");
        assert_eq!(insights[4], "Suggested stop: 95.00 (5.0% risk)");
    }

    #[test]
    fn volatility_label_when_bands_configured() {
        let mut config = StrategyConfig::new("sol", "SOL/USDT", ExitMode::StrictReversal);
        config.volatility = Some(VolatilityBands {
            high: 2.0,
            low: 0.5,
        });
        let insights = insights(&snapshot(), &classification(Signal::Neutral), &config);
        assert_eq!(insights[4], "Volatility: HIGH (ATR: 2.50)");
        assert_eq!(insights[5], "No directional signal, no stop suggested");
    }
}
