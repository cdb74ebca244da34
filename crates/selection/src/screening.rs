//! Underlying screening scores (0-100 each) and the weighted wheel score.

use serde::{Deserialize, Serialize};

/// Trailing-twelve-month ratios used by the fundamentals score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalRatios {
    pub net_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
}

/// Component scores for one ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningScores {
    pub fundamentals: u32,
    pub sentiment: u32,
    pub trend: u32,
    pub technical: u32,
    pub wheel: u32,
}

impl ScreeningScores {
    #[must_use]
    pub fn compute(
        ratios: &FundamentalRatios,
        sentiment: f64,
        price: Option<f64>,
        year_low: Option<f64>,
        year_high: Option<f64>,
        rsi: Option<f64>,
    ) -> Self {
        let fundamentals = score_fundamentals(ratios);
        let sentiment = score_sentiment(sentiment);
        let trend = score_trend_proxy(price, year_low, year_high);
        let technical = clamp_score(score_technical(rsi));
        Self {
            fundamentals,
            sentiment,
            trend,
            technical,
            wheel: wheel_score(fundamentals, sentiment, trend, technical),
        }
    }
}

/// Hard screening thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenFilters {
    pub min_price: f64,
    pub min_market_cap: f64,
}

/// Why a ticker was dropped by the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenRejection {
    PriceMissing,
    MarketCapMissing,
    MarketCapTooSmall,
    PriceTooLow,
}

/// Applies the hard filters in order: price present, market cap present,
/// market cap minimum, price minimum. RSI is never a filter.
///
/// # Errors
///
/// Returns the first filter the ticker fails.
pub fn passes_screen(
    price: Option<f64>,
    market_cap: Option<f64>,
    filters: &ScreenFilters,
) -> Result<(), ScreenRejection> {
    let price = match price {
        Some(p) if p > 0.0 => p,
        _ => return Err(ScreenRejection::PriceMissing),
    };
    let Some(market_cap) = market_cap else {
        return Err(ScreenRejection::MarketCapMissing);
    };
    if market_cap < filters.min_market_cap {
        return Err(ScreenRejection::MarketCapTooSmall);
    }
    if price < filters.min_price {
        return Err(ScreenRejection::PriceTooLow);
    }
    Ok(())
}

fn clamp_score(x: f64) -> u32 {
    x.round().clamp(0.0, 100.0) as u32
}

/// Profitability (70 pts), valuation (20) and leverage (10), normalised
/// over the weights that had data. 40 when nothing is known.
#[must_use]
pub fn score_fundamentals(r: &FundamentalRatios) -> u32 {
    let mut s = 0.0;
    let mut w = 0.0;

    if let Some(npm) = r.net_margin {
        s += (npm.clamp(-0.10, 0.30) + 0.10) / 0.40 * 25.0;
        w += 25.0;
    }
    if let Some(opm) = r.operating_margin {
        s += (opm.clamp(-0.10, 0.35) + 0.10) / 0.45 * 20.0;
        w += 20.0;
    }
    if let Some(roe) = r.return_on_equity {
        s += roe.clamp(0.0, 0.35) / 0.35 * 25.0;
        w += 25.0;
    }
    if let Some(pe) = r.pe_ratio.filter(|pe| *pe > 0.0) {
        let v = if pe <= 25.0 {
            1.0
        } else if pe <= 40.0 {
            1.0 - (pe - 25.0) / 15.0 * 0.6
        } else {
            0.2
        };
        s += v * 20.0;
        w += 20.0;
    }
    if let Some(de) = r.debt_to_equity.filter(|de| *de >= 0.0) {
        let v = if de <= 1.0 {
            1.0
        } else if de <= 2.5 {
            1.0 - (de - 1.0) / 1.5 * 0.7
        } else {
            0.2
        };
        s += v * 10.0;
        w += 10.0;
    }

    if w == 0.0 {
        return 40;
    }
    clamp_score(s / w * 100.0)
}

/// Maps sentiment in `[-1, 1]` onto 0-100.
#[must_use]
pub fn score_sentiment(sentiment: f64) -> u32 {
    clamp_score((sentiment + 1.0) * 50.0)
}

/// Prefers prices mid-way through the 52-week range. 50 when unknown.
#[must_use]
pub fn score_trend_proxy(price: Option<f64>, year_low: Option<f64>, year_high: Option<f64>) -> u32 {
    let (Some(price), Some(low), Some(high)) = (price, year_low, year_high) else {
        return 50;
    };
    if (high - low).abs() < f64::EPSILON {
        return 50;
    }
    let pos = (price - low) / (high - low);
    clamp_score(100.0 * (1.0 - ((pos - 0.5).abs() / 0.5).min(1.0)))
}

/// RSI sanity: 100 inside 30-70, linear to 0 at the extremes, 50 when missing.
#[must_use]
pub fn score_technical(rsi: Option<f64>) -> f64 {
    match rsi {
        None => 50.0,
        Some(r) if (30.0..=70.0).contains(&r) => 100.0,
        Some(r) if r < 30.0 => (100.0 * r / 30.0).clamp(0.0, 100.0),
        Some(r) => (100.0 * (100.0 - r) / 30.0).clamp(0.0, 100.0),
    }
}

/// 50% fundamentals, 20% sentiment, 20% trend, 10% technical.
#[must_use]
pub fn wheel_score(fundamentals: u32, sentiment: u32, trend: u32, technical: u32) -> u32 {
    clamp_score(
        0.50 * f64::from(fundamentals)
            + 0.20 * f64::from(sentiment)
            + 0.20 * f64::from(trend)
            + 0.10 * f64::from(technical),
    )
}
