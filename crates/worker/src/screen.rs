//! Weekly screen: build the universe, score every ticker, persist the
//! ranked candidates and refresh the approved universe.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};
use wheel_core::symbols::{is_valid_ticker, normalize_ticker};
use wheel_core::{market_today, EarningsProvider, ScreenerConfig, WheelRules};
use wheel_data::{
    load_universe_csv, ApprovedTicker, CandidateRecord, TickerRecord,
};
use wheel_fundamentals::{
    CompanyProfile, KeyMetricsTtm, NewsItem, Quote, RatiosTtm, ScreenerFilters,
};
use wheel_selection::screening::{
    passes_screen, FundamentalRatios, ScreenFilters, ScreenRejection, ScreeningScores,
};
use wheel_selection::sentiment::headline_sentiment;

use crate::context::JobContext;
use crate::sources::FundamentalsSource;

/// Everything fetched for one ticker before scoring.
#[derive(Debug, Clone, Default)]
pub struct TickerData {
    pub profile: Option<CompanyProfile>,
    pub quote: Option<Quote>,
    pub ratios: Option<RatiosTtm>,
    pub metrics: Option<KeyMetricsTtm>,
    pub news: Vec<NewsItem>,
    /// Cached RSI; never fetched live by the screen.
    pub rsi: Option<f64>,
    pub earnings_date: Option<NaiveDate>,
}

/// A ticker that passed the hard filters, with its scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenedTicker {
    pub ticker: String,
    pub name: String,
    pub exchange: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub price: f64,
    pub market_cap: f64,
    pub beta: Option<f64>,
    pub rsi: Option<f64>,
    pub earnings_date: Option<NaiveDate>,
    pub earnings_in_days: Option<i64>,
    pub scores: ScreeningScores,
    pub sentiment_raw: f64,
    pub features: Value,
}

/// Counters reported at the end of a screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScreenStats {
    pub universe: usize,
    pub profile_missing: usize,
    pub quote_missing: usize,
    pub rsi_missing: usize,
    pub errors: usize,
    pub passed: usize,
    pub rejected: BTreeMap<ScreenRejection, usize>,
}

/// Outcome of `weekly_screen`.
#[derive(Debug, Clone, Serialize)]
pub struct ScreenSummary {
    pub run_id: i64,
    pub universe_source: &'static str,
    pub candidates: usize,
    pub approved: usize,
    pub top: Vec<(String, u32)>,
    pub stats: ScreenStats,
}

/// TTM ratios with key metrics filling P/E and ROE gaps.
#[must_use]
pub fn fundamental_ratios(
    ratios: Option<&RatiosTtm>,
    metrics: Option<&KeyMetricsTtm>,
) -> FundamentalRatios {
    FundamentalRatios {
        net_margin: ratios.and_then(|r| r.net_margin),
        operating_margin: ratios.and_then(|r| r.operating_margin),
        return_on_equity: ratios
            .and_then(|r| r.return_on_equity)
            .or_else(|| metrics.and_then(|m| m.return_on_equity)),
        pe_ratio: ratios
            .and_then(|r| r.pe_ratio)
            .or_else(|| metrics.and_then(|m| m.pe_ratio)),
        debt_to_equity: ratios.and_then(|r| r.debt_to_equity),
    }
}

/// Days from `today` to a future earnings date.
#[must_use]
pub fn earnings_in_days(earnings_date: Option<NaiveDate>, today: NaiveDate) -> Option<i64> {
    earnings_date
        .map(|d| (d - today).num_days())
        .filter(|d| *d > 0)
}

/// Applies the hard filters and scores a ticker.
///
/// # Errors
/// Returns the filter the ticker failed.
pub fn evaluate_ticker(
    ticker: &str,
    data: &TickerData,
    filters: &ScreenFilters,
    rules: &WheelRules,
    today: NaiveDate,
) -> Result<ScreenedTicker, ScreenRejection> {
    let profile = data.profile.as_ref();
    let quote = data.quote.as_ref();

    let price = quote.and_then(|q| q.price);
    let market_cap = profile
        .and_then(|p| p.market_cap)
        .or_else(|| quote.and_then(|q| q.market_cap));
    passes_screen(price, market_cap, filters)?;
    // passes_screen guarantees both are present
    let (price, market_cap) = (price.unwrap_or_default(), market_cap.unwrap_or_default());

    let sentiment_raw = headline_sentiment(data.news.iter().map(|n| n.title.as_str()));
    let ratios = fundamental_ratios(data.ratios.as_ref(), data.metrics.as_ref());
    let year_low = quote.and_then(|q| q.year_low);
    let year_high = quote.and_then(|q| q.year_high);
    let scores =
        ScreeningScores::compute(&ratios, sentiment_raw, Some(price), year_low, year_high, data.rsi);
    let earnings_days = earnings_in_days(data.earnings_date, today);

    let features = json!({
        "profile": profile.map(|p| &p.raw),
        "quote": quote.map(|q| &q.raw),
        "ratios": data.ratios.as_ref().map(|r| &r.raw),
        "metrics": data.metrics.as_ref().map(|m| &m.raw),
        "rsi": data.rsi,
        "rsi_period": rules.rsi_period,
        "rsi_interval": rules.rsi_interval,
        "earnings_date": data.earnings_date,
        "earnings_in_days": earnings_days,
        "news_count": data.news.len(),
        "sentiment_raw": sentiment_raw,
        "fundamentals": ratios,
        "trend": { "price": price, "year_low": year_low, "year_high": year_high },
    });

    Ok(ScreenedTicker {
        ticker: normalize_ticker(ticker),
        name: profile
            .and_then(|p| p.company_name.clone())
            .unwrap_or_else(|| normalize_ticker(ticker)),
        exchange: profile.and_then(|p| p.exchange.clone()),
        sector: profile.and_then(|p| p.sector.clone()),
        industry: profile.and_then(|p| p.industry.clone()),
        price,
        market_cap,
        beta: profile
            .and_then(|p| p.beta)
            .or_else(|| quote.and_then(|q| q.beta)),
        rsi: data.rsi,
        earnings_date: data.earnings_date,
        earnings_in_days: earnings_days,
        scores,
        sentiment_raw,
        features,
    })
}

/// Best wheel score first; ties by larger market cap, then ticker.
pub fn rank_screened(screened: &mut [ScreenedTicker]) {
    screened.sort_by(|a, b| {
        b.scores
            .wheel
            .cmp(&a.scores.wheel)
            .then_with(|| {
                b.market_cap
                    .partial_cmp(&a.market_cap)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
}

/// Candidate row for a ranked ticker (`rank` is 1-based).
#[must_use]
pub fn candidate_record(
    run_id: i64,
    rank: i32,
    screened: &ScreenedTicker,
    rules: &WheelRules,
    filters: &ScreenFilters,
) -> CandidateRecord {
    let s = &screened.scores;
    let mut record = CandidateRecord::new(run_id, &screened.ticker, rank, s.wheel as i32);
    record.price = Some(screened.price);
    record.market_cap = Some(screened.market_cap);
    record.sector.clone_from(&screened.sector);
    record.industry.clone_from(&screened.industry);
    record.beta = screened.beta;
    record.rsi = screened.rsi;
    record.earn_in_days = screened
        .earnings_in_days
        .and_then(|d| i32::try_from(d).ok());
    record.earnings_date = screened.earnings_date;
    record.sentiment_score = Some(s.sentiment as i32);
    record.metrics = json!({
        "wheel_score": s.wheel,
        "fundamentals_score": s.fundamentals,
        "sentiment_score": s.sentiment,
        "trend_score": s.trend,
        "technical_score": s.technical,
        "rsi_period": rules.rsi_period,
        "rsi_interval": rules.rsi_interval,
        "earnings_in_days": screened.earnings_in_days,
        "reasons": {
            "market_cap_min": filters.min_market_cap,
            "price_min": filters.min_price,
            "rsi_missing": screened.rsi.is_none(),
        },
        "features": screened.features,
    });
    record
}

/// Reference row for `tickers`.
#[must_use]
pub fn ticker_record(screened: &ScreenedTicker) -> TickerRecord {
    let mut record = TickerRecord::new(&screened.ticker);
    record.name = Some(screened.name.clone());
    record.exchange.clone_from(&screened.exchange);
    record.sector.clone_from(&screened.sector);
    record.industry.clone_from(&screened.industry);
    record.market_cap = Some(screened.market_cap);
    record.metrics = json!({
        "earnings_in_days": screened.earnings_in_days,
        "earnings_date": screened.earnings_date,
        "wheel_score": screened.scores.wheel,
    });
    record
}

/// Tickers from the configured CSV, else the FMP screener across the
/// configured exchanges. De-duplicated, first-seen order.
///
/// # Errors
/// Returns an error if the CSV cannot be read or every screener call fails.
pub async fn build_universe(
    config: &ScreenerConfig,
    source: &dyn FundamentalsSource,
) -> Result<Vec<String>> {
    if let Some(path) = config.universe_csv.as_deref().filter(|p| !p.trim().is_empty()) {
        return load_universe_csv(path);
    }

    let filters = ScreenerFilters {
        min_price: Some(config.min_price),
        min_market_cap: Some(config.min_market_cap),
        min_avg_volume: Some(config.min_avg_volume),
    };
    let mut seen = HashSet::new();
    let mut universe = Vec::new();
    let mut failures = 0;

    for exchange in &config.exchanges {
        match source
            .company_screener(exchange, config.limit_per_exchange, &filters)
            .await
        {
            Ok(companies) => {
                let before = universe.len();
                for company in companies.iter().filter(|c| c.passes(&filters)) {
                    let ticker = normalize_ticker(&company.symbol);
                    if is_valid_ticker(&ticker) && seen.insert(ticker.clone()) {
                        universe.push(ticker);
                    }
                }
                info!(
                    exchange = %exchange,
                    returned = companies.len(),
                    added = universe.len() - before,
                    "Screener exchange processed"
                );
            }
            Err(e) => {
                failures += 1;
                warn!(exchange = %exchange, error = %e, "Company screener failed");
            }
        }
    }

    if universe.is_empty() && failures > 0 && failures == config.exchanges.len() {
        anyhow::bail!("company screener failed for every exchange");
    }
    Ok(universe)
}

/// Fetches profile, quote, ratios, metrics and news concurrently, plus the
/// next earnings date when a provider is given. Only profile and quote
/// failures are errors; the rest degrade to empty.
///
/// # Errors
/// Returns an error if the profile or quote request fails.
pub async fn gather_ticker(
    source: &dyn FundamentalsSource,
    earnings: Option<&dyn EarningsProvider>,
    ticker: &str,
    news_limit: u32,
    rsi: Option<f64>,
    today: NaiveDate,
) -> Result<TickerData> {
    let (profile, quote, ratios, metrics, news) = tokio::join!(
        source.profile(ticker),
        source.quote(ticker),
        source.ratios_ttm(ticker),
        source.key_metrics_ttm(ticker),
        source.stock_news(ticker, news_limit),
    );

    let ratios = ratios.unwrap_or_else(|e| {
        debug!(ticker, error = %e, "Ratios unavailable");
        None
    });
    let metrics = metrics.unwrap_or_else(|e| {
        debug!(ticker, error = %e, "Key metrics unavailable");
        None
    });
    let news = news.unwrap_or_else(|e| {
        debug!(ticker, error = %e, "News unavailable");
        Vec::new()
    });
    let earnings_date = match earnings {
        Some(provider) => provider
            .next_earnings_date(ticker, today)
            .await
            .unwrap_or_else(|e| {
                debug!(ticker, error = %e, "Earnings date unavailable");
                None
            }),
        None => None,
    };

    Ok(TickerData {
        profile: profile?,
        quote: quote?,
        ratios,
        metrics,
        news,
        rsi,
        earnings_date,
    })
}

/// Scores every ticker in `universe` and returns the ranked survivors.
pub async fn screen_universe(
    universe: &[String],
    source: &dyn FundamentalsSource,
    earnings: Option<&dyn EarningsProvider>,
    cached_rsi: &HashMap<String, f64>,
    config: &ScreenerConfig,
    rules: &WheelRules,
    today: NaiveDate,
) -> (Vec<ScreenedTicker>, ScreenStats) {
    let filters = ScreenFilters {
        min_price: config.min_price,
        min_market_cap: config.min_market_cap,
    };
    let mut stats = ScreenStats {
        universe: universe.len(),
        ..ScreenStats::default()
    };
    let mut screened = Vec::new();

    for (i, ticker) in universe.iter().enumerate() {
        let rsi = cached_rsi.get(ticker).copied();
        let data = match gather_ticker(source, earnings, ticker, config.news_limit, rsi, today).await
        {
            Ok(data) => data,
            Err(e) => {
                stats.errors += 1;
                warn!(ticker = %ticker, error = %e, "Ticker fetch failed");
                continue;
            }
        };
        if data.profile.is_none() {
            stats.profile_missing += 1;
        }
        if data.quote.is_none() {
            stats.quote_missing += 1;
        }

        match evaluate_ticker(ticker, &data, &filters, rules, today) {
            Ok(t) => {
                if t.rsi.is_none() {
                    stats.rsi_missing += 1;
                }
                stats.passed += 1;
                debug!(ticker = %t.ticker, wheel = t.scores.wheel, "Ticker passed screen");
                screened.push(t);
            }
            Err(reason) => {
                *stats.rejected.entry(reason).or_insert(0) += 1;
                debug!(ticker = %ticker, reason = ?reason, "Ticker filtered");
            }
        }

        if (i + 1) % 50 == 0 {
            info!(processed = i + 1, total = universe.len(), passed = stats.passed, "Screen progress");
        }
    }

    rank_screened(&mut screened);
    (screened, stats)
}

/// Runs the weekly screen end to end with run bookkeeping.
///
/// # Errors
/// Returns an error if FMP is not configured, the universe is empty or any
/// persistence step fails; the run is marked failed in the latter cases.
pub async fn weekly_screen(ctx: &JobContext) -> Result<ScreenSummary> {
    let config = &ctx.config;
    let rules = &config.rules;
    let fmp = ctx.fmp()?;
    let universe_source = if config.screener.universe_csv.is_some() {
        "csv"
    } else {
        "fmp"
    };

    info!(
        csp_delta = ?(rules.csp_delta_min, rules.csp_delta_max),
        cc_delta = ?(rules.cc_delta_min, rules.cc_delta_max),
        dte_primary = ?(rules.dte_min_primary, rules.dte_max_primary),
        dte_fallback = ?(rules.dte_min_fallback, rules.dte_max_fallback),
        earnings_avoid_days = rules.earnings_avoid_days,
        rsi_period = rules.rsi_period,
        rsi_interval = %rules.rsi_interval,
        "Wheel rules in effect"
    );

    let universe = build_universe(&config.screener, &fmp).await?;
    if universe.is_empty() {
        anyhow::bail!("universe is empty (source={universe_source})");
    }
    let universe_size = i32::try_from(universe.len()).unwrap_or(i32::MAX);
    let run_id = ctx
        .repos
        .runs
        .create_run(
            &format!("STARTED: weekly screener running (universe_source={universe_source})"),
            universe_size,
        )
        .await?;
    info!(run_id, universe = universe.len(), source = universe_source, "Screening run started");

    let result = async {
        let today = market_today();
        let cached_rsi = ctx
            .repos
            .snapshots
            .latest_rsi_many(&rules.rsi_interval, rules.rsi_period as i32, Utc::now())
            .await?;
        let (screened, stats) = screen_universe(
            &universe,
            &fmp,
            Some(&fmp as &dyn EarningsProvider),
            &cached_rsi,
            &config.screener,
            rules,
            today,
        )
        .await;

        let filters = ScreenFilters {
            min_price: config.screener.min_price,
            min_market_cap: config.screener.min_market_cap,
        };
        let candidates: Vec<CandidateRecord> = screened
            .iter()
            .enumerate()
            .map(|(i, t)| candidate_record(run_id, i as i32 + 1, t, rules, &filters))
            .collect();
        let tickers: Vec<TickerRecord> = screened.iter().map(ticker_record).collect();
        let approved: Vec<ApprovedTicker> = candidates
            .iter()
            .take(config.screener.approved_top_n)
            .map(|c| ApprovedTicker {
                ticker: c.ticker.clone(),
                last_rank: c.rank,
                last_score: c.score,
            })
            .collect();

        ctx.repos.tickers.upsert_many(&tickers).await?;
        ctx.repos.candidates.insert_many(&candidates).await?;
        ctx.repos.approved.replace(run_id, &approved).await?;

        Ok::<_, anyhow::Error>(ScreenSummary {
            run_id,
            universe_source,
            candidates: candidates.len(),
            approved: approved.len(),
            top: screened
                .iter()
                .take(10)
                .map(|t| (t.ticker.clone(), t.scores.wheel))
                .collect(),
            stats,
        })
    }
    .await;

    match result {
        Ok(summary) => {
            ctx.repos
                .runs
                .mark_success(
                    run_id,
                    Some(summary.candidates as i32),
                    Some(0),
                    Some(&format!(
                        "OK: candidates written (source={universe_source})"
                    )),
                )
                .await?;
            info!(
                run_id,
                candidates = summary.candidates,
                approved = summary.approved,
                passed = summary.stats.passed,
                errors = summary.stats.errors,
                rejected = ?summary.stats.rejected,
                "Weekly screen complete"
            );
            Ok(summary)
        }
        Err(e) => {
            if let Err(mark_err) = ctx.repos.runs.mark_failed(run_id, &format!("{e:#}")).await {
                warn!(run_id, error = %mark_err, "Failed to mark run as failed");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use wheel_fundamentals::ScreenerCompany;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn profile(symbol: &str, market_cap: f64) -> CompanyProfile {
        CompanyProfile {
            symbol: symbol.to_string(),
            company_name: Some(format!("{symbol} Inc")),
            sector: Some("Technology".to_string()),
            industry: None,
            exchange: Some("NASDAQ".to_string()),
            market_cap: Some(market_cap),
            beta: Some(1.1),
            raw: json!({"symbol": symbol}),
        }
    }

    fn quote(symbol: &str, price: f64) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            price: Some(price),
            market_cap: None,
            year_low: Some(price * 0.7),
            year_high: Some(price * 1.3),
            avg_volume: Some(5_000_000.0),
            beta: None,
            raw: json!({"price": price}),
        }
    }

    fn ratios(net_margin: f64) -> RatiosTtm {
        RatiosTtm {
            net_margin: Some(net_margin),
            operating_margin: Some(0.25),
            return_on_equity: None,
            pe_ratio: None,
            debt_to_equity: Some(0.8),
            raw: json!({}),
        }
    }

    #[derive(Default)]
    struct FakeFmp {
        companies: HashMap<String, (f64, f64, f64)>,
        screener_calls: Mutex<Vec<String>>,
    }

    impl FakeFmp {
        fn with(mut self, symbol: &str, price: f64, market_cap: f64, net_margin: f64) -> Self {
            self.companies
                .insert(symbol.to_string(), (price, market_cap, net_margin));
            self
        }
    }

    #[async_trait]
    impl FundamentalsSource for FakeFmp {
        async fn company_screener(
            &self,
            exchange: &str,
            _limit: u32,
            _filters: &ScreenerFilters,
        ) -> Result<Vec<ScreenerCompany>> {
            self.screener_calls.lock().unwrap().push(exchange.to_string());
            if exchange == "AMEX" {
                anyhow::bail!("503");
            }
            let mut symbols: Vec<&String> = self.companies.keys().collect();
            symbols.sort();
            Ok(symbols
                .into_iter()
                .map(|s| ScreenerCompany {
                    symbol: s.to_lowercase(),
                    name: s.clone(),
                    exchange: Some(exchange.to_string()),
                    price: Some(self.companies[s].0),
                    market_cap: Some(self.companies[s].1),
                    avg_volume: None,
                })
                .collect())
        }

        async fn profile(&self, symbol: &str) -> Result<Option<CompanyProfile>> {
            if symbol == "FAIL" {
                anyhow::bail!("network down");
            }
            Ok(self.companies.get(symbol).map(|c| profile(symbol, c.1)))
        }

        async fn quote(&self, symbol: &str) -> Result<Option<Quote>> {
            Ok(self.companies.get(symbol).map(|c| quote(symbol, c.0)))
        }

        async fn ratios_ttm(&self, symbol: &str) -> Result<Option<RatiosTtm>> {
            Ok(self.companies.get(symbol).map(|c| ratios(c.2)))
        }

        async fn key_metrics_ttm(&self, _symbol: &str) -> Result<Option<KeyMetricsTtm>> {
            Ok(Some(KeyMetricsTtm {
                pe_ratio: Some(18.0),
                return_on_equity: Some(0.3),
                raw: json!({}),
            }))
        }

        async fn stock_news(&self, _symbol: &str, _limit: u32) -> Result<Vec<NewsItem>> {
            anyhow::bail!("news endpoint down")
        }
    }

    struct FixedEarnings(Option<NaiveDate>);

    #[async_trait]
    impl EarningsProvider for FixedEarnings {
        async fn next_earnings_date(
            &self,
            _symbol: &str,
            _today: NaiveDate,
        ) -> Result<Option<NaiveDate>> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_metrics_fill_ratio_gaps() {
        let r = ratios(0.2);
        let m = KeyMetricsTtm {
            pe_ratio: Some(22.0),
            return_on_equity: Some(0.18),
            raw: json!({}),
        };
        let merged = fundamental_ratios(Some(&r), Some(&m));
        assert_eq!(merged.net_margin, Some(0.2));
        assert_eq!(merged.pe_ratio, Some(22.0));
        assert_eq!(merged.return_on_equity, Some(0.18));
        assert_eq!(fundamental_ratios(None, None), FundamentalRatios::default());
    }

    #[test]
    fn test_evaluate_applies_filters() {
        let filters = ScreenFilters {
            min_price: 5.0,
            min_market_cap: 2e9,
        };
        let rules = WheelRules::default();

        let mut data = TickerData::default();
        assert_eq!(
            evaluate_ticker("X", &data, &filters, &rules, today()),
            Err(ScreenRejection::PriceMissing)
        );

        data.quote = Some(quote("X", 50.0));
        assert_eq!(
            evaluate_ticker("X", &data, &filters, &rules, today()),
            Err(ScreenRejection::MarketCapMissing)
        );

        data.profile = Some(profile("X", 1e9));
        assert_eq!(
            evaluate_ticker("X", &data, &filters, &rules, today()),
            Err(ScreenRejection::MarketCapTooSmall)
        );

        data.profile = Some(profile("X", 5e9));
        data.quote = Some(quote("X", 3.0));
        assert_eq!(
            evaluate_ticker("X", &data, &filters, &rules, today()),
            Err(ScreenRejection::PriceTooLow)
        );
    }

    #[test]
    fn test_evaluate_scores_and_earnings() {
        let filters = ScreenFilters {
            min_price: 5.0,
            min_market_cap: 2e9,
        };
        let data = TickerData {
            profile: Some(profile("aapl", 3e12)),
            quote: Some(quote("aapl", 100.0)),
            ratios: Some(ratios(0.25)),
            metrics: None,
            news: vec![NewsItem {
                title: "Apple beats estimates, raises guidance".to_string(),
                published: None,
                url: None,
            }],
            rsi: None,
            earnings_date: NaiveDate::from_ymd_opt(2025, 3, 13),
        };
        let t = evaluate_ticker("aapl", &data, &filters, &WheelRules::default(), today()).unwrap();
        assert_eq!(t.ticker, "AAPL");
        assert_eq!(t.earnings_in_days, Some(10));
        assert_eq!(t.scores.technical, 50);
        // price in the middle of the 52-week range
        assert_eq!(t.scores.trend, 100);
        assert!(t.sentiment_raw > 0.0);
        assert_eq!(t.beta, Some(1.1));
        assert_eq!(t.features["news_count"], 1);
    }

    #[test]
    fn test_past_earnings_not_counted() {
        assert_eq!(earnings_in_days(NaiveDate::from_ymd_opt(2025, 3, 1), today()), None);
        assert_eq!(earnings_in_days(Some(today()), today()), None);
        assert_eq!(earnings_in_days(None, today()), None);
    }

    #[tokio::test]
    async fn test_universe_from_screener_dedupes_and_tolerates_failures() {
        let fake = FakeFmp::default()
            .with("AAPL", 100.0, 3e12, 0.25)
            .with("KO", 60.0, 2.5e11, 0.2);
        let config = ScreenerConfig::default();
        let universe = build_universe(&config, &fake).await.unwrap();
        assert_eq!(universe, vec!["AAPL", "KO"]);
        assert_eq!(fake.screener_calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_screen_universe_ranks_and_counts() {
        let fake = FakeFmp::default()
            .with("AAPL", 100.0, 3e12, 0.25)
            .with("WEAK", 20.0, 3e9, -0.1)
            .with("TINY", 20.0, 1e8, 0.3)
            .with("PENNY", 2.0, 5e9, 0.3);
        let universe: Vec<String> = ["WEAK", "AAPL", "TINY", "PENNY", "FAIL", "MISSING"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut rsi = HashMap::new();
        rsi.insert("AAPL".to_string(), 55.0);
        let earnings = FixedEarnings(NaiveDate::from_ymd_opt(2025, 3, 20));

        let (screened, stats) = screen_universe(
            &universe,
            &fake,
            Some(&earnings as &dyn EarningsProvider),
            &rsi,
            &ScreenerConfig::default(),
            &WheelRules::default(),
            today(),
        )
        .await;

        let tickers: Vec<&str> = screened.iter().map(|t| t.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["AAPL", "WEAK"]);
        assert_eq!(screened[0].rsi, Some(55.0));
        assert_eq!(screened[0].earnings_in_days, Some(17));
        assert_eq!(stats.universe, 6);
        assert_eq!(stats.passed, 2);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.profile_missing, 1);
        assert_eq!(stats.rsi_missing, 1);
        assert_eq!(stats.rejected[&ScreenRejection::MarketCapTooSmall], 1);
        assert_eq!(stats.rejected[&ScreenRejection::PriceTooLow], 1);
        assert_eq!(stats.rejected[&ScreenRejection::PriceMissing], 1);
    }

    #[test]
    fn test_candidate_and_ticker_records() {
        let filters = ScreenFilters {
            min_price: 5.0,
            min_market_cap: 2e9,
        };
        let data = TickerData {
            profile: Some(profile("KO", 2.5e11)),
            quote: Some(quote("KO", 60.0)),
            earnings_date: NaiveDate::from_ymd_opt(2025, 3, 8),
            ..TickerData::default()
        };
        let rules = WheelRules::default();
        let t = evaluate_ticker("KO", &data, &filters, &rules, today()).unwrap();

        let c = candidate_record(9, 3, &t, &rules, &filters);
        assert_eq!((c.run_id, c.rank, c.score), (9, 3, t.scores.wheel as i32));
        assert_eq!(c.earn_in_days, Some(5));
        assert_eq!(c.metrics["reasons"]["rsi_missing"], true);
        assert_eq!(c.earnings_date_from(today()), NaiveDate::from_ymd_opt(2025, 3, 8));

        let tr = ticker_record(&t);
        assert_eq!(tr.name.as_deref(), Some("KO Inc"));
        assert_eq!(tr.earnings_date_from(today()), NaiveDate::from_ymd_opt(2025, 3, 8));
    }
}
