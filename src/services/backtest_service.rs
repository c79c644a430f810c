use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use chrono::NaiveDate;
use sqlx::PgPool;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

use crate::db;
use crate::errors::AppError;
use crate::models::{
    BacktestResult, DcaRecommendation, MonthlyPerformance, PerformanceResponse, PricePoint,
    StrategyComparison,
};
use crate::services::dca_service::DcaConfig;

/// Latest close at or before `date`. `prices` must be ascending by date.
pub fn price_on_or_before(prices: &[PricePoint], date: NaiveDate) -> Option<&PricePoint> {
    prices.iter().rev().find(|p| p.date <= date)
}

/// Most recent close, regardless of date. Used for mark-to-market value.
pub fn latest_close(prices: &[PricePoint]) -> Option<&PricePoint> {
    prices.last()
}

/// Resolve the buy date for a `YYYY-MM` month token. Malformed tokens and
/// impossible dates yield `None` and the month is skipped.
pub fn buy_date(month: &str, day: u32) -> Option<NaiveDate> {
    let (year, month_num) = month.split_once('-')?;
    NaiveDate::from_ymd_opt(year.parse().ok()?, month_num.parse().ok()?, day)
}

/// Stored recommendations grouped by month token. BTreeMap keeps the
/// replay chronological because `YYYY-MM` sorts lexicographically.
fn group_by_month(
    recommendations: &[DcaRecommendation],
) -> BTreeMap<String, Vec<&DcaRecommendation>> {
    let mut grouped: BTreeMap<String, Vec<&DcaRecommendation>> = BTreeMap::new();
    for rec in recommendations {
        grouped.entry(rec.month.clone()).or_default().push(rec);
    }
    grouped
}

/// Value cumulative holdings at a point in time. Symbols with no usable
/// price contribute nothing.
fn portfolio_value(
    shares: &HashMap<String, BigDecimal>,
    histories: &HashMap<String, Vec<PricePoint>>,
    at: Option<NaiveDate>,
) -> BigDecimal {
    shares.iter().fold(BigDecimal::zero(), |acc, (symbol, qty)| {
        let price = histories.get(symbol).and_then(|prices| match at {
            Some(date) => price_on_or_before(prices, date),
            None => latest_close(prices),
        });
        match price {
            Some(p) => acc + qty * &p.close_price,
            None => acc,
        }
    })
}

fn return_pct(invested: &BigDecimal, value: &BigDecimal) -> f64 {
    if invested <= &BigDecimal::zero() {
        return 0.0;
    }
    ((value - invested) / invested).to_f64().unwrap_or(0.0) * 100.0
}

/// Replay stored monthly amounts against price history.
///
/// `allocate` maps one month's recommendations to the (symbol, amount)
/// purchases to simulate; the plan replay uses the stored amounts as-is
/// while the equal-split replay redistributes the month's total evenly.
fn replay<F>(
    grouped: &BTreeMap<String, Vec<&DcaRecommendation>>,
    histories: &HashMap<String, Vec<PricePoint>>,
    buy_day: u32,
    allocate: F,
) -> BacktestResult
where
    F: Fn(&[&DcaRecommendation]) -> Vec<(String, BigDecimal)>,
{
    let mut shares: HashMap<String, BigDecimal> = HashMap::new();
    let mut total_invested = BigDecimal::zero();
    let mut monthly = Vec::new();

    for (month, recs) in grouped {
        let Some(date) = buy_date(month, buy_day) else {
            debug!("Skipping month with malformed token: {}", month);
            continue;
        };

        let mut invested = BigDecimal::zero();
        for (symbol, amount) in allocate(recs) {
            let Some(point) = histories
                .get(&symbol)
                .and_then(|prices| price_on_or_before(prices, date))
            else {
                // No price on or before the buy date: skip the purchase,
                // leaving the amount uninvested.
                debug!("No price for {} on or before {}, skipping buy", symbol, date);
                continue;
            };

            let bought = &amount / &point.close_price;
            *shares.entry(symbol).or_insert_with(BigDecimal::zero) += bought;
            invested += amount;
        }

        total_invested = total_invested + &invested;
        let value = portfolio_value(&shares, histories, Some(date));

        monthly.push(MonthlyPerformance {
            month: month.clone(),
            invested,
            shares: shares.clone(),
            cumulative_return_pct: return_pct(&total_invested, &value),
            value,
        });
    }

    let current_value = portfolio_value(&shares, histories, None);
    BacktestResult {
        return_pct: return_pct(&total_invested, &current_value),
        total_invested,
        current_value,
        monthly,
    }
}

/// Plan strategy: buy exactly the stored amount of each recommendation.
pub fn replay_plan(
    grouped: &BTreeMap<String, Vec<&DcaRecommendation>>,
    histories: &HashMap<String, Vec<PricePoint>>,
    buy_day: u32,
) -> BacktestResult {
    replay(grouped, histories, buy_day, |recs| {
        recs.iter()
            .map(|r| (r.symbol.clone(), r.amount.clone()))
            .collect()
    })
}

/// Baseline strategy: split each month's total budget evenly across that
/// month's distinct symbols, ignoring the stored weights. Stored rows are
/// unique per (portfolio, month, symbol), but callers may pass arbitrary
/// slices, so symbols are deduplicated before splitting.
pub fn replay_equal_split(
    grouped: &BTreeMap<String, Vec<&DcaRecommendation>>,
    histories: &HashMap<String, Vec<PricePoint>>,
    buy_day: u32,
) -> BacktestResult {
    replay(grouped, histories, buy_day, |recs| {
        let mut symbols: Vec<String> = Vec::new();
        for rec in recs {
            if !symbols.contains(&rec.symbol) {
                symbols.push(rec.symbol.clone());
            }
        }
        if symbols.is_empty() {
            return Vec::new();
        }

        let total = recs
            .iter()
            .fold(BigDecimal::zero(), |acc, r| acc + &r.amount);
        let share = total / BigDecimal::from(symbols.len() as i64);
        symbols
            .into_iter()
            .map(|symbol| (symbol, share.clone()))
            .collect()
    })
}

/// Replay both strategies over the same recommendation history and diff them.
pub fn compare_strategies(
    recommendations: &[DcaRecommendation],
    histories: &HashMap<String, Vec<PricePoint>>,
    buy_day: u32,
) -> StrategyComparison {
    let grouped = group_by_month(recommendations);
    let plan = replay_plan(&grouped, histories, buy_day);
    let equal_split = replay_equal_split(&grouped, histories, buy_day);

    StrategyComparison {
        value_diff: &plan.current_value - &equal_split.current_value,
        return_diff_pct: plan.return_pct - equal_split.return_pct,
        plan,
        equal_split,
    }
}

/// Load a portfolio's stored recommendations and price histories, then
/// compare the plan against the equal-split baseline.
pub async fn portfolio_performance(
    pool: &PgPool,
    portfolio_id: Uuid,
    config: &DcaConfig,
) -> Result<PerformanceResponse, AppError> {
    let recommendations =
        db::recommendation_queries::fetch_for_portfolio(pool, portfolio_id).await?;
    if recommendations.is_empty() {
        return Err(AppError::NotFound(format!(
            "no recommendations recorded for portfolio {}",
            portfolio_id
        )));
    }

    let mut symbols: Vec<String> = recommendations
        .iter()
        .map(|r| r.symbol.clone())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    symbols.sort();

    let histories = db::price_queries::fetch_history_map(pool, &symbols).await?;

    let months_analyzed = recommendations
        .iter()
        .map(|r| r.month.as_str())
        .collect::<HashSet<_>>()
        .len();

    let comparison = compare_strategies(&recommendations, &histories, config.buy_day);

    Ok(PerformanceResponse {
        comparison,
        months_analyzed,
        symbols,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn points(symbol: &str, series: &[(NaiveDate, &str)]) -> Vec<PricePoint> {
        series
            .iter()
            .map(|(date, close)| PricePoint::test_point(symbol, *date, dec(close)))
            .collect()
    }

    fn rec(month: &str, symbol: &str, amount: &str, weight: &str) -> DcaRecommendation {
        DcaRecommendation {
            id: Uuid::new_v4(),
            portfolio_id: Uuid::new_v4(),
            month: month.to_string(),
            symbol: symbol.to_string(),
            amount: dec(amount),
            weight: dec(weight),
            reason: "test".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn price_lookup_takes_closest_earlier_close() {
        let prices = points(
            "VTI",
            &[
                (day(2024, 1, 2), "100"),
                (day(2024, 1, 31), "110"),
                (day(2024, 3, 1), "120"),
            ],
        );

        // Exact match
        assert_eq!(
            price_on_or_before(&prices, day(2024, 1, 31)).unwrap().close_price,
            dec("110")
        );
        // Gap: fall back to the closest earlier close
        assert_eq!(
            price_on_or_before(&prices, day(2024, 2, 2)).unwrap().close_price,
            dec("110")
        );
        // Before any data
        assert!(price_on_or_before(&prices, day(2023, 12, 31)).is_none());

        assert_eq!(latest_close(&prices).unwrap().close_price, dec("120"));
    }

    #[test]
    fn buy_date_parses_month_tokens() {
        assert_eq!(buy_date("2024-03", 2), Some(day(2024, 3, 2)));
        assert_eq!(buy_date("2024-3", 2), Some(day(2024, 3, 2)));
        assert_eq!(buy_date("garbage", 2), None);
        assert_eq!(buy_date("2024-13", 2), None);
    }

    #[test]
    fn single_buy_at_flat_price_returns_zero() {
        // $100 at $10/share buys 10 shares; with an unchanged price the
        // position is worth exactly what was invested
        let recs = vec![rec("2024-01", "VTI", "100", "100")];
        let histories = HashMap::from([(
            "VTI".to_string(),
            points("VTI", &[(day(2024, 1, 2), "10")]),
        )]);

        let grouped = group_by_month(&recs);
        let result = replay_plan(&grouped, &histories, 2);

        assert_eq!(result.total_invested, dec("100"));
        assert_eq!(result.current_value, dec("100"));
        assert_eq!(result.return_pct, 0.0);

        assert_eq!(result.monthly.len(), 1);
        assert_eq!(result.monthly[0].shares["VTI"], dec("10"));
    }

    #[test]
    fn doubling_price_doubles_value() {
        let recs = vec![rec("2024-01", "VTI", "100", "100")];
        let histories = HashMap::from([(
            "VTI".to_string(),
            points(
                "VTI",
                &[(day(2024, 1, 2), "10"), (day(2024, 6, 3), "20")],
            ),
        )]);

        let grouped = group_by_month(&recs);
        let result = replay_plan(&grouped, &histories, 2);

        assert_eq!(result.current_value, dec("200"));
        assert!((result.return_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn missing_price_skips_the_buy_silently() {
        // No price exists on or before the February buy date for NEWIPO,
        // so only the January buy executes and invested excludes February
        let recs = vec![
            rec("2024-01", "VTI", "100", "50"),
            rec("2024-02", "NEWIPO", "100", "50"),
        ];
        let histories = HashMap::from([
            (
                "VTI".to_string(),
                points("VTI", &[(day(2024, 1, 2), "10")]),
            ),
            (
                "NEWIPO".to_string(),
                points("NEWIPO", &[(day(2024, 5, 1), "10")]),
            ),
        ]);

        let grouped = group_by_month(&recs);
        let result = replay_plan(&grouped, &histories, 2);

        assert_eq!(result.total_invested, dec("100"));
        assert!(result.monthly[1].shares.get("NEWIPO").is_none());
    }

    #[test]
    fn equal_amounts_make_both_strategies_identical() {
        // When the stored plan is already an even split, the equal-split
        // baseline buys exactly the same shares and the diffs are zero
        let recs = vec![
            rec("2024-01", "VTI", "50", "50"),
            rec("2024-01", "BND", "50", "50"),
        ];
        let histories = HashMap::from([
            (
                "VTI".to_string(),
                points("VTI", &[(day(2024, 1, 2), "10"), (day(2024, 6, 3), "14")]),
            ),
            (
                "BND".to_string(),
                points("BND", &[(day(2024, 1, 2), "25"), (day(2024, 6, 3), "24")]),
            ),
        ]);

        let comparison = compare_strategies(&recs, &histories, 2);

        assert_eq!(comparison.value_diff, BigDecimal::zero());
        assert!(comparison.return_diff_pct.abs() < 1e-9);
        assert_eq!(
            comparison.plan.current_value,
            comparison.equal_split.current_value
        );
    }

    #[test]
    fn flat_prices_make_both_strategies_return_zero() {
        // Prices never move, so whatever the allocation, invested and value
        // coincide for both strategies and the comparison is all zeros
        let recs = vec![
            rec("2024-01", "VTI", "70", "70"),
            rec("2024-01", "BND", "30", "30"),
            rec("2024-02", "VTI", "70", "70"),
            rec("2024-02", "BND", "30", "30"),
        ];
        let histories = HashMap::from([
            (
                "VTI".to_string(),
                points("VTI", &[(day(2024, 1, 2), "10"), (day(2024, 2, 2), "10")]),
            ),
            (
                "BND".to_string(),
                points("BND", &[(day(2024, 1, 2), "25"), (day(2024, 2, 2), "25")]),
            ),
        ]);

        let comparison = compare_strategies(&recs, &histories, 2);

        assert_eq!(comparison.plan.total_invested, dec("200"));
        assert_eq!(comparison.plan.current_value, dec("200"));
        assert_eq!(comparison.plan.return_pct, 0.0);
        assert_eq!(comparison.equal_split.total_invested, dec("200"));
        assert_eq!(comparison.equal_split.return_pct, 0.0);
        assert_eq!(comparison.value_diff, BigDecimal::zero());
        assert_eq!(comparison.return_diff_pct, 0.0);
    }

    #[test]
    fn equal_split_divides_by_distinct_symbols() {
        // Duplicate symbol rows in one month must not inflate the divisor:
        // total 100 over two distinct symbols is 50 each
        let recs = vec![
            rec("2024-01", "VTI", "60", "60"),
            rec("2024-01", "VTI", "20", "20"),
            rec("2024-01", "BND", "20", "20"),
        ];
        let histories = HashMap::from([
            (
                "VTI".to_string(),
                points("VTI", &[(day(2024, 1, 2), "10")]),
            ),
            (
                "BND".to_string(),
                points("BND", &[(day(2024, 1, 2), "25")]),
            ),
        ]);

        let grouped = group_by_month(&recs);
        let result = replay_equal_split(&grouped, &histories, 2);

        assert_eq!(result.total_invested, dec("100"));
        assert_eq!(result.monthly[0].shares["VTI"], dec("5"));
        assert_eq!(result.monthly[0].shares["BND"], dec("2"));
    }

    #[test]
    fn overweighting_the_winner_beats_the_even_split() {
        // Plan puts 80% into the stock that rallies; the equal split
        // holds more of the flat stock and underperforms
        let recs = vec![
            rec("2024-01", "WIN", "80", "80"),
            rec("2024-01", "FLAT", "20", "20"),
        ];
        let histories = HashMap::from([
            (
                "WIN".to_string(),
                points("WIN", &[(day(2024, 1, 2), "10"), (day(2024, 6, 3), "20")]),
            ),
            (
                "FLAT".to_string(),
                points("FLAT", &[(day(2024, 1, 2), "10"), (day(2024, 6, 3), "10")]),
            ),
        ]);

        let comparison = compare_strategies(&recs, &histories, 2);

        // Plan: 8 WIN + 2 FLAT -> 160 + 20 = 180
        // Equal: 5 WIN + 5 FLAT -> 100 + 50 = 150
        assert_eq!(comparison.plan.current_value, dec("180"));
        assert_eq!(comparison.equal_split.current_value, dec("150"));
        assert_eq!(comparison.value_diff, dec("30"));
        assert!(comparison.return_diff_pct > 0.0);
    }

    #[test]
    fn replay_is_chronological_and_cumulative() {
        let recs = vec![
            rec("2024-02", "VTI", "100", "100"),
            rec("2024-01", "VTI", "100", "100"),
        ];
        let histories = HashMap::from([(
            "VTI".to_string(),
            points(
                "VTI",
                &[(day(2024, 1, 2), "10"), (day(2024, 2, 2), "20")],
            ),
        )]);

        let grouped = group_by_month(&recs);
        let result = replay_plan(&grouped, &histories, 2);

        assert_eq!(result.monthly[0].month, "2024-01");
        assert_eq!(result.monthly[1].month, "2024-02");
        // 10 shares in January, 5 more in February
        assert_eq!(result.monthly[1].shares["VTI"], dec("15"));
        // February value: 15 shares at 20
        assert_eq!(result.monthly[1].value, dec("300"));
        assert!((result.monthly[1].cumulative_return_pct - 50.0).abs() < 1e-9);
    }
}
