use crate::types::{InvestorFlow, StockSnapshot};

/// Rate at or above which a stock counts toward the surge bonus
pub const SURGE_RATE: f64 = 10.0;
/// Rate at or above which a stock counts toward the limit-up bonus
pub const LIMIT_UP_RANK_RATE: f64 = 29.0;

/// Traded-value-weighted mean rate; unweighted mean when no value traded.
pub fn theme_score(stocks: &[StockSnapshot]) -> f64 {
    if stocks.is_empty() {
        return 0.0;
    }

    let total_amount: f64 = stocks.iter().map(|s| s.amount.max(0.0)).sum();
    if total_amount > 0.0 {
        stocks.iter().map(|s| s.rate * s.amount.max(0.0)).sum::<f64>() / total_amount
    } else {
        average_rate(stocks)
    }
}

pub fn average_rate(stocks: &[StockSnapshot]) -> f64 {
    if stocks.is_empty() {
        return 0.0;
    }
    stocks.iter().map(|s| s.rate).sum::<f64>() / stocks.len() as f64
}

pub fn total_volume(stocks: &[StockSnapshot]) -> f64 {
    stocks.iter().map(|s| s.amount).sum()
}

/// Composite rank used to choose core themes.
///
/// volume/100 + avgRate*10 + 5 per surging stock + 20 per limit-up stock + 10 for 3+ stocks
pub fn rank_score(stocks: &[StockSnapshot]) -> f64 {
    if stocks.is_empty() {
        return 0.0;
    }

    let volume_score = total_volume(stocks) / 100.0;
    let rate_score = average_rate(stocks) * 10.0;
    let surge_bonus = stocks.iter().filter(|s| s.rate >= SURGE_RATE).count() as f64 * 5.0;
    let limit_up_bonus = stocks.iter().filter(|s| s.rate >= LIMIT_UP_RANK_RATE).count() as f64 * 20.0;
    let count_bonus = if stocks.len() >= 3 { 10.0 } else { 0.0 };

    volume_score + rate_score + surge_bonus + limit_up_bonus + count_bonus
}

/// Net-buy tier from combined foreign + institutional flow (억 won): -2..=2
pub fn supply_tier(net_buy: f64) -> i8 {
    if net_buy >= 100.0 {
        2
    } else if net_buy >= 50.0 {
        1
    } else if net_buy <= -100.0 {
        -2
    } else if net_buy <= -50.0 {
        -1
    } else {
        0
    }
}

/// Short-interest risk tier from short ratio (%): 0..=3
pub fn short_risk_tier(short_ratio: f64) -> u8 {
    if short_ratio >= 20.0 {
        3
    } else if short_ratio >= 10.0 {
        2
    } else if short_ratio >= 5.0 {
        1
    } else {
        0
    }
}

/// Per-stock supply/demand adjustment in score points, within [-1.45, 1.0].
pub fn supply_adjustment(flow: &InvestorFlow) -> f64 {
    let bonus = supply_tier(flow.net_buy()) as f64 / 2.0;
    let penalty = flow.short_ratio.map(short_risk_tier).unwrap_or(0) as f64 * 0.15;
    bonus - penalty
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CandidateSource;

    fn stock(rate: f64, amount: f64) -> StockSnapshot {
        StockSnapshot::new(format!("s{rate}_{amount}"), rate, amount, CandidateSource::HotMovers)
    }

    #[test]
    fn test_weighted_score() {
        let stocks = vec![stock(32.0, 200.0), stock(15.0, 150.0), stock(8.0, 50.0)];
        let score = theme_score(&stocks);
        assert!((score - 22.625).abs() < 1e-9);
    }

    #[test]
    fn test_unweighted_fallback() {
        let stocks = vec![stock(4.0, 0.0), stock(-2.0, 0.0)];
        assert!((theme_score(&stocks) - 1.0).abs() < 1e-9);
        assert_eq!(theme_score(&[]), 0.0);
    }

    #[test]
    fn test_score_bounded_by_extremes() {
        let cases = vec![
            vec![stock(1.0, 10.0), stock(9.0, 1000.0), stock(-3.0, 5.0)],
            vec![stock(-5.0, 0.0), stock(5.0, 0.0)],
            vec![stock(29.9, 1.0)],
            vec![stock(0.5, 300.0), stock(0.7, 0.0), stock(12.0, 0.1)],
        ];
        for stocks in cases {
            let score = theme_score(&stocks);
            let min = stocks.iter().map(|s| s.rate).fold(f64::INFINITY, f64::min);
            let max = stocks.iter().map(|s| s.rate).fold(f64::NEG_INFINITY, f64::max);
            assert!(score >= min - 1e-9 && score <= max + 1e-9, "{score} not in [{min}, {max}]");
        }
    }

    #[test]
    fn test_rank_score_components() {
        // volume 400/100 = 4, avg 55/3*10 = 183.33, surge 2*5, limit-up 1*20, count 10
        let stocks = vec![stock(32.0, 200.0), stock(15.0, 150.0), stock(8.0, 50.0)];
        let expected = 4.0 + (55.0 / 3.0) * 10.0 + 10.0 + 20.0 + 10.0;
        assert!((rank_score(&stocks) - expected).abs() < 1e-9);
        assert_eq!(rank_score(&[]), 0.0);
    }

    #[test]
    fn test_supply_adjustment_bounds() {
        let strong = InvestorFlow { code: "a".into(), foreign_net_buy: 80.0, institution_net_buy: 40.0, short_ratio: Some(1.0) };
        assert_eq!(supply_adjustment(&strong), 1.0);

        let weak = InvestorFlow { code: "b".into(), foreign_net_buy: -150.0, institution_net_buy: 0.0, short_ratio: Some(25.0) };
        assert!((supply_adjustment(&weak) - (-1.45)).abs() < 1e-9);

        let mild = InvestorFlow { code: "c".into(), foreign_net_buy: 30.0, institution_net_buy: 25.0, short_ratio: None };
        assert_eq!(supply_adjustment(&mild), 0.5);
    }
}
