//! Session-gated confidence grade (0-3 stars) for selected themes.

use std::collections::HashMap;

use theme_core::{is_reserved_name, scoring, SessionPhase, StockSnapshot, Theme};

/// Rate treated as limit-up when the feed carries no explicit flag
pub const LIMIT_UP_RATE: f64 = 29.9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarRating {
    pub stars: u8,
    pub reason: String,
}

impl StarRating {
    fn new(stars: u8, reason: impl Into<String>) -> Self {
        Self {
            stars,
            reason: reason.into(),
        }
    }
}

struct Metrics {
    count: usize,
    score: f64,
    total_volume: f64,
    limit_up: usize,
    surging: usize,
    all_above_7: bool,
    above_5: usize,
    negatives: usize,
    dispersed: bool,
}

impl Metrics {
    fn of(stocks: &[StockSnapshot]) -> Self {
        let count = stocks.len();
        let total_volume = scoring::total_volume(stocks);
        let max_amount = stocks.iter().map(|s| s.amount).fold(0.0_f64, f64::max);
        let avg_amount = if count > 0 { total_volume / count as f64 } else { 0.0 };

        Self {
            count,
            score: scoring::theme_score(stocks),
            total_volume,
            limit_up: stocks.iter().filter(|s| is_limit_up(s)).count(),
            surging: stocks.iter().filter(|s| s.rate >= scoring::SURGE_RATE).count(),
            all_above_7: count > 0 && stocks.iter().all(|s| s.rate >= 7.0),
            above_5: stocks.iter().filter(|s| s.rate >= 5.0).count(),
            negatives: stocks.iter().filter(|s| s.rate < 0.0).count(),
            dispersed: total_volume > 0.0 && max_amount < 3.0 * avg_amount,
        }
    }

    fn surging_share(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.surging as f64 / self.count as f64
        }
    }

    fn one_star(&self) -> Vec<&'static str> {
        let mut met = Vec::new();
        if self.limit_up >= 1 {
            met.push("상한가 종목 포함");
        }
        if self.surging >= 2 && self.score >= 5.0 {
            met.push("10% 이상 2종목 + 점수 5% 이상");
        }
        if self.count >= 3 && self.all_above_7 {
            met.push("3종목 이상 모두 7% 이상");
        }
        met
    }

    fn two_star(&self) -> Vec<&'static str> {
        let mut met = Vec::new();
        if self.limit_up >= 1 {
            met.push("상한가 종목");
        }
        if self.surging_share() >= 0.5 {
            met.push("절반 이상 10% 이상");
        }
        if self.score >= 8.0 {
            met.push("점수 8% 이상");
        }
        if self.total_volume >= 500.0 {
            met.push("거래대금 500억 이상");
        }
        if self.above_5 >= 4 {
            met.push("5% 이상 4종목");
        }
        met
    }

    fn three_star(&self) -> Vec<&'static str> {
        let mut met = Vec::new();
        if self.limit_up >= 2 {
            met.push("상한가 2종목 이상");
        }
        if self.score >= 12.0 {
            met.push("점수 12% 이상");
        }
        if self.total_volume >= 1000.0 {
            met.push("거래대금 1000억 이상");
        }
        if self.surging_share() >= 0.7 {
            met.push("70% 이상 종목 10% 이상");
        }
        if self.negatives == 0 {
            met.push("하락 종목 없음");
        }
        if self.dispersed {
            met.push("거래대금 분산");
        }
        met
    }
}

fn is_limit_up(stock: &StockSnapshot) -> bool {
    stock.rate >= LIMIT_UP_RATE || stock.is_upper_limit()
}

fn phase_label(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::PreMarket => "장 시작 전",
        SessionPhase::Opening => "장 초반",
        SessionPhase::Morning => "오전장",
        SessionPhase::Midday => "점심장",
        SessionPhase::Closing => "마감장",
        SessionPhase::AfterMarket => "시간외",
        SessionPhase::Closed => "장 마감",
    }
}

/// Rule-based grader. Each tier requires the one below it.
#[derive(Debug, Clone, Copy, Default)]
pub struct StarRater;

impl StarRater {
    pub fn new() -> Self {
        Self
    }

    /// Nested tier verdicts `[1★, 2★, 3★]` before any phase cap.
    pub fn tiers(&self, theme: &Theme) -> [bool; 3] {
        if !self.is_eligible(theme) {
            return [false; 3];
        }
        let m = Metrics::of(&theme.stocks);
        let one = !m.one_star().is_empty();
        let two = one && m.two_star().len() >= 2;
        let three = two && m.three_star().len() >= 3;
        [one, two, three]
    }

    fn is_eligible(&self, theme: &Theme) -> bool {
        !theme.is_special
            && !is_reserved_name(&theme.name)
            && theme.stocks.len() >= 2
            && scoring::theme_score(&theme.stocks) > 0.0
    }

    /// Uncapped grade from the theme's current stocks.
    pub fn evaluate(&self, theme: &Theme) -> StarRating {
        if theme.is_special || is_reserved_name(&theme.name) {
            return StarRating::new(0, "해당 없음");
        }
        if !self.is_eligible(theme) {
            return StarRating::new(0, "조건 미충족");
        }

        let m = Metrics::of(&theme.stocks);
        let one = m.one_star();
        if one.is_empty() {
            return StarRating::new(0, "조건 미충족");
        }
        let two = m.two_star();
        if two.len() < 2 {
            return StarRating::new(1, format!("1★ {}", one.join(", ")));
        }
        let three = m.three_star();
        if three.len() < 3 {
            return StarRating::new(2, format!("2★ {}", two.join(", ")));
        }
        StarRating::new(3, format!("3★ {}", three.join(", ")))
    }

    /// Grade capped by the session phase. After the close a higher previous
    /// grade for the same theme id is kept.
    pub fn rate(&self, theme: &Theme, phase: SessionPhase, previous: Option<u8>) -> StarRating {
        let raw = self.evaluate(theme);
        if theme.is_special || is_reserved_name(&theme.name) {
            return raw;
        }

        let cap = phase.max_stars();
        let mut rating = if raw.stars > cap {
            StarRating::new(
                cap,
                format!("{}★ ({} 상한, 산정 {}★)", cap, phase_label(phase), raw.stars),
            )
        } else {
            raw
        };

        if phase.retains_rating() {
            if let Some(prev) = previous.map(|p| p.min(cap)) {
                if prev > rating.stars {
                    rating = StarRating::new(prev, format!("{}★ 유지 ({})", prev, phase_label(phase)));
                }
            }
        }

        rating
    }

    /// Rate every theme in place; `previous` maps theme id to last published stars.
    pub fn apply(&self, themes: &mut [Theme], phase: SessionPhase, previous: &HashMap<String, u8>) {
        for theme in themes.iter_mut() {
            let rating = self.rate(theme, phase, previous.get(&theme.id).copied());
            theme.stars = rating.stars;
            theme.star_reason = rating.reason;
        }

        let rated: Vec<String> = themes
            .iter()
            .filter(|t| t.stars > 0)
            .map(|t| format!("{}({}★)", t.name, t.stars))
            .collect();
        tracing::info!("⭐ Star ratings [{:?}]: {}", phase, if rated.is_empty() { "-".to_string() } else { rated.join(", ") });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use theme_core::{CandidateSource, LimitType, INDIVIDUAL_ISSUE};

    fn stock(name: &str, rate: f64, amount: f64) -> StockSnapshot {
        StockSnapshot::new(name, rate, amount, CandidateSource::HotMovers)
    }

    fn scenario_theme() -> Theme {
        Theme::new(
            "로봇",
            vec![stock("a", 32.0, 200.0), stock("b", 15.0, 150.0), stock("c", 8.0, 50.0)],
        )
    }

    const ALL_PHASES: [SessionPhase; 7] = [
        SessionPhase::PreMarket,
        SessionPhase::Opening,
        SessionPhase::Morning,
        SessionPhase::Midday,
        SessionPhase::Closing,
        SessionPhase::AfterMarket,
        SessionPhase::Closed,
    ];

    #[test]
    fn test_scenario_closing_three_stars() {
        let rating = StarRater::new().rate(&scenario_theme(), SessionPhase::Closing, None);
        assert_eq!(rating.stars, 3);
        assert_eq!(rating.reason, "3★ 점수 12% 이상, 하락 종목 없음, 거래대금 분산");
    }

    #[test]
    fn test_phase_caps() {
        let rater = StarRater::new();
        let theme = scenario_theme();
        for phase in ALL_PHASES {
            let rating = rater.rate(&theme, phase, None);
            assert!(rating.stars <= phase.max_stars(), "{:?}", phase);
        }
        assert_eq!(rater.rate(&theme, SessionPhase::Opening, None).stars, 0);
        assert_eq!(rater.rate(&theme, SessionPhase::PreMarket, Some(3)).stars, 0);

        let midday = rater.rate(&theme, SessionPhase::Midday, None);
        assert_eq!(midday.stars, 2);
        assert_eq!(midday.reason, "2★ (점심장 상한, 산정 3★)");
    }

    #[test]
    fn test_tiers_are_nested() {
        let rater = StarRater::new();
        let rates = [-3.0, 0.5, 5.0, 7.0, 9.0, 10.0, 12.0, 18.0, 29.9, 30.0];
        let amounts = [0.0, 20.0, 150.0, 600.0];

        let mut seed: usize = 7;
        for _ in 0..400 {
            let n = 2 + seed % 5;
            let stocks: Vec<StockSnapshot> = (0..n)
                .map(|i| {
                    seed = seed.wrapping_mul(1103515245).wrapping_add(12345) % 2147483648;
                    stock(&format!("s{i}"), rates[seed % rates.len()], amounts[(seed / 7) % amounts.len()])
                })
                .collect();
            let theme = Theme::new("반도체", stocks);
            let [one, two, three] = rater.tiers(&theme);
            assert!(!three || two);
            assert!(!two || one);

            let stars = rater.evaluate(&theme).stars;
            assert_eq!(stars as usize, [one, two, three].iter().filter(|t| **t).count());
        }
    }

    #[test]
    fn test_special_and_thin_themes_get_zero() {
        let rater = StarRater::new();
        let special = Theme::special(INDIVIDUAL_ISSUE, String::new(), vec![stock("a", 30.0, 500.0), stock("b", 30.0, 500.0)]);
        let rating = rater.rate(&special, SessionPhase::Closing, Some(3));
        assert_eq!(rating, StarRating::new(0, "해당 없음"));

        let single = Theme::new("조선", vec![stock("a", 30.0, 500.0)]);
        assert_eq!(rater.evaluate(&single).stars, 0);

        let falling = Theme::new("조선", vec![stock("a", -2.0, 500.0), stock("b", -1.0, 500.0)]);
        assert_eq!(rater.evaluate(&falling).stars, 0);
    }

    #[test]
    fn test_upper_limit_flag_counts_as_limit_up() {
        let mut flagged = stock("a", 25.0, 10.0);
        flagged.is_limit = true;
        flagged.limit_type = Some(LimitType::Upper);
        let theme = Theme::new("방산", vec![flagged, stock("b", 2.0, 100.0), stock("c", 1.0, 100.0)]);
        let rating = StarRater::new().evaluate(&theme);
        assert_eq!(rating.stars, 1);
        assert!(rating.reason.contains("상한가 종목 포함"));
    }

    #[test]
    fn test_after_close_retains_previous_grade() {
        let rater = StarRater::new();
        let theme = Theme::new("방산", vec![stock("a", 8.0, 100.0), stock("b", 7.5, 100.0), stock("c", 7.0, 100.0)]);
        assert_eq!(rater.evaluate(&theme).stars, 1);

        let kept = rater.rate(&theme, SessionPhase::AfterMarket, Some(3));
        assert_eq!(kept.stars, 3);
        assert_eq!(kept.reason, "3★ 유지 (시간외)");

        let not_kept = rater.rate(&theme, SessionPhase::Closing, Some(3));
        assert_eq!(not_kept.stars, 1);

        let mut themes = vec![theme];
        let previous = HashMap::from([("방산".to_string(), 2u8)]);
        rater.apply(&mut themes, SessionPhase::Closed, &previous);
        assert_eq!(themes[0].stars, 2);
    }
}
