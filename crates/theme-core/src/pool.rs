use std::collections::HashMap;

use crate::types::StockSnapshot;

/// Deduplicating stock container.
///
/// Snapshots are keyed by code when known and by name otherwise. When two
/// snapshots describe the same instrument the more recently fetched one wins;
/// on equal timestamps the later insert wins. Insertion order is preserved.
#[derive(Debug, Clone, Default)]
pub struct StockPool {
    stocks: Vec<StockSnapshot>,
    by_code: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl StockPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, stock: &StockSnapshot) -> Option<usize> {
        if let Some(code) = &stock.code {
            if let Some(&idx) = self.by_code.get(code) {
                return Some(idx);
            }
        }
        // Name fallback must not merge two different known codes
        self.by_name.get(&stock.name).copied().filter(|&idx| {
            match (&self.stocks[idx].code, &stock.code) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        })
    }

    /// Returns true when the snapshot introduced a new instrument.
    pub fn insert(&mut self, stock: StockSnapshot) -> bool {
        match self.find(&stock) {
            Some(idx) => {
                let existing = &mut self.stocks[idx];
                if stock.fetched_at >= existing.fetched_at {
                    let mut incoming = stock;
                    if incoming.code.is_none() {
                        incoming.code = existing.code.take();
                    }
                    if incoming.sector_hint.is_none() {
                        incoming.sector_hint = existing.sector_hint.take();
                    }
                    if incoming.source_theme.is_none() {
                        incoming.source_theme = existing.source_theme.take();
                    }
                    incoming.is_ipo |= existing.is_ipo;
                    *existing = incoming;
                } else {
                    if existing.code.is_none() {
                        existing.code = stock.code;
                    }
                    if existing.sector_hint.is_none() {
                        existing.sector_hint = stock.sector_hint;
                    }
                }
                self.index(idx);
                false
            }
            None => {
                let idx = self.stocks.len();
                self.stocks.push(stock);
                self.index(idx);
                true
            }
        }
    }

    fn index(&mut self, idx: usize) {
        let stock = &self.stocks[idx];
        if let Some(code) = &stock.code {
            self.by_code.entry(code.clone()).or_insert(idx);
        }
        self.by_name.entry(stock.name.clone()).or_insert(idx);
    }

    pub fn extend<I: IntoIterator<Item = StockSnapshot>>(&mut self, stocks: I) {
        for stock in stocks {
            self.insert(stock);
        }
    }

    /// Look up by code or by display name.
    pub fn get(&self, key: &str) -> Option<&StockSnapshot> {
        self.by_code
            .get(key)
            .or_else(|| self.by_name.get(key))
            .map(|&idx| &self.stocks[idx])
    }

    pub fn contains(&self, stock: &StockSnapshot) -> bool {
        self.find(stock).is_some()
    }

    pub fn len(&self) -> usize {
        self.stocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StockSnapshot> {
        self.stocks.iter()
    }

    pub fn as_slice(&self) -> &[StockSnapshot] {
        &self.stocks
    }

    pub fn into_vec(self) -> Vec<StockSnapshot> {
        self.stocks
    }
}

impl FromIterator<StockSnapshot> for StockPool {
    fn from_iter<I: IntoIterator<Item = StockSnapshot>>(iter: I) -> Self {
        let mut pool = StockPool::new();
        pool.extend(iter);
        pool
    }
}

/// Drop duplicate instruments, keeping the freshest snapshot of each.
pub fn dedup_latest(stocks: Vec<StockSnapshot>) -> Vec<StockSnapshot> {
    stocks.into_iter().collect::<StockPool>().into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CandidateSource;
    use chrono::{Duration, Utc};

    #[test]
    fn test_fresher_snapshot_wins_same_code() {
        let now = Utc::now();
        let stale = StockSnapshot::new("한미반도체", 3.0, 100.0, CandidateSource::Sector)
            .with_code("042700")
            .fetched_at(now - Duration::seconds(30));
        let fresh = StockSnapshot::new("한미반도체", 7.5, 140.0, CandidateSource::HotMovers)
            .with_code("042700")
            .fetched_at(now);

        // order of arrival must not matter
        let a = dedup_latest(vec![stale.clone(), fresh.clone()]);
        let b = dedup_latest(vec![fresh, stale]);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_eq!(a[0].rate, 7.5);
        assert_eq!(b[0].rate, 7.5);
    }

    #[test]
    fn test_code_carried_over_from_older_snapshot() {
        let now = Utc::now();
        let mut pool = StockPool::new();
        pool.insert(
            StockSnapshot::new("기아", 1.0, 10.0, CandidateSource::Sector)
                .with_code("000270")
                .with_sector("자동차")
                .fetched_at(now - Duration::seconds(5)),
        );
        assert!(!pool.insert(StockSnapshot::new("기아", 2.0, 20.0, CandidateSource::News).fetched_at(now)));

        let kia = pool.get("000270").unwrap();
        assert_eq!(kia.rate, 2.0);
        assert_eq!(kia.code.as_deref(), Some("000270"));
        assert_eq!(kia.sector_hint.as_deref(), Some("자동차"));
        assert_eq!(pool.get("기아").unwrap().rate, 2.0);
    }

    #[test]
    fn test_distinct_codes_with_same_name_stay_apart() {
        let mut pool = StockPool::new();
        pool.insert(StockSnapshot::new("동명", 1.0, 1.0, CandidateSource::HotMovers).with_code("111111"));
        assert!(pool.insert(StockSnapshot::new("동명", 2.0, 1.0, CandidateSource::HotMovers).with_code("222222")));
        assert_eq!(pool.len(), 2);
    }
}
