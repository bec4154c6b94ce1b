//! Non-common-stock filter (preferred shares, SPACs, ETFs/ETNs).
//!
//! Heuristic by name only. A common stock whose name happens to end in "우"
//! or contain a fund brand is dropped too; that false positive is accepted.

const PREFERRED_SUFFIXES: [&str; 3] = ["우", "우B", "우(전환)"];

const FUND_BRANDS: [&str; 13] = [
    "스팩", "ETF", "ETN", "TIGER", "KODEX", "SOL", "KBSTAR", "ACE", "HANARO", "KOSEF",
    "ARIRANG", "TIMEFOLIO", "KoAct",
];

/// True when the name looks like a preferred share, fund, or numbered SPAC.
pub fn is_noise(name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() {
        return true;
    }

    if PREFERRED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
        return true;
    }

    if FUND_BRANDS.iter().any(|brand| name.contains(brand)) {
        return true;
    }

    has_spac_number(name)
}

/// Matches "제<digits>호", e.g. "하나금융제25호".
fn has_spac_number(name: &str) -> bool {
    let mut rest = name;
    while let Some(pos) = rest.find('제') {
        let after = &rest[pos + '제'.len_utf8()..];
        let digits = after.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits > 0 && after[digits..].starts_with('호') {
            return true;
        }
        rest = after;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferred_shares() {
        assert!(is_noise("삼성전자우"));
        assert!(is_noise("현대차2우B"));
        assert!(is_noise("한화솔루션우(전환)"));
        assert!(!is_noise("삼성전자"));
        assert!(!is_noise("우진"));
    }

    #[test]
    fn test_funds_and_spacs() {
        assert!(is_noise("KODEX 200"));
        assert!(is_noise("TIGER 2차전지테마"));
        assert!(is_noise("KB스팩30호"));
        assert!(is_noise("하나금융제25호"));
        assert!(!is_noise("제룡전기"));
        assert!(!is_noise("제이콘텐트리"));
        assert!(is_noise(""));
    }

    #[test]
    fn test_verdict_is_stable() {
        for name in ["삼성전자우", "에코프로", "KODEX 레버리지", "미래에셋제3호", "한미반도체"] {
            assert_eq!(is_noise(name), is_noise(name));
        }
    }
}
