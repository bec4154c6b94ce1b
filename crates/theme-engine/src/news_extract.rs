//! Pull stock mentions out of news headlines and article bodies.

use std::collections::HashSet;

use theme_core::{is_noise, NewsHeadline};

/// Return quote keys (names or 6-digit codes) mentioned in the headlines.
///
/// Each title is scanned, then its body when one was fetched. Known names
/// shorter than two characters are ignored; "이름(005930)" style mentions
/// contribute their code. Order follows first appearance.
pub fn extract_stock_mentions(headlines: &[NewsHeadline], known_names: &[&str]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut mentions = Vec::new();

    let candidates: Vec<&str> = known_names
        .iter()
        .copied()
        .filter(|n| n.chars().count() >= 2 && !is_noise(n))
        .collect();

    let texts = headlines
        .iter()
        .flat_map(|h| std::iter::once(h.title.as_str()).chain(h.body.as_deref()));

    for text in texts {
        for name in &candidates {
            if text.contains(name) && seen.insert(name.to_string()) {
                mentions.push(name.to_string());
            }
        }

        for code in parenthesized_codes(text) {
            if seen.insert(code.clone()) {
                mentions.push(code);
            }
        }
    }

    mentions
}

fn parenthesized_codes(title: &str) -> Vec<String> {
    let mut codes = Vec::new();
    let mut rest = title;

    while let Some(open) = rest.find('(') {
        let after = &rest[open + 1..];
        let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.len() == 6 && after[6..].starts_with(')') {
            codes.push(digits);
        }
        rest = after;
    }

    codes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headline(title: &str) -> NewsHeadline {
        NewsHeadline {
            title: title.to_string(),
            url: None,
            source: None,
            published_at: None,
            body: None,
        }
    }

    #[test]
    fn test_extracts_names_and_codes() {
        let headlines = vec![
            headline("레인보우로보틱스, 삼성 협업 기대에 급등"),
            headline("에이피알(278470) 신고가… 레인보우로보틱스 연일 강세"),
            headline("코스피 보합 마감(2025)"),
        ];
        let known = ["레인보우로보틱스", "삼성전자", "LG", "기"];

        let mentions = extract_stock_mentions(&headlines, &known);
        assert_eq!(mentions, vec!["레인보우로보틱스".to_string(), "278470".to_string()]);
    }

    #[test]
    fn test_body_mentions_follow_title() {
        let mut with_body = headline("2차전지 소재주 동반 강세");
        with_body.body = Some("에코프로비엠(247540)이 수주 공시를 냈고 포스코퓨처엠도 올랐다.".to_string());
        let headlines = vec![with_body, headline("포스코퓨처엠 신고가")];
        let known = ["포스코퓨처엠", "에코프로비엠"];

        let mentions = extract_stock_mentions(&headlines, &known);
        assert_eq!(
            mentions,
            vec!["포스코퓨처엠".to_string(), "에코프로비엠".to_string(), "247540".to_string()]
        );
    }

    #[test]
    fn test_single_char_names_ignored() {
        let mentions = extract_stock_mentions(&[headline("기 싸움 치열")], &["기"]);
        assert!(mentions.is_empty());
    }
}
