use std::fmt::Write;

use theme_core::{NewsHeadline, StockSnapshot};

/// Hot stocks beyond this many are left out of the prompt
pub const MAX_PROMPT_STOCKS: usize = 150;

const INSTRUCTIONS: &str = r#"
**Instructions:**
1. Group the rising stocks above into Korean stock market themes (industries or sectors).
2. THEME NAME: a single keyword or short phrase naming an industry or sector.
   GOOD: "로봇", "반도체", "바이오", "원자력", "2차전지"
   BAD: "스팩(SPAC)", "우선주", "급등주", "코스닥 상위"
3. Ignore ETFs, ETNs, SPACs (스팩, 제N호) and preferred shares (names ending in 우, 우B).
4. Up to 5 unique stocks per theme, highest rate first. A stock may appear in only one theme.
5. Pick ONE news headline that best represents each theme.
6. Identify 6-8 distinct themes.

Return ONLY a JSON array, no explanations:
[{"name": "테마명", "headline": "대표 뉴스 헤드라인", "stocks": ["종목1", "종목2"]}]
"#;

/// Classification prompt listing the hot-stock pool and the news headlines.
pub fn build_prompt(headlines: &[NewsHeadline], hot_pool: &[StockSnapshot]) -> String {
    let mut prompt = String::from(
        "You are a financial analyst specializing in Korean stock market theme analysis.\n\n\
         **REAL-TIME HOT STOCKS (rate, traded value in 억 won):**\n",
    );

    if hot_pool.is_empty() {
        prompt.push_str("No hot stock data available\n");
    }
    for stock in hot_pool.iter().take(MAX_PROMPT_STOCKS) {
        let _ = writeln!(prompt, "{} ({:+.2}%, {:.0}억)", stock.name, stock.rate, stock.amount);
    }

    prompt.push_str("\n**NEWS HEADLINES:**\n");
    for headline in headlines {
        let _ = writeln!(prompt, "- {}", headline.title);
    }

    prompt.push_str(INSTRUCTIONS);
    prompt
}
