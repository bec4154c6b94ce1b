//! Versioned sector taxonomy.
//!
//! One structure holds every sector's keywords, representative stocks and
//! name synonyms, plus the corporate-group rosters and display priority.
//! It is loaded once and shared as `Arc<ThemeTaxonomy>`.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ThemeError;
use crate::types::is_reserved_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectorTier {
    /// Competes for the core theme slots
    Core,
    /// Folded into the other-sector bucket
    Peripheral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorDefinition {
    pub name: String,
    pub tier: SectorTier,
    /// Major sectors are emitted even when only one representative is trading
    #[serde(default)]
    pub major: bool,
    pub keywords: Vec<String>,
    pub representative_stocks: Vec<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

impl SectorDefinition {
    pub fn is_representative(&self, stock_name: &str) -> bool {
        self.representative_stocks.iter().any(|s| s == stock_name)
    }

    /// Exact roster hit or keyword substring in the stock name.
    pub fn matches_stock(&self, stock_name: &str) -> bool {
        self.is_representative(stock_name) || self.keywords.iter().any(|k| stock_name.contains(k.as_str()))
    }

    fn terms(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.name.to_lowercase()).chain(self.synonyms.iter().map(|s| s.to_lowercase()))
    }

    fn mentioned_in(&self, lower_name: &str) -> bool {
        self.terms().any(|t| !t.is_empty() && lower_name.contains(&t))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConglomerateDefinition {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeTaxonomy {
    pub version: u32,
    pub sectors: Vec<SectorDefinition>,
    pub conglomerates: Vec<ConglomerateDefinition>,
    /// Display order for well-known themes; unlisted themes sort after these
    #[serde(default)]
    pub priority: Vec<String>,
}

impl ThemeTaxonomy {
    pub fn from_json(json: &str) -> Result<Self, ThemeError> {
        let taxonomy: ThemeTaxonomy = serde_json::from_str(json)?;
        taxonomy.validate()?;
        Ok(taxonomy)
    }

    pub fn load(path: &Path) -> Result<Self, ThemeError> {
        let json = std::fs::read_to_string(path)?;
        let taxonomy = Self::from_json(&json)?;
        tracing::info!(
            "Loaded taxonomy v{} from {} ({} sectors, {} groups)",
            taxonomy.version,
            path.display(),
            taxonomy.sectors.len(),
            taxonomy.conglomerates.len()
        );
        Ok(taxonomy)
    }

    pub fn validate(&self) -> Result<(), ThemeError> {
        if self.sectors.is_empty() {
            return Err(ThemeError::Config("taxonomy has no sectors".to_string()));
        }

        let mut seen = HashSet::new();
        for name in self.sectors.iter().map(|s| &s.name).chain(self.conglomerates.iter().map(|c| &c.name)) {
            if name.trim().is_empty() {
                return Err(ThemeError::Config("taxonomy entry with empty name".to_string()));
            }
            if is_reserved_name(name) {
                return Err(ThemeError::Config(format!("'{}' is a reserved theme name", name)));
            }
            if !seen.insert(name.as_str()) {
                return Err(ThemeError::Config(format!("duplicate taxonomy entry '{}'", name)));
            }
        }
        Ok(())
    }

    pub fn sector(&self, name: &str) -> Option<&SectorDefinition> {
        self.sectors.iter().find(|s| s.name == name)
    }

    pub fn is_peripheral(&self, theme_name: &str) -> bool {
        self.sector(theme_name)
            .map(|s| s.tier == SectorTier::Peripheral)
            .unwrap_or(false)
    }

    pub fn is_conglomerate(&self, name: &str) -> bool {
        self.conglomerates.iter().any(|c| c.name == name)
    }

    pub fn priority_index(&self, theme_name: &str) -> Option<usize> {
        self.priority.iter().position(|p| p == theme_name)
    }

    /// Map a free-form theme label onto its canonical sector name.
    ///
    /// Exact synonym hits win, then the longest synonym contained in the
    /// label, then a synonym that contains the label. Unknown labels pass
    /// through unchanged.
    pub fn canonical_name(&self, theme_name: &str) -> String {
        if is_reserved_name(theme_name) || self.is_conglomerate(theme_name) {
            return theme_name.to_string();
        }

        let lower = theme_name.trim().to_lowercase();
        if lower.is_empty() {
            return theme_name.to_string();
        }

        for sector in &self.sectors {
            if sector.terms().any(|t| t == lower) {
                return sector.name.clone();
            }
        }

        let mut best: Option<(&SectorDefinition, usize)> = None;
        for sector in &self.sectors {
            for term in sector.terms() {
                let len = term.chars().count();
                if len > 0 && lower.contains(&term) && best.map_or(true, |(_, l)| len > l) {
                    best = Some((sector, len));
                }
            }
        }
        if let Some((sector, _)) = best {
            return sector.name.clone();
        }

        if lower.chars().count() >= 2 {
            for sector in &self.sectors {
                if sector.terms().any(|t| t.contains(&lower)) {
                    return sector.name.clone();
                }
            }
        }

        theme_name.to_string()
    }

    /// Name similarity used when merging AI labels into base themes.
    pub fn is_similar(&self, a: &str, b: &str) -> bool {
        let la = a.trim().to_lowercase();
        let lb = b.trim().to_lowercase();
        if la.is_empty() || lb.is_empty() {
            return false;
        }
        if la == lb || la.contains(&lb) || lb.contains(&la) {
            return true;
        }
        self.sectors
            .iter()
            .any(|s| s.mentioned_in(&la) && s.mentioned_in(&lb))
    }

    /// Every roster name the taxonomy knows, for headline stock extraction.
    pub fn known_stock_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.sectors
            .iter()
            .flat_map(|s| s.representative_stocks.iter())
            .chain(self.conglomerates.iter().flat_map(|c| c.members.iter()))
            .map(String::as_str)
            .filter(|name| seen.insert(*name))
            .collect()
    }

    pub fn builtin() -> Self {
        builtin_taxonomy()
    }
}

impl Default for ThemeTaxonomy {
    fn default() -> Self {
        builtin_taxonomy()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn sector(
    name: &str,
    tier: SectorTier,
    major: bool,
    keywords: &[&str],
    stocks: &[&str],
    synonyms: &[&str],
) -> SectorDefinition {
    SectorDefinition {
        name: name.to_string(),
        tier,
        major,
        keywords: strings(keywords),
        representative_stocks: strings(stocks),
        synonyms: strings(synonyms),
    }
}

fn group(name: &str, members: &[&str]) -> ConglomerateDefinition {
    ConglomerateDefinition {
        name: name.to_string(),
        members: strings(members),
    }
}

fn builtin_taxonomy() -> ThemeTaxonomy {
    use SectorTier::{Core, Peripheral};

    ThemeTaxonomy {
        version: 1,
        sectors: vec![
            sector(
                "반도체", Core, true,
                &["반도체", "HBM", "칩", "웨이퍼", "NPU"],
                &["삼성전자", "SK하이닉스", "한미반도체", "원익IPS", "칩스앤미디어", "원익홀딩스", "이오테크닉스", "테크윙", "넥스트칩", "주성엔지니어링", "피에스케이", "리노공업", "태성", "켐트로스"],
                &["HBM", "메모리", "메모리반도체", "시스템반도체", "반도체장비", "반도체소재", "AI반도체", "파운드리", "IT 대표주", "semiconductor"],
            ),
            sector(
                "2차전지", Core, true,
                &["2차전지", "배터리"],
                &["에코프로", "에코프로비엠", "LG에너지솔루션", "포스코퓨처엠", "엘앤에프", "금양", "피엔티", "엠플러스"],
                &["배터리", "전지", "리튬", "양극재", "음극재", "전고체", "나트륨이온", "battery"],
            ),
            sector(
                "로봇", Core, true,
                &["로봇", "로보", "자동화"],
                &["레인보우로보틱스", "두산로보틱스", "로보티즈", "유진로봇", "휴림로봇", "디아이씨", "로보스타", "에스피지", "코츠테크놀로지"],
                &["협동로봇", "산업용로봇", "서비스로봇", "로봇부품", "자동화", "자동화설비", "스마트팩토리", "robot"],
            ),
            sector(
                "바이오", Core, true,
                &["바이오", "제약", "헬스케어", "의료"],
                &["셀트리온", "삼성바이오로직스", "에이비엘바이오", "알테오젠", "메디톡스", "레고켐바이오", "유한양행", "한미약품"],
                &["제약", "신약", "바이오시밀러", "의약품", "헬스케어", "진단키트", "의료기기", "mRNA", "bio"],
            ),
            sector(
                "자동차", Core, true,
                &["자동차", "모빌리티", "완성차"],
                &["현대차", "기아", "현대모비스", "HL만도", "한라캐스트", "현대위아", "S&T모티브", "세종공업", "화신"],
                &["자동차부품", "전기차", "수소차", "자율주행", "스마트카", "모빌리티", "완성차", "EV", "테슬라"],
            ),
            sector(
                "원자력", Core, true,
                &["원전", "원자력", "SMR"],
                &["두산에너빌리티", "우진", "현대건설", "한전KPS", "비에이치아이", "일진파워", "보성파워텍"],
                &["원전", "SMR", "소형모듈원전", "원자력발전", "nuclear"],
            ),
            sector(
                "건설", Core, true,
                &["건설", "주택", "토건", "인프라"],
                &["삼성물산", "GS건설", "현대건설", "대우건설", "DL이앤씨", "코오롱글로벌", "HDC현대산업개발"],
                &["부동산", "시멘트", "레미콘", "인테리어", "리모델링"],
            ),
            sector(
                "방산", Core, true,
                &["방산", "방위", "국방", "무기"],
                &["한화에어로스페이스", "LIG넥스원", "한국항공우주", "현대로템", "풍산", "한화시스템"],
                &["방위", "방위산업", "K-방산", "군수", "무기", "무기체계", "국방", "defense"],
            ),
            sector(
                "조선", Core, false,
                &["조선", "선박", "해운"],
                &["HD현대중공업", "삼성중공업", "한화오션", "HD현대미포", "STX중공업"],
                &["선박", "해운", "조선기자재", "LNG선", "컨테이너선", "shipbuilding"],
            ),
            sector(
                "항공", Core, false,
                &["항공", "여행", "LCC"],
                &["대한항공", "아시아나항공", "제주항공", "진에어", "티웨이항공", "에어부산"],
                &["우주", "위성", "드론", "UAM", "LCC", "여행", "비행"],
            ),
            sector(
                "AI/소프트웨어", Core, false,
                &["AI", "LLM", "GPT", "소프트웨어", "클라우드"],
                &["솔트룩스", "셀바스AI", "마인즈랩", "코난테크놀로지", "플리토", "알체라", "라온피플", "오픈엣지테크놀로지"],
                &["AI", "인공지능", "딥러닝", "머신러닝", "LLM", "GPT", "소프트웨어", "SaaS", "클라우드", "IT서비스"],
            ),
            sector(
                "전력설비", Core, false,
                &["전력", "변압기", "전선", "일렉트릭"],
                &["HD현대일렉트릭", "LS ELECTRIC", "효성중공업", "일진전기", "제룡전기", "대한전선"],
                &["전력기기", "변압기", "초고압", "송전", "HVDC", "전력망"],
            ),
            sector(
                "화장품", Peripheral, false,
                &["화장품", "뷰티", "코스메틱"],
                &["아모레퍼시픽", "LG생활건강", "코스맥스", "클리오", "에이블씨엔씨", "토니모리", "한국콜마", "코스메카코리아"],
                &["뷰티", "K-뷰티", "코스메틱", "미용"],
            ),
            sector(
                "게임", Peripheral, false,
                &["게임"],
                &["크래프톤", "엔씨소프트", "넷마블", "펄어비스", "위메이드", "컴투스", "카카오게임즈", "네오위즈"],
                &["모바일게임", "PC게임", "메타버스"],
            ),
            sector(
                "엔터/미디어", Peripheral, false,
                &["엔터", "미디어", "방송", "콘텐츠"],
                &["하이브", "JYP Ent.", "SM", "YG엔터테인먼트", "CJ ENM", "스튜디오드래곤", "SBS", "제이콘텐트리"],
                &["엔터", "엔터테인먼트", "K-POP", "방송", "미디어", "OTT", "콘텐츠", "기획사"],
            ),
            sector(
                "금융/증권", Peripheral, false,
                &["금융", "증권", "은행", "보험"],
                &["삼성증권", "키움증권", "미래에셋증권", "KB금융", "신한지주", "하나금융지주", "NH투자증권", "메리츠금융지주"],
                &["금융", "증권", "은행", "보험", "저축은행", "캐피탈", "자산운용"],
            ),
        ],
        conglomerates: vec![
            group("현대차그룹", &["현대차", "기아", "현대모비스", "현대제철", "현대위아", "현대글로비스", "현대오토에버", "현대로템", "현대건설", "현대엔지니어링", "현대일렉트릭", "현대에너지솔루션"]),
            group("한화그룹", &["한화에어로스페이스", "한화오션", "한화시스템", "한화솔루션", "한화", "한화생명", "한화투자증권", "한화갤러리아", "한화에너지", "한화임팩트", "한화비전"]),
            group("삼성그룹", &["삼성전자", "삼성SDI", "삼성물산", "삼성바이오로직스", "삼성생명", "삼성화재", "삼성증권", "삼성중공업", "삼성엔지니어링", "삼성전기", "삼성SDS", "호텔신라"]),
            group("SK그룹", &["SK하이닉스", "SK이노베이션", "SK텔레콤", "SK스퀘어", "SK네트웍스", "SK케미칼", "SK바이오팜", "SK바이오사이언스", "SK아이이테크놀로지", "SK가스", "SK렌터카"]),
            group("LG그룹", &["LG전자", "LG화학", "LG에너지솔루션", "LG디스플레이", "LG이노텍", "LG생활건강", "LG유플러스", "LG CNS", "LG헬로비전"]),
            group("롯데그룹", &["롯데케미칼", "롯데칠성", "롯데쇼핑", "롯데지주", "롯데정밀화학", "롯데렌탈", "롯데하이마트"]),
            group("포스코그룹", &["POSCO홀딩스", "포스코퓨처엠", "포스코인터내셔널", "포스코DX", "포스코엠텍", "포스코스틸리온"]),
            group("두산그룹", &["두산에너빌리티", "두산밥캣", "두산로보틱스", "두산퓨얼셀", "두산", "두산테스나"]),
        ],
        priority: strings(&[
            "현대차그룹", "한화그룹", "삼성그룹", "SK그룹", "LG그룹", "롯데그룹", "포스코그룹", "두산그룹",
            "로봇", "반도체", "2차전지", "자동차", "방산", "원자력", "바이오", "조선", "AI/소프트웨어", "전력설비",
        ]),
    }
}
