//! 심볼 정의.
//!
//! 스캔 유니버스의 각 종목을 식별하는 심볼 타입입니다.
//! 심볼은 정렬 가능하며, 랭킹의 동점 처리(심볼 오름차순)에 사용됩니다.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 거래 가능한 상품을 나타내는 심볼 (예: `BTC-USD`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// 새 심볼을 생성합니다. 앞뒤 공백은 제거되고 대문자로 정규화됩니다.
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(value.as_ref().trim().to_uppercase())
    }

    /// 심볼 문자열을 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 쉼표로 구분된 심볼 목록을 파싱합니다. 빈 항목은 무시됩니다.
    pub fn parse_list(input: &str) -> Vec<Symbol> {
        input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Symbol::new)
            .collect()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Symbol::new(value)
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Symbol::new(value)
    }
}
