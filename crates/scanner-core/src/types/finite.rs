//! 비유한 실수 필드의 JSON 직렬화.
//!
//! JSON은 NaN과 무한대를 표현할 수 없으므로 `null`로 기록하고,
//! 읽을 때 `null`은 NaN으로 복원합니다. 무한대는 NaN으로 돌아옵니다.
//!
//! ```ignore
//! #[serde(with = "crate::types::finite")]
//! pub rsi: f64,
//! ```

use serde::{Deserialize, Deserializer, Serializer};

/// 유한값은 숫자로, 그 외는 `null`로 기록합니다.
pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}

/// 숫자 또는 `null`을 읽습니다. `null`은 NaN.
pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}
