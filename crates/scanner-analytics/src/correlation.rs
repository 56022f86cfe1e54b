//! 상관계수 및 벡터 연산 모듈.
//!
//! 횡단면(cross-section) 팩터 벡터 간의 상관관계와 내적을 계산합니다.
//! 직교화 품질 진단과 테스트에서 사용됩니다.
//!
//! # 예시
//!
//! ```rust
//! use scanner_analytics::correlation::calculate_correlation;
//!
//! let momentum = vec![1.0, 2.0, 3.0, 4.0];
//! let residual = vec![0.5, -0.5, -0.5, 0.5];
//!
//! let corr = calculate_correlation(&momentum, &residual).unwrap_or(0.0);
//! assert!(corr.abs() < 1e-12);
//! ```

/// 두 벡터의 내적.
///
/// 길이가 다르면 짧은 쪽 길이까지만 계산합니다.
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(a, b)| a * b).sum()
}

/// Pearson 상관계수 계산.
///
/// # 인자
///
/// * `x` - 첫 번째 시계열/횡단면
/// * `y` - 두 번째 시계열/횡단면
///
/// # 반환
///
/// 상관계수 (-1.0 ~ 1.0), 데이터 부족이나 분산 0이면 None
pub fn calculate_correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;

    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    // 분산이 0에 가까우면 (변동 없음) 상관계수 정의 불가
    if var_x <= f64::EPSILON || var_y <= f64::EPSILON {
        return None;
    }

    let corr = cov / (var_x.sqrt() * var_y.sqrt());
    corr.is_finite().then(|| corr.clamp(-1.0, 1.0))
}

/// 마스크가 참인 위치만 골라 상관계수를 계산합니다.
pub fn masked_correlation(x: &[f64], y: &[f64], mask: &[bool]) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .zip(mask)
        .filter(|(_, keep)| **keep)
        .map(|((a, b), _)| (*a, *b))
        .unzip();
    calculate_correlation(&xs, &ys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_correlation() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![2.0, 4.0, 6.0, 8.0, 10.0];
        let corr = calculate_correlation(&x, &y).unwrap();
        assert!((corr - 1.0).abs() < 1e-12);

        let inverse: Vec<f64> = y.iter().map(|v| -v).collect();
        let corr = calculate_correlation(&x, &inverse).unwrap();
        assert!((corr + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_series_has_no_correlation() {
        assert_eq!(calculate_correlation(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]), None);
        assert_eq!(calculate_correlation(&[1.0], &[1.0]), None);
    }

    #[test]
    fn test_masked_correlation() {
        let x = vec![1.0, 2.0, 100.0, 3.0];
        let y = vec![1.0, 2.0, -50.0, 3.0];
        let mask = vec![true, true, false, true];
        let corr = masked_correlation(&x, &y, &mask).unwrap();
        assert!((corr - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_dot() {
        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
    }
}
