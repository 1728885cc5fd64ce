//! 隶属度计算模块
//!
//! 纯函数：给定隶属函数和清晰值，返回 [0, 1] 内的隶属度。
//! 分段形状的顶点必须精确命中，不能因浮点误差偏离。

use crate::core::models::MembershipFunction;

impl MembershipFunction {
    /// 计算 x 的隶属度
    pub fn membership(&self, x: f64) -> f64 {
        let degree = match self {
            MembershipFunction::Triangular { a, b, c } => {
                piecewise(&[(*a, 0.0), (*b, 1.0), (*c, 0.0)], x)
            }
            MembershipFunction::Trapezoidal { a, b, c, d } => {
                piecewise(&[(*a, 0.0), (*b, 1.0), (*c, 1.0), (*d, 0.0)], x)
            }
            MembershipFunction::Singleton { a } => {
                if x == *a {
                    1.0
                } else {
                    0.0
                }
            }
            MembershipFunction::PiecewiseLinear { points } => piecewise(points, x),
            MembershipFunction::Gaussian { mean, sigma } => {
                if *sigma == 0.0 {
                    if x == *mean {
                        1.0
                    } else {
                        0.0
                    }
                } else {
                    (-(x - mean).powi(2) / (2.0 * sigma.powi(2))).exp()
                }
            }
            MembershipFunction::GeneralizedBell { a, b, mean } => {
                if *a == 0.0 {
                    if x == *mean {
                        1.0
                    } else {
                        0.0
                    }
                } else {
                    1.0 / (1.0 + ((x - mean) / a).abs().powf(2.0 * b))
                }
            }
            MembershipFunction::Sigmoid { gain, center } => {
                1.0 / (1.0 + (-gain * (x - center)).exp())
            }
        };

        if degree.is_nan() {
            0.0
        } else {
            degree.clamp(0.0, 1.0)
        }
    }

    /// 形状参数覆盖的横坐标范围，用于推导缺省论域
    pub fn extent(&self) -> (f64, f64) {
        match self {
            MembershipFunction::Triangular { a, c, .. } => (*a, *c),
            MembershipFunction::Trapezoidal { a, d, .. } => (*a, *d),
            MembershipFunction::Singleton { a } => (*a, *a),
            MembershipFunction::PiecewiseLinear { points } => {
                let first = points.first().map(|p| p.0).unwrap_or(0.0);
                let last = points.last().map(|p| p.0).unwrap_or(0.0);
                (first, last)
            }
            MembershipFunction::Gaussian { mean, sigma } => {
                (mean - 4.0 * sigma.abs(), mean + 4.0 * sigma.abs())
            }
            MembershipFunction::GeneralizedBell { a, mean, .. } => {
                (mean - 4.0 * a.abs(), mean + 4.0 * a.abs())
            }
            MembershipFunction::Sigmoid { gain, center } => {
                let spread = if *gain == 0.0 { 1.0 } else { 8.0 / gain.abs() };
                (center - spread, center + spread)
            }
        }
    }

    /// 单点位置（仅单点形状）
    pub fn singleton_position(&self) -> Option<f64> {
        match self {
            MembershipFunction::Singleton { a } => Some(*a),
            _ => None,
        }
    }
}

/// 分段线性插值；端点之外取端点值
fn piecewise(points: &[(f64, f64)], x: f64) -> f64 {
    let (first, last) = match (points.first(), points.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return 0.0,
    };

    if x <= first.0 {
        // 竖直边（同一横坐标上有多个点）取最大值
        return if x == first.0 {
            vertex_value(points, x)
        } else {
            first.1
        };
    }
    if x >= last.0 {
        return if x == last.0 {
            vertex_value(points, x)
        } else {
            last.1
        };
    }

    for pair in points.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if x == x0 {
            return vertex_value(points, x);
        }
        if x > x0 && x < x1 {
            return y0 + (x - x0) * (y1 - y0) / (x1 - x0);
        }
    }

    vertex_value(points, x)
}

/// 顶点处的取值：同一横坐标存在多个点时取最大纵坐标
fn vertex_value(points: &[(f64, f64)], x: f64) -> f64 {
    points
        .iter()
        .filter(|p| p.0 == x)
        .map(|p| p.1)
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shapes() -> Vec<MembershipFunction> {
        vec![
            MembershipFunction::Triangular { a: 0.0, b: 5.0, c: 10.0 },
            MembershipFunction::Triangular { a: 0.0, b: 0.0, c: 10.0 },
            MembershipFunction::Trapezoidal { a: 0.0, b: 2.0, c: 8.0, d: 10.0 },
            MembershipFunction::Singleton { a: 3.0 },
            MembershipFunction::PiecewiseLinear {
                points: vec![(0.0, 1.0), (5.0, 1.0), (10.0, 0.0)],
            },
            MembershipFunction::Gaussian { mean: 5.0, sigma: 2.0 },
            MembershipFunction::GeneralizedBell { a: 2.0, b: 4.0, mean: 5.0 },
            MembershipFunction::Sigmoid { gain: 2.0, center: 5.0 },
        ]
    }

    #[test]
    fn test_degrees_stay_in_unit_interval() {
        for shape in shapes() {
            let mut x = -5.0;
            while x <= 15.0 {
                let d = shape.membership(x);
                assert!((0.0..=1.0).contains(&d), "{:?} at {} gave {}", shape, x, d);
                x += 0.05;
            }
        }
    }

    #[test]
    fn test_vertices_are_exact() {
        let tri = MembershipFunction::Triangular { a: 1.0, b: 4.0, c: 9.0 };
        assert_eq!(tri.membership(1.0), 0.0);
        assert_eq!(tri.membership(4.0), 1.0);
        assert_eq!(tri.membership(9.0), 0.0);

        let trap = MembershipFunction::Trapezoidal { a: 0.0, b: 2.0, c: 8.0, d: 10.0 };
        assert_eq!(trap.membership(2.0), 1.0);
        assert_eq!(trap.membership(8.0), 1.0);
        assert_eq!(trap.membership(10.0), 0.0);

        let points = MembershipFunction::PiecewiseLinear {
            points: vec![(5.0, 0.0), (10.0, 1.0), (20.0, 1.0), (30.0, 0.0)],
        };
        assert_eq!(points.membership(10.0), 1.0);
        assert_eq!(points.membership(20.0), 1.0);
        assert_eq!(points.membership(7.0), 0.4);
    }

    #[test]
    fn test_shoulder_triangle_at_domain_edge() {
        // 左肩形：a == b
        let left = MembershipFunction::Triangular { a: 0.0, b: 0.0, c: 10.0 };
        assert_eq!(left.membership(0.0), 1.0);
        assert_eq!(left.membership(5.0), 0.5);

        let right = MembershipFunction::Triangular { a: 0.0, b: 10.0, c: 10.0 };
        assert_eq!(right.membership(10.0), 1.0);
    }

    #[test]
    fn test_piecewise_outside_points_uses_end_values() {
        let shape = MembershipFunction::PiecewiseLinear {
            points: vec![(20.0, 0.0), (30.0, 1.0), (50.0, 1.0)],
        };
        assert_eq!(shape.membership(0.0), 0.0);
        assert_eq!(shape.membership(60.0), 1.0);
    }

    #[test]
    fn test_singleton() {
        let s = MembershipFunction::Singleton { a: 3.0 };
        assert_eq!(s.membership(3.0), 1.0);
        assert_eq!(s.membership(3.0001), 0.0);
        assert_eq!(s.singleton_position(), Some(3.0));
    }
}
