//! 几何判定：线段与包围球相交（遮挡）、距离（可达）

use nalgebra::Vector3;

/// 线段 a→b 是否穿过以 center 为球心、radius 为半径的球
pub fn segment_hits_sphere(a: &Vector3<f32>, b: &Vector3<f32>, center: &Vector3<f32>, radius: f32) -> bool {
    let d = b - a;
    let len_sq = d.norm_squared();
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        ((center - a).dot(&d) / len_sq).clamp(0.0, 1.0)
    };
    let closest = a + d * t;
    (closest - center).norm() <= radius
}

pub fn within_reach(from: &Vector3<f32>, to: &Vector3<f32>, reach: f32) -> bool {
    (to - from).norm() <= reach
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_on_segment_blocks() {
        let a = Vector3::new(0.0, 0.0, 0.0);
        let b = Vector3::new(2.0, 0.0, 0.0);
        assert!(segment_hits_sphere(&a, &b, &Vector3::new(1.0, 0.05, 0.0), 0.1));
        assert!(!segment_hits_sphere(&a, &b, &Vector3::new(1.0, 0.5, 0.0), 0.1));
    }

    #[test]
    fn test_sphere_behind_target_does_not_block() {
        let a = Vector3::new(0.0, 0.0, 0.0);
        let b = Vector3::new(1.0, 0.0, 0.0);
        assert!(!segment_hits_sphere(&a, &b, &Vector3::new(1.5, 0.0, 0.0), 0.2));
    }

    #[test]
    fn test_reach_is_inclusive() {
        let a = Vector3::new(0.0, 0.0, 0.0);
        assert!(within_reach(&a, &Vector3::new(0.5, 0.0, 0.0), 0.5));
        assert!(!within_reach(&a, &Vector3::new(0.51, 0.0, 0.0), 0.5));
    }
}
