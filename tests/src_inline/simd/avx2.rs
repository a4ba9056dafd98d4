use super::*;
use crate::simd::scalar;

#[test]
fn test_sum_equiv() {
    let v = [0.1f32, 0.2, 0.3, 0.4, 0.5, 0.6, 1.1, 2.5, -0.7, 3.0];
    assert_eq!(sum_f32_f64(&v), scalar::sum_f32_f64(&v));
}

#[test]
fn test_dot_equiv() {
    let a: Vec<f32> = (0..19).map(|i| i as f32 * 0.25 - 1.0).collect();
    let b: Vec<f32> = (0..19).map(|i| (i as f32).sin()).collect();
    assert_eq!(dot_f32_f64(&a, &b), scalar::dot_f32_f64(&a, &b));
}

#[test]
fn test_max_equiv() {
    let v = [0.1f32, 2.0, 0.3, -4.0, 9.0, 1.0, 1.0, 1.0, 12.5];
    assert_eq!(max_f32(&v), scalar::max_f32(&v));
}
