use super::*;

#[test]
fn test_sum() {
    let v = [1.0f32, 2.0, 3.0];
    assert_eq!(sum_f32_f64(&v), 6.0);
}

#[test]
fn test_dot() {
    let a = [1.0f32, 2.0, 3.0];
    let b = [4.0f32, -5.0, 6.0];
    assert_eq!(dot_f32_f64(&a, &b), 12.0);
}

#[test]
fn test_dot_uses_shorter_length() {
    let a = [1.0f32, 2.0];
    let b = [3.0f32, 4.0, 100.0];
    assert_eq!(dot_f32_f64(&a, &b), 11.0);
}

#[test]
fn test_max() {
    let v = [1.0f32, -1.0, 3.0];
    assert_eq!(max_f32(&v), 3.0);
    assert_eq!(max_f32(&[]), 0.0);
}
