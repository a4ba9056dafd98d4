use super::*;

#[test]
fn test_cholesky_solve_spd() {
    // [[4, 2], [2, 3]] x = [2, 1] -> x = [0.5, 0]
    let a = [4.0, 2.0, 2.0, 3.0];
    let b = [2.0, 1.0];
    let x = cholesky_solve(&a, &b, 2).unwrap();
    assert!((x[0] - 0.5).abs() < 1e-12);
    assert!(x[1].abs() < 1e-12);
}

#[test]
fn test_cholesky_rejects_indefinite() {
    let a = [1.0, 2.0, 2.0, 1.0];
    assert!(cholesky_solve(&a, &[1.0, 1.0], 2).is_none());
}

#[test]
fn test_gauss_solve_with_pivot() {
    let a = [0.0, 1.0, 2.0, 0.0];
    let b = [3.0, 4.0];
    let x = gauss_solve(&a, &b, 2);
    assert!((x[0] - 2.0).abs() < 1e-12);
    assert!((x[1] - 3.0).abs() < 1e-12);
}

#[test]
fn test_least_squares_recovers_mixture() {
    let c0 = [1.0f32, 0.0, 0.0, 1.0];
    let c1 = [0.0f32, 1.0, 1.0, 0.0];
    let y: Vec<f32> = (0..4).map(|i| 2.0 * c0[i] - 0.5 * c1[i]).collect();
    let x = least_squares(&[&c0, &c1], &y, None);
    assert!((x[0] - 2.0).abs() < 1e-5);
    assert!((x[1] + 0.5).abs() < 1e-5);
}

#[test]
fn test_least_squares_weighted_ignores_zero_weight() {
    let c0 = [1.0f32, 1.0, 1.0];
    let y = [1.0f32, 1.0, 100.0];
    let w = [1.0f32, 1.0, 0.0];
    let x = least_squares(&[&c0], &y, Some(&w));
    assert!((x[0] - 1.0).abs() < 1e-5);
}

#[test]
fn test_scale_fit() {
    assert!((scale_fit(&[1.0, 2.0], &[2.0, 4.0]) - 2.0).abs() < 1e-6);
    assert_eq!(scale_fit(&[0.0, 0.0], &[2.0, 4.0]), 0.0);
}
