use isomc_linalg::{least_squares, linear_knot_basis};
use nalgebra::DVector;

#[test]
fn knot_basis_rows_sum_to_one() {
    let basis = linear_knot_basis(41, 5).expect("basis");
    assert_eq!(basis.shape(), (41, 5));
    for row in basis.row_iter() {
        assert!((row.sum() - 1.0).abs() < 1e-12);
    }
    assert_eq!(basis[(0, 0)], 1.0);
    assert_eq!(basis[(40, 4)], 1.0);
    assert_eq!(basis[(10, 1)], 1.0);
}

#[test]
fn linear_profile_is_recovered_from_knot_fit() {
    let basis = linear_knot_basis(60, 4).expect("basis");
    let truth = DVector::from_vec(vec![1.0e5, 1.2e5, 0.9e5, 1.1e5]);
    let observed = &basis * &truth;
    let knots = least_squares(&basis, &observed).expect("solve");
    for (fitted, expected) in knots.iter().zip(truth.iter()) {
        assert!((fitted - expected).abs() / expected < 1e-9);
    }
}

#[test]
fn single_knot_basis_is_constant() {
    let basis = linear_knot_basis(7, 1).expect("basis");
    assert!(basis.iter().all(|&v| v == 1.0));
    assert!(linear_knot_basis(0, 3).is_err());
}

#[test]
fn knots_without_support_are_singular() {
    let basis = linear_knot_basis(30, 3).expect("basis");
    // Observe only the first few rows; the last knot has no support.
    let observed_rows = basis.rows(0, 5).into_owned();
    let rhs = DVector::from_element(5, 10.0);
    assert!(least_squares(&observed_rows, &rhs).is_err());
}
