/// Hartree to kcal/mol.
pub const HARTREE_TO_KCAL_PER_MOL: f64 = 627.509;

/// RMSE of Hartree-valued squared errors, reported in kcal/mol.
/// Returns 0 for an empty slice.
pub fn rmse_kcal(squared_errors: &[f64]) -> f64 {
    if squared_errors.is_empty() {
        return 0.0;
    }
    let mean = squared_errors.iter().sum::<f64>() / squared_errors.len() as f64;
    mean.sqrt() * HARTREE_TO_KCAL_PER_MOL
}
