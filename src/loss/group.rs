use crate::data::dataset::EvalGroup;

/// Squared errors of group-relative energies.
///
/// Within each group the member with the lowest reference energy is the
/// reference conformer; every member contributes
/// `((pred_i - pred_ref) - (true_i - true_ref))²`. Empty groups are skipped.
pub fn relative_squared_errors(predicted: &[f64], expected: &[f64], groups: &EvalGroup) -> Vec<f64> {
    let mut out = Vec::new();
    for group in &groups.groups {
        let Some(&reference) = group.iter()
            .min_by(|&&a, &&b| expected[a].total_cmp(&expected[b]))
        else {
            continue;
        };
        for &i in group {
            let rel_pred = predicted[i] - predicted[reference];
            let rel_true = expected[i] - expected[reference];
            out.push((rel_pred - rel_true).powi(2));
        }
    }
    out
}
