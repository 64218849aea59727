pub struct MseLoss;

impl MseLoss {
    /// Per-sample (predicted - expected)².
    pub fn squared_errors(predicted: &[f64], expected: &[f64]) -> Vec<f64> {
        predicted.iter().zip(expected.iter())
            .map(|(a, b)| (a - b).powi(2))
            .collect()
    }
}
