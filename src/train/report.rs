use log::info;
use serde::{Deserialize, Serialize};

use crate::data::dataset::{Dataset, EvalGroup};
use crate::error::Result;
use crate::trainer::Trainer;

/// A named held-out rotamer set and its conformer grouping.
#[derive(Debug, Clone)]
pub struct EvalSet {
    pub name: String,
    pub dataset: Dataset,
    pub groups: EvalGroup,
}

impl EvalSet {
    pub fn new(name: impl Into<String>, dataset: Dataset, groups: EvalGroup) -> EvalSet {
        EvalSet { name: name.into(), dataset, groups }
    }
}

/// Absolute and group-relative RMSE (kcal/mol) of one evaluation set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub name: String,
    pub abs_rmse: f64,
    pub rel_rmse: f64,
}

/// Evaluates every set. Never touches training state or parameters.
pub fn evaluate_sets<T: Trainer + ?Sized>(trainer: &T, sets: &[EvalSet]) -> Result<Vec<EvalReport>> {
    sets.iter()
        .map(|set| {
            Ok(EvalReport {
                name: set.name.clone(),
                abs_rmse: trainer.eval_abs_rmse(&set.dataset)?,
                rel_rmse: trainer.eval_eh_rmse(&set.dataset, &set.groups)?,
            })
        })
        .collect()
}

/// One log line per report, full precision; used for the startup sanity check.
pub fn log_reports(reports: &[EvalReport]) {
    for r in reports {
        info!("{} abs/rel rmses: {:.6} kcal/mol | {:.6} kcal/mol", r.name, r.abs_rmse, r.rel_rmse);
    }
}

/// Compact single-line rendering appended to an epoch line.
pub fn format_reports(gdb11_rmse: Option<f64>, reports: &[EvalReport]) -> String {
    let mut out = String::new();
    if let Some(rmse) = gdb11_rmse {
        out.push_str(&format!(" | gdb11 abs rmse {rmse:.2} kcal/mol"));
    }
    for r in reports {
        out.push_str(&format!(
            " | {} abs/rel rmses {:.2} kcal/mol, {:.2} kcal/mol",
            r.name, r.abs_rmse, r.rel_rmse
        ));
    }
    out
}
