//! Conversion of solved column values back into per-flow series.

use crate::solve::SolvedModel;
use ensys_core::{
    EnergySystem, EnsysError, EnsysResult, FlowSeries, ResultsSet, SolveMeta, Stage,
};
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct ResultsExtractor;

impl ResultsExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Package solved values by flow, in time-index order.
    ///
    /// Fails unless the model was solved to optimality and was compiled from
    /// `system`; partial results are never returned.
    pub fn extract(&self, solved: &SolvedModel, system: &EnergySystem) -> EnsysResult<ResultsSet> {
        if !solved.status.is_optimal() {
            return Err(EnsysError::model_build(
                Stage::Extract,
                format!(
                    "cannot extract results from a model with status '{}'{}",
                    solved.status,
                    solved
                        .message
                        .as_deref()
                        .map(|m| format!(": {}", m))
                        .unwrap_or_default()
                ),
            ));
        }

        let model = &solved.model;
        if solved.values.len() != model.num_variables() {
            return Err(EnsysError::model_build(
                Stage::Extract,
                format!(
                    "solution has {} values but the model has {} variables",
                    solved.values.len(),
                    model.num_variables()
                ),
            ));
        }
        if model.periods() != system.periods() || model.num_flows() != system.num_flows() {
            return Err(EnsysError::model_build(
                Stage::Extract,
                "model was not compiled from this energy system",
            ));
        }

        let mut flows = Vec::with_capacity(system.num_flows());
        for (i, (flow, labels)) in system.flows().zip(model.flow_labels()).enumerate() {
            if flow.from != labels.0 || flow.to != labels.1 {
                return Err(EnsysError::model_build(
                    Stage::Extract,
                    format!(
                        "flow {} is '{}' in the system but '{} -> {}' in the model",
                        i,
                        flow.name(),
                        labels.0,
                        labels.1
                    ),
                ));
            }
            let mut values = Vec::with_capacity(model.periods());
            for t in 0..model.periods() {
                let col = model.column(i, t).ok_or_else(|| {
                    EnsysError::model_build(
                        Stage::Extract,
                        format!("flow '{}' has no variable at t={}", flow.name(), t),
                    )
                })?;
                let value = solved.values[col];
                if !value.is_finite() {
                    return Err(EnsysError::model_build(
                        Stage::Extract,
                        format!("flow '{}' has non-finite value at t={}", flow.name(), t),
                    ));
                }
                values.push(value);
            }
            flows.push(FlowSeries {
                from: flow.from.to_string(),
                to: flow.to.to_string(),
                values,
            });
        }

        let meta = SolveMeta {
            objective: solved.objective.unwrap_or(0.0),
            status: solved.status,
            solver: solved.solver.clone(),
            solve_time_ms: solved.solve_time_ms,
            num_variables: model.num_variables(),
            num_constraints: model.num_constraints(),
        };
        info!(flows = flows.len(), objective = meta.objective, "extracted results");

        Ok(ResultsSet { flows, meta })
    }
}
