use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::operation::{OperationKind, OperationResult};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GasProfiler {
    report: Report,
}

/// Gas usage per contract, then per `{operation}__{op_name}`.
pub type Report = HashMap<String, HashMap<String, GasReport>>;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GasReport {
    pub gas_wanted: u64,
    pub gas_used: u64,
}

impl GasProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instrument<S: Into<String>>(
        &mut self,
        contract: S,
        op_name: &str,
        op_kind: OperationKind,
        result: &OperationResult,
    ) {
        if op_kind == OperationKind::Query {
            // Wasm Query msgs don't cost gas
            return;
        }

        let op_key = format!("{op_kind}__{op_name}");

        let m = self.report.entry(contract.into()).or_default();
        m.insert(
            op_key,
            GasReport {
                gas_used: result.gas_used,
                gas_wanted: result.gas_wanted,
            },
        );
    }

    pub fn report(&self) -> &Report {
        &self.report
    }
}
