//! Run metrics.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::ToolCallStatus;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub turns: usize,
    pub model_calls: usize,
    pub tool_calls: usize,
    pub errors: usize,
    pub denials: usize,
    pub confirmations: usize,
    pub reruns: usize,
    pub model_time_ms: u64,
    pub wall_time_ms: u64,
    pub tool_stats: HashMap<String, ToolStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolStats {
    pub calls: usize,
    pub errors: usize,
    pub denials: usize,
    pub total_time_ms: u64,
}

impl RunMetrics {
    pub fn record_model_call(&mut self, elapsed: Duration) {
        self.model_calls += 1;
        self.model_time_ms += elapsed.as_millis() as u64;
    }

    pub fn record_tool(&mut self, name: &str, elapsed: Duration, status: ToolCallStatus) {
        self.tool_calls += 1;
        let stats = self.tool_stats.entry(name.to_string()).or_default();
        stats.calls += 1;
        stats.total_time_ms += elapsed.as_millis() as u64;
        match status {
            ToolCallStatus::Success => {}
            ToolCallStatus::Error => {
                stats.errors += 1;
                self.errors += 1;
            }
            ToolCallStatus::Denied => {
                stats.denials += 1;
                self.denials += 1;
            }
        }
    }

    pub fn avg_tool_time_ms(&self) -> f64 {
        if self.tool_calls == 0 {
            return 0.0;
        }
        let total: u64 = self.tool_stats.values().map(|s| s.total_time_ms).sum();
        total as f64 / self.tool_calls as f64
    }

    pub fn tool_success_rate(&self) -> f64 {
        if self.tool_calls == 0 {
            return 1.0;
        }
        (self.tool_calls - self.errors - self.denials) as f64 / self.tool_calls as f64
    }
}
