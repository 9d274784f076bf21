use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::discovery::Target;
use crate::skill::TargetKind;

/// Lightweight summary of a discovered target.
#[derive(Debug, Clone)]
pub struct DiscoveredTargetSummary {
    pub kind: TargetKind,
    pub id: String,
    pub label: String,
}

impl From<&Target> for DiscoveredTargetSummary {
    fn from(target: &Target) -> Self {
        Self {
            kind: target.kind,
            id: target.id.clone(),
            label: target.label.clone(),
        }
    }
}

/// Record of a single skill execution against one target.
#[derive(Debug, Clone)]
pub struct SkillExecutionRecord {
    pub skill_name: String,
    pub target_id: String,
    pub success: bool,
    pub duration: Duration,
    pub error: Option<String>,
}

/// Record of a single rollback step.
#[derive(Debug, Clone)]
pub struct RollbackStepRecord {
    pub skill_name: String,
    pub success: bool,
    pub duration: Duration,
    pub error: Option<String>,
}

/// Complete post-experiment report.
#[derive(Debug, Clone)]
pub struct ExperimentReport {
    pub experiment_id: Uuid,
    pub experiment_name: String,
    pub status: String,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub total_duration: Duration,
    pub soak_duration: Duration,

    pub discovered_targets: Vec<DiscoveredTargetSummary>,
    pub skill_executions: Vec<SkillExecutionRecord>,
    pub rollback_steps: Vec<RollbackStepRecord>,
}

pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        let millis = d.subsec_millis();
        if millis > 0 {
            format!("{mins}m {secs}.{millis:03}s")
        } else {
            format!("{mins}m {secs}s")
        }
    } else {
        let millis = d.as_millis();
        if millis < 1000 {
            format!("{millis}ms")
        } else {
            format!("{}.{}s", total_secs, d.subsec_millis() / 100)
        }
    }
}

impl fmt::Display for ExperimentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bar = "=".repeat(72);
        let thin = "-".repeat(72);

        writeln!(f, "\n{bar}")?;
        writeln!(f, "  EXPERIMENT REPORT")?;
        writeln!(f, "{bar}\n")?;

        writeln!(f, "  Name:     {}", self.experiment_name)?;
        writeln!(f, "  ID:       {}", self.experiment_id)?;
        writeln!(f, "  Status:   {}", self.status)?;
        writeln!(f, "  Duration: {}", format_duration(self.total_duration))?;

        // Discovery, summarized per kind
        writeln!(f, "\n{thin}")?;
        writeln!(
            f,
            "  DISCOVERED TARGETS ({})",
            self.discovered_targets.len()
        )?;
        writeln!(f, "{thin}\n")?;
        if self.discovered_targets.is_empty() {
            writeln!(f, "  (none)")?;
        } else {
            let mut per_kind: BTreeMap<TargetKind, usize> = BTreeMap::new();
            for t in &self.discovered_targets {
                *per_kind.entry(t.kind).or_default() += 1;
            }
            writeln!(f, "  {:<15} {}", "KIND", "COUNT")?;
            for (kind, count) in per_kind {
                writeln!(f, "  {:<15} {}", kind.to_string(), count)?;
            }
        }

        // Skills executed
        writeln!(f, "\n{thin}")?;
        writeln!(
            f,
            "  SKILLS EXECUTED ({})",
            self.skill_executions.len()
        )?;
        writeln!(f, "{thin}\n")?;
        if self.skill_executions.is_empty() {
            writeln!(f, "  (none)")?;
        } else {
            writeln!(
                f,
                "  {:<4} {:<28} {:<40} {:<8} {}",
                "#", "SKILL", "TARGET", "RESULT", "DURATION"
            )?;
            for (i, s) in self.skill_executions.iter().enumerate() {
                let result = if s.success { "OK" } else { "FAILED" };
                writeln!(
                    f,
                    "  {:<4} {:<28} {:<40} {:<8} {}",
                    i + 1,
                    s.skill_name,
                    s.target_id,
                    result,
                    format_duration(s.duration)
                )?;
                if let Some(ref err) = s.error {
                    writeln!(f, "       -> {err}")?;
                }
            }
        }

        // Rollback
        writeln!(f, "\n{thin}")?;
        writeln!(f, "  ROLLBACK ({} steps)", self.rollback_steps.len())?;
        writeln!(f, "{thin}\n")?;
        if self.rollback_steps.is_empty() {
            writeln!(f, "  (none)")?;
        } else {
            writeln!(
                f,
                "  {:<4} {:<25} {:<10} {}",
                "#", "SKILL", "RESULT", "DURATION"
            )?;
            for (i, r) in self.rollback_steps.iter().enumerate() {
                let result = if r.success { "OK" } else { "FAILED" };
                writeln!(
                    f,
                    "  {:<4} {:<25} {:<10} {}",
                    i + 1,
                    r.skill_name,
                    result,
                    format_duration(r.duration)
                )?;
                if let Some(ref err) = r.error {
                    writeln!(f, "       -> {err}")?;
                }
            }
        }

        // Timeline
        writeln!(f, "\n{thin}")?;
        writeln!(f, "  TIMELINE")?;
        writeln!(f, "{thin}\n")?;
        writeln!(
            f,
            "  Started:    {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(
            f,
            "  Completed:  {}",
            self.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(
            f,
            "  Soak time:  {}",
            format_duration(self.soak_duration)
        )?;
        writeln!(
            f,
            "  Total:      {}",
            format_duration(self.total_duration)
        )?;

        writeln!(f, "\n{bar}")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_durations_like_the_report() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn report_counts_targets_per_kind() {
        let now = Utc::now();
        let report = ExperimentReport {
            experiment_id: Uuid::new_v4(),
            experiment_name: "demo".into(),
            status: "completed".into(),
            started_at: now,
            completed_at: now,
            total_duration: Duration::from_secs(3),
            soak_duration: Duration::from_secs(2),
            discovered_targets: vec![
                DiscoveredTargetSummary {
                    kind: TargetKind::Lambda,
                    id: "a".into(),
                    label: "a".into(),
                },
                DiscoveredTargetSummary {
                    kind: TargetKind::Lambda,
                    id: "b".into(),
                    label: "b".into(),
                },
            ],
            skill_executions: Vec::new(),
            rollback_steps: Vec::new(),
        };
        let text = report.to_string();
        assert!(text.contains("DISCOVERED TARGETS (2)"));
        assert!(text.contains("lambda"));
    }
}
