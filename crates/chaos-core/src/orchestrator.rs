use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::agent::Agent;
use crate::config::RunSettings;
use crate::discovery::Target;
use crate::error::{ChaosError, ChaosResult};
use crate::event::{EventSink, ExperimentEvent};
use crate::experiment::{Experiment, ExperimentConfig, ExperimentStatus};
use crate::report::{
    DiscoveredTargetSummary, ExperimentReport, RollbackStepRecord, SkillExecutionRecord,
};
use crate::skill::SkillStatus;

/// What a started skill was aimed at, kept so status checks and rollback
/// can rebuild the same context.
struct LaunchedSkill {
    target: Target,
    params: serde_yaml::Value,
}

pub struct Orchestrator {
    agent: Arc<RwLock<Box<dyn Agent>>>,
    settings: RunSettings,
    reports: Arc<RwLock<HashMap<Uuid, ExperimentReport>>>,
    event_sinks: Vec<Arc<dyn EventSink>>,
}

impl Orchestrator {
    pub fn new(agent: Box<dyn Agent>, settings: RunSettings) -> Self {
        Self {
            agent: Arc::new(RwLock::new(agent)),
            settings,
            reports: Arc::new(RwLock::new(HashMap::new())),
            event_sinks: Vec::new(),
        }
    }

    pub fn add_event_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.event_sinks.push(sink);
    }

    pub async fn report(&self, experiment_id: Uuid) -> Option<ExperimentReport> {
        self.reports.read().await.get(&experiment_id).cloned()
    }

    async fn emit(&self, event: ExperimentEvent) {
        for sink in &self.event_sinks {
            sink.emit(event.clone()).await;
        }
    }

    /// Run a single experiment to completion (discover -> execute -> soak -> rollback).
    ///
    /// Skill failures end up in the report; only initialization and discovery
    /// failures are returned as errors.
    pub async fn run_experiment(&self, config: ExperimentConfig) -> ChaosResult<ExperimentReport> {
        let mut experiment = Experiment::new(config.clone());
        let experiment_id = experiment.id;
        let started_at = chrono::Utc::now();
        let clock = Instant::now();

        self.emit(ExperimentEvent::Started {
            experiment_id,
            at: started_at,
        })
        .await;

        {
            let mut agent = self.agent.write().await;
            if agent.status() != crate::agent::AgentStatus::Ready {
                agent.initialize().await?;
            }
        }

        // Discovery phase
        experiment.status = ExperimentStatus::Discovering;
        let targets = {
            let mut agent = self.agent.write().await;
            agent.discover().await?
        };
        tracing::info!(count = targets.len(), "Discovered targets");
        self.emit(ExperimentEvent::TargetsDiscovered {
            experiment_id,
            count: targets.len(),
        })
        .await;

        // Execution phase
        experiment.status = ExperimentStatus::Executing;
        experiment.started_at = Some(chrono::Utc::now());

        let mut launched = HashMap::new();
        let mut skill_executions = Vec::new();
        let execution_result = self
            .execute_skills(&targets, &mut experiment, &mut launched, &mut skill_executions)
            .await;

        if let Err(ref e) = execution_result {
            tracing::error!(error = %e, "Skill execution failed, initiating rollback");
            experiment.status = ExperimentStatus::Failed(e.to_string());
            self.emit(ExperimentEvent::Failed {
                experiment_id,
                error: e.to_string(),
            })
            .await;
        }

        // Soak period with status polling
        let soak_clock = Instant::now();
        if execution_result.is_ok() {
            experiment.status = ExperimentStatus::WaitingDuration;
            self.emit(ExperimentEvent::DurationWaitBegin {
                experiment_id,
                duration: config.duration,
            })
            .await;
            tracing::info!(duration = ?config.duration, "Waiting for chaos duration");
            if let Err(reason) = self.soak(&experiment, &launched).await {
                experiment.status = ExperimentStatus::Failed(reason.clone());
                self.emit(ExperimentEvent::Failed {
                    experiment_id,
                    error: reason,
                })
                .await;
            }
        }
        let soak_duration = soak_clock.elapsed();

        // Rollback phase (always runs)
        let previous_status = std::mem::replace(&mut experiment.status, ExperimentStatus::RollingBack);
        self.emit(ExperimentEvent::RollbackStarted { experiment_id })
            .await;
        let rollback_steps = self.rollback_experiment(&experiment, &launched).await;

        experiment.status = match previous_status {
            ExperimentStatus::Failed(reason) => ExperimentStatus::Failed(reason),
            _ => ExperimentStatus::Completed,
        };
        experiment.completed_at = Some(chrono::Utc::now());

        self.emit(ExperimentEvent::Completed {
            experiment_id,
            at: chrono::Utc::now(),
        })
        .await;

        let report = ExperimentReport {
            experiment_id,
            experiment_name: config.name.clone(),
            status: experiment.status.label(),
            started_at,
            completed_at: experiment.completed_at.unwrap_or_else(chrono::Utc::now),
            total_duration: clock.elapsed(),
            soak_duration,
            discovered_targets: targets.iter().map(DiscoveredTargetSummary::from).collect(),
            skill_executions,
            rollback_steps,
        };

        self.reports
            .write()
            .await
            .insert(experiment_id, report.clone());

        Ok(report)
    }

    async fn execute_skills(
        &self,
        targets: &[Target],
        experiment: &mut Experiment,
        launched: &mut HashMap<Uuid, LaunchedSkill>,
        records: &mut Vec<SkillExecutionRecord>,
    ) -> ChaosResult<()> {
        let agent = self.agent.read().await;

        for invocation in &experiment.config.skills {
            let skill = agent.skill_by_name(&invocation.skill_name).ok_or_else(|| {
                ChaosError::Config(format!("Unknown skill: {}", invocation.skill_name))
            })?;

            if skill.descriptor().target_kind != invocation.target.kind {
                return Err(ChaosError::Config(format!(
                    "Skill {} cannot target {}",
                    invocation.skill_name, invocation.target.kind
                )));
            }

            skill.validate_params(&invocation.params)?;

            let selected: Vec<&Target> = invocation
                .target
                .select(targets)
                .into_iter()
                .take(invocation.count as usize)
                .collect();
            if selected.is_empty() {
                return Err(ChaosError::NoTarget(invocation.target.to_string()));
            }

            for target in selected {
                let ctx = agent.build_context(target, &invocation.params).await?;
                let clock = Instant::now();
                match skill.execute(&ctx).await {
                    Ok(handle) => {
                        tracing::info!(
                            skill = %invocation.skill_name,
                            target = %target.id,
                            "Skill executed successfully"
                        );
                        records.push(SkillExecutionRecord {
                            skill_name: invocation.skill_name.clone(),
                            target_id: target.id.clone(),
                            success: true,
                            duration: clock.elapsed(),
                            error: None,
                        });
                        self.emit(ExperimentEvent::SkillExecuted {
                            experiment_id: experiment.id,
                            skill_name: invocation.skill_name.clone(),
                            target_id: target.id.clone(),
                            success: true,
                        })
                        .await;
                        launched.insert(
                            handle.id,
                            LaunchedSkill {
                                target: target.clone(),
                                params: invocation.params.clone(),
                            },
                        );
                        experiment.rollback_log.push(handle);
                    }
                    Err(e) => {
                        records.push(SkillExecutionRecord {
                            skill_name: invocation.skill_name.clone(),
                            target_id: target.id.clone(),
                            success: false,
                            duration: clock.elapsed(),
                            error: Some(e.to_string()),
                        });
                        self.emit(ExperimentEvent::SkillExecuted {
                            experiment_id: experiment.id,
                            skill_name: invocation.skill_name.clone(),
                            target_id: target.id.clone(),
                            success: false,
                        })
                        .await;
                        return Err(ChaosError::SkillExecution {
                            skill_name: invocation.skill_name.clone(),
                            source: e.into(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Wait out the experiment duration, polling skill status.
    /// Ends early once every skill completed; a failed skill aborts the soak.
    async fn soak(
        &self,
        experiment: &Experiment,
        launched: &HashMap<Uuid, LaunchedSkill>,
    ) -> Result<(), String> {
        let deadline = tokio::time::Instant::now() + experiment.config.duration;
        let mut finished: HashSet<Uuid> = HashSet::new();

        loop {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(());
            }
            let wake = (now + self.settings.status_interval).min(deadline);
            tokio::time::sleep_until(wake).await;

            let agent = self.agent.read().await;
            for handle in experiment.rollback_log.iter() {
                if finished.contains(&handle.id) {
                    continue;
                }
                let (Some(skill), Some(launch)) =
                    (agent.skill_by_name(&handle.skill_name), launched.get(&handle.id))
                else {
                    continue;
                };
                let ctx = match agent.build_context(&launch.target, &launch.params).await {
                    Ok(ctx) => ctx,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to build context for status check");
                        continue;
                    }
                };

                match skill.status(&ctx, handle).await {
                    Ok(SkillStatus::Running) => {}
                    Ok(SkillStatus::Completed) => {
                        tracing::info!(skill = %handle.skill_name, target = %handle.target_id, "Skill completed");
                        finished.insert(handle.id);
                        self.emit(ExperimentEvent::SkillFinished {
                            experiment_id: experiment.id,
                            skill_name: handle.skill_name.clone(),
                            target_id: handle.target_id.clone(),
                            failure: None,
                        })
                        .await;
                    }
                    Ok(SkillStatus::Failed(reason)) => {
                        tracing::error!(skill = %handle.skill_name, target = %handle.target_id, %reason, "Skill failed");
                        self.emit(ExperimentEvent::SkillFinished {
                            experiment_id: experiment.id,
                            skill_name: handle.skill_name.clone(),
                            target_id: handle.target_id.clone(),
                            failure: Some(reason.clone()),
                        })
                        .await;
                        return Err(format!("{} on {}: {reason}", handle.skill_name, handle.target_id));
                    }
                    Err(e) => {
                        tracing::warn!(skill = %handle.skill_name, error = %e, "Status check failed");
                    }
                }
            }

            if finished.len() == experiment.rollback_log.len() {
                tracing::info!("All skills completed before the duration elapsed");
                return Ok(());
            }
        }
    }

    /// Rollback in LIFO order. Best-effort: continues even if individual rollbacks fail.
    async fn rollback_experiment(
        &self,
        experiment: &Experiment,
        launched: &HashMap<Uuid, LaunchedSkill>,
    ) -> Vec<RollbackStepRecord> {
        let agent = self.agent.read().await;
        let mut steps = Vec::new();

        for handle in experiment.rollback_log.iter_reverse() {
            let clock = Instant::now();
            let skill = match agent.skill_by_name(&handle.skill_name) {
                Some(s) => s,
                None => {
                    tracing::error!(skill = %handle.skill_name, "Skill not found for rollback");
                    continue;
                }
            };
            let Some(launch) = launched.get(&handle.id) else {
                continue;
            };

            let result = match agent.build_context(&launch.target, &launch.params).await {
                Ok(ctx) => skill.rollback(&ctx, handle).await,
                Err(e) => Err(e),
            };

            let error = match result {
                Ok(()) => {
                    tracing::info!(skill = %handle.skill_name, target = %handle.target_id, "Rollback succeeded");
                    None
                }
                Err(e) => {
                    let e = ChaosError::RollbackFailed {
                        skill_name: handle.skill_name.clone(),
                        source: e.into(),
                    };
                    tracing::error!(error = %e, "Rollback failed");
                    Some(e.to_string())
                }
            };

            self.emit(ExperimentEvent::RollbackStepCompleted {
                experiment_id: experiment.id,
                skill_name: handle.skill_name.clone(),
                success: error.is_none(),
            })
            .await;

            steps.push(RollbackStepRecord {
                skill_name: handle.skill_name.clone(),
                success: error.is_none(),
                duration: clock.elapsed(),
                error,
            });
        }

        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentStatus;
    use crate::discovery::TargetSelector;
    use crate::event::ChannelEventSink;
    use crate::experiment::SkillInvocation;
    use crate::rollback::RollbackHandle;
    use crate::skill::{Skill, SkillContext, SkillDescriptor, TargetKind};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    type CallLog = Arc<Mutex<Vec<String>>>;

    struct ScriptedSkill {
        status: SkillStatus,
        calls: CallLog,
    }

    #[async_trait]
    impl Skill for ScriptedSkill {
        fn descriptor(&self) -> SkillDescriptor {
            SkillDescriptor {
                name: "test.scripted".into(),
                description: "records calls".into(),
                target_kind: TargetKind::Lambda,
                reversible: true,
            }
        }

        fn validate_params(&self, _params: &serde_yaml::Value) -> ChaosResult<()> {
            Ok(())
        }

        async fn execute(&self, ctx: &SkillContext) -> ChaosResult<RollbackHandle> {
            self.calls.lock().unwrap().push(format!("execute {}", ctx.target.id));
            Ok(RollbackHandle::new("test.scripted", &ctx.target.id, serde_yaml::Value::Null))
        }

        async fn status(&self, _ctx: &SkillContext, _handle: &RollbackHandle) -> ChaosResult<SkillStatus> {
            Ok(self.status.clone())
        }

        async fn rollback(&self, ctx: &SkillContext, _handle: &RollbackHandle) -> ChaosResult<()> {
            self.calls.lock().unwrap().push(format!("rollback {}", ctx.target.id));
            Ok(())
        }
    }

    struct FakeAgent {
        status: AgentStatus,
        targets: Vec<Target>,
        skills: Vec<Box<dyn Skill>>,
    }

    #[async_trait]
    impl Agent for FakeAgent {
        fn name(&self) -> &str {
            "fake"
        }

        fn status(&self) -> AgentStatus {
            self.status.clone()
        }

        async fn initialize(&mut self) -> ChaosResult<()> {
            self.status = AgentStatus::Ready;
            Ok(())
        }

        async fn discover(&mut self) -> ChaosResult<Vec<Target>> {
            Ok(self.targets.clone())
        }

        fn skills(&self) -> Vec<&dyn Skill> {
            self.skills.iter().map(|s| s.as_ref()).collect()
        }

        async fn build_context(
            &self,
            target: &Target,
            params: &serde_yaml::Value,
        ) -> ChaosResult<SkillContext> {
            Ok(SkillContext {
                shared: Box::new(()),
                target: target.clone(),
                params: params.clone(),
            })
        }

        async fn shutdown(&mut self) -> ChaosResult<()> {
            Ok(())
        }
    }

    fn orchestrator(status: SkillStatus, calls: &CallLog) -> Orchestrator {
        let agent = FakeAgent {
            status: AgentStatus::Idle,
            targets: vec![
                Target::new(TargetKind::Lambda, "fn-a", "a").with_attr("aws.lambda.function-name", "a"),
                Target::new(TargetKind::Lambda, "fn-b", "b").with_attr("aws.lambda.function-name", "b"),
            ],
            skills: vec![Box::new(ScriptedSkill {
                status,
                calls: calls.clone(),
            })],
        };
        Orchestrator::new(
            Box::new(agent),
            RunSettings {
                status_interval: Duration::from_millis(10),
            },
        )
    }

    fn experiment(count: u32, function: Option<&str>, duration: Duration) -> ExperimentConfig {
        let mut selector = TargetSelector {
            kind: TargetKind::Lambda,
            attributes: Default::default(),
        };
        if let Some(name) = function {
            selector
                .attributes
                .insert("aws.lambda.function-name".into(), name.into());
        }
        ExperimentConfig {
            name: "test".into(),
            skills: vec![SkillInvocation {
                skill_name: "test.scripted".into(),
                target: selector,
                params: serde_yaml::Value::Null,
                count,
            }],
            duration,
        }
    }

    #[tokio::test]
    async fn completed_skills_end_the_soak_early_and_roll_back_lifo() {
        let calls = CallLog::default();
        let orch = orchestrator(SkillStatus::Completed, &calls);

        let report = orch
            .run_experiment(experiment(2, None, Duration::from_secs(60)))
            .await
            .unwrap();

        assert_eq!(report.status, "completed");
        assert!(report.soak_duration < Duration::from_secs(60));
        assert_eq!(report.skill_executions.len(), 2);
        assert_eq!(report.rollback_steps.len(), 2);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["execute fn-a", "execute fn-b", "rollback fn-b", "rollback fn-a"]
        );
        assert!(orch.report(report.experiment_id).await.is_some());
    }

    #[tokio::test]
    async fn events_follow_the_experiment_lifecycle() {
        let calls = CallLog::default();
        let mut orch = orchestrator(SkillStatus::Completed, &calls);
        let (sink, mut rx) = ChannelEventSink::new();
        orch.add_event_sink(Arc::new(sink));

        orch.run_experiment(experiment(1, Some("a"), Duration::from_secs(60)))
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events[0], ExperimentEvent::Started { .. }));
        assert!(matches!(events[1], ExperimentEvent::TargetsDiscovered { count: 2, .. }));
        assert!(matches!(
            events[2],
            ExperimentEvent::SkillExecuted { success: true, .. }
        ));
        assert!(matches!(events[3], ExperimentEvent::DurationWaitBegin { .. }));
        assert!(matches!(
            events[4],
            ExperimentEvent::SkillFinished { failure: None, .. }
        ));
        assert!(matches!(events[5], ExperimentEvent::RollbackStarted { .. }));
        assert!(matches!(
            events[6],
            ExperimentEvent::RollbackStepCompleted { success: true, .. }
        ));
        assert!(matches!(events[7], ExperimentEvent::Completed { .. }));
        assert_eq!(events.len(), 8);
    }

    #[tokio::test]
    async fn unmatched_selector_fails_without_rollback() {
        let calls = CallLog::default();
        let orch = orchestrator(SkillStatus::Running, &calls);

        let report = orch
            .run_experiment(experiment(1, Some("missing"), Duration::from_secs(1)))
            .await
            .unwrap();

        assert!(report.status.starts_with("failed"));
        assert!(report.skill_executions.is_empty());
        assert!(report.rollback_steps.is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_status_aborts_soak_but_still_rolls_back() {
        let calls = CallLog::default();
        let orch = orchestrator(SkillStatus::Failed("boom".into()), &calls);

        let report = orch
            .run_experiment(experiment(1, Some("b"), Duration::from_secs(60)))
            .await
            .unwrap();

        assert!(report.status.contains("boom"));
        assert!(report.soak_duration < Duration::from_secs(60));
        assert_eq!(*calls.lock().unwrap(), vec!["execute fn-b", "rollback fn-b"]);
    }
}
