use std::sync::Arc;

use aws_sdk_fis::error::DisplayErrorContext;
use aws_sdk_fis::primitives::DateTime as AwsDateTime;
use aws_sdk_fis::types::ExperimentTemplateSummary;
use chrono::{DateTime, Utc};

use chaos_core::discovery::Target;
use chaos_core::skill::TargetKind;

use crate::access::AwsAccess;
use crate::fis::duration::TemplateDurationCache;
use crate::fis::FisTemplateSource;

pub const ATTR_TEMPLATE_ID: &str = "aws.fis.experiment.template.id";
pub const ATTR_TEMPLATE_DURATION: &str = "aws.fis.experiment.template.duration";
pub const ATTR_TEMPLATE_DURATION_SECONDS: &str = "aws.fis.experiment.template.duration.seconds";

pub async fn discover(
    access: AwsAccess,
    durations: Arc<TemplateDurationCache>,
) -> anyhow::Result<Vec<Target>> {
    let client = access.fis();
    let source = FisTemplateSource::new(client.clone());
    let mut targets = Vec::new();
    let mut next_token: Option<String> = None;

    loop {
        let page = client
            .list_experiment_templates()
            .set_next_token(next_token.take())
            .send()
            .await
            .map_err(|e| {
                anyhow::anyhow!("ListExperimentTemplates failed: {}", DisplayErrorContext(&e))
            })?;

        for summary in page.experiment_templates() {
            let mut target = template_target(summary);

            if let (Some(id), Some(updated)) = (summary.id(), summary.last_update_time()) {
                match durations
                    .total_duration(id, to_chrono(updated), &source)
                    .await
                {
                    Ok(duration) => {
                        target.set_attr(
                            ATTR_TEMPLATE_DURATION,
                            humantime::format_duration(duration).to_string(),
                        );
                        target.set_attr(
                            ATTR_TEMPLATE_DURATION_SECONDS,
                            duration.as_secs().to_string(),
                        );
                    }
                    Err(e) => {
                        tracing::warn!(template = %id, error = %e, "Failed to estimate template duration");
                    }
                }
            }

            targets.push(access.stamp(target));
        }

        next_token = page.next_token().map(str::to_string);
        if next_token.is_none() {
            break;
        }
    }

    Ok(targets)
}

pub fn to_chrono(time: &AwsDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos()).unwrap_or_default()
}

/// The `Name` tag is the label FIS shows in the console; fall back to the id.
pub fn template_target(summary: &ExperimentTemplateSummary) -> Target {
    let id = summary.id().unwrap_or_default();
    let tags = summary.tags();
    let label = tags
        .and_then(|t| t.get("Name"))
        .map(String::as_str)
        .unwrap_or(id);

    let mut target = Target::new(TargetKind::FisTemplate, id, label);
    target.set_attr(ATTR_TEMPLATE_ID, id);
    target.set_opt_attr(
        "aws.fis.experiment.template.description",
        summary.description(),
    );
    target.set_opt_attr(
        "aws.fis.experiment.template.last-update",
        summary.last_update_time().map(|t| to_chrono(t).to_rfc3339()),
    );
    if let Some(tags) = tags {
        for (key, value) in tags {
            target.set_attr(
                format!("aws.fis.experiment.template.label.{}", key.to_lowercase()),
                value,
            );
        }
    }
    target
}
