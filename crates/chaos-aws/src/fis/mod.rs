pub mod duration;
pub mod iso8601;

use async_trait::async_trait;
use aws_sdk_fis::error::DisplayErrorContext;
use aws_sdk_fis::types::ExperimentTemplate;

use duration::{ActionSpec, TemplateActions, TemplateSource, DURATION_PARAMETER};

/// Reads template actions through `GetExperimentTemplate`.
pub struct FisTemplateSource {
    client: aws_sdk_fis::Client,
}

impl FisTemplateSource {
    pub fn new(client: aws_sdk_fis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TemplateSource for FisTemplateSource {
    async fn fetch_template(&self, template_id: &str) -> anyhow::Result<TemplateActions> {
        let output = self
            .client
            .get_experiment_template()
            .id(template_id)
            .send()
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "GetExperimentTemplate {template_id} failed: {}",
                    DisplayErrorContext(&e)
                )
            })?;
        let template = output
            .experiment_template()
            .ok_or_else(|| anyhow::anyhow!("Experiment template {template_id} not returned"))?;
        Ok(template_actions(template))
    }
}

pub fn template_actions(template: &ExperimentTemplate) -> TemplateActions {
    template
        .actions()
        .into_iter()
        .flatten()
        .map(|(name, action)| {
            let duration = action
                .parameters()
                .and_then(|params| params.get(DURATION_PARAMETER))
                .map(String::as_str);
            ActionSpec::from_parameter(name.clone(), duration, action.start_after().to_vec())
        })
        .collect()
}
