use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::types::FunctionConfiguration;

use chaos_core::discovery::Target;
use chaos_core::skill::TargetKind;

use crate::access::AwsAccess;

/// Environment variable naming the SSM parameter a function reads its
/// failure configuration from.
pub const FAILURE_INJECTION_ENV: &str = "FAILURE_INJECTION_PARAM";
pub const ATTR_FUNCTION_NAME: &str = "aws.lambda.function-name";
pub const ATTR_FAILURE_INJECTION_PARAM: &str = "aws.lambda.failure-injection-param";

pub async fn discover(access: AwsAccess) -> anyhow::Result<Vec<Target>> {
    let client = access.lambda();
    let mut pages = client.list_functions().into_paginator().send();
    let mut targets = Vec::new();

    while let Some(page) = pages.next().await {
        let page = page
            .map_err(|e| anyhow::anyhow!("ListFunctions failed: {}", DisplayErrorContext(&e)))?;
        targets.extend(
            page.functions()
                .iter()
                .map(|function| access.stamp(function_target(function))),
        );
    }

    Ok(targets)
}

pub fn function_target(function: &FunctionConfiguration) -> Target {
    let name = function.function_name().unwrap_or_default();
    let arn = function.function_arn().unwrap_or(name);

    let mut target = Target::new(TargetKind::Lambda, arn, name);
    target.set_attr("aws.arn", arn);
    target.set_attr(ATTR_FUNCTION_NAME, name);
    target.set_opt_attr("aws.lambda.runtime", function.runtime().map(|r| r.as_str()));
    target.set_opt_attr("aws.lambda.memory-size", function.memory_size());
    target.set_opt_attr("aws.lambda.timeout", function.timeout());
    target.set_attr("aws.lambda.code-size", function.code_size().to_string());
    target.set_opt_attr("aws.lambda.description", function.description());
    target.set_opt_attr("aws.lambda.last-modified", function.last_modified());
    target.set_opt_attr(
        "aws.lambda.package-type",
        function.package_type().map(|p| p.as_str()),
    );
    for arch in function.architectures() {
        target.set_attr("aws.lambda.architecture", arch.as_str());
    }
    target.set_opt_attr("aws.lambda.role", function.role());
    target.set_opt_attr("aws.lambda.version", function.version());

    let failure_param = function
        .environment()
        .and_then(|env| env.variables())
        .and_then(|vars| vars.get(FAILURE_INJECTION_ENV));
    target.set_opt_attr(ATTR_FAILURE_INJECTION_PARAM, failure_param);

    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_lambda::types::{Architecture, EnvironmentResponse, Runtime};

    #[test]
    fn maps_function_configuration() {
        let function = FunctionConfiguration::builder()
            .function_name("checkout")
            .function_arn("arn:aws:lambda:eu-central-1:123456789012:function:checkout")
            .runtime(Runtime::Nodejs18x)
            .memory_size(512)
            .timeout(30)
            .code_size(2048)
            .architectures(Architecture::Arm64)
            .environment(
                EnvironmentResponse::builder()
                    .variables(FAILURE_INJECTION_ENV, "/chaos/checkout")
                    .build(),
            )
            .build();

        let target = function_target(&function);

        assert_eq!(target.kind, TargetKind::Lambda);
        assert_eq!(target.id, "arn:aws:lambda:eu-central-1:123456789012:function:checkout");
        assert_eq!(target.label, "checkout");
        assert_eq!(target.attr(ATTR_FUNCTION_NAME), Some("checkout"));
        assert_eq!(target.attr("aws.lambda.runtime"), Some("nodejs18.x"));
        assert_eq!(target.attr("aws.lambda.memory-size"), Some("512"));
        assert_eq!(target.attr("aws.lambda.code-size"), Some("2048"));
        assert_eq!(target.attr("aws.lambda.architecture"), Some("arm64"));
        assert_eq!(target.attr(ATTR_FAILURE_INJECTION_PARAM), Some("/chaos/checkout"));
        assert!(target.attr("aws.lambda.description").is_none());
    }

    #[test]
    fn functions_without_failure_param_are_still_targets() {
        let function = FunctionConfiguration::builder().function_name("plain").build();
        let target = function_target(&function);
        assert_eq!(target.id, "plain");
        assert!(target.attr(ATTR_FAILURE_INJECTION_PARAM).is_none());
    }
}
