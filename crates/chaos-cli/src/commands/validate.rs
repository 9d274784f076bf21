use std::path::PathBuf;

use chaos_core::agent::Agent;

pub async fn execute(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let (path, config, agent) = super::load(config_path)?;
    println!("Validating {}...", path.display());
    println!("  YAML parsing: OK");
    println!("  Accesses: {}", agent.config().accesses.len());
    println!("  Experiments found: {}", config.experiments.len());

    let mut errors = Vec::new();
    if agent.config().accesses.is_empty() {
        errors.push("target_config: no accesses configured".to_string());
    }

    for (i, experiment) in config.experiments.iter().enumerate() {
        println!("\n  Experiment #{}: '{}'", i + 1, experiment.name);
        println!("    Duration: {:?}", experiment.duration);
        println!("    Skills: {}", experiment.skills.len());

        for invocation in &experiment.skills {
            let Some(skill) = agent.skill_by_name(&invocation.skill_name) else {
                println!("    Skill '{}': NOT FOUND", invocation.skill_name);
                errors.push(format!(
                    "Experiment '{}': unknown skill '{}'",
                    experiment.name, invocation.skill_name
                ));
                continue;
            };

            let desc = skill.descriptor();
            if desc.target_kind != invocation.target.kind {
                println!(
                    "    Skill '{}': WRONG TARGET - expects {}, selector is {}",
                    invocation.skill_name, desc.target_kind, invocation.target.kind
                );
                errors.push(format!(
                    "Experiment '{}', skill '{}': targets {} but selector is {}",
                    experiment.name, invocation.skill_name, desc.target_kind, invocation.target.kind
                ));
                continue;
            }

            match skill.validate_params(&invocation.params) {
                Ok(()) => println!("    Skill '{}' on {}: OK", invocation.skill_name, invocation.target),
                Err(e) => {
                    println!("    Skill '{}': INVALID - {e}", invocation.skill_name);
                    errors.push(format!(
                        "Experiment '{}', skill '{}': invalid params: {e}",
                        experiment.name, invocation.skill_name
                    ));
                }
            }
        }
    }

    println!();
    if errors.is_empty() {
        println!("Validation PASSED");
        Ok(())
    } else {
        println!("Validation FAILED with {} error(s):", errors.len());
        for err in &errors {
            eprintln!("  - {err}");
        }
        anyhow::bail!("{} validation error(s)", errors.len())
    }
}
