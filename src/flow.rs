//! Compiles a job and its steps into the request handed to the batch runner.

use serde::Serialize;

use crate::cluster::ClusterShape;
use crate::config::StepConfig;
use crate::models::{join_input_paths, Job, JobVariant, Step};
use crate::planner::log_uri;

/// One runner step: a jar invocation with positional string arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowStep {
    pub name: String,
    pub jar: String,
    pub arguments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BootstrapAction {
    /// Script run on every node as it starts.
    Script { uri: String },
    /// Runner configuration file applied to every node.
    ConfigFile { uri: String },
}

/// Everything the runner needs to launch a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaunchRequest {
    pub name: String,
    pub job_name: String,
    pub variant: JobVariant,
    pub log_uri: String,
    pub steps: Vec<FlowStep>,
    pub cluster: ClusterShape,
    pub bootstrap_actions: Vec<BootstrapAction>,
}

/// Human-readable step label.
pub fn step_name(variant: JobVariant, step: &Step) -> String {
    match variant {
        JobVariant::Parse => format!(
            "Segment: {}",
            step.segment_name.as_deref().unwrap_or_default()
        ),
        JobVariant::Combine => format!("Combining {} jobs", step.input_paths.len()),
    }
}

/// Positional arguments: main class, input paths, output path, and the
/// per-step file cap when one is set.
pub fn step_arguments(job: &Job, step: &Step, step_config: &StepConfig) -> Vec<String> {
    let mut args = vec![
        step_config.main_class.clone(),
        join_input_paths(&step.input_paths),
        step.output_path.clone(),
    ];
    if let Some(max) = job.max_units_per_step {
        args.push(max.to_string());
    }
    args
}

pub fn compile(
    job: &Job,
    steps: &[Step],
    step_config: &StepConfig,
    output_root: &str,
    cluster: ClusterShape,
) -> LaunchRequest {
    let flow_steps = steps
        .iter()
        .map(|step| FlowStep {
            name: step_name(job.variant, step),
            jar: step_config.jar.clone(),
            arguments: step_arguments(job, step, step_config),
        })
        .collect();

    let mut bootstrap_actions: Vec<BootstrapAction> = cluster
        .bootstrap_scripts
        .iter()
        .map(|uri| BootstrapAction::Script { uri: uri.clone() })
        .collect();
    if let Some(uri) = step_config.runner_config.as_ref().filter(|u| !u.is_empty()) {
        bootstrap_actions.push(BootstrapAction::ConfigFile { uri: uri.clone() });
    }

    LaunchRequest {
        name: format!("Job: {} {}", job.name, job.description),
        job_name: job.name.clone(),
        variant: job.variant,
        log_uri: log_uri(output_root, job.variant, &job.name),
        steps: flow_steps,
        cluster,
        bootstrap_actions,
    }
}
