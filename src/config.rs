//! TOML configuration.
//!
//! One file carries everything the command surface needs; each component is
//! handed only its own section (see [`Config::planner_config`] and friends).
//!
//! ```toml
//! [db]
//! path = "./data/crawl-ledger.sqlite"
//!
//! [dataset]
//! root = "s3://aws-publicdatasets/common-crawl/crawl-data"
//! manifest = "./manifests/{release}.paths"
//!
//! [output]
//! root = "s3://my-crawl-bucket"
//!
//! [steps.parse]
//! jar = "s3://my-crawl-bucket/jar/crawl-parser.jar"
//! main_class = "com.example.WarcParser"
//! input_filter = "warc/*.warc.gz"
//!
//! [steps.combine]
//! jar = "s3://my-crawl-bucket/jar/crawl-parser.jar"
//! main_class = "com.example.Combiner"
//! input_filter = "part-*"
//!
//! [cluster.master]
//! instance_type = "m1.medium"
//! instance_count = 1
//!
//! [cluster.core]
//! instance_type = "m1.medium"
//! instance_count = 2
//! use_spot_instances = true
//! bid_price = 0.12
//!
//! [runner]
//! command = "emr-launch"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::planner::PlannerConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub dataset: DatasetConfig,
    pub output: OutputConfig,
    pub steps: StepsConfig,
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub runner: Option<RunnerConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Where the crawl lives and how its partitions are listed.
#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    /// URI prefix under which every release is stored.
    #[serde(default = "default_dataset_root")]
    pub root: String,
    /// Manifest path template; `{release}` is replaced by the release name.
    #[serde(default)]
    pub manifest: Option<String>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    /// Leading path components of a manifest line that name its partition.
    #[serde(default = "default_partition_depth")]
    pub partition_depth: usize,
}

fn default_dataset_root() -> String {
    "s3://aws-publicdatasets/common-crawl/crawl-data".to_string()
}

fn default_include_globs() -> Vec<String> {
    vec!["**".to_string()]
}

fn default_partition_depth() -> usize {
    5
}

/// Destination for job data and logs.
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub root: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StepsConfig {
    pub parse: StepConfig,
    pub combine: StepConfig,
}

/// Per-variant step settings.
#[derive(Debug, Deserialize, Clone)]
pub struct StepConfig {
    pub jar: String,
    pub main_class: String,
    pub input_filter: String,
    /// Runner configuration file applied to every node at bootstrap.
    #[serde(default)]
    pub runner_config: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClusterConfig {
    pub master: InstanceGroupConfig,
    pub core: InstanceGroupConfig,
    #[serde(default)]
    pub task: Option<InstanceGroupConfig>,
    #[serde(default)]
    pub ec2_key_name: Option<String>,
    #[serde(default)]
    pub placement: Option<String>,
    #[serde(default)]
    pub ami_version: Option<String>,
    #[serde(default)]
    pub job_flow_role: Option<String>,
    #[serde(default)]
    pub service_role: Option<String>,
    #[serde(default)]
    pub ec2_subnet_id: Option<String>,
    #[serde(default)]
    pub bootstrap_scripts: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InstanceGroupConfig {
    pub instance_type: String,
    #[serde(default)]
    pub instance_count: u32,
    #[serde(default)]
    pub use_spot_instances: bool,
    #[serde(default)]
    pub bid_price: Option<f64>,
}

/// External command that accepts launch requests.
#[derive(Debug, Deserialize, Clone)]
pub struct RunnerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Config {
    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            output_root: self.output.root.clone(),
            parse_input_filter: self.steps.parse.input_filter.clone(),
            combine_input_filter: self.steps.combine.input_filter.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.dataset.partition_depth == 0 {
            bail!("dataset.partition_depth must be > 0");
        }
        if self.dataset.root.trim().is_empty() {
            bail!("dataset.root must not be empty");
        }
        if self.output.root.trim().is_empty() {
            bail!("output.root must not be empty");
        }

        validate_group("cluster.master", &self.cluster.master)?;
        validate_group("cluster.core", &self.cluster.core)?;
        if let Some(task) = &self.cluster.task {
            if task.instance_count > 0 {
                validate_group("cluster.task", task)?;
            }
        }

        if let Some(runner) = &self.runner {
            if runner.command.trim().is_empty() {
                bail!("runner.command must not be empty");
            }
        }

        Ok(())
    }
}

fn validate_group(section: &str, group: &InstanceGroupConfig) -> Result<()> {
    if group.instance_type.trim().is_empty() {
        bail!("{}.instance_type must be specified", section);
    }
    if group.use_spot_instances && group.bid_price.is_none() {
        bail!(
            "{}.bid_price must be specified when use_spot_instances is true",
            section
        );
    }
    Ok(())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
