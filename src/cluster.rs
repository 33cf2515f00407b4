//! Cluster shape handed to the batch runner with every launch.
//!
//! The master group runs a single node; the core group is required; the
//! task group is only present when configured with at least one instance.

use serde::Serialize;

use crate::config::{ClusterConfig, InstanceGroupConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupRole {
    Master,
    Core,
    Task,
}

/// How instances in a group are bought.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "market", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Market {
    OnDemand,
    Spot { bid_price: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceGroup {
    pub role: GroupRole,
    pub instance_type: String,
    /// `None` leaves the count to the runner's default.
    pub instance_count: Option<u32>,
    #[serde(flatten)]
    pub market: Market,
}

impl InstanceGroup {
    fn from_config(role: GroupRole, config: &InstanceGroupConfig) -> Self {
        let market = match (config.use_spot_instances, config.bid_price) {
            (true, Some(bid_price)) => Market::Spot { bid_price },
            _ => Market::OnDemand,
        };

        Self {
            role,
            instance_type: config.instance_type.clone(),
            instance_count: (config.instance_count > 0).then_some(config.instance_count),
            market,
        }
    }

    fn describe(&self) -> String {
        let price = match &self.market {
            Market::Spot { bid_price } => format!("(Spot: {})", bid_price),
            Market::OnDemand => "(On Demand)".to_string(),
        };
        let count = self
            .instance_count
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!("{} {}  {}", count, self.instance_type, price)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterShape {
    pub master: InstanceGroup,
    pub core: InstanceGroup,
    pub task: Option<InstanceGroup>,
    pub ec2_key_name: Option<String>,
    pub placement: Option<String>,
    pub ami_version: Option<String>,
    pub job_flow_role: Option<String>,
    pub service_role: Option<String>,
    pub ec2_subnet_id: Option<String>,
    pub bootstrap_scripts: Vec<String>,
}

impl ClusterShape {
    pub fn from_config(config: &ClusterConfig) -> Self {
        let task = config
            .task
            .as_ref()
            .filter(|t| t.instance_count > 0)
            .map(|t| InstanceGroup::from_config(GroupRole::Task, t));

        Self {
            master: InstanceGroup::from_config(GroupRole::Master, &config.master),
            core: InstanceGroup::from_config(GroupRole::Core, &config.core),
            task,
            ec2_key_name: non_empty(&config.ec2_key_name),
            placement: non_empty(&config.placement),
            ami_version: non_empty(&config.ami_version),
            job_flow_role: non_empty(&config.job_flow_role),
            service_role: non_empty(&config.service_role),
            ec2_subnet_id: non_empty(&config.ec2_subnet_id),
            bootstrap_scripts: config.bootstrap_scripts.clone(),
        }
    }

    /// One line per instance group.
    pub fn describe(&self) -> String {
        let task = self
            .task
            .as_ref()
            .map(InstanceGroup::describe)
            .unwrap_or_else(|| "--".to_string());

        format!(
            "Master: {}\nCore:   {}\nTask:   {}",
            self.master.describe(),
            self.core.describe(),
            task
        )
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}
