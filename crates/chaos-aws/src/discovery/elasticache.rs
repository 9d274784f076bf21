use aws_sdk_elasticache::error::DisplayErrorContext;
use aws_sdk_elasticache::types::ReplicationGroup;

use chaos_core::discovery::Target;
use chaos_core::skill::TargetKind;

use crate::access::AwsAccess;

pub const ATTR_REPLICATION_GROUP_ID: &str = "aws.elasticache.replication-group.id";
pub const ATTR_NODE_GROUP_ID: &str = "aws.elasticache.node-group.id";

pub async fn discover(access: AwsAccess) -> anyhow::Result<Vec<Target>> {
    let client = access.elasticache();
    let mut pages = client.describe_replication_groups().into_paginator().send();
    let mut targets = Vec::new();

    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| {
            anyhow::anyhow!("DescribeReplicationGroups failed: {}", DisplayErrorContext(&e))
        })?;
        for group in page.replication_groups() {
            targets.extend(
                node_group_targets(group)
                    .into_iter()
                    .map(|target| access.stamp(target)),
            );
        }
    }

    Ok(targets)
}

/// One target per node group; failover acts on a single node group.
pub fn node_group_targets(group: &ReplicationGroup) -> Vec<Target> {
    let group_id = group.replication_group_id().unwrap_or_default();

    group
        .node_groups()
        .iter()
        .map(|node_group| {
            let node_group_id = node_group.node_group_id().unwrap_or_default();
            let mut target = Target::new(
                TargetKind::ElastiCacheNodeGroup,
                format!("{group_id}/{node_group_id}"),
                format!("{group_id} ({node_group_id})"),
            );
            target.set_opt_attr("aws.arn", group.arn());
            target.set_attr(ATTR_REPLICATION_GROUP_ID, group_id);
            target.set_opt_attr("aws.elasticache.replication-group.status", group.status());
            target.set_opt_attr(
                "aws.elasticache.replication-group.description",
                group.description(),
            );
            target.set_opt_attr(
                "aws.elasticache.replication-group.cache-node-type",
                group.cache_node_type(),
            );
            target.set_opt_attr(
                "aws.elasticache.replication-group.automatic-failover",
                group.automatic_failover().map(|s| s.as_str()),
            );
            target.set_opt_attr(
                "aws.elasticache.replication-group.multi-az",
                group.multi_az().map(|s| s.as_str()),
            );
            target.set_opt_attr(
                "aws.elasticache.replication-group.cluster-enabled",
                group.cluster_enabled(),
            );
            target.set_attr(ATTR_NODE_GROUP_ID, node_group_id);
            target.set_opt_attr("aws.elasticache.node-group.status", node_group.status());
            for member in node_group.node_group_members() {
                target.set_opt_attr(
                    "aws.elasticache.node-group.member",
                    member.cache_cluster_id(),
                );
            }
            target
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_elasticache::types::{AutomaticFailoverStatus, NodeGroup, NodeGroupMember};

    #[test]
    fn one_target_per_node_group() {
        let group = ReplicationGroup::builder()
            .replication_group_id("orders")
            .status("available")
            .automatic_failover(AutomaticFailoverStatus::Enabled)
            .cluster_enabled(true)
            .node_groups(
                NodeGroup::builder()
                    .node_group_id("0001")
                    .status("available")
                    .node_group_members(
                        NodeGroupMember::builder()
                            .cache_cluster_id("orders-0001-001")
                            .build(),
                    )
                    .node_group_members(
                        NodeGroupMember::builder()
                            .cache_cluster_id("orders-0001-002")
                            .build(),
                    )
                    .build(),
            )
            .node_groups(NodeGroup::builder().node_group_id("0002").build())
            .build();

        let targets = node_group_targets(&group);

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].id, "orders/0001");
        assert_eq!(targets[1].attr(ATTR_NODE_GROUP_ID), Some("0002"));
        assert_eq!(targets[0].attr(ATTR_REPLICATION_GROUP_ID), Some("orders"));
        assert_eq!(
            targets[0].attr("aws.elasticache.replication-group.automatic-failover"),
            Some("enabled")
        );
        assert_eq!(
            targets[0].attr("aws.elasticache.replication-group.cluster-enabled"),
            Some("true")
        );
        assert_eq!(
            targets[0].attributes["aws.elasticache.node-group.member"],
            vec!["orders-0001-001", "orders-0001-002"]
        );
    }

    #[test]
    fn group_without_node_groups_yields_nothing() {
        let group = ReplicationGroup::builder().replication_group_id("empty").build();
        assert!(node_group_targets(&group).is_empty());
    }
}
