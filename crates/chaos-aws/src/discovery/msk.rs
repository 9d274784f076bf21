use aws_sdk_kafka::error::DisplayErrorContext;
use aws_sdk_kafka::types::{Cluster, ClusterType, NodeInfo};

use chaos_core::discovery::Target;
use chaos_core::skill::TargetKind;

use crate::access::AwsAccess;

pub const ATTR_CLUSTER_ARN: &str = "aws.msk.cluster.arn";
pub const ATTR_BROKER_ID: &str = "aws.msk.cluster.broker.id";

pub async fn discover(access: AwsAccess) -> anyhow::Result<Vec<Target>> {
    let client = access.kafka();
    let mut targets = Vec::new();
    let mut next_token: Option<String> = None;

    loop {
        let page = client
            .list_clusters_v2()
            .set_next_token(next_token.take())
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("ListClustersV2 failed: {}", DisplayErrorContext(&e)))?;

        for cluster in page.cluster_info_list() {
            // Serverless clusters have no addressable brokers.
            if cluster.cluster_type() != Some(&ClusterType::Provisioned) {
                continue;
            }
            let Some(cluster_arn) = cluster.cluster_arn() else {
                continue;
            };
            match list_nodes(&client, cluster_arn).await {
                Ok(nodes) => targets.extend(
                    nodes
                        .iter()
                        .filter_map(|node| broker_target(cluster, node))
                        .map(|target| access.stamp(target)),
                ),
                Err(e) => {
                    tracing::warn!(cluster = %cluster_arn, error = %e, "Failed to list MSK brokers");
                }
            }
        }

        next_token = page.next_token().map(str::to_string);
        if next_token.is_none() {
            break;
        }
    }

    Ok(targets)
}

async fn list_nodes(client: &aws_sdk_kafka::Client, cluster_arn: &str) -> anyhow::Result<Vec<NodeInfo>> {
    let mut nodes = Vec::new();
    let mut next_token: Option<String> = None;

    loop {
        let page = client
            .list_nodes()
            .cluster_arn(cluster_arn)
            .set_next_token(next_token.take())
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("ListNodes failed: {}", DisplayErrorContext(&e)))?;
        nodes.extend(page.node_info_list().iter().cloned());

        next_token = page.next_token().map(str::to_string);
        if next_token.is_none() {
            break;
        }
    }

    Ok(nodes)
}

/// Broker ids are reported as floats; the API expects them back as integers.
pub fn broker_id_string(id: f64) -> String {
    format!("{}", id as i64)
}

/// Nodes without broker info (e.g. ZooKeeper/controller nodes) are skipped.
pub fn broker_target(cluster: &Cluster, node: &NodeInfo) -> Option<Target> {
    let broker = node.broker_node_info()?;
    let broker_id = broker_id_string(broker.broker_id()?);
    let cluster_arn = cluster.cluster_arn().unwrap_or_default();
    let cluster_name = cluster.cluster_name().unwrap_or_default();

    let mut target = Target::new(
        TargetKind::MskBroker,
        format!("{cluster_arn}/broker-{broker_id}"),
        format!("{cluster_name} broker {broker_id}"),
    );
    target.set_attr(ATTR_CLUSTER_ARN, cluster_arn);
    target.set_attr("aws.msk.cluster.name", cluster_name);
    target.set_opt_attr("aws.msk.cluster.state", cluster.state().map(|s| s.as_str()));
    target.set_attr(ATTR_BROKER_ID, broker_id);
    target.set_opt_attr("aws.msk.cluster.broker.arn", node.node_arn());
    target.set_opt_attr("aws.msk.cluster.broker.instance-type", node.instance_type());
    target.set_opt_attr("aws.msk.cluster.broker.client-subnet", broker.client_subnet());
    target.set_opt_attr("aws.msk.cluster.broker.vpc-ip", broker.client_vpc_ip_address());
    for endpoint in broker.endpoints() {
        target.set_attr("aws.msk.cluster.broker.endpoint", endpoint);
    }
    if let Some(tags) = cluster.tags() {
        for (key, value) in tags {
            target.set_attr(format!("aws.msk.cluster.label.{}", key.to_lowercase()), value);
        }
    }

    Some(target)
}
