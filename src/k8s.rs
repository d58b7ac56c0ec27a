use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{Namespace, Pod};
use kube::api::{AttachParams, AttachedProcess, ListParams, LogParams};
use kube::{Api, Client, Config};
use tracing::debug;

use crate::model::{ContainerChoice, ContainerDetail, PodDetail};

const LOG_TAIL_LINES: i64 = 50;
const EXEC_SHELL: &str = "/bin/sh";

/// Shared handle to the cluster API. Cheap to clone; every background task
/// gets its own copy.
#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    api_host: String,
}

impl KubeGateway {
    /// Connects either via the in-cluster service account or by inferring
    /// from the environment (kubeconfig, then in-cluster as fallback).
    pub async fn connect(in_cluster: bool) -> Result<Self> {
        let config = if in_cluster {
            Config::incluster().context("loading in-cluster configuration")?
        } else {
            Config::infer()
                .await
                .context("inferring cluster configuration")?
        };
        let api_host = config.cluster_url.to_string();
        let client = Client::try_from(config).context("building cluster client")?;
        debug!("connected to {api_host}");
        Ok(Self { client, api_host })
    }

    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    pub async fn list_namespaces(&self) -> Result<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .context("listing namespaces")?;
        Ok(list
            .into_iter()
            .filter_map(|namespace| namespace.metadata.name)
            .collect())
    }

    pub async fn list_pods(&self, namespace: &str) -> Result<Vec<String>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default())
            .await
            .with_context(|| format!("listing pods in {namespace}"))?;
        Ok(list.into_iter().filter_map(|pod| pod.metadata.name).collect())
    }

    pub async fn pod_detail(&self, namespace: &str, pod: &str) -> Result<PodDetail> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let object = api
            .get(pod)
            .await
            .with_context(|| format!("fetching pod {namespace}/{pod}"))?;
        Ok(detail_from_pod(object))
    }

    pub async fn pod_containers(&self, namespace: &str, pod: &str) -> Result<Vec<ContainerChoice>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let object = api
            .get(pod)
            .await
            .with_context(|| format!("fetching pod {namespace}/{pod}"))?;
        Ok(containers_from_pod(&object))
    }

    /// Follow-mode log stream, seeded with the last `LOG_TAIL_LINES` lines.
    pub async fn open_log_stream(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
    ) -> Result<impl futures::AsyncBufRead + Send> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            follow: true,
            tail_lines: Some(LOG_TAIL_LINES),
            container: container.map(str::to_string),
            ..LogParams::default()
        };
        api.log_stream(pod, &params)
            .await
            .with_context(|| format!("opening log stream for {namespace}/{pod}"))
    }

    /// Interactive `/bin/sh` inside the container, attached over a tty.
    pub async fn exec_shell(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> Result<AttachedProcess> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = AttachParams {
            container: Some(container.to_string()),
            stdin: true,
            stdout: true,
            stderr: false,
            tty: true,
            ..AttachParams::default()
        };
        api.exec(pod, [EXEC_SHELL], &params)
            .await
            .with_context(|| format!("starting shell in {namespace}/{pod}:{container}"))
    }
}

/// Reduces a full Pod object to the fields the detail pane renders.
pub fn detail_from_pod(pod: Pod) -> PodDetail {
    let containers = containers_detail(&pod);
    let metadata = pod.metadata;
    let spec = pod.spec.unwrap_or_default();
    let status = pod.status.unwrap_or_default();

    let controlled_by = metadata
        .owner_references
        .unwrap_or_default()
        .into_iter()
        .next()
        .map(|owner| (owner.kind, owner.name));
    // Restart count shown is the first container's, matching the template.
    let restarts = status
        .container_statuses
        .as_ref()
        .and_then(|statuses| statuses.first())
        .map(|status| status.restart_count);
    let created = metadata
        .creation_timestamp
        .map(|time| time.0.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();

    PodDetail {
        name: metadata.name.unwrap_or_default(),
        namespace: metadata.namespace.unwrap_or_default(),
        node: spec.node_name.unwrap_or_default(),
        controlled_by,
        created,
        restarts,
        phase: status.phase.unwrap_or_default(),
        pod_ip: status.pod_ip.unwrap_or_default(),
        containers,
    }
}

fn containers_detail(pod: &Pod) -> Vec<ContainerDetail> {
    let Some(spec) = &pod.spec else {
        return Vec::new();
    };
    spec.containers
        .iter()
        .map(|container| ContainerDetail {
            name: container.name.clone(),
            image: container.image.clone().unwrap_or_default(),
            env: container
                .env
                .iter()
                .flatten()
                .map(|var| (var.name.clone(), var.value.clone().unwrap_or_default()))
                .collect(),
        })
        .collect()
}

/// Spec-order container names and images, for the choice prompt and the
/// single-container fast path.
pub fn containers_from_pod(pod: &Pod) -> Vec<ContainerChoice> {
    let Some(spec) = &pod.spec else {
        return Vec::new();
    };
    spec.containers
        .iter()
        .map(|container| ContainerChoice {
            name: container.name.clone(),
            image: container.image.clone().unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{containers_from_pod, detail_from_pod};
    use k8s_openapi::api::core::v1::{Container, ContainerStatus, EnvVar, Pod, PodSpec, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

    fn sample_pod() -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("web-7f-abc12".to_string()),
                namespace: Some("default".to_string()),
                owner_references: Some(vec![OwnerReference {
                    kind: "ReplicaSet".to_string(),
                    name: "web-7f".to_string(),
                    ..OwnerReference::default()
                }]),
                ..ObjectMeta::default()
            },
            spec: Some(PodSpec {
                node_name: Some("node-1".to_string()),
                containers: vec![
                    Container {
                        name: "app".to_string(),
                        image: Some("nginx:1.25".to_string()),
                        env: Some(vec![EnvVar {
                            name: "FOO".to_string(),
                            value: Some("bar".to_string()),
                            ..EnvVar::default()
                        }]),
                        ..Container::default()
                    },
                    Container {
                        name: "sidecar".to_string(),
                        image: Some("envoy:1.28".to_string()),
                        ..Container::default()
                    },
                ],
                ..PodSpec::default()
            }),
            status: Some(PodStatus {
                phase: Some("Running".to_string()),
                pod_ip: Some("10.1.2.3".to_string()),
                container_statuses: Some(vec![
                    ContainerStatus {
                        name: "app".to_string(),
                        restart_count: 2,
                        ..ContainerStatus::default()
                    },
                    ContainerStatus {
                        name: "sidecar".to_string(),
                        restart_count: 1,
                        ..ContainerStatus::default()
                    },
                ]),
                ..PodStatus::default()
            }),
        }
    }

    #[test]
    fn detail_reduces_pod_fields() {
        let detail = detail_from_pod(sample_pod());
        assert_eq!(detail.name, "web-7f-abc12");
        assert_eq!(detail.namespace, "default");
        assert_eq!(detail.node, "node-1");
        assert_eq!(
            detail.controlled_by,
            Some(("ReplicaSet".to_string(), "web-7f".to_string()))
        );
        assert_eq!(detail.restarts, Some(2));
        assert_eq!(detail.phase, "Running");
        assert_eq!(detail.pod_ip, "10.1.2.3");
    }

    #[test]
    fn detail_keeps_container_spec_order() {
        let detail = detail_from_pod(sample_pod());
        assert_eq!(detail.containers.len(), 2);
        assert_eq!(detail.containers[0].name, "app");
        assert_eq!(
            detail.containers[0].env,
            vec![("FOO".to_string(), "bar".to_string())]
        );
        assert_eq!(detail.containers[1].name, "sidecar");
    }

    #[test]
    fn detail_tolerates_missing_sections() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("bare".to_string()),
                ..ObjectMeta::default()
            },
            spec: None,
            status: None,
        };
        let detail = detail_from_pod(pod);
        assert_eq!(detail.name, "bare");
        assert_eq!(detail.controlled_by, None);
        assert_eq!(detail.restarts, None);
        assert!(detail.containers.is_empty());
    }

    #[test]
    fn choices_list_name_and_image() {
        let choices = containers_from_pod(&sample_pod());
        assert_eq!(choices.len(), 2);
        assert_eq!(choices[0].name, "app");
        assert_eq!(choices[0].image, "nginx:1.25");
    }
}
