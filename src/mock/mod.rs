//! Demo data: a deterministic spread of recovery points across every
//! provider, all inside the last 30 days

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::recovery::{ExternalRef, Mode, Outcome, Provider, RecoveryPoint};

/// Points anchored at today's UTC midnight so paging stays stable
pub fn demo_points() -> Vec<RecoveryPoint> {
    let now = Utc::now();
    let anchor = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|d| d.and_utc())
        .unwrap_or(now);
    generate(anchor)
}

/// Generate the demo set relative to `anchor`
pub fn generate(anchor: DateTime<Utc>) -> Vec<RecoveryPoint> {
    let mut points = Vec::with_capacity(80);
    kubernetes_snapshots(anchor, &mut points);
    velero_backups(anchor, &mut points);
    proxmox_backups(anchor, &mut points);
    truenas_snapshots(anchor, &mut points);
    truenas_replication(anchor, &mut points);
    docker_backups(anchor, &mut points);
    points
}

// ─── Helpers ───

fn stable_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.trim().as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

/// true / false / unknown rotation
fn tri(i: usize, m: usize) -> Option<bool> {
    match i % m {
        0 => Some(true),
        1 => Some(false),
        _ => None,
    }
}

fn at(anchor: DateTime<Utc>, age_days: usize, hour: usize, minute: usize) -> DateTime<Utc> {
    anchor - Duration::days(age_days as i64) + Duration::hours(hour as i64) + Duration::minutes(minute as i64)
}

fn time_key(completed: Option<DateTime<Utc>>, started: DateTime<Utc>) -> String {
    completed.unwrap_or(started).to_rfc3339()
}

fn details(v: Value) -> Option<Map<String, Value>> {
    match v {
        Value::Object(m) => Some(m),
        _ => None,
    }
}

fn typed_ref(ref_type: &str, name: &str) -> ExternalRef {
    ExternalRef { ref_type: ref_type.into(), name: name.into(), ..Default::default() }
}

// ─── Kubernetes ───

const CLUSTERS: [(&str, &str); 2] = [("k8s-demo-cluster-1", "dev-cluster"), ("k8s-demo-cluster-2", "prod-cluster")];

fn kubernetes_snapshots(anchor: DateTime<Utc>, out: &mut Vec<RecoveryPoint>) {
    let subjects = [
        (CLUSTERS[0], "default", "postgres-pvc", "csi-ceph-rbd"),
        (CLUSTERS[0], "monitoring", "prometheus-pvc", "csi-local-path"),
        (CLUSTERS[1], "media", "nextcloud-pvc", "csi-ebs-gp3"),
    ];
    for (si, ((cluster_id, cluster_name), ns, pvc, class)) in subjects.into_iter().enumerate() {
        for i in 0..6 {
            let started = at(anchor, 2 + (si * 7 + i * 4) % 28, (si * 5 + i * 3) % 23, (i % 7) * 6);
            let (outcome, completed) = match i % 4 {
                0 | 1 => (Outcome::Success, Some(started + Duration::minutes(2 + (i % 4) as i64))),
                2 => (Outcome::Running, None),
                _ => (Outcome::Failed, Some(started + Duration::minutes(1 + (i % 3) as i64))),
            };
            let snap_name = format!("vs-{}-{}-{:02}", ns, pvc, i + 1);

            out.push(RecoveryPoint {
                id: stable_id(&["demo", "k8s", "snapshot", cluster_id, ns, pvc, &time_key(completed, started)]),
                provider: Some(Provider::Kubernetes),
                kind: "snapshot".into(),
                mode: Mode::Snapshot,
                outcome,
                started_at: Some(started),
                completed_at: completed,
                size_bytes: (i % 2 == 0 && completed.is_some())
                    .then(|| 2_000_000_000 + (si as i64 + 1) * 750_000_000 + i as i64 * 125_000_000),
                verified: completed.and(tri(i, 3)),
                encrypted: tri(i, 4),
                immutable: tri(i, 5),
                subject_ref: Some(ExternalRef {
                    namespace: ns.into(),
                    uid: stable_id(&["k8s", "pvc", cluster_id, ns, pvc]),
                    ..typed_ref("k8s-pvc", pvc)
                }),
                repository_ref: Some(ExternalRef { class: class.into(), ..typed_ref("k8s-volume-snapshot-class", class) }),
                details: details(json!({
                    "k8sClusterId": cluster_id,
                    "k8sClusterName": cluster_name,
                    "snapshotName": snap_name,
                    "snapshotNs": ns,
                })),
                ..Default::default()
            });
        }
    }
}

fn velero_backups(anchor: DateTime<Utc>, out: &mut Vec<RecoveryPoint>) {
    let locations = ["minio", "s3-primary"];
    for (ci, (cluster_id, cluster_name)) in CLUSTERS.into_iter().enumerate() {
        for i in 0..6 {
            let started = at(anchor, 1 + (ci * 9 + i * 3) % 26, (12 + i * 2 + ci) % 23, (i % 7) * 9);
            let (outcome, phase) = match i % 5 {
                0 | 1 => (Outcome::Success, "Completed"),
                2 => (Outcome::Warning, "PartiallyFailed"),
                3 => (Outcome::Failed, "Failed"),
                _ => (Outcome::Running, "InProgress"),
            };
            let completed = (outcome != Outcome::Running).then(|| started + Duration::minutes(8 + (i % 12) as i64));
            let backup_name = format!("backup-{}-{:02}", cluster_name, i + 1);
            let location = locations[(ci + i) % locations.len()];

            out.push(RecoveryPoint {
                id: stable_id(&["demo", "k8s", "velero", cluster_id, &backup_name, &time_key(completed, started)]),
                provider: Some(Provider::Kubernetes),
                kind: "backup".into(),
                mode: Mode::Remote,
                outcome,
                started_at: Some(started),
                completed_at: completed,
                size_bytes: (completed.is_some() && i % 2 == 0)
                    .then(|| 20_000_000_000 + (ci as i64 + 1) * 5_000_000_000 + i as i64 * 1_250_000_000),
                verified: completed.and(tri(i, 3)),
                encrypted: tri(i, 4),
                immutable: tri(i, 5),
                subject_ref: Some(ExternalRef { id: cluster_id.into(), ..typed_ref("k8s-cluster", cluster_name) }),
                repository_ref: Some(typed_ref("velero-backup-storage-location", location)),
                details: details(json!({
                    "k8sClusterId": cluster_id,
                    "k8sClusterName": cluster_name,
                    "veleroName": backup_name,
                    "veleroNs": "velero",
                    "phase": phase,
                    "storageLocation": location,
                })),
                ..Default::default()
            });
        }
    }
}

// ─── Proxmox ───

fn proxmox_backups(anchor: DateTime<Utc>, out: &mut Vec<RecoveryPoint>) {
    // (instance, node, vmid, type, name, storage, via PBS)
    let guests = [
        ("pve-1", "pve-a", 101, "vm", "web-01", "pbs-1", true),
        ("pve-1", "pve-a", 102, "vm", "db-01", "local-zfs", false),
        ("pve-2", "pve-b", 201, "lxc", "cache-01", "pbs-1", true),
    ];
    for (si, (instance, node, vmid, typ, name, storage, is_pbs)) in guests.into_iter().enumerate() {
        let vmid_s = vmid.to_string();
        for i in 0..5 {
            let started = at(anchor, 2 + (si * 8 + i * 6) % 27, (6 + si * 4 + i * 3) % 23, (i % 7) * 5);
            let (mut outcome, mut status) = match i % 5 {
                0..=2 => (Outcome::Success, "ok"),
                3 => (Outcome::Warning, "warning"),
                _ => (Outcome::Failed, "error"),
            };
            let completed = if i == 0 && si % 2 == 0 {
                outcome = Outcome::Running;
                status = "running";
                None
            } else {
                Some(started + Duration::minutes(7 + (i % 8) as i64))
            };

            out.push(RecoveryPoint {
                id: format!("pve-backup:{}", stable_id(&["proxmox", "backup", instance, node, &vmid_s, &time_key(completed, started)])),
                provider: Some(Provider::ProxmoxPve),
                kind: "backup".into(),
                mode: if is_pbs { Mode::Remote } else { Mode::Local },
                outcome,
                started_at: Some(started),
                completed_at: completed,
                size_bytes: (completed.is_some() && i % 2 == 0)
                    .then(|| 15_000_000_000 + si as i64 * 4_000_000_000 + i as i64 * 1_500_000_000),
                verified: (is_pbs && completed.is_some()).then_some(i % 3 == 0),
                encrypted: if is_pbs { tri(i, 4) } else { None },
                immutable: completed.and(tri(i, 4)),
                subject_ref: Some(ExternalRef {
                    namespace: instance.into(),
                    id: stable_id(&["proxmox", "guest", instance, node, &vmid_s]),
                    class: node.into(),
                    ..typed_ref(if typ == "vm" { "proxmox-vm" } else { "proxmox-lxc" }, name)
                }),
                repository_ref: Some(ExternalRef {
                    namespace: instance.into(),
                    class: node.into(),
                    ..typed_ref("proxmox-storage", storage)
                }),
                details: details(json!({
                    "type": typ,
                    "instance": instance,
                    "node": node,
                    "vmid": vmid,
                    "storage": storage,
                    "isPBS": is_pbs,
                    "status": status,
                    "notes": "scheduled",
                })),
                ..Default::default()
            });
        }
    }
}

// ─── TrueNAS ───

const TRUENAS_HOST: &str = "truenas.local";
const DATASETS: [&str; 3] = ["tank/apps/postgres", "tank/apps/minio", "tank/media/photos"];

fn truenas_snapshots(anchor: DateTime<Utc>, out: &mut Vec<RecoveryPoint>) {
    for (di, ds) in DATASETS.into_iter().enumerate() {
        for i in 0..4 {
            let completed = at(anchor, 3 + (di * 6 + i * 5) % 25, (3 + di * 4 + i * 2) % 23, (i % 7) * 7);
            let snap_name = format!("auto-{}-{:02}", completed.format("%Y%m%d"), i + 1);
            let full = format!("{}@{}", ds, snap_name);

            out.push(RecoveryPoint {
                id: stable_id(&["demo", "truenas", "zfs-snapshot", &full, &completed.to_rfc3339()]),
                provider: Some(Provider::TrueNas),
                kind: "snapshot".into(),
                mode: Mode::Snapshot,
                outcome: Outcome::Success,
                started_at: Some(completed),
                completed_at: Some(completed),
                size_bytes: (i % 2 == 1).then(|| 750_000_000 + di as i64 * 250_000_000 + i as i64 * 125_000_000),
                encrypted: tri(i, 3),
                immutable: tri(i, 4),
                subject_ref: Some(ExternalRef { id: ds.into(), ..typed_ref("truenas-dataset", ds) }),
                details: details(json!({
                    "hostname": TRUENAS_HOST,
                    "dataset": ds,
                    "snapshot": snap_name,
                    "fullName": full,
                })),
                ..Default::default()
            });
        }
    }
}

fn truenas_replication(anchor: DateTime<Utc>, out: &mut Vec<RecoveryPoint>) {
    for (di, ds) in DATASETS.into_iter().enumerate() {
        let task_id = format!("rep-task-{:02}", di + 1);
        let target = format!("backup-tank/replicated/{}", ds.replace('/', "_"));
        for i in 0..4 {
            let started = at(anchor, 1 + (di * 5 + i * 6) % 27, (8 + di * 3 + i * 4) % 23, (i % 7) * 11);
            let (outcome, state, error) = match i % 4 {
                0 => (Outcome::Success, "SUCCESS", ""),
                1 => (Outcome::Warning, "WARNING", ""),
                2 => (Outcome::Failed, "FAILED", "network timeout"),
                _ => (Outcome::Running, "RUNNING", ""),
            };
            let completed = (outcome != Outcome::Running).then(|| started + Duration::minutes(14 + (i % 8) as i64));

            out.push(RecoveryPoint {
                id: stable_id(&["demo", "truenas", "replication-task", &task_id, &time_key(completed, started)]),
                provider: Some(Provider::TrueNas),
                kind: "backup".into(),
                mode: Mode::Remote,
                outcome,
                started_at: Some(started),
                completed_at: completed,
                verified: completed.and(tri(i, 3)),
                encrypted: tri(i, 4),
                immutable: tri(i, 5),
                subject_ref: Some(ExternalRef { id: ds.into(), ..typed_ref("truenas-dataset", ds) }),
                repository_ref: Some(ExternalRef { id: target.clone(), ..typed_ref("truenas-dataset", &target) }),
                details: details(json!({
                    "hostname": TRUENAS_HOST,
                    "taskId": task_id,
                    "targetDataset": target,
                    "lastState": state,
                    "lastError": error,
                })),
                ..Default::default()
            });
        }
    }
}

// ─── Docker ───

fn docker_backups(anchor: DateTime<Utc>, out: &mut Vec<RecoveryPoint>) {
    let containers = [("docker-host-1", "gitea"), ("docker-host-2", "vaultwarden")];
    for (ci, (host, container)) in containers.into_iter().enumerate() {
        for i in 0..4 {
            let started = at(anchor, 1 + (ci * 4 + i * 7) % 28, (1 + ci * 5 + i * 3) % 23, (i % 7) * 4);
            let outcome = if i == 3 { Outcome::Failed } else { Outcome::Success };
            let completed = started + Duration::minutes(3 + i as i64);

            out.push(RecoveryPoint {
                id: stable_id(&["demo", "docker", host, container, &completed.to_rfc3339()]),
                provider: Some(Provider::Docker),
                kind: "volume-backup".into(),
                mode: Mode::Local,
                outcome,
                started_at: Some(started),
                completed_at: Some(completed),
                size_bytes: (outcome == Outcome::Success).then(|| 400_000_000 + i as i64 * 50_000_000),
                subject_ref: Some(ExternalRef {
                    id: stable_id(&["docker", host, container]),
                    ..typed_ref("docker-container", container)
                }),
                details: details(json!({ "hostname": host, "container": container })),
                ..Default::default()
            });
        }
    }
}
