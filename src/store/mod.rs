//! Recovery store: persists recovery points and answers list queries
//!
//! Points are kept in memory keyed by id and written to a JSON file after
//! every ingest. Retention pruning runs opportunistically on writes and from
//! the background task in `main`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::recovery::{
    self, ListPointsOptions, PageLimits, PageMeta, PointsFacets, PointsSeriesBucket, ProtectionRollup,
    RecoveryPoint,
};

// ─── Data Types ───

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPoint {
    point: RecoveryPoint,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoredPoint {
    /// Retention clock: completion, else start, else last write
    fn retention_time(&self) -> DateTime<Utc> {
        self.point.timestamp().unwrap_or(self.updated_at)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    points: Vec<StoredPoint>,
}

/// Tunables for a store instance
#[derive(Debug, Clone, Copy)]
pub struct StoreSettings {
    pub retention: Duration,
    pub prune_interval: Duration,
    pub limits: PageLimits,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            retention: Duration::days(90),
            prune_interval: Duration::hours(1),
            limits: PageLimits::default(),
        }
    }
}

/// A page of results plus paging metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

pub struct RecoveryStore {
    path: Option<PathBuf>,
    settings: StoreSettings,
    points: RwLock<HashMap<String, StoredPoint>>,
    last_prune: Mutex<Option<DateTime<Utc>>>,
    persist_lock: Mutex<()>,
}

impl RecoveryStore {
    /// Open (or create) a store backed by a JSON file
    pub fn open(path: &Path, settings: StoreSettings) -> Result<Self, String> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .map_err(|e| format!("Failed to create recovery data dir {}: {}", dir.display(), e))?;
        }

        let mut points = HashMap::new();
        match fs::read_to_string(path) {
            Ok(data) => {
                let file: StoreFile = serde_json::from_str(&data)
                    .map_err(|e| format!("Failed to parse recovery store {}: {}", path.display(), e))?;
                for stored in file.points {
                    points.insert(stored.point.id.clone(), stored);
                }
                info!("Loaded {} recovery points from {}", points.len(), path.display());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No recovery store at {}, starting empty", path.display());
            }
            Err(e) => return Err(format!("Failed to read recovery store {}: {}", path.display(), e)),
        }

        Ok(Self {
            path: Some(path.to_path_buf()),
            settings,
            points: RwLock::new(points),
            last_prune: Mutex::new(None),
            persist_lock: Mutex::new(()),
        })
    }

    /// Store that never touches disk (demo mode and tests)
    pub fn in_memory(settings: StoreSettings) -> Self {
        Self {
            path: None,
            settings,
            points: RwLock::new(HashMap::new()),
            last_prune: Mutex::new(None),
            persist_lock: Mutex::new(()),
        }
    }

    pub fn limits(&self) -> PageLimits {
        self.settings.limits
    }

    pub fn len(&self) -> usize {
        self.points.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace points by id. Returns how many were stored.
    pub fn upsert_points(&self, points: Vec<RecoveryPoint>) -> Result<usize, String> {
        self.upsert_points_at(points, Utc::now())
    }

    pub fn upsert_points_at(&self, points: Vec<RecoveryPoint>, now: DateTime<Utc>) -> Result<usize, String> {
        if points.is_empty() {
            return Ok(0);
        }
        self.maybe_prune(now);

        // Stage against a copy so a failed write leaves memory matching disk
        let _guard = self.persist_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.points.write().unwrap_or_else(|e| e.into_inner());
        let mut staged = map.clone();

        let mut stored = 0;
        for mut p in points {
            p.id = p.id.trim().to_string();
            p.kind = p.kind.trim().to_string();
            if p.id.is_empty() || p.kind.is_empty() || p.provider.is_none() {
                debug!("Skipping recovery point without id, kind or provider");
                continue;
            }
            p.display = recovery::derive_index(&p).to_display();
            let created_at = staged.get(&p.id).map(|s| s.created_at).unwrap_or(now);
            staged.insert(p.id.clone(), StoredPoint { point: p, created_at, updated_at: now });
            stored += 1;
        }

        if stored > 0 {
            self.write_file(&staged)?;
            *map = staged;
        }
        Ok(stored)
    }

    fn maybe_prune(&self, now: DateTime<Utc>) {
        {
            let mut last = self.last_prune.lock().unwrap_or_else(|e| e.into_inner());
            if last.is_some_and(|t| now - t < self.settings.prune_interval) {
                return;
            }
            *last = Some(now);
        }
        self.prune(now);
    }

    /// Drop points older than the retention window. Returns how many were removed.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        if self.settings.retention <= Duration::zero() {
            return 0;
        }
        let cutoff = now - self.settings.retention;
        let removed = {
            let mut map = self.points.write().unwrap_or_else(|e| e.into_inner());
            let before = map.len();
            map.retain(|_, s| s.retention_time() >= cutoff);
            before - map.len()
        };
        if removed > 0 {
            info!("Pruned {} recovery points older than {}", removed, cutoff.to_rfc3339());
            if let Err(e) = self.save() {
                warn!("{}", e);
            }
        }
        removed
    }

    /// Write the current points to disk
    fn save(&self) -> Result<(), String> {
        if self.path.is_none() {
            return Ok(());
        }
        let _guard = self.persist_lock.lock().unwrap_or_else(|e| e.into_inner());
        let map = self.points.read().unwrap_or_else(|e| e.into_inner());
        self.write_file(&map)
    }

    /// Serialize `points` to the store file (temp file + rename).
    /// Callers hold `persist_lock`.
    fn write_file(&self, points: &HashMap<String, StoredPoint>) -> Result<(), String> {
        let Some(path) = &self.path else { return Ok(()) };

        let mut points: Vec<StoredPoint> = points.values().cloned().collect();
        points.sort_by(|a, b| a.point.id.cmp(&b.point.id));
        let json = serde_json::to_string(&StoreFile { points })
            .map_err(|e| format!("Failed to serialize recovery store: {}", e))?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| format!("Failed to write recovery store: {}", e))?;
        fs::rename(&tmp, path).map_err(|e| format!("Failed to replace recovery store: {}", e))
    }

    /// All points in list order: newest completion first, never-completed
    /// last, most recently written first within a tie
    fn ordered_points(&self) -> Vec<RecoveryPoint> {
        let map = self.points.read().unwrap_or_else(|e| e.into_inner());
        let mut stored: Vec<&StoredPoint> = map.values().collect();
        stored.sort_by(|a, b| {
            let ta = recovery::valid_time(a.point.completed_at);
            let tb = recovery::valid_time(b.point.completed_at);
            ta.is_none()
                .cmp(&tb.is_none())
                .then_with(|| tb.cmp(&ta))
                .then_with(|| b.updated_at.cmp(&a.updated_at))
                .then_with(|| b.point.id.cmp(&a.point.id))
        });
        stored.into_iter().map(|s| s.point.clone()).collect()
    }

    fn page_meta(&self, opts: &ListPointsOptions, total: usize) -> PageMeta {
        let limit = self.settings.limits.limit(opts.limit);
        let total = total as i64;
        PageMeta {
            page: self.settings.limits.page(opts.page),
            limit,
            total,
            total_pages: recovery::total_pages(total, limit),
        }
    }

    pub fn list_points(&self, opts: &ListPointsOptions) -> Page<RecoveryPoint> {
        let filtered = recovery::filter_points(&self.ordered_points(), opts);
        let meta = self.page_meta(opts, filtered.len());
        let items = recovery::paginate(&filtered, opts.page, opts.limit, self.settings.limits);
        Page { items, meta }
    }

    pub fn list_rollups(&self, opts: &ListPointsOptions) -> Page<ProtectionRollup> {
        let filtered = recovery::filter_points_for_rollups(&self.ordered_points(), opts);
        let rollups = recovery::build_rollups_from_points(&filtered);
        let meta = self.page_meta(opts, rollups.len());
        let items = recovery::paginate(&rollups, opts.page, opts.limit, self.settings.limits);
        Page { items, meta }
    }

    pub fn list_series(&self, opts: &ListPointsOptions, tz_offset_minutes: i32) -> Vec<PointsSeriesBucket> {
        self.list_series_at(opts, tz_offset_minutes, Utc::now())
    }

    pub fn list_series_at(&self, opts: &ListPointsOptions, tz_offset_minutes: i32, now: DateTime<Utc>) -> Vec<PointsSeriesBucket> {
        let filtered = recovery::filter_points(&self.ordered_points(), opts);
        recovery::build_series(&filtered, opts.from, opts.to, tz_offset_minutes, now)
    }

    pub fn list_facets(&self, opts: &ListPointsOptions) -> PointsFacets {
        recovery::build_facets(&recovery::filter_points(&self.ordered_points(), opts))
    }
}
