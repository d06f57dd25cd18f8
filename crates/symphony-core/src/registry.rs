// ── Unit registry ──
//
// UnitId -> unit record plus the host device bound to it. Written only by
// the background task; read from anywhere. Records are immutable values
// swapped in atomically, and every mutation republishes the full snapshot
// through a `watch` channel.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Utc;
use indexmap::IndexMap;
use symphony_api::{Gateway, ReadResponse};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::device::{ConnectableDevice, DeviceSurface, PlatformProtocol};
use crate::diff::GatewayDiff;
use crate::model::{UnitId, UnitRecord};

pub type UnitSnapshot = Arc<Vec<Arc<UnitRecord>>>;

struct UnitEntry {
    record: ArcSwap<UnitRecord>,
    device: Arc<dyn ConnectableDevice>,
}

pub struct UnitRegistry {
    entries: ArcSwap<IndexMap<UnitId, Arc<UnitEntry>>>,
    snapshot: watch::Sender<UnitSnapshot>,
    surface: Arc<dyn DeviceSurface>,
    protocol: Arc<dyn PlatformProtocol>,
}

impl UnitRegistry {
    pub fn new(surface: Arc<dyn DeviceSurface>, protocol: Arc<dyn PlatformProtocol>) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            entries: ArcSwap::from_pointee(IndexMap::new()),
            snapshot,
            surface,
            protocol,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get(&self, unit: &UnitId) -> Option<Arc<UnitRecord>> {
        self.entries.load().get(unit).map(|e| e.record.load_full())
    }

    /// Every record, in insertion order.
    pub fn all(&self) -> Vec<Arc<UnitRecord>> {
        self.entries
            .load()
            .values()
            .map(|e| e.record.load_full())
            .collect()
    }

    /// Find a unit by id, gateway id or display name (case-insensitive).
    pub fn find(&self, query: &str) -> Option<Arc<UnitRecord>> {
        let by_id = UnitId::parse_lenient(query);
        self.get(&by_id).or_else(|| {
            self.all()
                .into_iter()
                .find(|r| r.display_name.eq_ignore_ascii_case(query.trim()))
        })
    }

    pub fn contains(&self, unit: &UnitId) -> bool {
        self.entries.load().contains_key(unit)
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Subscribe to full-snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<UnitSnapshot> {
        self.snapshot.subscribe()
    }

    // ── Roster synchronization ───────────────────────────────────────

    /// Apply a roster diff: removals, then additions, then renames.
    ///
    /// Entries that contradict the registry (removing an unknown unit,
    /// adding a known one, renaming an unknown one) are logged and skipped.
    pub fn apply_diff(&self, diff: &GatewayDiff) {
        if diff.is_empty() {
            return;
        }
        let mut entries = IndexMap::clone(&self.entries.load());

        for gateway in &diff.removed {
            self.remove(&mut entries, gateway);
        }
        for gateway in &diff.added {
            self.add(&mut entries, gateway);
        }
        for (_, after) in &diff.changed {
            Self::rename(&entries, after, self.surface.as_ref());
        }

        self.entries.store(Arc::new(entries));
        self.publish();
        info!(%diff, units = self.len(), "roster applied");
    }

    fn remove(&self, entries: &mut IndexMap<UnitId, Arc<UnitEntry>>, gateway: &Gateway) {
        let unit = UnitId::from(gateway);
        if entries.shift_remove(&unit).is_none() {
            warn!(%unit, "roster removed a unit that is not registered, skipping");
            return;
        }
        self.surface.remove_unit(&unit);
        debug!(%unit, "unit removed");
    }

    fn add(&self, entries: &mut IndexMap<UnitId, Arc<UnitEntry>>, gateway: &Gateway) {
        let record = UnitRecord::from_gateway(gateway);
        if entries.contains_key(&record.unit_id) {
            warn!(unit = %record.unit_id, "roster added a unit that is already registered, skipping");
            return;
        }

        let device = self.surface.add_unit(&record, Arc::clone(&self.protocol));
        device.set_connection_status(record.online);
        debug!(unit = %record.unit_id, name = %record.display_name, series = %record.series, "unit added");

        entries.insert(
            record.unit_id.clone(),
            Arc::new(UnitEntry {
                record: ArcSwap::from_pointee(record),
                device,
            }),
        );
    }

    fn rename(
        entries: &IndexMap<UnitId, Arc<UnitEntry>>,
        gateway: &Gateway,
        surface: &dyn DeviceSurface,
    ) {
        let unit = UnitId::from(gateway);
        let Some(entry) = entries.get(&unit) else {
            warn!(%unit, "roster renamed a unit that is not registered, skipping");
            return;
        };
        let name = gateway.display_name();
        entry.record.store(Arc::new(entry.record.load().renamed(name)));
        surface.rename_unit(&unit, name);
        debug!(%unit, %name, "unit renamed");
    }

    // ── Runtime updates ──────────────────────────────────────────────

    /// Store a fresh read for `unit`, mark it online and notify its device.
    /// Returns `false` if the unit is not registered.
    pub fn apply_read(&self, unit: &UnitId, read: ReadResponse) -> bool {
        let entries = self.entries.load();
        let Some(entry) = entries.get(unit) else {
            warn!(%unit, "read response for an unregistered unit, dropping");
            return false;
        };

        let previous = entry.record.load_full();
        let read = Arc::new(read);
        entry
            .record
            .store(Arc::new(previous.with_read(Arc::clone(&read), Utc::now())));

        if !previous.online {
            entry.device.set_connection_status(true);
        }
        entry.device.refresh_with_data(&read);
        self.publish();
        true
    }

    /// Force every unit offline (stream lost).
    pub fn set_all_offline(&self) {
        let entries = self.entries.load();
        let mut changed = false;
        for entry in entries.values() {
            let record = entry.record.load_full();
            if record.online {
                entry.record.store(Arc::new(record.with_connection(false)));
                changed = true;
            }
            entry.device.set_connection_status(false);
        }
        if changed {
            self.publish();
        }
    }

    fn publish(&self) {
        let records = self.all();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(records));
    }
}

// ── Tests ────────────────────────────────────────────────────────────
