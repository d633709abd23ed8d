//! History view: filter, sort and group sessions, and mark best laps.
//!
//! Best-lap markers are computed over the rider's whole history, before
//! filtering, so a crown does not move when a filter hides the real record.
//! Ties share the marker.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use time::Date;

use crate::laptime;
use crate::services::track_session::HistoryEntry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

/// Query-string filters. Empty or `"all"` means no filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub circuit: Option<String>,
    #[serde(default)]
    pub bike: Option<String>,
    #[serde(default)]
    pub sort: SortOrder,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryItem {
    #[serde(flatten)]
    pub entry: HistoryEntry,
    pub is_best_circuit: bool,
    pub is_best_day: bool,
    pub is_best_bike: bool,
}

/// Sessions sharing a date and circuit.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryGroup {
    pub date: Date,
    pub circuit_name: String,
    pub has_best_day: bool,
    pub sessions: Vec<HistoryItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryView {
    pub groups: Vec<HistoryGroup>,
    /// Distinct circuit names, sorted, for the filter picker.
    pub circuits: Vec<String>,
    /// Distinct `"{brand} {model}"` labels, sorted, for the filter picker.
    pub bikes: Vec<String>,
}

fn active(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty() && *v != "all")
}

fn matches(entry: &HistoryEntry, filter: &HistoryFilter) -> bool {
    if let Some(search) = active(filter.search.as_deref()) {
        let needle = search.to_lowercase();
        let hit = entry.name.to_lowercase().contains(&needle)
            || entry.circuit_name.to_lowercase().contains(&needle)
            || entry.bike_model.as_deref().is_some_and(|m| m.to_lowercase().contains(&needle));
        if !hit {
            return false;
        }
    }
    if let Some(circuit) = active(filter.circuit.as_deref())
        && entry.circuit_name != circuit
    {
        return false;
    }
    if let Some(bike) = active(filter.bike.as_deref()) {
        let label = entry.bike_label().unwrap_or_else(|| "N/A".to_owned());
        if label != bike {
            return false;
        }
    }
    true
}

fn best_by<K, F>(entries: &[HistoryEntry], key: F) -> HashMap<K, u64>
where
    K: std::hash::Hash + Eq,
    F: Fn(&HistoryEntry) -> Option<K>,
{
    let mut best: HashMap<K, u64> = HashMap::new();
    for entry in entries {
        let (Some(k), Some(ms)) = (key(entry), entry.best_lap.as_deref().and_then(laptime::parse_millis)) else {
            continue;
        };
        best.entry(k).and_modify(|b| *b = (*b).min(ms)).or_insert(ms);
    }
    best
}

/// Build the grouped, filtered history.
#[must_use]
pub fn build_view(entries: Vec<HistoryEntry>, filter: &HistoryFilter) -> HistoryView {
    let circuits = entries
        .iter()
        .map(|e| e.circuit_name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let bikes = entries
        .iter()
        .filter_map(HistoryEntry::bike_label)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let best_circuit = best_by(&entries, |e| Some(e.circuit_name.clone()));
    let best_day = best_by(&entries, |e| Some((e.date, e.circuit_name.clone())));
    let best_bike = best_by(&entries, HistoryEntry::bike_label);

    let mut selected = entries
        .into_iter()
        .filter(|e| matches(e, filter))
        .map(|entry| {
            let lap = entry.best_lap.as_deref().and_then(laptime::parse_millis);
            let is_best = |best: Option<&u64>| matches!((lap, best), (Some(l), Some(b)) if l == *b);
            HistoryItem {
                is_best_circuit: is_best(best_circuit.get(&entry.circuit_name)),
                is_best_day: is_best(best_day.get(&(entry.date, entry.circuit_name.clone()))),
                is_best_bike: is_best(entry.bike_label().as_ref().and_then(|label| best_bike.get(label))),
                entry,
            }
        })
        .collect::<Vec<_>>();

    selected.sort_by(|a, b| {
        let ord = a.entry.created_at.cmp(&b.entry.created_at);
        match filter.sort {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });

    let mut groups: Vec<HistoryGroup> = Vec::new();
    for item in selected {
        let position = groups
            .iter()
            .position(|g| g.date == item.entry.date && g.circuit_name == item.entry.circuit_name);
        let group = match position {
            Some(i) => &mut groups[i],
            None => {
                groups.push(HistoryGroup {
                    date: item.entry.date,
                    circuit_name: item.entry.circuit_name.clone(),
                    has_best_day: false,
                    sessions: Vec::new(),
                });
                let last = groups.len() - 1;
                &mut groups[last]
            }
        };
        group.has_best_day |= item.is_best_day;
        group.sessions.push(item);
    }

    HistoryView { groups, circuits, bikes }
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
