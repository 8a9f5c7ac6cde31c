//! Cluster aggregation
//!
//! Joins a cluster assignment with an optional holder list and summarises each
//! cluster.

use super::types::*;
use crate::analytics::records::HolderRecord;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Build the per-address table and per-cluster statistics.
///
/// Holder data is left-joined by address; the first record wins for duplicated
/// addresses. A sum column exists only when at least one holder record carries
/// that field. Stats are ordered by total balance descending when balances are
/// available, otherwise by address count descending. Holders with no cluster are
/// collected into [`UnclusteredHolders`] instead of being dropped.
pub fn analyze_clusters(assignment: &ClusterAssignment, holders: &[HolderRecord]) -> ClusterAnalysis {
    let mut by_address: HashMap<&str, &HolderRecord> = HashMap::with_capacity(holders.len());
    let mut unclustered_order: Vec<&HolderRecord> = Vec::new();
    for holder in holders.iter().filter(|h| !h.address.is_empty()) {
        if by_address.contains_key(holder.address.as_str()) {
            continue;
        }
        by_address.insert(holder.address.as_str(), holder);
        if assignment.get(&holder.address).is_none() {
            unclustered_order.push(holder);
        }
    }
    let has_balance = holders.iter().any(|h| h.balance.is_some());
    let has_percentage = holders.iter().any(|h| h.percentage.is_some());

    let mut addresses: Vec<AddressClusterRow> = assignment
        .iter()
        .map(|(address, cluster_id)| {
            let holder = by_address.get(address.as_str());
            AddressClusterRow {
                address: address.clone(),
                cluster_id,
                balance: holder.and_then(|h| h.balance),
                percentage: holder.and_then(|h| h.percentage),
            }
        })
        .collect();
    addresses.sort_by(|a, b| {
        a.cluster_id
            .cmp(&b.cluster_id)
            .then_with(|| a.address.cmp(&b.address))
    });

    let mut grouped: BTreeMap<ClusterId, ClusterStats> = BTreeMap::new();
    for row in &addresses {
        let stats = grouped.entry(row.cluster_id).or_insert_with(|| ClusterStats {
            cluster_id: row.cluster_id,
            address_count: 0,
            total_balance: has_balance.then_some(0.0),
            total_percentage: has_percentage.then_some(0.0),
        });
        stats.address_count += 1;
        if let Some(total) = stats.total_balance.as_mut() {
            *total += row.balance.unwrap_or(0.0);
        }
        if let Some(total) = stats.total_percentage.as_mut() {
            *total += row.percentage.unwrap_or(0.0);
        }
    }

    let mut stats: Vec<ClusterStats> = grouped.into_values().collect();
    if has_balance {
        stats.sort_by(|a, b| {
            let (x, y) = (a.total_balance.unwrap_or(0.0), b.total_balance.unwrap_or(0.0));
            y.partial_cmp(&x)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.cluster_id.cmp(&b.cluster_id))
        });
    } else {
        stats.sort_by(|a, b| {
            b.address_count
                .cmp(&a.address_count)
                .then_with(|| a.cluster_id.cmp(&b.cluster_id))
        });
    }

    let unclustered = unclustered_group(unclustered_order, has_balance, has_percentage);

    debug!(
        "Aggregated {} addresses into {} cluster rows, {} unclustered holders",
        addresses.len(),
        stats.len(),
        unclustered.address_count
    );
    ClusterAnalysis {
        addresses,
        stats,
        unclustered,
    }
}

fn unclustered_group(
    holders: Vec<&HolderRecord>,
    has_balance: bool,
    has_percentage: bool,
) -> UnclusteredHolders {
    if holders.is_empty() {
        return UnclusteredHolders::default();
    }

    let mut addresses: Vec<UnclusteredRow> = holders
        .into_iter()
        .map(|h| UnclusteredRow {
            address: h.address.clone(),
            balance: h.balance,
            percentage: h.percentage,
        })
        .collect();
    addresses.sort_by(|a, b| {
        let (x, y) = (a.balance.unwrap_or(0.0), b.balance.unwrap_or(0.0));
        y.partial_cmp(&x)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.address.cmp(&b.address))
    });

    UnclusteredHolders {
        address_count: addresses.len(),
        total_balance: has_balance
            .then(|| addresses.iter().map(|r| r.balance.unwrap_or(0.0)).sum()),
        total_percentage: has_percentage
            .then(|| addresses.iter().map(|r| r.percentage.unwrap_or(0.0)).sum()),
        addresses,
    }
}
