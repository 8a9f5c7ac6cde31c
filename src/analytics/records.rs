//! Input records shared by the clustering and holder-pattern pipelines
//!
//! Upstream holder lists come from loosely typed JSON. Every numeric field is
//! optional here and deserializes leniently: numbers, numeric strings, `null`
//! and missing keys are all accepted, and anything else collapses to `None`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Wallet/account identifier, treated as an opaque key
pub type Address = String;

/// Transaction hash
pub type TxHash = String;

/// Balance observation for one address
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HolderRecord {
    /// Empty when the upstream record lacks one; such records are skipped by the analyses
    #[serde(default)]
    pub address: Address,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub balance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub percentage: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub rank: Option<u32>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub value_usd: Option<f64>,
}

impl HolderRecord {
    pub fn new(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn with_balance(mut self, balance: f64) -> Self {
        self.balance = Some(balance);
        self
    }

    pub fn with_percentage(mut self, percentage: f64) -> Self {
        self.percentage = Some(percentage);
        self
    }

    /// Balance, or 0.0 when absent
    pub fn balance_or_zero(&self) -> f64 {
        self.balance.unwrap_or(0.0)
    }

    /// Percentage of supply, or 0.0 when absent
    pub fn percentage_or_zero(&self) -> f64 {
        self.percentage.unwrap_or(0.0)
    }
}

/// A holder record tied to the snapshot it was observed in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub snapshot_time: DateTime<Utc>,
    #[serde(flatten)]
    pub holder: HolderRecord,
}

/// Top-N holder list captured at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_time: DateTime<Utc>,
    #[serde(default)]
    pub holders: Vec<HolderRecord>,
}

impl Snapshot {
    /// Flatten into per-record form
    pub fn records(&self) -> impl Iterator<Item = SnapshotRecord> + '_ {
        self.holders.iter().map(move |holder| SnapshotRecord {
            snapshot_time: self.snapshot_time,
            holder: holder.clone(),
        })
    }
}

fn value_as_f64(value: Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_as_f64))
}

pub(crate) fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(value_as_f64)
        .filter(|v| *v >= 0.0 && *v <= u32::MAX as f64)
        .map(|v| v as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lenient_numeric_fields() {
        let record: HolderRecord = serde_json::from_value(json!({
            "address": "w1",
            "balance": "1500.5",
            "percentage": 2.5,
            "rank": "3",
            "value_usd": "n/a"
        }))
        .unwrap();

        assert_eq!(record.balance, Some(1500.5));
        assert_eq!(record.percentage, Some(2.5));
        assert_eq!(record.rank, Some(3));
        assert_eq!(record.value_usd, None);
    }

    #[test]
    fn test_missing_fields_default_to_none() {
        let record: HolderRecord = serde_json::from_value(json!({ "address": "w1" })).unwrap();
        assert!(record.balance.is_none());
        assert_eq!(record.percentage_or_zero(), 0.0);
    }

    #[test]
    fn test_missing_address_does_not_fail_the_list() {
        let holders: Vec<HolderRecord> = serde_json::from_value(json!([
            { "address": "w1", "balance": 10 },
            { "percentage": 1.0 }
        ]))
        .unwrap();

        assert_eq!(holders.len(), 2);
        assert_eq!(holders[1].address, "");
        assert_eq!(holders[1].percentage, Some(1.0));
    }

    #[test]
    fn test_snapshot_record_flattened() {
        let record: SnapshotRecord = serde_json::from_value(json!({
            "snapshot_time": "2024-05-01T00:00:00Z",
            "address": "w1",
            "percentage": null
        }))
        .unwrap();

        assert_eq!(record.holder.address, "w1");
        assert!(record.holder.percentage.is_none());
    }
}
