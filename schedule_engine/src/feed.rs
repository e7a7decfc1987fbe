use crate::error::FeedError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One parsed revision of the operator's intraday schedule feed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedPayload {
    #[serde(rename = "ResponseBody", default)]
    pub body: ResponseBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseBody {
    #[serde(
        rename = "FullSchdRevisionNo",
        default,
        deserialize_with = "lenient_revision"
    )]
    pub revision: Option<u32>,
    #[serde(rename = "GroupWiseDataList", default, deserialize_with = "null_as_default")]
    pub groups: Vec<ScheduleGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleGroup {
    #[serde(rename = "FullschdList", default, deserialize_with = "null_as_default")]
    pub records: Vec<ScheduleRecord>,
}

/// One seller/buyer schedule line. The quantity payload stays untyped because
/// its shape depends on the schedule category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleRecord {
    #[serde(rename = "SellerAcronym", default, deserialize_with = "null_as_default")]
    pub seller: String,
    #[serde(rename = "BuyerAcronym", default, deserialize_with = "null_as_default")]
    pub buyer: String,
    #[serde(rename = "FullScheduleData", default)]
    pub schedule: Value,
}

impl FeedPayload {
    pub fn from_json(text: &str) -> Result<Self, FeedError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// The fetch side writes `{"error": ...}` in place of the payload when the
    /// upstream could not be reached.
    pub fn from_value(value: Value) -> Result<Self, FeedError> {
        if let Some(error) = value.get("error") {
            let message = match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(FeedError::Upstream(message));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn revision(&self) -> Option<u32> {
        self.body.revision
    }

    pub fn records(&self) -> impl Iterator<Item = &ScheduleRecord> {
        self.body.groups.iter().flat_map(|g| g.records.iter())
    }

    pub fn record_count(&self) -> usize {
        self.body.groups.iter().map(|g| g.records.len()).sum()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_revision<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}
