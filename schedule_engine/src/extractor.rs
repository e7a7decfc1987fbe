use crate::config::ShortSeriesFill;
use crate::feed::ScheduleRecord;
use crate::models::BLOCKS_PER_DAY;
use serde_json::Value;

const ISGS_KEY: &str = "ISGSFullScheduleJsonData";
const OPEN_ACCESS_KEY: &str = "OAFullScheduleJsonData";

/// Searched in this order; the first present sub-schedule wins.
const ISGS_SUB_KEYS: [&str; 3] = [
    "ISGSThermalFullScheduleJsonData",
    "ISGSHydroFullScheduleJsonData",
    "ISGSGasFullScheduleJsonData",
];

const TOTAL_DRAWAL_FIELD: &str = "TotalDrwBoundarySchdAmount";
const SCHEDULED_FIELD: &str = "SchdAmount";

/// Pulls the 96-block quantity series out of a record's nested schedule payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleExtractor {
    fill: ShortSeriesFill,
}

impl ScheduleExtractor {
    pub fn new(fill: ShortSeriesFill) -> Self {
        Self { fill }
    }

    pub fn extract(&self, record: &ScheduleRecord) -> Vec<f64> {
        self.extract_value(&record.schedule)
    }

    pub fn extract_value(&self, schedule: &Value) -> Vec<f64> {
        match source_array(schedule) {
            Some(values) => self.to_series(values),
            None => vec![0.0; BLOCKS_PER_DAY],
        }
    }

    fn to_series(&self, values: &[Value]) -> Vec<f64> {
        let mut series = vec![0.0; BLOCKS_PER_DAY];
        for (slot, value) in series.iter_mut().zip(values) {
            *slot = parse_quantity(value);
        }
        if self.fill == ShortSeriesFill::CarryForward && !values.is_empty() {
            let available = values.len().min(BLOCKS_PER_DAY);
            let last = series[available - 1];
            for slot in series.iter_mut().skip(available) {
                *slot = last;
            }
        }
        series
    }
}

fn source_array(schedule: &Value) -> Option<&[Value]> {
    match present(schedule.get(ISGS_KEY)) {
        Some(isgs) => ISGS_SUB_KEYS
            .iter()
            .find_map(|key| present(isgs.get(*key)))
            .and_then(amount_array),
        None => present(schedule.get(OPEN_ACCESS_KEY))
            .and_then(|oa| non_empty_array(oa.get(SCHEDULED_FIELD))),
    }
}

/// Drawal-boundary amounts are preferred over the plain scheduled amounts.
fn amount_array(sub: &Value) -> Option<&[Value]> {
    non_empty_array(sub.get(TOTAL_DRAWAL_FIELD)).or_else(|| non_empty_array(sub.get(SCHEDULED_FIELD)))
}

/// A sub-schedule counts as present only when it is a non-empty object.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| v.as_object().is_some_and(|o| !o.is_empty()))
}

fn non_empty_array(value: Option<&Value>) -> Option<&[Value]> {
    value
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .filter(|a| !a.is_empty())
}

/// Numbers or numeric strings; anything else counts as zero.
fn parse_quantity(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extract(schedule: Value) -> Vec<f64> {
        ScheduleExtractor::default().extract_value(&schedule)
    }

    #[test]
    fn test_thermal_prefers_total_drawal() {
        let series = extract(json!({
            "ISGSFullScheduleJsonData": {
                "ISGSThermalFullScheduleJsonData": {
                    "TotalDrwBoundarySchdAmount": vec![4.0; 96],
                    "SchdAmount": vec![9.0; 96]
                }
            }
        }));
        assert_eq!(series.len(), BLOCKS_PER_DAY);
        assert!(series.iter().all(|v| *v == 4.0));
    }

    #[test]
    fn test_first_present_sub_schedule_wins() {
        let series = extract(json!({
            "ISGSFullScheduleJsonData": {
                "ISGSThermalFullScheduleJsonData": {},
                "ISGSHydroFullScheduleJsonData": {"SchdAmount": vec![2.0; 96]},
                "ISGSGasFullScheduleJsonData": {"SchdAmount": vec![7.0; 96]}
            }
        }));
        assert!(series.iter().all(|v| *v == 2.0));
    }

    #[test]
    fn test_empty_drawal_array_falls_back_to_scheduled() {
        let series = extract(json!({
            "ISGSFullScheduleJsonData": {
                "ISGSGasFullScheduleJsonData": {
                    "TotalDrwBoundarySchdAmount": [],
                    "SchdAmount": vec![1.5; 96]
                }
            }
        }));
        assert!(series.iter().all(|v| *v == 1.5));
    }

    #[test]
    fn test_open_access_used_without_isgs() {
        let series = extract(json!({
            "ISGSFullScheduleJsonData": {},
            "OAFullScheduleJsonData": {"SchdAmount": vec![3.0; 96]}
        }));
        assert!(series.iter().all(|v| *v == 3.0));
    }

    #[test]
    fn test_isgs_without_amounts_is_zero_not_open_access() {
        let series = extract(json!({
            "ISGSFullScheduleJsonData": {"ISGSThermalFullScheduleJsonData": {"Other": 1}},
            "OAFullScheduleJsonData": {"SchdAmount": vec![3.0; 96]}
        }));
        assert!(series.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_missing_payload_is_zero_vector() {
        assert_eq!(extract(Value::Null), vec![0.0; BLOCKS_PER_DAY]);
        assert_eq!(extract(json!({"Unrelated": true})), vec![0.0; BLOCKS_PER_DAY]);
    }

    #[test]
    fn test_bad_values_are_zero() {
        let series = extract(json!({
            "OAFullScheduleJsonData": {"SchdAmount": [1.0, "2.5", "n/a", null, {"x": 1}, " -3 "]}
        }));
        assert_eq!(&series[..6], &[1.0, 2.5, 0.0, 0.0, 0.0, -3.0]);
    }

    #[test]
    fn test_short_array_zero_fill_and_carry_forward() {
        let schedule = json!({"OAFullScheduleJsonData": {"SchdAmount": [1.0, 2.0, 3.0]}});

        let zero = ScheduleExtractor::new(ShortSeriesFill::Zero).extract_value(&schedule);
        assert_eq!(&zero[..4], &[1.0, 2.0, 3.0, 0.0]);
        assert_eq!(zero[95], 0.0);

        let carried = ScheduleExtractor::new(ShortSeriesFill::CarryForward).extract_value(&schedule);
        assert_eq!(&carried[..4], &[1.0, 2.0, 3.0, 3.0]);
        assert_eq!(carried[95], 3.0);
    }

    #[test]
    fn test_long_array_is_truncated() {
        let series = extract(json!({"OAFullScheduleJsonData": {"SchdAmount": vec![1.0; 120]}}));
        assert_eq!(series.len(), BLOCKS_PER_DAY);
    }
}
