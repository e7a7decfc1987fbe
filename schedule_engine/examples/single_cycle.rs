use schedule_engine::directory::PlantDirectoryEntry;
use schedule_engine::{
    AggregationEngine, EngineConfig, FeedPayload, MemoryBaselineStore, PlantDirectory,
    RevisionTracker,
};
use serde_json::json;

fn revision(number: u32, drawal: f64) -> FeedPayload {
    FeedPayload::from_value(json!({
        "ResponseBody": {
            "FullSchdRevisionNo": number,
            "GroupWiseDataList": [{
                "FullschdList": [
                    {
                        "SellerAcronym": "NTPC-DADRI-II",
                        "BuyerAcronym": "DELHI",
                        "FullScheduleData": {
                            "ISGSFullScheduleJsonData": {
                                "ISGSThermalFullScheduleJsonData": {"TotalDrwBoundarySchdAmount": vec![drawal; 96]}
                            }
                        }
                    },
                    {
                        "SellerAcronym": "SECI-WIND-T4",
                        "BuyerAcronym": "BYPL",
                        "FullScheduleData": {"OAFullScheduleJsonData": {"SchdAmount": vec![25.0; 96]}}
                    }
                ]
            }]
        }
    }))
    .unwrap()
}

fn main() {
    let directory = PlantDirectory::from_entries(
        vec![PlantDirectoryEntry {
            raw_key: "NTPC_DADRI_II".to_string(),
            plant_code: "DADRI2".to_string(),
            entitlement_pct: 40.0,
        }],
        vec!["DADRI2".to_string(), "SECI_BYPL".to_string()],
    );

    let config = EngineConfig::default();
    let engine = AggregationEngine::new(&config).unwrap();
    let mut tracker = RevisionTracker::new(MemoryBaselineStore::new(), &config);

    // Revision 2 raises the drawal from 100 to 120 MW: 8 MW more for the entity.
    for (number, drawal) in [(1, 100.0), (2, 120.0)] {
        let matrix = engine.aggregate(&revision(number, drawal), &directory);
        let outcome = tracker.observe(number, &matrix, 33).unwrap();

        println!("Revision {}", number);
        println!("===========");
        for plant in matrix.columns() {
            println!("  {}: {:.2} MW in block 33", plant, matrix.value(plant, 33).unwrap_or(0.0));
        }
        for alert in outcome.alerts() {
            println!(
                "  ALERT {} {} ({}): {:.2} -> {:.2} ({:+.2})",
                alert.plant,
                alert.slot,
                alert.slot_label(),
                alert.old_value,
                alert.new_value,
                alert.delta
            );
        }
        println!();
    }
}
