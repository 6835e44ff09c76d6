use anyhow::Result;
use std::io::Write;

use spectra::config::GuidanceConfig;
use spectra::guidance::{GuidanceEngine, Instruction};
use spectra::inference::Query;
use spectra::replay::{RecordedObservations, ReplayInference};
use spectra::similarity::HashEmbeddingRanker;

const RECORDING: &str = r#"{
  "width": 640,
  "height": 400,
  "detections": [
    { "label": "person", "confidence": 0.93, "bbox": { "x1": 0, "y1": 0, "x2": 200, "y2": 400 } },
    { "label": "cup", "class_id": 41, "confidence": 0.81, "bbox": { "x1": 380, "y1": 180, "x2": 420, "y2": 220 } }
  ],
  "hands": [ { "wrist": [0.15625, 0.5], "handedness": "Right" } ],
  "depth": {
    "background": 40.0,
    "regions": [
      { "bbox": { "x1": 90, "y1": 190, "x2": 110, "y2": 210 }, "value": 130.0 }
    ]
  }
}"#;

#[tokio::test]
async fn test_recording_drives_the_engine() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(RECORDING.as_bytes())?;

    let recorded = RecordedObservations::load(file.path()).await?;
    assert_eq!(recorded.detections.len(), 2);
    assert_eq!(recorded.detections[1].class_id, Some(41));

    let depth = recorded.depth_map()?;
    assert_eq!(depth.sample(100.0, 200.0), 130.0);
    assert_eq!(depth.sample(400.0, 200.0), 40.0);

    let replay = ReplayInference::new(&recorded)?;
    let engine = GuidanceEngine::new(
        replay.clone(),
        replay.clone(),
        replay,
        HashEmbeddingRanker::default(),
        GuidanceConfig::default(),
    );

    let g = engine
        .locate_object(&recorded.blank_frame(), &Query::text("cup"))
        .await?;
    assert_eq!(g.target, "cup");
    assert_eq!(g.depth_delta, 90.0);
    assert_eq!(g.instruction, Instruction::MoveForward);
    Ok(())
}

#[test]
fn test_dense_depth_must_match_its_size() {
    let bad = r#"{
      "width": 2, "height": 2,
      "depth": { "width": 2, "height": 2, "values": [1.0, 2.0, 3.0] }
    }"#;
    let recorded: RecordedObservations = serde_json::from_str(bad).expect("parses");
    assert!(recorded.depth_map().is_err());

    let good = r#"{
      "width": 2, "height": 2,
      "depth": { "width": 2, "height": 2, "values": [1.0, 2.0, 3.0, 4.0] }
    }"#;
    let recorded: RecordedObservations = serde_json::from_str(good).expect("parses");
    let depth = recorded.depth_map().expect("dense map");
    assert_eq!(depth.sample(1.0, 1.0), 4.0);
    assert_eq!(depth.sample(5.0, -3.0), 2.0);
}
