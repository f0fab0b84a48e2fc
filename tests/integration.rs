//! Integration tests for Shopper Spectrum

use std::fs;
use std::path::Path;

use shopper_spectrum::{load_rfm_requests, ArtifactPaths, Artifacts, Error, Segment};
use tempfile::TempDir;

const WHITE: &str = "WHITE HANGING HEART T-LIGHT HOLDER";
const RED: &str = "RED HANGING HEART T-LIGHT HOLDER";
const JUMBO: &str = "JUMBO BAG RED RETROSPOT";
const LANTERN: &str = "WHITE METAL LANTERN";

/// Write a consistent set of artifacts into a temporary directory
fn create_test_artifacts() -> (TempDir, ArtifactPaths) {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    fs::write(
        root.join("scaler.json"),
        r#"{"mean": [90.0, 5.0, 2000.0], "scale": [100.0, 7.0, 8000.0]}"#,
    )
    .unwrap();

    // Cluster order is deliberately unrelated to spend
    fs::write(
        root.join("kmeans.json"),
        r#"{"centroids": [
            [0.2, -0.4, -0.2],
            [-0.8, 2.5, 3.0],
            [2.0, -0.6, -0.25],
            [-0.5, 0.3, 0.1]
        ]}"#,
    )
    .unwrap();

    // Mean monetary per cluster: 0 -> 600, 1 -> 26000, 2 -> 150, 3 -> 2500
    fs::write(
        root.join("rfm.csv"),
        "CustomerID,Recency,Frequency,Monetary,Cluster\n\
         12346,110,2,500.0,0\n\
         12347,100,3,700.0,0\n\
         12348,5,25,30000.0,1\n\
         12349,8,20,22000.0,1\n\
         12350,300,1,100.0,2\n\
         12351,280,1,200.0,2\n\
         12352,40,7,2400.0,3\n\
         12353,35,8,2600.0,3\n",
    )
    .unwrap();

    fs::write(
        root.join("similarity.csv"),
        format!(
            "Description,{LANTERN},{JUMBO},{WHITE},{RED}\n\
             {LANTERN},1.0,0.30,0.40,0.35\n\
             {JUMBO},0.30,1.0,0.81,0.50\n\
             {WHITE},0.40,0.81,1.0,0.92\n\
             {RED},0.35,0.50,0.92,1.0\n"
        ),
    )
    .unwrap();

    fs::write(
        root.join("transactions.csv"),
        format!(
            "InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country\n\
             536365,85123A,{WHITE},6,2010-12-01 08:26:00,2.55,17850,United Kingdom\n\
             536365,71053,{LANTERN},6,2010-12-01 08:26:00,3.39,17850,United Kingdom\n\
             536366,22633,HAND WARMER UNION JACK,6,2010-12-01 08:28:00,1.85,17850,United Kingdom\n"
        ),
    )
    .unwrap();

    let paths = ArtifactPaths {
        scaler: root.join("scaler.json"),
        model: root.join("kmeans.json"),
        similarity: root.join("similarity.csv"),
        rfm_history: root.join("rfm.csv"),
        catalog: Some(root.join("transactions.csv")),
    };
    (dir, paths)
}

fn write(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
}

#[test]
fn test_end_to_end_segmentation() {
    let (_dir, paths) = create_test_artifacts();
    let artifacts = Artifacts::load(&paths).unwrap();

    assert_eq!(artifacts.labels().get(1), Some(Segment::HighValue));
    assert_eq!(artifacts.labels().get(3), Some(Segment::Regular));
    assert_eq!(artifacts.labels().get(0), Some(Segment::Occasional));
    assert_eq!(artifacts.labels().get(2), Some(Segment::AtRisk));

    assert_eq!(
        artifacts.predict_segment(5.0, 25, 26000.0).unwrap(),
        Segment::HighValue
    );
    assert_eq!(
        artifacts.predict_segment(300.0, 1, 50.0).unwrap(),
        Segment::AtRisk
    );
    assert_eq!(
        artifacts.predict_segment(40.0, 7, 2800.0).unwrap(),
        Segment::Regular
    );
}

#[test]
fn test_prediction_is_repeatable() {
    let (_dir, paths) = create_test_artifacts();
    let artifacts = Artifacts::load(&paths).unwrap();

    let first = artifacts.predict_segment(60.0, 3, 750.0).unwrap();
    assert_eq!(artifacts.predict_segment(60.0, 3, 750.0).unwrap(), first);
}

#[test]
fn test_invalid_request_does_not_poison_state() {
    let (_dir, paths) = create_test_artifacts();
    let artifacts = Artifacts::load(&paths).unwrap();

    let err = artifacts.predict_segment(10.0, 0, 100.0).unwrap_err();
    assert!(err.is_request_error());
    assert!(artifacts.predict_segment(10.0, 1, 100.0).is_ok());
}

#[test]
fn test_end_to_end_batch_segmentation() {
    let (dir, paths) = create_test_artifacts();
    let input = dir.path().join("batch.csv");
    write(
        &input,
        "CustomerID,Recency,Frequency,Monetary
         A1,5,25,26000.0
         A2,-3,2,40.0
         A3,300,1,50.0
         A4,12,0,80.0
         A5,40,7,2800.0
",
    );

    let artifacts = Artifacts::load(&paths).unwrap();
    let outcomes = artifacts.predict_batch(load_rfm_requests(&input).unwrap());

    let summary: Vec<(&str, Option<Segment>)> = outcomes
        .iter()
        .map(|(key, segment)| (key.as_str(), segment.as_ref().ok().copied()))
        .collect();
    assert_eq!(
        summary,
        [
            ("A1", Some(Segment::HighValue)),
            ("A2", None),
            ("A3", Some(Segment::AtRisk)),
            ("A4", None),
            ("A5", Some(Segment::Regular)),
        ]
    );
    assert!(outcomes
        .iter()
        .filter_map(|(_, segment)| segment.as_ref().err())
        .all(Error::is_request_error));
}

#[test]
fn test_end_to_end_recommendations() {
    let (_dir, paths) = create_test_artifacts();
    let artifacts = Artifacts::load(&paths).unwrap();

    assert_eq!(artifacts.recommend(WHITE, 2).unwrap(), vec![RED, JUMBO]);
    assert!(artifacts
        .recommend("NONEXISTENT PRODUCT XYZ", 5)
        .unwrap()
        .is_empty());
    // in the catalog but not in the similarity matrix
    assert!(artifacts
        .recommend("HAND WARMER UNION JACK", 5)
        .unwrap()
        .is_empty());
    assert!(artifacts.recommend(WHITE, 0).is_err());
}

#[test]
fn test_catalog_and_profiles() {
    let (_dir, paths) = create_test_artifacts();
    let artifacts = Artifacts::load(&paths).unwrap();

    let catalog = artifacts.catalog().unwrap();
    assert_eq!(catalog.len(), 3);
    assert_eq!(catalog.uncovered(artifacts.similarity()).count(), 1);

    let profiles = artifacts.profiles();
    assert_eq!(profiles.len(), 4);
    assert_eq!(profiles.iter().map(|p| p.size).sum::<usize>(), 8);
    assert!((profiles[1].mean_monetary - 26000.0).abs() < 1e-9);
}

#[test]
fn test_catalog_is_optional() {
    let (_dir, mut paths) = create_test_artifacts();
    paths.catalog = None;
    let artifacts = Artifacts::load(&paths).unwrap();
    assert!(artifacts.catalog().is_none());
}

#[test]
fn test_error_handling_wrong_cluster_count() {
    let (_dir, paths) = create_test_artifacts();
    write(
        &paths.rfm_history,
        "Recency,Frequency,Monetary,Cluster\n10,2,100.0,0\n20,3,200.0,1\n30,4,300.0,2\n",
    );

    let err = Artifacts::load(&paths).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    assert!(!err.is_request_error());
}

#[test]
fn test_error_handling_model_history_mismatch() {
    let (_dir, paths) = create_test_artifacts();
    // four clusters in the history, but ids 0, 1, 2, 7
    write(
        &paths.rfm_history,
        "Recency,Frequency,Monetary,Cluster\n10,2,100.0,0\n20,3,200.0,1\n30,4,300.0,2\n40,5,400.0,7\n",
    );

    assert!(matches!(
        Artifacts::load(&paths),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn test_error_handling_missing_artifact() {
    let (_dir, mut paths) = create_test_artifacts();
    paths.similarity = paths.similarity.with_file_name("missing.csv");

    assert!(matches!(
        Artifacts::load(&paths),
        Err(Error::Dataset { .. })
    ));
}
