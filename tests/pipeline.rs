use workpulse::models::CellValue;
use workpulse::normalize::normalize_batch;
use workpulse::schema::resolve;
use workpulse::{ingest, metrics, ranking, trend};
use workpulse::{AliasTable, CanonicalField, EmployeeIdentity, Role, TimelineStore};

const WEEK_ONE: &str = "\
Timestamp,Name,Role,How many videos did you create this week?,Overall productivity this week
2025-03-07 17:02:11,Sam,Video Editor,4,4
";

const WEEK_TWO: &str = "\
Timestamp,Name,Role,How many videos did you create this week?,Overall productivity this week
2025-03-14 16:40:53,Sam,Video Editor,8,5
";

#[test]
fn two_weekly_uploads_rank_one_video_editor() {
    let aliases = AliasTable::default();
    let store = TimelineStore::new();
    for csv in [WEEK_ONE, WEEK_TWO] {
        let raw = ingest::read_csv_from(csv.as_bytes()).unwrap();
        store.append(normalize_batch(&raw, &aliases, 0));
    }

    let sam = EmployeeIdentity::from("Sam (Video Editor)");
    let history = store.history(&sam);
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|record| record.name() == "Sam"));
    assert!(history[0].sequence < history[1].sequence);

    let entries = ranking::rank(&store.snapshot());
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.identity, sam);
    assert_eq!(entry.total_output, 12.0);
    assert!((entry.avg_productivity - 4.5).abs() < 1e-9);
    assert!((entry.improvement_score - 10.0).abs() < 1e-9);

    let consistency = 1.0 / (0.5 + 0.1);
    let expected = 0.3 * 12.0 + 0.4 * (4.5 * 20.0) + 0.2 * (consistency * 10.0) + 0.1 * 10.0;
    assert!((entry.composite_score - expected).abs() < 1e-9);

    let video_metrics = metrics::compute_metrics(&store.all_records(), Some(&Role::VideoEditor));
    assert_eq!(video_metrics.field(CanonicalField::VideosCreated).unwrap().sum, 12.0);

    let change = trend::first_vs_last(&history).unwrap();
    let videos = change
        .get(workpulse::models::Metric::Total(CanonicalField::VideosCreated))
        .unwrap();
    assert!((videos.percent - 100.0).abs() < 1e-9);
}

#[test]
fn later_upload_appends_even_for_an_earlier_week() {
    let aliases = AliasTable::default();
    let store = TimelineStore::new();
    let columns = ["Name", "Role", "Week Start Date", "Videos Created"];
    let batch_a = workpulse::RawTable::new(columns).with_row([
        CellValue::from("Sam"),
        CellValue::from("Video Editor"),
        CellValue::from("2025-03-17"),
        CellValue::Int(2),
    ]);
    let batch_b = workpulse::RawTable::new(columns).with_row([
        CellValue::from("Sam"),
        CellValue::from("Video Editor"),
        CellValue::from("2025-03-03"),
        CellValue::Int(7),
    ]);
    store.append(normalize_batch(&batch_a, &aliases, 0));
    store.append(normalize_batch(&batch_b, &aliases, 0));

    let history = store.history(&EmployeeIdentity::from("Sam (Video Editor)"));
    let videos: Vec<f64> = history
        .iter()
        .map(|record| record.number(CanonicalField::VideosCreated))
        .collect();
    assert_eq!(videos, vec![2.0, 7.0]);
}

#[test]
fn designer_survey_header_resolves() {
    let map = resolve(
        &["Name", "Role", "How many designs did you create this week?"],
        &AliasTable::default(),
    );
    assert_eq!(
        map.column_for(CanonicalField::DesignsCreated),
        Some("How many designs did you create this week?")
    );
}
