use std::sync::Arc;

use edalens::chart_data::{prepare_bar_chart, prepare_histogram};
use edalens::panels::{NO_DATA_UPLOADED, NO_FILE_UPLOADED};
use edalens::summary::missing_report;
use edalens::{
    apply_range_filter, classify, ingest, reset_bound, ChartKind, IngestError, IngestOptions,
    Node, Outcome, RangeBound, Session, SessionOptions, SummaryReport, UploadedFile,
};

const SMALL_CSV: &str = "a,b\n1,x\n2,y\n3,x\n,z\n";

fn numbers_csv(rows: usize) -> String {
    let mut csv = String::from("id,value,score,group\n");
    for i in 0..rows {
        csv.push_str(&format!(
            "{},{},{},{}\n",
            i,
            (i as f64) * 1.5,
            (i * 7) % 13,
            ["red", "green", "blue"][i % 3]
        ));
    }
    csv
}

fn upload(session: &mut Session, name: &str, csv: &str) -> Vec<Node> {
    session.upload(Some(UploadedFile::new(name, csv.as_bytes().to_vec())))
}

#[test]
fn small_file_classifies_numeric_with_few_values_as_categorical() {
    let file = UploadedFile::new("small.csv", SMALL_CSV.as_bytes().to_vec());
    let dataset = ingest(Some(&file), &IngestOptions::default()).unwrap();
    assert_eq!(dataset.shape(), (4, 2));

    let classes = classify(&dataset, 8);
    assert!(classes.continuous.is_empty());
    assert_eq!(classes.categorical, vec!["b".to_string(), "a".to_string()]);
}

#[test]
fn missing_report_counts_blank_cells() {
    let file = UploadedFile::new("small.csv", SMALL_CSV.as_bytes().to_vec());
    let dataset = ingest(Some(&file), &IngestOptions::default()).unwrap();

    let Outcome::Ready(rows) = missing_report(Some(&dataset)) else {
        panic!("expected a report");
    };
    let a = rows.iter().find(|r| r.column == "a").unwrap();
    assert_eq!(a.missing, 1);
    assert_eq!(a.missing_pct, 25.0);
    assert_eq!(a.complete, 3);
    assert_eq!(a.complete_pct, 75.0);

    let b = rows.iter().find(|r| r.column == "b").unwrap();
    assert_eq!(b.missing, 0);
    assert_eq!(b.complete_pct, 100.0);
}

#[test]
fn blank_column_is_described_as_numeric() {
    let file = UploadedFile::new("blank.csv", b"a,b\n1,\n2,\n3,\n".to_vec());
    let dataset = Arc::new(ingest(Some(&file), &IngestOptions::default()).unwrap());

    let view = apply_range_filter(Some(&dataset), Some("a"), RangeBound::new(1.0, 3.0));
    let Outcome::Ready(SummaryReport::Describe(cols)) = edalens::summary::summarize(view.as_ref())
    else {
        panic!("expected describe table");
    };
    let names: Vec<&str> = cols.iter().map(|c| c.column.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    let b = &cols[1];
    assert_eq!(b.count, 0);
    assert_eq!(b.mean, None);

    // An all-missing numeric column falls back to the default range
    assert_eq!(reset_bound(Some(&dataset), Some("b")), RangeBound::default());

    let Outcome::Ready(rows) = missing_report(Some(&dataset)) else {
        panic!("expected a report");
    };
    let b = rows.iter().find(|r| r.column == "b").unwrap();
    assert_eq!(b.dtype, "f64");
    assert_eq!(b.missing, 3);
}

#[test]
fn range_filter_is_inclusive_and_drops_missing() {
    let file = UploadedFile::new("small.csv", SMALL_CSV.as_bytes().to_vec());
    let dataset = Arc::new(ingest(Some(&file), &IngestOptions::default()).unwrap());

    let view = apply_range_filter(Some(&dataset), Some("a"), RangeBound::new(1.0, 2.0)).unwrap();
    assert!(view.is_applied());
    assert_eq!(view.shape(), (2, 2));

    // Reversed ends mean the same bound
    let reversed =
        apply_range_filter(Some(&dataset), Some("a"), RangeBound::new(2.0, 1.0)).unwrap();
    assert_eq!(reversed.shape(), (2, 2));
}

#[test]
fn full_range_keeps_every_complete_row() {
    let csv = numbers_csv(40);
    let file = UploadedFile::new("n.csv", csv.into_bytes());
    let dataset = Arc::new(ingest(Some(&file), &IngestOptions::default()).unwrap());

    let bound = reset_bound(Some(&dataset), Some("value"));
    assert_eq!(bound, RangeBound::new(0.0, 58.5));
    let view = apply_range_filter(Some(&dataset), Some("value"), bound).unwrap();
    assert_eq!(view.shape(), dataset.shape());

    // Filtering twice with the same bound changes nothing
    let again = apply_range_filter(Some(&view.data), Some("value"), bound).unwrap();
    assert_eq!(again.shape(), view.shape());
}

#[test]
fn infinite_value_stays_inside_the_default_range() {
    let mut csv = String::from("v\n");
    for i in 1..=10 {
        csv.push_str(&format!("{}\n", i * 50));
    }
    csv.push_str("inf\n");

    let mut session = Session::new(SessionOptions::default());
    upload(&mut session, "inf.csv", &csv);
    assert_eq!(session.selection().num_column.as_deref(), Some("v"));
    let range = session.selection().range;
    assert_eq!(range.lo(), 50.0);
    assert_eq!(range.hi(), f64::INFINITY);
    assert_eq!(
        session.filtered().unwrap().shape(),
        session.raw_dataset().unwrap().shape()
    );
}

#[test]
fn filter_on_text_column_passes_rows_through() {
    let file = UploadedFile::new("small.csv", SMALL_CSV.as_bytes().to_vec());
    let dataset = Arc::new(ingest(Some(&file), &IngestOptions::default()).unwrap());
    let view = apply_range_filter(Some(&dataset), Some("b"), RangeBound::new(0.0, 1.0)).unwrap();
    assert!(!view.is_applied());
    assert_eq!(view.shape(), (4, 2));
}

#[test]
fn no_upload_shows_placeholders() {
    let session = Session::new(SessionOptions::default());
    assert_eq!(session.file_info(), NO_FILE_UPLOADED);
    assert_eq!(session.diagnostics(), NO_DATA_UPLOADED);
    assert!(session.missing().is_empty());
    for kind in [
        ChartKind::Histogram,
        ChartKind::BoxPlot,
        ChartKind::Bar,
        ChartKind::Scatter,
    ] {
        assert!(session.chart(kind).is_empty());
    }
}

#[test]
fn oversized_declared_upload_is_rejected() {
    let mut file = UploadedFile::new("big.csv", SMALL_CSV.as_bytes().to_vec());
    file.declared_size = 20 * 1024 * 1024;
    let err = ingest(Some(&file), &IngestOptions::default()).unwrap_err();
    assert!(matches!(err, IngestError::TooLarge { .. }));
    assert!(err.to_string().contains("20.00 MB"));

    let mut session = Session::new(SessionOptions::default());
    session.upload(Some(file));
    assert!(session.raw_dataset().is_none());
    assert!(session.file_info().contains("big.csv"));
    assert!(session.file_info().contains("Rejected"));
}

#[test]
fn unlimited_uploads_accept_large_declared_size() {
    let mut file = UploadedFile::new("big.csv", SMALL_CSV.as_bytes().to_vec());
    file.declared_size = 20 * 1024 * 1024;
    let options = IngestOptions {
        max_upload_bytes: None,
        ..IngestOptions::default()
    };
    assert!(ingest(Some(&file), &options).is_ok());
}

#[test]
fn non_csv_upload_is_rejected() {
    let file = UploadedFile::new("notes.txt", b"a,b\n1,2\n".to_vec());
    assert_eq!(
        ingest(Some(&file), &IngestOptions::default()).unwrap_err(),
        IngestError::NotCsv
    );
    assert_eq!(
        ingest(None, &IngestOptions::default()).unwrap_err(),
        IngestError::NoFile
    );
}

#[test]
fn numeric_change_leaves_unrelated_views_alone() {
    let mut session = Session::new(SessionOptions::default());
    upload(&mut session, "n.csv", &numbers_csv(40));
    assert_eq!(session.selection().num_column.as_deref(), Some("id"));

    let untouched = [Node::Missing, Node::BarChart, Node::Preview, Node::FileInfo];
    let before: Vec<u64> = untouched.iter().map(|n| session.evaluations(*n)).collect();
    let histogram_before = session.evaluations(Node::Histogram);

    let dirty = session.select_numeric(Some("value".into()));
    assert!(dirty.contains(&Node::Filtered));
    assert!(dirty.contains(&Node::Summary));
    for node in untouched {
        assert!(!dirty.contains(&node), "{} should stay clean", node);
    }

    let after: Vec<u64> = untouched.iter().map(|n| session.evaluations(*n)).collect();
    assert_eq!(before, after);
    assert_eq!(session.evaluations(Node::Histogram), histogram_before + 1);
}

#[test]
fn equal_range_recomputes_nothing() {
    let mut session = Session::new(SessionOptions::default());
    upload(&mut session, "n.csv", &numbers_csv(40));
    let bound = session.selection().range;

    let before: Vec<u64> = Node::DERIVED.iter().map(|n| session.evaluations(*n)).collect();
    let dirty = session.set_range(bound.lo(), bound.hi());
    assert!(dirty.is_empty());
    let after: Vec<u64> = Node::DERIVED.iter().map(|n| session.evaluations(*n)).collect();
    assert_eq!(before, after);

    // Reversed ends describe the same bound
    assert!(session.set_range(bound.hi(), bound.lo()).is_empty());
}

#[test]
fn range_narrowing_updates_summary_and_charts() {
    let mut session = Session::new(SessionOptions::default());
    upload(&mut session, "n.csv", &numbers_csv(40));

    let dirty = session.set_range(10.0, 19.0);
    assert!(dirty.contains(&Node::Histogram));
    assert!(dirty.contains(&Node::BoxPlot));
    assert!(dirty.contains(&Node::Diagnostics));
    assert!(!dirty.contains(&Node::BarChart));
    assert_eq!(session.filtered().unwrap().shape(), (10, 4));

    let Outcome::Ready(SummaryReport::Describe(cols)) = session.summary() else {
        panic!("expected describe table");
    };
    let id = cols.iter().find(|c| c.column == "id").unwrap();
    assert_eq!(id.count, 10);
    assert_eq!(id.min, Some(10.0));
    assert_eq!(id.max, Some(19.0));

    assert!(session.diagnostics().contains("(10, 4)"));
    assert!(session.chart(ChartKind::Histogram).is_ready());
}

#[test]
fn empty_filter_leaves_charts_empty() {
    let mut session = Session::new(SessionOptions::default());
    upload(&mut session, "n.csv", &numbers_csv(40));
    session.set_range(1000.0, 2000.0);

    assert_eq!(session.filtered().unwrap().shape().0, 0);
    assert!(session.chart(ChartKind::Histogram).is_empty());
    assert!(session.chart(ChartKind::BoxPlot).is_empty());
    // The bar chart reads the unfiltered data
    assert!(session.chart(ChartKind::Bar).is_ready());
}

#[test]
fn scatter_color_groups_points() {
    let mut session = Session::new(SessionOptions::default());
    upload(&mut session, "n.csv", &numbers_csv(40));

    let dirty = session.select_scatter_color(edalens::ScatterColor::Column("group".into()));
    assert!(dirty.contains(&Node::Scatter));
    assert!(!dirty.contains(&Node::Filtered));
    assert!(!dirty.contains(&Node::Histogram));
    let Outcome::Ready(svg) = session.chart(ChartKind::Scatter) else {
        panic!("expected scatter svg");
    };
    assert!(svg.contains("red"));
    assert!(svg.contains("green"));
}

#[test]
fn chart_data_from_uploaded_file() {
    let file = UploadedFile::new("n.csv", numbers_csv(40).into_bytes());
    let dataset = Arc::new(ingest(Some(&file), &IngestOptions::default()).unwrap());
    let view = apply_range_filter(Some(&dataset), Some("id"), RangeBound::new(0.0, 39.0));

    let Outcome::Ready(hist) = prepare_histogram(view.as_ref(), Some("id"), 10) else {
        panic!("expected histogram");
    };
    let total: usize = hist.bins.iter().map(|b| b.count).sum();
    assert_eq!(total, 40);

    let Outcome::Ready(bars) = prepare_bar_chart(Some(&dataset), Some("group")) else {
        panic!("expected bar chart");
    };
    assert_eq!(bars.categories[0], ("red".to_string(), 14));
}

#[test]
fn reupload_replaces_everything() {
    let mut session = Session::new(SessionOptions::default());
    upload(&mut session, "n.csv", &numbers_csv(40));
    session.set_range(5.0, 6.0);

    let dirty = upload(&mut session, "small.csv", SMALL_CSV);
    assert!(dirty.contains(&Node::Preview));
    assert!(dirty.contains(&Node::Missing));
    assert_eq!(session.raw_dataset().unwrap().shape(), (4, 2));
    assert_eq!(session.selection().num_column, None);
    assert_eq!(session.selection().cat_column.as_deref(), Some("b"));
    assert_eq!(session.filtered().unwrap().shape(), (4, 2));
    assert!(matches!(
        session.summary(),
        Outcome::Ready(SummaryReport::Describe(_))
    ));
}
