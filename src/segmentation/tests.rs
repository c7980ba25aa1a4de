use super::boundaries::detect_boundaries;
use super::builder::{build_plan, build_records, LabelIds};
use super::quality_gate::{evaluate, recognition_mask};
use crate::alignment::collapse::collapse;
use crate::types::SegmentRecord;

const BLANK: u32 = 0;
const SEP: u32 = 9;
const IDS: LabelIds = LabelIds {
    blank_id: BLANK,
    word_sep_id: SEP,
};

fn segment(aligned: &[u32], recognized: &[bool], targets: &[u32]) -> Vec<SegmentRecord> {
    let boundaries = detect_boundaries(recognized, aligned, SEP);
    build_records(0, &boundaries, aligned, targets, recognized.len(), IDS)
}

fn concatenated_labels(records: &[SegmentRecord]) -> Vec<u32> {
    records.iter().flat_map(|r| r.labels.iter().copied()).collect()
}

#[test]
fn records_reassemble_the_collapsed_alignment() {
    //             0  1  2  3  4    5  6  7  8    9  10 11 12
    let aligned = [1, 1, 2, 0, SEP, 3, 3, 0, SEP, 4, 5, 0, 0];
    let targets = collapse(&aligned, BLANK);
    let records = segment(&aligned, &[true; 13], &targets);

    assert_eq!(records.len(), 5);
    assert_eq!(concatenated_labels(&records), targets);
    // records are ordered and never overlap
    assert!(records
        .windows(2)
        .all(|w| w[0].emission_end() <= w[1].emission_start));
}

#[test]
fn reassembly_holds_around_a_misrecognized_word() {
    //             0  1  2    3  4  5    6  7  8
    let aligned = [1, 0, SEP, 2, 0, SEP, 3, 0, 0];
    let mut recognized = [true; 9];
    recognized[3] = false;
    let targets = collapse(&aligned, BLANK);
    let records = segment(&aligned, &recognized, &targets);

    // the broken word keeps its separators inside a single span
    assert_eq!(concatenated_labels(&records), vec![1, SEP, 2, SEP, 3]);
    let last = records.last().expect("record");
    assert_eq!(last.labels, vec![2, SEP, 3]);
    assert_eq!((last.emission_start, last.emission_len), (3, 5));
}

#[test]
fn whole_utterance_record_is_verbatim() {
    let aligned = [1, 1, 0, 2, 2, 0, 3];
    let raw_targets = [1, 2, 3];
    let records = segment(&aligned, &[true; 7], &raw_targets);
    assert_eq!(
        records,
        vec![SegmentRecord {
            utterance: 0,
            emission_start: 0,
            emission_len: 7,
            labels: raw_targets.to_vec(),
        }]
    );
}

#[test]
fn adjacent_separators_produce_no_empty_record() {
    let aligned = [1, 0, SEP, SEP, 2, 0, 0];
    let records = segment(&aligned, &[true; 7], &[1, SEP, SEP, 2]);
    assert!(records.iter().all(|r| r.emission_len > 0));
    let spans: Vec<(usize, usize)> = records
        .iter()
        .map(|r| (r.emission_start, r.emission_len))
        .collect();
    let mut deduped = spans.clone();
    deduped.dedup();
    assert_eq!(spans, deduped);
}

#[test]
fn batch_pipeline_from_predictions() {
    let aligned = vec![
        vec![1, 0, SEP, 2, 0, 0, 0, 0],
        vec![3, 3, 0, 4, 0, 0, 0, 0],
    ];
    let predictions = vec![
        vec![1, 0, SEP, 2, 0, 0, 5, 5],
        vec![3, 3, 0, 7, 0, 0, 0, 0],
    ];
    let lengths = [6, 5];
    let targets = vec![vec![1, SEP, 2], vec![3, 4, 0]];
    let target_lengths = [3, 2];

    let mask = recognition_mask(&aligned, &predictions, &lengths);
    let gate = evaluate(&mask, &target_lengths, 0.5);
    assert_eq!(gate.recognized, 10);
    assert!(gate.passed);

    let boundaries: Vec<Vec<usize>> = mask
        .iter()
        .zip(&aligned)
        .map(|(m, a)| detect_boundaries(m, a, SEP))
        .collect();
    assert_eq!(boundaries, vec![vec![0, 2, 5], vec![0, 4]]);

    let plan = build_plan(&boundaries, &aligned, &targets, &lengths, &target_lengths, IDS)
        .expect("plan");
    assert_eq!(plan.utterance_ids(), vec![0, 0, 0, 1]);
    assert_eq!(plan.records[3].labels, vec![3, 4]);
    assert_eq!(plan.records[3].emission_len, 5);

    let again = build_plan(&boundaries, &aligned, &targets, &lengths, &target_lengths, IDS)
        .expect("plan");
    assert_eq!(plan, again);
}
