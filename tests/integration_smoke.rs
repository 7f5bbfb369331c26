use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use kp_anonymity::{load_dataset, run, Algorithm, AnonymityParams, AnonymizationResult, Dataset};
use kp_anonymity::output::{output_path_for, write_anonymized};

const SERIES_LEN: usize = 8;

/// Three shape families with per-member jitter: up-ramps, down-ramps and
/// V-shapes. 24 records total. Each test writes its own file so parallel
/// test threads never race on it.
fn write_smoke_csv(name: &str) -> std::path::PathBuf {
    let path = std::path::PathBuf::from(format!("tests/{name}.csv"));
    let mut file = std::fs::File::create(&path).expect("create smoke data");
    let header: Vec<String> = (0..SERIES_LEN).map(|j| format!("w{j}")).collect();
    writeln!(file, "id,{},disease", header.join(",")).unwrap();
    for i in 0..8 {
        let row: Vec<String> = (0..SERIES_LEN)
            .map(|j| format!("{}", 10.0 + 10.0 * j as f64 + i as f64))
            .collect();
        writeln!(file, "up{i},{},40", row.join(",")).unwrap();
    }
    for i in 0..8 {
        let row: Vec<String> = (0..SERIES_LEN)
            .map(|j| format!("{}", 90.0 - 10.0 * j as f64 + i as f64))
            .collect();
        writeln!(file, "down{i},{},{}", row.join(","), 50 + i % 3).unwrap();
    }
    for i in 0..8 {
        let row: Vec<String> = (0..SERIES_LEN)
            .map(|j| format!("{}", 20.0 * (j as f64 - 3.5).abs() + i as f64))
            .collect();
        writeln!(file, "vee{i},{},{}", row.join(","), 60 + i).unwrap();
    }
    drop(file);
    path
}

fn params() -> AnonymityParams {
    AnonymityParams {
        k: 4,
        p: 2,
        paa: 4,
        l: 2,
        epsilon: 1,
        max_level: 5,
    }
}

fn surviving_ids(result: &AnonymizationResult) -> BTreeSet<String> {
    result
        .k_groups
        .iter()
        .flat_map(|g| g.keys().cloned())
        .collect()
}

fn check_partition(dataset: &Dataset, result: &AnonymizationResult) {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut total = 0usize;
    for group in result.k_groups.iter().chain(&result.suppressed) {
        total += group.len();
        seen.extend(group.keys().cloned());
    }
    assert_eq!(total, dataset.records.len(), "records duplicated or lost");
    let expected: BTreeSet<String> = dataset.records.keys().cloned().collect();
    assert_eq!(seen, expected);
}

fn check_l_diversity(result: &AnonymizationResult, l: usize) {
    assert_eq!(result.unresolved_classes, 0);
    for group in &result.k_groups {
        let mut envelopes: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for id in group.keys() {
            let pattern = result.patterns.get(id).expect("surviving record has a tag");
            envelopes.entry(pattern).or_default().push(id);
        }
        for (_, envelope) in envelopes {
            let ps = envelope.len();
            let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
            for id in &envelope {
                *counts.entry(result.sensitive[*id]).or_default() += 1;
            }
            for (_, count) in counts {
                assert!(
                    count * l <= ps,
                    "diversity violated: class {count} in envelope {ps}"
                );
            }
        }
    }
}

#[test]
fn naive_end_to_end() {
    let path = write_smoke_csv("smoke_naive");
    let dataset = load_dataset(&path).expect("load");
    let params = params();
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let result = run(Algorithm::Naive, &dataset, &params, &mut rng).expect("naive run");

    assert!(result.suppressed.is_empty(), "naive never suppresses");
    check_partition(&dataset, &result);
    for group in &result.k_groups {
        assert!(group.len() >= params.k, "k-group of {}", group.len());
    }
    for id in surviving_ids(&result) {
        assert!(result.patterns.contains_key(&id));
    }
    check_l_diversity(&result, params.l);
}

#[test]
fn kapra_end_to_end() {
    let path = write_smoke_csv("smoke_kapra");
    let dataset = load_dataset(&path).expect("load");
    let params = params();
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let result = run(Algorithm::Kapra, &dataset, &params, &mut rng).expect("kapra run");

    check_partition(&dataset, &result);
    for group in &result.k_groups {
        assert!(group.len() >= params.k, "k-group of {}", group.len());
    }
    for id in surviving_ids(&result) {
        assert!(result.patterns.contains_key(&id));
    }
    check_l_diversity(&result, params.l);
}

#[test]
fn partition_invariant_holds_across_seeds() {
    let path = write_smoke_csv("smoke_seeds");
    let dataset = load_dataset(&path).expect("load");
    let params = params();
    for seed in [0, 1, 2, 3, 17] {
        for algorithm in [Algorithm::Naive, Algorithm::Kapra] {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let result = run(algorithm, &dataset, &params, &mut rng).expect("run");
            check_partition(&dataset, &result);
        }
    }
}

#[test]
fn output_file_has_one_row_per_record() {
    let path = write_smoke_csv("smoke_output");
    let dataset = load_dataset(&path).expect("load");
    let params = params();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let result = run(Algorithm::Kapra, &dataset, &params, &mut rng).expect("run");

    let out_path = output_path_for(&path);
    write_anonymized(&out_path, &dataset.columns, &result).expect("write output");
    let text = std::fs::read_to_string(&out_path).expect("read output");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1 + dataset.records.len());
    assert_eq!(
        lines[0],
        format!("id,{},sax,as,group", dataset.columns.join(","))
    );
}

#[test]
fn rejects_invalid_parameters_before_clustering() {
    let path = write_smoke_csv("smoke_params");
    let dataset = load_dataset(&path).expect("load");
    let mut rng = ChaCha8Rng::seed_from_u64(0);

    let mut bad = params();
    bad.k = 1; // k < P
    assert!(run(Algorithm::Naive, &dataset, &bad, &mut rng).is_err());

    let mut huge = params();
    huge.k = 1000; // more than the table holds
    assert!(run(Algorithm::Kapra, &dataset, &huge, &mut rng).is_err());
}
