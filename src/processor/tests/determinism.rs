//! Reproducibility tests: reruns and on-disk ordering must not change output

use super::{REGIONAL_CAST, WOCE_CAST, outputs, quiet_config, write_zip};
use crate::processor::Aggregator;
use crate::processor::writer::provenance_path;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn run(zip_folder: &Path, out_root: &Path) {
    Aggregator::new(zip_folder, outputs(out_root))
        .unwrap()
        .with_config(quiet_config())
        .run()
        .unwrap();
}

fn read_outputs(out_root: &Path) -> Vec<Vec<u8>> {
    let paths = outputs(out_root);
    [
        paths.aggregated_csv.clone(),
        paths.final_csv.clone(),
        provenance_path(&paths.aggregated_csv),
        provenance_path(&paths.final_csv),
    ]
    .iter()
    .map(|path| fs::read(path).unwrap())
    .collect()
}

#[test]
fn test_rerun_is_byte_identical() {
    let temp_dir = TempDir::new().unwrap();
    let zip_folder = temp_dir.path().join("zips");
    fs::create_dir_all(&zip_folder).unwrap();
    write_zip(&zip_folder.join("atlantic.zip"), &[("cast.csv", REGIONAL_CAST)]);
    write_zip(&zip_folder.join("pacific.zip"), &[("cast.csv", WOCE_CAST)]);

    let out_root = temp_dir.path().join("out");
    run(&zip_folder, &out_root);
    let first = read_outputs(&out_root);
    let intermediate = fs::read(outputs(&out_root).processed_folder.join("pacific_processed.csv")).unwrap();

    run(&zip_folder, &out_root);
    let second = read_outputs(&out_root);
    let intermediate_again =
        fs::read(outputs(&out_root).processed_folder.join("pacific_processed.csv")).unwrap();

    assert_eq!(first, second);
    assert_eq!(intermediate, intermediate_again);
}

#[test]
fn test_creation_order_does_not_matter() {
    let temp_dir = TempDir::new().unwrap();
    let archives = [
        ("charlie.zip", REGIONAL_CAST),
        ("alpha.zip", WOCE_CAST),
        ("bravo.zip", REGIONAL_CAST),
    ];

    let forward = temp_dir.path().join("forward");
    fs::create_dir_all(&forward).unwrap();
    for (name, cast) in archives.iter() {
        write_zip(&forward.join(name), &[("cast.csv", *cast)]);
    }

    let reversed = temp_dir.path().join("reversed");
    fs::create_dir_all(&reversed).unwrap();
    for (name, cast) in archives.iter().rev() {
        write_zip(&reversed.join(name), &[("cast.csv", *cast)]);
    }

    run(&forward, &temp_dir.path().join("out_forward"));
    run(&reversed, &temp_dir.path().join("out_reversed"));

    assert_eq!(
        read_outputs(&temp_dir.path().join("out_forward")),
        read_outputs(&temp_dir.path().join("out_reversed"))
    );

    // Archives appear in filename order
    let aggregated = fs::read_to_string(outputs(&temp_dir.path().join("out_forward")).aggregated_csv).unwrap();
    let alpha = aggregated.find("alpha/cast.csv").unwrap();
    let bravo = aggregated.find("bravo/cast.csv").unwrap();
    let charlie = aggregated.find("charlie/cast.csv").unwrap();
    assert!(alpha < bravo && bravo < charlie);
}
