mod common;

use clap::Parser;
use labelstudio2yolo::aggregate::AggregateOptions;
use labelstudio2yolo::conversion::{process_task, ConversionContext, TaskOutcome};
use labelstudio2yolo::io::{load_tasks, mask_path, setup_output_directories, CLASSES_FILE};
use labelstudio2yolo::registry::ClassRegistry;
use labelstudio2yolo::{process_dataset, Args, ExportedTask};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

use common::brush_rle;

fn brush_result(id: &str, label: &str, width: u32, height: u32, rle: Vec<u32>) -> Value {
    json!({
        "id": id,
        "type": "brushlabels",
        "original_width": width,
        "original_height": height,
        "value": {"format": "rle", "rle": rle, "brushlabels": [label]}
    })
}

fn rectangle_result(id: &str, label: &str, x: f64, y: f64, w: f64, h: f64) -> Value {
    json!({
        "id": id,
        "type": "rectanglelabels",
        "original_width": 100,
        "original_height": 100,
        "value": {"x": x, "y": y, "width": w, "height": h, "rotation": 0, "rectanglelabels": [label]}
    })
}

fn export_task(id: u64, image: &str, results: Vec<Value>) -> Value {
    json!({
        "id": id,
        "data": {"image": format!("/data/upload/1/{}", image)},
        "annotations": [{"was_cancelled": false, "result": results}]
    })
}

fn write_json(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_process_task_writes_matching_masks_and_labels() {
    let temp_dir = tempfile::tempdir().unwrap();
    let output_dirs = setup_output_directories(&temp_dir.path().join("out")).unwrap();

    let exported: ExportedTask = serde_json::from_value(export_task(
        5,
        "img.png",
        vec![
            brush_result("a", "cell", 100, 100, brush_rle(100, 100, |x, y| x < 50 && y < 20)),
            brush_result("b", "debris", 100, 100, brush_rle(100, 100, |x, y| x >= 90 && y >= 90)),
        ],
    ))
    .unwrap();
    let task = exported.to_task(None).unwrap();

    let registry = ClassRegistry::new();
    let ctx = ConversionContext {
        output_dirs: &output_dirs,
        registry: &registry,
        options: AggregateOptions::default(),
        precision: 6,
        include_background: false,
        write_masks: true,
    };

    let outcome = process_task(&task, &ctx).unwrap();
    assert!(matches!(outcome, TaskOutcome::Converted { instances: 2, skipped_instances: 0, .. }));

    let lines = read_lines(&output_dirs.labels_dir.join("5.txt"));
    assert_eq!(lines, vec!["0 0.245 0.095 0.49 0.19", "1 0.945 0.945 0.09 0.09"]);

    let first = image::open(mask_path(&output_dirs, "5", 0)).unwrap().to_luma8();
    let second = image::open(mask_path(&output_dirs, "5", 1)).unwrap().to_luma8();
    assert_eq!(first.dimensions(), (100, 100));
    assert_eq!(first.get_pixel(10, 10)[0], 255);
    assert_eq!(first.get_pixel(95, 95)[0], 0);
    assert_eq!(second.get_pixel(95, 95)[0], 255);
    assert!(output_dirs.masks_dir.join("5_0.png").is_file());
    assert!(output_dirs.masks_dir.join("5_1.png").is_file());
    assert!(!output_dirs.masks_dir.join("5_2.png").exists());
}

#[test]
fn test_process_dataset_from_export_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let export_path = temp_dir.path().join("export.json");
    let out_dir = temp_dir.path().join("dataset");

    let export = json!([
        export_task(1, "one.png", vec![rectangle_result("r", "cell", 10.0, 10.0, 20.0, 20.0)]),
        export_task(
            2,
            "two.png",
            vec![
                rectangle_result("r1", "cell", 0.0, 0.0, 50.0, 50.0),
                brush_result("b1", "debris", 100, 100, brush_rle(100, 100, |_, _| true)),
                brush_result("b2", "debris", 100, 100, vec![1, 2, 3]),
            ],
        ),
        export_task(3, "three.png", vec![brush_result("e", "cell", 100, 100, vec![])]),
        {"id": 4, "annotations": [{"result": [
            {"type": "brushlabels", "value": {"rle": [], "brushlabels": ["cell"]}}
        ]}]}
    ]);
    write_json(&export_path, &export);

    let args = Args::parse_from([
        "labelstudio2yolo",
        "-i",
        export_path.to_str().unwrap(),
        "-o",
        out_dir.to_str().unwrap(),
    ]);
    let stats = process_dataset(&args).unwrap();

    assert_eq!(stats.total_tasks, 4);
    assert_eq!(stats.successful_tasks, 2);
    assert_eq!(stats.skipped_empty_tasks, 1);
    assert_eq!(stats.failed_tasks, 1);
    assert_eq!(stats.instances_written, 3);
    assert_eq!(stats.instances_skipped, 2);

    assert_eq!(read_lines(&out_dir.join("labels/1.txt")), vec!["0 0.2 0.2 0.2 0.2"]);
    assert_eq!(
        read_lines(&out_dir.join("labels/2.txt")),
        vec!["0 0.25 0.25 0.5 0.5", "1 0.495 0.495 0.99 0.99"]
    );
    assert!(!out_dir.join("labels/3.txt").exists());
    assert!(!out_dir.join("labels/4.txt").exists());
    assert!(out_dir.join("masks/2_1.png").is_file());
    assert!(!out_dir.join("masks/2_2.png").exists());
    assert_eq!(read_lines(&out_dir.join(CLASSES_FILE)), vec!["cell", "debris"]);
}

#[test]
fn test_process_dataset_with_label_list() {
    let temp_dir = tempfile::tempdir().unwrap();
    let export_path = temp_dir.path().join("export.json");
    let out_dir = temp_dir.path().join("dataset");

    write_json(
        &export_path,
        &json!([export_task(
            1,
            "one.png",
            vec![
                rectangle_result("r1", "bead", 0.0, 0.0, 10.0, 10.0),
                rectangle_result("r2", "cell", 0.0, 0.0, 10.0, 10.0),
            ],
        )]),
    );

    let args = Args::parse_from([
        "labelstudio2yolo",
        "-i",
        export_path.to_str().unwrap(),
        "-o",
        out_dir.to_str().unwrap(),
        "--no_masks",
        "debris,cell",
    ]);
    let stats = process_dataset(&args).unwrap();

    assert_eq!(stats.successful_tasks, 1);
    assert_eq!(stats.instances_skipped, 1);
    assert_eq!(read_lines(&out_dir.join("labels/1.txt")), vec!["1 0.05 0.05 0.1 0.1"]);
    assert_eq!(read_lines(&out_dir.join(CLASSES_FILE)), vec!["debris", "cell"]);
    assert!(fs::read_dir(out_dir.join("masks")).unwrap().next().is_none());
}

#[test]
fn test_background_task_gets_empty_label_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let export_path = temp_dir.path().join("export.json");
    let images_dir = temp_dir.path().join("images");
    let out_dir = temp_dir.path().join("dataset");
    fs::create_dir_all(&images_dir).unwrap();
    image::GrayImage::new(100, 100).save(images_dir.join("one.png")).unwrap();
    image::GrayImage::new(30, 30).save(images_dir.join("two.png")).unwrap();

    write_json(
        &export_path,
        &json!([
            export_task(1, "one.png", vec![rectangle_result("r", "cell", 0.0, 0.0, 10.0, 10.0)]),
            export_task(2, "two.png", vec![]),
            {"id": 3, "annotations": []},
        ]),
    );

    let args = Args::parse_from([
        "labelstudio2yolo",
        "-i",
        export_path.to_str().unwrap(),
        "-o",
        out_dir.to_str().unwrap(),
        "--images_dir",
        images_dir.to_str().unwrap(),
        "--include_background",
    ]);
    let stats = process_dataset(&args).unwrap();

    assert_eq!(stats.successful_tasks, 2);
    assert_eq!(stats.background_tasks, 1);
    // Task 3 has neither recorded dimensions nor an image
    assert_eq!(stats.failed_tasks, 1);
    assert_eq!(fs::read_to_string(out_dir.join("labels/2.txt")).unwrap(), "");
    assert!(out_dir.join("images/2.png").is_file());
    assert!(!out_dir.join("masks/2_0.png").exists());
}

#[test]
fn test_process_export_directory() {
    let temp_dir = tempfile::tempdir().unwrap();
    let export_dir = temp_dir.path();
    fs::create_dir_all(export_dir.join("annotations")).unwrap();
    fs::create_dir_all(export_dir.join("images")).unwrap();

    image::GrayImage::new(40, 20)
        .save(export_dir.join("images/task_1_cells.png"))
        .unwrap();

    // Task 1 has no recorded dimensions; they are read from its image
    write_json(
        &export_dir.join("annotations/task_1_annotation.json"),
        &json!({
            "id": 1,
            "data": {"image": "/data/upload/1/cells.png"},
            "annotations": [
                {"result": [{"id": "r", "type": "rectanglelabels",
                    "value": {"x": 25, "y": 50, "width": 50, "height": 50, "rectanglelabels": ["cell"]}}]}
            ]
        }),
    );
    write_json(
        &export_dir.join("annotations/task_2_annotation.json"),
        &export_task(2, "beads.png", vec![rectangle_result("r", "bead", 0.0, 0.0, 10.0, 10.0)]),
    );
    write_json(
        &export_dir.join("image_annotation_pairs.json"),
        &json!({
            "1": {"image_file": "task_1_cells.png", "annotation_file": "task_1_annotation.json",
                  "original_filename": "cells.png", "task_id": "1"},
            "2": {"image_file": "task_2_beads.png", "annotation_file": "task_2_annotation.json",
                  "original_filename": "beads.png", "task_id": "2"},
            "3": {"image_file": "task_3_x.png", "annotation_file": "missing.json",
                  "original_filename": "x.png", "task_id": "3"}
        }),
    );

    let tasks = load_tasks(export_dir).unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].file_upload.as_deref(), Some("task_1_cells.png"));

    let args = Args::parse_from(["labelstudio2yolo", "-i", export_dir.to_str().unwrap()]);
    let stats = process_dataset(&args).unwrap();

    let out_dir = export_dir.join("YOLODataset");
    assert_eq!(stats.successful_tasks, 1);
    assert_eq!(stats.skipped_missing_image, 1);
    assert!(out_dir.join("images/1.png").is_file());
    assert_eq!(read_lines(&out_dir.join("labels/1.txt")), vec!["0 0.5 0.75 0.5 0.5"]);
    assert!(!out_dir.join("labels/2.txt").exists());
    let mask = image::open(out_dir.join("masks/1_0.png")).unwrap().to_luma8();
    assert_eq!(mask.dimensions(), (40, 20));
}

#[test]
fn test_load_tasks_rejects_empty_export() {
    let temp_dir = tempfile::tempdir().unwrap();
    let export_path = temp_dir.path().join("export.json");
    write_json(&export_path, &json!([]));
    assert!(load_tasks(&export_path).is_err());
    assert!(load_tasks(&temp_dir.path().join("nope.json")).is_err());
}

#[test]
fn test_output_root_must_not_contain_the_input() {
    let temp_dir = tempfile::tempdir().unwrap();
    let export_dir = temp_dir.path();
    fs::create_dir_all(export_dir.join("annotations")).unwrap();
    fs::create_dir_all(export_dir.join("images")).unwrap();
    let source_image = export_dir.join("images/task_1_a.png");
    image::GrayImage::new(10, 10).save(&source_image).unwrap();

    write_json(
        &export_dir.join("annotations/task_1_annotation.json"),
        &export_task(1, "a.png", vec![rectangle_result("r", "cell", 0.0, 0.0, 10.0, 10.0)]),
    );
    write_json(
        &export_dir.join("image_annotation_pairs.json"),
        &json!({"1": {"image_file": "task_1_a.png", "annotation_file": "task_1_annotation.json"}}),
    );

    let args = Args::parse_from([
        "labelstudio2yolo",
        "-i",
        export_dir.to_str().unwrap(),
        "-o",
        export_dir.to_str().unwrap(),
    ]);
    assert!(process_dataset(&args).is_err());
    assert!(source_image.is_file());

    // An explicit images dir under the output root is protected as well
    let export_path = temp_dir.path().join("export.json");
    write_json(
        &export_path,
        &json!([export_task(1, "task_1_a.png", vec![rectangle_result("r", "cell", 0.0, 0.0, 10.0, 10.0)])]),
    );
    let out_dir = temp_dir.path().to_str().unwrap();
    let images_dir = export_dir.join("images");
    let args = Args::parse_from([
        "labelstudio2yolo",
        "-i",
        export_path.to_str().unwrap(),
        "-o",
        out_dir,
        "--images_dir",
        images_dir.to_str().unwrap(),
    ]);
    assert!(process_dataset(&args).is_err());
    assert!(source_image.is_file());

    // The default output beside the export still works
    let args = Args::parse_from(["labelstudio2yolo", "-i", export_dir.to_str().unwrap()]);
    let stats = process_dataset(&args).unwrap();
    assert_eq!(stats.successful_tasks, 1);
    assert!(source_image.is_file());
    assert!(export_dir.join("YOLODataset/images/1.png").is_file());
}
