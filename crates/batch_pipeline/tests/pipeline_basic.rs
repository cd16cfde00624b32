//! End-to-end tests for batch production.
//!
//! Tests cover:
//! - Round-robin order and epoch wrap in validation mode
//! - Batch shapes, labels and data dimensions
//! - Epoch/batch tags across epoch boundaries
//! - Centered and random crop placement, mirroring
//! - Mean subtraction
//! - Seeded reproducibility and resume

mod common;
use common::{column_identity, identity, Fixture, HEIGHT, WIDTH};

use anyhow::Result;
use batch_pipeline::{drain_epochs, DataMode, FinishedBatch, Pipeline, PipelineConfig, PipelineError};

fn pull(pipeline: &Pipeline, n: usize) -> Result<Vec<FinishedBatch>> {
    (0..n).map(|_| pipeline.get_next_batch()).collect()
}

fn tags(batches: &[FinishedBatch]) -> Vec<(usize, usize)> {
    batches
        .iter()
        .map(|b| (b.epoch_index, b.batch_index))
        .collect()
}

/// `(x, y)` of feature `(row, column)` of `col`, read back from the R and G channels.
fn coordinate(batch: &FinishedBatch, col: usize, row: usize, column: usize, crop_width: usize) -> (f32, f32) {
    let base = (row * crop_width + column) * 3;
    (batch.data[[base, col]], batch.data[[base + 1, col]])
}

// ================================================================================================
// 1. Sampling order and tags
// ================================================================================================

#[test]
fn test_val_round_robin_wraps_shorter_class() -> Result<()> {
    let fixture = Fixture::new(&[3, 2])?;
    let pipeline = Pipeline::new(
        fixture
            .config()
            .data_mode(DataMode::Val)
            .batch_size(1)
            .crop(4, 3)
            .build(),
    )?;
    pipeline.start()?;

    let batches = pull(&pipeline, 6)?;
    pipeline.stop()?;

    let order: Vec<u8> = batches.iter().map(|b| column_identity(b, 0)).collect();
    assert_eq!(
        order,
        vec![
            identity(0, 0),
            identity(1, 0),
            identity(0, 1),
            identity(1, 1),
            identity(0, 2),
            identity(1, 0),
        ]
    );
    assert_eq!(
        tags(&batches),
        vec![(1, 1), (1, 2), (1, 3), (1, 4), (1, 5), (2, 1)]
    );

    let labels: Vec<f32> = batches.iter().map(|b| b.labels[[0, 0]]).collect();
    assert_eq!(labels, vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
    Ok(())
}

#[test]
fn test_epoch_tags_follow_total_processed() -> Result<()> {
    let fixture = Fixture::new(&[3, 2])?;
    let pipeline = Pipeline::new(
        fixture
            .config()
            .data_mode(DataMode::Val)
            .batch_size(2)
            .crop(4, 3)
            .build(),
    )?;
    assert_eq!(pipeline.num_batches(), 3);
    pipeline.start()?;

    let batches = pull(&pipeline, 7)?;
    pipeline.stop()?;

    // Batches straddling an epoch boundary keep the epoch they started in
    assert_eq!(
        tags(&batches),
        vec![(1, 1), (1, 2), (1, 3), (2, 1), (2, 2), (3, 1), (3, 2)]
    );
    assert!(batches.windows(2).all(|w| w[0].epoch_index <= w[1].epoch_index));
    Ok(())
}

#[test]
fn test_batch_shapes_and_labels() -> Result<()> {
    let fixture = Fixture::new(&[2, 3, 4])?;
    let pipeline = Pipeline::new(
        fixture
            .config()
            .batch_size(4)
            .crop(4, 3)
            .random_transform(true)
            .seed(11)
            .build(),
    )?;
    assert_eq!(pipeline.num_classes(), 3);
    assert_eq!(pipeline.num_batches(), 3);
    assert_eq!(pipeline.data_dims(), (36, 1));
    assert_eq!(pipeline.data_summary().class_histogram, vec![2, 3, 4]);
    pipeline.start()?;

    for batch in pull(&pipeline, 5)? {
        assert_eq!(batch.data.dim(), (36, 4));
        assert_eq!(batch.labels.dim(), (1, 4));
        assert_eq!(batch.batch_size(), 4);
        for col in 0..4 {
            let label = batch.labels[[0, col]];
            assert!([0.0, 1.0, 2.0].contains(&label));
            // The identity channel names the class the label claims
            let class_id = label as usize;
            let found = column_identity(&batch, col);
            assert!((0..4).any(|index| identity(class_id, index) == found));
        }
    }
    pipeline.stop()?;
    Ok(())
}

// ================================================================================================
// 2. Transform stage
// ================================================================================================

#[test]
fn test_center_crop_offsets() -> Result<()> {
    let (crop_width, crop_height) = (4, 3);
    let fixture = Fixture::with_size(&[2], 11, 8)?;
    let pipeline = Pipeline::new(
        fixture
            .config()
            .data_mode(DataMode::Val)
            .batch_size(2)
            .crop(crop_width, crop_height)
            .build(),
    )?;
    pipeline.start()?;
    let batch = pipeline.get_next_batch()?;
    pipeline.stop()?;

    // floor((11 - 4) / 2) = 3, floor((8 - 3) / 2) = 2
    for col in 0..2 {
        for row in 0..crop_height {
            for column in 0..crop_width {
                assert_eq!(
                    coordinate(&batch, col, row, column, crop_width),
                    ((3 + column) as f32, (2 + row) as f32)
                );
            }
        }
    }
    Ok(())
}

#[test]
fn test_random_crops_stay_in_bounds_and_mirror() -> Result<()> {
    let (crop_width, crop_height) = (4, 3);
    let fixture = Fixture::new(&[3, 3])?;
    let pipeline = Pipeline::new(
        fixture
            .config()
            .batch_size(8)
            .crop(crop_width, crop_height)
            .random_transform(true)
            .seed(5)
            .build(),
    )?;
    pipeline.start()?;
    let batches = pull(&pipeline, 25)?;
    pipeline.stop()?;

    let (mut mirrored, mut upright) = (0, 0);
    let mut offsets_x = std::collections::HashSet::new();
    for batch in &batches {
        for col in 0..batch.batch_size() {
            let (first_x, y) = coordinate(batch, col, 0, 0, crop_width);
            let (last_x, _) = coordinate(batch, col, 0, crop_width - 1, crop_width);
            let x = first_x.min(last_x) as usize;
            if first_x > last_x {
                mirrored += 1;
            } else {
                upright += 1;
            }

            assert_eq!((first_x - last_x).abs() as usize, crop_width - 1);
            assert!(x < WIDTH as usize - crop_width, "x offset {} out of range", x);
            assert!((y as usize) < HEIGHT as usize - crop_height, "y offset {} out of range", y);
            offsets_x.insert(x);
        }
    }

    assert!(mirrored > 40 && upright > 40, "mirrored {} upright {}", mirrored, upright);
    assert_eq!(offsets_x.len(), WIDTH as usize - crop_width);
    Ok(())
}

#[test]
fn test_mean_is_subtracted() -> Result<()> {
    let fixture = Fixture::new(&[1, 1])?;
    fixture.write_mean(WIDTH, HEIGHT, 10.4)?;
    let pipeline = Pipeline::new(
        fixture
            .config()
            .data_mode(DataMode::Val)
            .batch_size(2)
            .crop(4, 3)
            .build(),
    )?;
    pipeline.start()?;
    let batch = pipeline.get_next_batch()?;
    pipeline.stop()?;

    // The mean rounds to 10; center offset is (2, 2)
    assert_eq!(batch.data[[0, 0]], 2.0 - 10.0);
    assert_eq!(batch.data[[1, 0]], 2.0 - 10.0);
    assert_eq!(batch.data[[2, 0]], identity(0, 0) as f32 - 10.0);
    assert_eq!(batch.data[[2, 1]], identity(1, 0) as f32 - 10.0);
    Ok(())
}

// ================================================================================================
// 3. Reproducibility and resume
// ================================================================================================

#[test]
fn test_seeded_pipelines_repeat() -> Result<()> {
    let fixture = Fixture::new(&[2, 3, 1])?;
    let config = fixture
        .config()
        .batch_size(3)
        .crop(4, 3)
        .random_transform(true)
        .seed(1234)
        .build();

    let run = |config: PipelineConfig| -> Result<Vec<FinishedBatch>> {
        let pipeline = Pipeline::new(config)?;
        pipeline.start()?;
        let batches = pull(&pipeline, 6)?;
        pipeline.stop()?;
        Ok(batches)
    };

    let first = run(config.clone())?;
    let second = run(config)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_resume_continues_mid_epoch() -> Result<()> {
    let fixture = Fixture::new(&[3, 2])?;
    let pipeline = Pipeline::new(
        fixture
            .config()
            .data_mode(DataMode::Val)
            .batch_size(1)
            .crop(4, 3)
            .resume(1, 3)
            .build(),
    )?;
    pipeline.start()?;
    let batches = pull(&pipeline, 3)?;
    pipeline.stop()?;

    assert_eq!(tags(&batches), vec![(1, 4), (1, 5), (2, 1)]);
    let order: Vec<u8> = batches.iter().map(|b| column_identity(b, 0)).collect();
    assert_eq!(order, vec![identity(1, 1), identity(0, 2), identity(1, 0)]);
    Ok(())
}

#[test]
fn test_resume_at_epoch_start() -> Result<()> {
    let fixture = Fixture::new(&[3, 2])?;
    let pipeline = Pipeline::new(
        fixture
            .config()
            .data_mode(DataMode::Val)
            .batch_size(1)
            .crop(4, 3)
            .resume(2, 0)
            .build(),
    )?;
    pipeline.start()?;
    let batch = pipeline.get_next_batch()?;
    pipeline.stop()?;

    assert_eq!((batch.epoch_index, batch.batch_index), (2, 1));
    assert_eq!(column_identity(&batch, 0), identity(1, 0));
    Ok(())
}

#[test]
fn test_resume_out_of_range_is_configuration_error() -> Result<()> {
    let fixture = Fixture::new(&[3, 2])?;
    for (epoch_index, batch_index) in [(usize::MAX / 2, 0), (1, usize::MAX / 2)] {
        let result = Pipeline::new(
            fixture
                .config()
                .data_mode(DataMode::Val)
                .batch_size(2)
                .crop(4, 3)
                .resume(epoch_index, batch_index)
                .build(),
        );
        let err = result.err().expect("resume point should be rejected");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Configuration(_))
        ));
    }
    Ok(())
}

// ================================================================================================
// 4. Construction and the consumer trait
// ================================================================================================

#[test]
fn test_drain_epochs_over_pipeline() -> Result<()> {
    let fixture = Fixture::new(&[3, 2])?;
    let mut pipeline = Pipeline::new(
        fixture
            .config()
            .data_mode(DataMode::Val)
            .batch_size(2)
            .crop(4, 3)
            .build(),
    )?;
    pipeline.start()?;

    let mut seen = Vec::new();
    let next = drain_epochs(&mut pipeline, 2, |batch| {
        seen.push((batch.epoch_index, batch.batch_index));
        Ok(())
    })?;
    pipeline.stop()?;

    assert_eq!(seen, vec![(1, 1), (1, 2), (1, 3), (2, 1), (2, 2)]);
    assert_eq!((next.epoch_index, next.batch_index), (3, 1));
    Ok(())
}

#[test]
fn test_config_file_drives_pipeline() -> Result<()> {
    let fixture = Fixture::new(&[2, 2])?;
    let path = fixture.root().join("pipeline.json");
    let config = serde_json::json!({
        "root_path": fixture.root(),
        "batch_size": 2,
        "crop_width": 4,
        "crop_height": 3,
        "buffer_size": 1,
        "data_mode": "val",
    });
    std::fs::write(&path, config.to_string())?;

    let pipeline = Pipeline::new(PipelineConfig::from_json_file(&path)?)?;
    pipeline.start()?;
    let batch = pipeline.get_next_batch()?;
    pipeline.stop()?;
    assert_eq!(batch.data.dim(), (36, 2));
    Ok(())
}

#[test]
fn test_missing_catalog_is_configuration_error() -> Result<()> {
    let fixture = Fixture::new(&[1])?;
    std::fs::remove_file(fixture.root().join("catalog.json"))?;

    let err = match Pipeline::new(fixture.config().crop(4, 3).build()) {
        Ok(_) => panic!("pipeline built without a catalog"),
        Err(e) => e,
    };
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::Configuration(_))
    ));
    Ok(())
}

#[test]
fn test_start_twice_fails() -> Result<()> {
    let fixture = Fixture::new(&[2])?;
    let pipeline = Pipeline::new(fixture.config().batch_size(1).crop(4, 3).build())?;
    pipeline.start()?;
    assert!(pipeline.start().is_err());
    pipeline.stop()?;
    Ok(())
}
