mod test_helpers;

use fuzzy_clahe::batch::{try_decode, BatchDriver, FileOutcome, PlannedAction};
use fuzzy_clahe::errors::AppError;
use image::ImageFormat;
use std::fs;
use std::path::{Path, PathBuf};
use test_helpers::{small_config, write_png, write_text, TestTree};

#[cfg(test)]
mod tests {
    use super::*;

    /// Images are enhanced into the mirrored tree, other files are moved there
    #[tokio::test]
    async fn test_batch_mirrors_tree() {
        let tree = TestTree::new();
        write_png(&tree.source().join("train/XR_HAND/patient1/image1.png"), 40, 30);
        write_text(&tree.source().join("train/XR_HAND/patient1/labels.txt"), "positive");
        write_text(&tree.source().join("README"), "MURA subset");

        let driver = BatchDriver::new(&small_config(32));
        let report = driver.run(tree.source(), &tree.dest()).await.unwrap();

        assert_eq!(report.enhanced, 1);
        assert_eq!(report.relocated, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(report.skipped, 0);
        assert!(!report.has_failures());

        // Enhanced image at the mirrored path, in the working size
        let enhanced = try_decode(&tree.dest().join("train/XR_HAND/patient1/image1.png")).unwrap();
        assert_eq!(enhanced.format, ImageFormat::Png);
        assert_eq!((enhanced.image.width(), enhanced.image.height()), (32, 32));

        // Source image untouched
        assert!(tree.source().join("train/XR_HAND/patient1/image1.png").exists());

        // Non-images moved unchanged
        let moved = tree.dest().join("train/XR_HAND/patient1/labels.txt");
        assert_eq!(fs::read_to_string(moved).unwrap(), "positive");
        assert!(!tree.source().join("train/XR_HAND/patient1/labels.txt").exists());
        assert_eq!(fs::read_to_string(tree.dest().join("README")).unwrap(), "MURA subset");
    }

    /// Files with an image extension but no decodable content are relocated
    #[tokio::test]
    async fn test_undecodable_image_is_relocated() {
        let tree = TestTree::new();
        write_text(&tree.source().join("broken.png"), "");
        write_text(&tree.source().join("truncated.png"), "\u{89}PNG");

        let driver = BatchDriver::new(&small_config(16));
        let report = driver.run(tree.source(), &tree.dest()).await.unwrap();

        assert_eq!(report.relocated, 2);
        assert_eq!(report.enhanced, 0);
        assert!(tree.dest().join("broken.png").exists());
        assert!(tree.dest().join("truncated.png").exists());
    }

    /// Cancelling before the run starts skips every file
    #[tokio::test]
    async fn test_cancel_before_start_skips_all() {
        let tree = TestTree::new();
        write_png(&tree.source().join("a.png"), 20, 20);
        write_text(&tree.source().join("b.txt"), "notes");

        let driver = BatchDriver::new(&small_config(16));
        driver.cancellation_token().cancel();
        let report = driver.run(tree.source(), &tree.dest()).await.unwrap();

        assert_eq!(report.skipped, 2);
        assert_eq!(report.enhanced + report.relocated + report.failed, 0);
        assert!(report.files.iter().all(|r| r.outcome == FileOutcome::Skipped));
        assert!(tree.source().join("b.txt").exists());
        assert!(!tree.dest().join("a.png").exists());
    }

    /// A dry run plans every file and leaves both trees untouched
    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let tree = TestTree::new();
        write_png(&tree.source().join("scans/a.png"), 20, 20);
        write_text(&tree.source().join("scans/b.txt"), "notes");

        let mut config = small_config(16);
        config.batch.dry_run = true;
        let report = BatchDriver::new(&config)
            .run(tree.source(), &tree.dest())
            .await
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.planned, 2);
        assert!(!tree.dest().exists());
        assert!(tree.source().join("scans/b.txt").exists());

        let actions: Vec<_> = report
            .files
            .iter()
            .map(|record| record.outcome.clone())
            .collect();
        assert_eq!(
            actions,
            vec![
                FileOutcome::Planned {
                    action: PlannedAction::Enhance
                },
                FileOutcome::Planned {
                    action: PlannedAction::Relocate
                },
            ]
        );
    }

    /// A single worker processes the same tree to the same result
    #[tokio::test]
    async fn test_single_worker_matches_pool() {
        let pooled = TestTree::new();
        let serial = TestTree::new();
        for tree in [&pooled, &serial] {
            for i in 0..4 {
                write_png(&tree.source().join(format!("img{}.png", i)), 25 + i, 18);
            }
        }

        let pooled_config = small_config(16);
        let mut serial_config = small_config(16);
        serial_config.batch.workers = 1;

        BatchDriver::new(&pooled_config)
            .run(pooled.source(), &pooled.dest())
            .await
            .unwrap();
        let report = BatchDriver::new(&serial_config)
            .run(serial.source(), &serial.dest())
            .await
            .unwrap();
        assert_eq!(report.enhanced, 4);

        for i in 0..4 {
            let name = format!("img{}.png", i);
            let a = try_decode(&pooled.dest().join(&name)).unwrap().image;
            let b = try_decode(&serial.dest().join(&name)).unwrap().image;
            assert_eq!(a.to_luma8(), b.to_luma8());
        }
    }

    /// The JSON report lists every file with its outcome
    #[tokio::test]
    async fn test_report_written_as_json() {
        let tree = TestTree::new();
        write_png(&tree.source().join("a.png"), 20, 20);
        write_text(&tree.source().join("b.txt"), "notes");

        let report = BatchDriver::new(&small_config(16))
            .run(tree.source(), &tree.dest())
            .await
            .unwrap();
        let report_path = tree.dest_dir.path().join("report.json");
        report.write_json(&report_path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(report_path).unwrap()).unwrap();
        assert_eq!(json["enhanced"], 1);
        assert_eq!(json["relocated"], 1);
        assert_eq!(json["files"].as_array().unwrap().len(), 2);
        assert_eq!(json["files"][0]["outcome"], "enhanced");
        assert_eq!(json["files"][1]["outcome"], "relocated");
        assert!(json["started_at"].is_string());
    }

    /// Source and destination must be different directories
    #[tokio::test]
    async fn test_same_roots_rejected() {
        let tree = TestTree::new();
        let driver = BatchDriver::new(&small_config(16));
        assert!(matches!(
            driver.run(tree.source(), tree.source()).await,
            Err(AppError::Validation(_))
        ));
    }

    /// A leading `./` does not hide that both roots are the same directory
    #[tokio::test]
    async fn test_same_roots_with_leading_curdir_rejected() {
        let dir = tempfile::Builder::new()
            .prefix("fce-roots")
            .tempdir_in(".")
            .unwrap();
        let name = PathBuf::from(dir.path().file_name().unwrap());
        let image = name.join("scan.png");
        write_png(&image, 20, 20);
        let original = fs::read(&image).unwrap();

        let driver = BatchDriver::new(&small_config(8));
        let result = driver.run(&name, &Path::new(".").join(&name)).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(fs::read(&image).unwrap(), original);
    }

    /// A `..` detour back into the source is the same directory
    #[tokio::test]
    async fn test_same_roots_through_parent_dir_rejected() {
        let tree = TestTree::new();
        write_text(&tree.source().join("notes.txt"), "keep me");
        let name = tree.source().file_name().unwrap().to_owned();
        let detour = tree.source().join("..").join(name);

        let driver = BatchDriver::new(&small_config(8));
        let result = driver.run(tree.source(), &detour).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(
            fs::read_to_string(tree.source().join("notes.txt")).unwrap(),
            "keep me"
        );
    }

    /// A destination inside the source, reached through `..`, is not walked again
    #[tokio::test]
    async fn test_nested_destination_through_parent_dir_not_reprocessed() {
        let tree = TestTree::new();
        write_png(&tree.source().join("scan.png"), 20, 20);
        let name = tree.source().file_name().unwrap().to_owned();
        let dest = tree.source().join("..").join(name).join("out");

        let driver = BatchDriver::new(&small_config(8));
        let first = driver.run(tree.source(), &dest).await.unwrap();
        let second = driver.run(tree.source(), &dest).await.unwrap();

        assert_eq!(first.enhanced, 1);
        assert_eq!(second.total_files(), 1);
        assert_eq!(second.enhanced, 1);
        assert!(tree.source().join("out/scan.png").exists());
        assert!(!tree.source().join("out/out").exists());
    }
}
