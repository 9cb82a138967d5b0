//! Screenshot storage and visual comparison
//!
//! Screenshots taken by spec steps land in the actual/ directory; approved
//! references live in baselines/. Comparison is a SHA-256 fast path
//! followed by a per-pixel diff with a small channel tolerance for
//! anti-aliasing and PNG encoder differences.

use std::path::{Path, PathBuf};

use image::{GenericImageView, Pixel, Rgba, RgbaImage};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// Channel delta below which two pixels count as equal
const PIXEL_TOLERANCE: i32 = 5;

/// Result of comparing a screenshot against its baseline
#[derive(Debug, Clone)]
pub struct SnapshotDiff {
    /// Whether the images match within the threshold
    pub matches: bool,

    /// Percentage of pixels that differ
    pub diff_percent: f64,

    /// Number of differing pixels
    pub diff_pixels: u64,

    /// Total pixels compared
    pub total_pixels: u64,

    /// Path to the generated diff image, if any pixels differ
    pub diff_image_path: Option<PathBuf>,
}

/// Configuration for snapshot storage
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub baseline_dir: PathBuf,
    pub actual_dir: PathBuf,
    pub diff_dir: PathBuf,
    pub threshold: f64,
    pub auto_update: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            baseline_dir: PathBuf::from("test-results/baselines"),
            actual_dir: PathBuf::from("test-results/screenshots"),
            diff_dir: PathBuf::from("test-results/diffs"),
            threshold: 0.5,
            auto_update: false,
        }
    }
}

/// Screenshot store with baseline comparison
pub struct SnapshotStore {
    baseline_dir: PathBuf,
    actual_dir: PathBuf,
    diff_dir: PathBuf,
    threshold: f64,
    auto_update: bool,
}

impl SnapshotStore {
    pub fn new(config: SnapshotConfig) -> E2eResult<Self> {
        std::fs::create_dir_all(&config.baseline_dir)?;
        std::fs::create_dir_all(&config.actual_dir)?;
        std::fs::create_dir_all(&config.diff_dir)?;

        Ok(Self {
            baseline_dir: config.baseline_dir,
            actual_dir: config.actual_dir,
            diff_dir: config.diff_dir,
            threshold: config.threshold,
            auto_update: config.auto_update,
        })
    }

    /// Compare a named screenshot against its baseline
    pub fn compare(&self, name: &str, threshold: Option<f64>) -> E2eResult<SnapshotDiff> {
        let threshold = threshold.unwrap_or(self.threshold);

        let actual_path = self.actual_dir.join(format!("{}.png", name));
        let baseline_path = self.baseline_dir.join(format!("{}.png", name));

        if !actual_path.exists() {
            return Err(E2eError::Spec(format!(
                "screenshot '{}' was never captured: {}",
                name,
                actual_path.display()
            )));
        }

        if !baseline_path.exists() {
            if self.auto_update {
                info!("Creating baseline for '{}'", name);
                std::fs::copy(&actual_path, &baseline_path)?;
                return Ok(SnapshotDiff {
                    matches: true,
                    diff_percent: 0.0,
                    diff_pixels: 0,
                    total_pixels: 0,
                    diff_image_path: None,
                });
            }
            return Err(E2eError::BaselineNotFound(
                baseline_path.to_string_lossy().to_string(),
            ));
        }

        // Hash fast path: byte-identical files need no pixel walk
        if hash_file(&actual_path)? == hash_file(&baseline_path)? {
            debug!("Screenshots for '{}' are byte-identical", name);
            let img = image::open(&actual_path)?;
            let total = (img.width() as u64) * (img.height() as u64);
            return Ok(SnapshotDiff {
                matches: true,
                diff_percent: 0.0,
                diff_pixels: 0,
                total_pixels: total,
                diff_image_path: None,
            });
        }

        let actual = image::open(&actual_path)?;
        let baseline = image::open(&baseline_path)?;

        if actual.dimensions() != baseline.dimensions() {
            warn!(
                "Screenshot dimensions differ for '{}': actual {:?} vs baseline {:?}",
                name,
                actual.dimensions(),
                baseline.dimensions()
            );
        }

        let (diff_pixels, total_pixels, diff_img) =
            diff_images(&actual.to_rgba8(), &baseline.to_rgba8());

        let diff_percent = if total_pixels == 0 {
            0.0
        } else {
            (diff_pixels as f64 / total_pixels as f64) * 100.0
        };
        let matches = diff_percent <= threshold;

        let diff_image_path = if diff_pixels > 0 {
            let path = self.diff_dir.join(format!("{}-diff.png", name));
            diff_img.save(&path)?;
            Some(path)
        } else {
            None
        };

        if !matches {
            warn!(
                "Visual regression in '{}': {:.2}% pixels differ (threshold: {:.2}%)",
                name, diff_percent, threshold
            );
        }

        Ok(SnapshotDiff {
            matches,
            diff_percent,
            diff_pixels,
            total_pixels,
            diff_image_path,
        })
    }

    /// Promote the actual screenshot to baseline
    pub fn update_baseline(&self, name: &str) -> E2eResult<()> {
        let actual_path = self.actual_dir.join(format!("{}.png", name));
        let baseline_path = self.baseline_dir.join(format!("{}.png", name));

        if !actual_path.exists() {
            return Err(E2eError::Spec(format!(
                "cannot update baseline '{}': no actual screenshot at {}",
                name,
                actual_path.display()
            )));
        }

        std::fs::copy(&actual_path, &baseline_path)?;
        info!("Updated baseline for '{}'", name);
        Ok(())
    }

    /// Promote every captured screenshot to baseline
    pub fn update_all_baselines(&self) -> E2eResult<()> {
        for name in png_stems(&self.actual_dir)? {
            self.update_baseline(&name)?;
        }
        Ok(())
    }

    /// List all baseline names
    pub fn list_baselines(&self) -> E2eResult<Vec<String>> {
        png_stems(&self.baseline_dir)
    }

    /// Remove stale diff images from previous runs
    pub fn clean_diffs(&self) -> E2eResult<()> {
        for entry in std::fs::read_dir(&self.diff_dir)? {
            let entry = entry?;
            std::fs::remove_file(entry.path())?;
        }
        Ok(())
    }
}

/// Per-pixel comparison over the overlapping region. Returns the count of
/// differing pixels, the total pixel count of the actual image, and a diff
/// image with differing pixels marked red and matching ones dimmed.
fn diff_images(actual: &RgbaImage, baseline: &RgbaImage) -> (u64, u64, RgbaImage) {
    let (width, height) = actual.dimensions();
    let mut diff_img = RgbaImage::new(width, height);
    let mut diff_pixels = 0u64;
    let total_pixels = (width as u64) * (height as u64);

    for y in 0..height.min(baseline.height()) {
        for x in 0..width.min(baseline.width()) {
            let a = actual.get_pixel(x, y);
            let b = baseline.get_pixel(x, y);

            if pixels_differ(a, b) {
                diff_pixels += 1;
                diff_img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            } else {
                let c = a.channels();
                diff_img.put_pixel(x, y, Rgba([c[0] / 2, c[1] / 2, c[2] / 2, 128]));
            }
        }
    }

    (diff_pixels, total_pixels, diff_img)
}

fn pixels_differ(a: &Rgba<u8>, b: &Rgba<u8>) -> bool {
    let a = a.channels();
    let b = b.channels();

    for i in 0..4 {
        if (a[i] as i32 - b[i] as i32).abs() > PIXEL_TOLERANCE {
            return true;
        }
    }
    false
}

fn hash_file(path: &Path) -> E2eResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn png_stems(dir: &Path) -> E2eResult<Vec<String>> {
    let mut names = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.extension().map(|e| e == "png").unwrap_or(false) {
            if let Some(name) = path.file_stem() {
                names.push(name.to_string_lossy().to_string());
            }
        }
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(root: &Path, threshold: f64, auto_update: bool) -> SnapshotStore {
        SnapshotStore::new(SnapshotConfig {
            baseline_dir: root.join("baselines"),
            actual_dir: root.join("actual"),
            diff_dir: root.join("diffs"),
            threshold,
            auto_update,
        })
        .unwrap()
    }

    fn solid_image(w: u32, h: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(color))
    }

    #[test]
    fn test_identical_images_match() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), 0.5, false);

        let img = solid_image(4, 4, [10, 20, 30, 255]);
        img.save(dir.path().join("actual/landing.png")).unwrap();
        img.save(dir.path().join("baselines/landing.png")).unwrap();

        let diff = store.compare("landing", None).unwrap();
        assert!(diff.matches);
        assert_eq!(diff.diff_pixels, 0);
    }

    #[test]
    fn test_single_changed_pixel_counted() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), 0.5, false);

        let baseline = solid_image(4, 4, [10, 20, 30, 255]);
        let mut actual = baseline.clone();
        actual.put_pixel(0, 0, Rgba([200, 20, 30, 255]));

        actual.save(dir.path().join("actual/landing.png")).unwrap();
        baseline.save(dir.path().join("baselines/landing.png")).unwrap();

        // 1 of 16 pixels = 6.25%, above the 0.5% threshold
        let diff = store.compare("landing", None).unwrap();
        assert!(!diff.matches);
        assert_eq!(diff.diff_pixels, 1);
        assert_eq!(diff.total_pixels, 16);
        assert!(diff.diff_image_path.is_some());
    }

    #[test]
    fn test_tolerance_absorbs_small_deltas() {
        let a = Rgba([100, 100, 100, 255]);
        let b = Rgba([103, 98, 100, 255]);
        assert!(!pixels_differ(&a, &b));

        let c = Rgba([110, 100, 100, 255]);
        assert!(pixels_differ(&a, &c));
    }

    #[test]
    fn test_missing_baseline_is_error_without_auto_update() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), 0.5, false);

        solid_image(2, 2, [0, 0, 0, 255])
            .save(dir.path().join("actual/new.png"))
            .unwrap();

        match store.compare("new", None) {
            Err(E2eError::BaselineNotFound(_)) => {}
            other => panic!("expected BaselineNotFound, got {:?}", other.map(|d| d.matches)),
        }
    }

    #[test]
    fn test_auto_update_creates_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), 0.5, true);

        solid_image(2, 2, [0, 0, 0, 255])
            .save(dir.path().join("actual/new.png"))
            .unwrap();

        let diff = store.compare("new", None).unwrap();
        assert!(diff.matches);
        assert!(dir.path().join("baselines/new.png").exists());
        assert_eq!(store.list_baselines().unwrap(), vec!["new".to_string()]);
    }
}
