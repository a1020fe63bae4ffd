use crate::core::candidates::{RawSimilarityMap, ScoreList};
use image::ImageReader;
use image_hasher::{HashAlg, HasherConfig, ImageHash};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use walkdir::WalkDir;

pub const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"];

#[derive(Debug, Error)]
pub enum SimilarityError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid similarity map {path}: {source}")]
    InvalidMap {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Progress display error: {0}")]
    Progress(#[from] indicatif::style::TemplateError),
}

/// Reports, for each image in a directory, which other images look like it.
pub trait SimilarityProvider {
    fn find_similar(&self, directory: &Path) -> Result<RawSimilarityMap, SimilarityError>;
}

/// Perceptual-hash provider: hashes every top-level image and scores pairs by
/// Hamming distance.
pub struct HashSimilarityProvider {
    hash_alg: HashAlg,
    hash_size: u32,
    min_score: f64,
}

impl HashSimilarityProvider {
    pub fn new(hash_alg: HashAlg, min_score: f64) -> Self {
        Self {
            hash_alg,
            hash_size: 16,
            min_score,
        }
    }

    pub fn with_hash_size(mut self, hash_size: u32) -> Self {
        self.hash_size = hash_size;
        self
    }

    fn hash_images(&self, images: &[PathBuf]) -> Vec<(String, ImageHash)> {
        let hasher = HasherConfig::new()
            .hash_alg(self.hash_alg)
            .hash_size(self.hash_size, self.hash_size)
            .to_hasher();

        images
            .par_iter()
            .filter_map(|path| {
                let img = match ImageReader::open(path).and_then(|r| r.with_guessed_format()) {
                    Ok(reader) => match reader.decode() {
                        Ok(img) => img,
                        Err(e) => {
                            log::warn!("Failed to decode {}: {}", path.display(), e);
                            return None;
                        }
                    },
                    Err(e) => {
                        log::warn!("Failed to open {}: {}", path.display(), e);
                        return None;
                    }
                };
                let name = path.file_name()?.to_string_lossy().into_owned();
                Some((name, hasher.hash_image(&img)))
            })
            .collect()
    }
}

impl SimilarityProvider for HashSimilarityProvider {
    fn find_similar(&self, directory: &Path) -> Result<RawSimilarityMap, SimilarityError> {
        let images = list_images(directory)?;
        log::info!("Hashing {} image(s) in {}", images.len(), directory.display());

        let mut hashes = self.hash_images(&images);
        hashes.sort_by(|a, b| a.0.cmp(&b.0));

        let scored: Vec<(String, Vec<(String, f64)>)> = hashes
            .par_iter()
            .enumerate()
            .map(|(i, (name, hash))| {
                let mut matches: Vec<(String, f64)> = hashes
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, (other, other_hash))| (other.clone(), hash_similarity(hash, other_hash)))
                    .filter(|(_, score)| *score >= self.min_score)
                    .collect();
                matches.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                (name.clone(), matches)
            })
            .collect();

        Ok(scored
            .into_iter()
            .filter(|(_, matches)| !matches.is_empty())
            .map(|(name, matches)| (name, ScoreList::Pairs(matches)))
            .collect())
    }
}

/// Provider backed by a precomputed JSON map, e.g. from an external
/// embedding model. Key order in the file is kept.
pub struct JsonSimilarityProvider {
    path: PathBuf,
}

impl JsonSimilarityProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SimilarityProvider for JsonSimilarityProvider {
    fn find_similar(&self, _directory: &Path) -> Result<RawSimilarityMap, SimilarityError> {
        let text = fs::read_to_string(&self.path)?;
        let map: RawSimilarityMap =
            serde_json::from_str(&text).map_err(|source| SimilarityError::InvalidMap {
                path: self.path.to_string_lossy().to_string(),
                source,
            })?;
        Ok(map.into_iter().filter(|(_, scores)| !scores.is_empty()).collect())
    }
}

/// `1 - distance / bits`, so identical hashes score 1.0.
pub fn hash_similarity(a: &ImageHash, b: &ImageHash) -> f64 {
    let bits = (a.as_bytes().len() * 8).max(1) as f64;
    1.0 - f64::from(a.dist(b)) / bits
}

/// Image files directly inside `dir`, sorted. Subfolders (the archive among
/// them) are not descended into.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, SimilarityError> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message("Scanning for images…");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut images = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if path.is_file() && is_image(path) {
            images.push(path.to_path_buf());
        }
        spinner.tick();
    }
    images.sort();
    spinner.finish_and_clear();
    Ok(images)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn create_test_image(path: &Path, width: u32, height: u32, invert: bool) {
        let img = ImageBuffer::from_fn(width, height, |x, _y| {
            let mut intensity = if x < width / 2 { 20u8 } else { 230u8 };
            if invert {
                intensity = 255 - intensity;
            }
            Rgb([intensity, intensity, intensity])
        });
        img.save(path).unwrap();
    }

    #[test]
    fn test_list_images_is_flat_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("b.JPG"), b"x").unwrap();
        fs::write(dir.join("a.png"), b"x").unwrap();
        fs::write(dir.join("notes.txt"), b"x").unwrap();
        fs::create_dir(dir.join("duplicates_archive")).unwrap();
        fs::write(dir.join("duplicates_archive").join("c.png"), b"x").unwrap();

        let names: Vec<_> = list_images(dir)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.JPG"]);
    }

    #[test]
    fn test_hash_provider_reports_both_directions() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        create_test_image(&dir.join("a.png"), 64, 64, false);
        create_test_image(&dir.join("b.png"), 128, 128, false);
        create_test_image(&dir.join("c.png"), 64, 64, true);

        let provider = HashSimilarityProvider::new(HashAlg::Mean, 0.9);
        let map = provider.find_similar(dir).unwrap();

        let a = map.get("a.png").unwrap().clone().into_pairs();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].0, "b.png");
        assert!(a[0].1 >= 0.9);

        let b = map.get("b.png").unwrap().clone().into_pairs();
        assert_eq!(b[0].0, "a.png");
        assert!(!map.contains_key("c.png"));
    }

    #[test]
    fn test_hash_provider_skips_undecodable_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("broken.jpg"), b"garbage").unwrap();

        let provider = HashSimilarityProvider::new(HashAlg::Gradient, 0.5);
        assert!(provider.find_similar(temp_dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_json_provider_keeps_order_and_drops_empty_lists() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("scores.json");
        fs::write(
            &file,
            r#"{"z.jpg": [["a.jpg", 0.97]], "m.jpg": [], "a.jpg": {"z.jpg": 0.95}}"#,
        )
        .unwrap();

        let map = JsonSimilarityProvider::new(&file)
            .find_similar(temp_dir.path())
            .unwrap();
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["z.jpg", "a.jpg"]);
    }

    #[test]
    fn test_json_provider_rejects_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("scores.json");
        fs::write(&file, "{not json").unwrap();

        let result = JsonSimilarityProvider::new(&file).find_similar(temp_dir.path());
        assert!(matches!(result, Err(SimilarityError::InvalidMap { .. })));
    }
}
