//! Overlay assets ("artverts") and their selection.
//!
//! The catalog is built once at startup, validated, and never mutated. It is
//! either loaded from a JSON manifest or built from the default set of five
//! `artvertN.png` files. Selection is a bounds-checked cyclic index.

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Descriptive fields shown on the label overlay, in display order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct OverlayMetadata {
    pub title: String,
    pub date: String,
    pub author: String,
    pub client: String,
    pub location: String,
}

impl OverlayMetadata {
    /// Label lines, top to bottom: title, date, author, client, location.
    pub fn lines(&self) -> [&str; 5] {
        [
            self.title.as_str(),
            self.date.as_str(),
            self.author.as_str(),
            self.client.as_str(),
            self.location.as_str(),
        ]
    }
}

pub struct OverlayAsset {
    pub metadata: OverlayMetadata,
    pub image: RgbaImage,
}

impl std::fmt::Debug for OverlayAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayAsset")
            .field("metadata", &self.metadata)
            .field("dimensions", &self.image.dimensions())
            .finish()
    }
}

/// Immutable, non-empty list of overlay assets.
#[derive(Debug)]
pub struct OverlayCatalog {
    assets: Vec<OverlayAsset>,
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    overlays: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    image: PathBuf,
    #[serde(flatten)]
    metadata: OverlayMetadata,
}

impl OverlayCatalog {
    pub fn new(assets: Vec<OverlayAsset>) -> Result<Self> {
        if assets.is_empty() {
            return Err(anyhow!("overlay catalog must hold at least one asset"));
        }
        for (index, asset) in assets.iter().enumerate() {
            let (w, h) = asset.image.dimensions();
            if w == 0 || h == 0 {
                return Err(anyhow!(
                    "overlay {} ({}) has an empty image",
                    index,
                    asset.metadata.title
                ));
            }
        }
        Ok(Self { assets })
    }

    /// Load a JSON manifest: `{"overlays": [{"image": "...", "title": "...", ...}]}`.
    /// Image paths are relative to the manifest's directory.
    pub fn from_manifest(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read overlay manifest {}: {}", path.display(), e))?;
        let manifest: ManifestFile = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid overlay manifest {}: {}", path.display(), e))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let assets = manifest
            .overlays
            .into_iter()
            .map(|entry| {
                let image_path = base.join(&entry.image);
                Ok(OverlayAsset {
                    image: load_rgba(&image_path)?,
                    metadata: entry.metadata,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(assets)
    }

    /// The default five-asset catalog, images read from `dir`.
    pub fn default_set(dir: &Path) -> Result<Self> {
        let assets = default_metadata()
            .into_iter()
            .enumerate()
            .map(|(i, metadata)| {
                let image_path = dir.join(format!("artvert{}.png", i + 1));
                Ok(OverlayAsset {
                    image: load_rgba(&image_path)?,
                    metadata,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(assets)
    }

    /// A one-asset catalog for a single still image.
    pub fn single(path: &Path) -> Result<Self> {
        let title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        Self::new(vec![OverlayAsset {
            image: load_rgba(path)?,
            metadata: OverlayMetadata {
                title,
                ..OverlayMetadata::default()
            },
        }])
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&OverlayAsset> {
        self.assets.get(index)
    }

    pub fn selected(&self, selector: &OverlaySelector) -> Option<&OverlayAsset> {
        self.assets.get(selector.index())
    }
}

fn load_rgba(path: &Path) -> Result<RgbaImage> {
    let img = image::open(path).with_context(|| format!("failed to load overlay {}", path.display()))?;
    Ok(img.to_rgba8())
}

fn default_metadata() -> Vec<OverlayMetadata> {
    let entry = |title: &str, date: &str, author: &str, client: &str, location: &str| {
        OverlayMetadata {
            title: title.to_string(),
            date: date.to_string(),
            author: author.to_string(),
            client: client.to_string(),
            location: location.to_string(),
        }
    };
    vec![
        entry("Arrebato, 1980", "Feb, 2009", "Iván Zulueta", "Polo", "Madrid, Spain"),
        entry("name2", "2008", "simon innings", "Helmut Lang", "Parlance Avenue"),
        entry("name3", "2008", "simon innings", "Loreal", "Parlance Avenue"),
        entry("name4", "2008", "simon innings", "Hugo Boss", "Parlance Avenue"),
        entry("name5", "2008", "simon innings", "Burger King", "Parlance Avenue"),
    ]
}

/// Cyclic index over a catalog of fixed length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlaySelector {
    index: usize,
    len: usize,
}

impl OverlaySelector {
    pub fn new(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(anyhow!("overlay selector needs a non-empty catalog"));
        }
        Ok(Self { index: 0, len })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Advance, wrapping to 0 after the last asset.
    pub fn next(&mut self) -> usize {
        self.index = (self.index + 1) % self.len;
        self.index
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    pub fn select(&mut self, index: usize) -> Result<()> {
        if index >= self.len {
            return Err(anyhow!(
                "overlay index {} out of range ({} assets)",
                index,
                self.len
            ));
        }
        self.index = index;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn asset(title: &str) -> OverlayAsset {
        OverlayAsset {
            metadata: OverlayMetadata {
                title: title.to_string(),
                ..OverlayMetadata::default()
            },
            image: RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])),
        }
    }

    #[test]
    fn next_cycles_back_to_start() -> Result<()> {
        let mut selector = OverlaySelector::new(5)?;
        for _ in 0..5 {
            selector.next();
        }
        assert_eq!(selector.index(), 0);
        Ok(())
    }

    #[test]
    fn select_is_bounds_checked() -> Result<()> {
        let mut selector = OverlaySelector::new(3)?;
        selector.select(2)?;
        assert_eq!(selector.index(), 2);
        assert!(selector.select(3).is_err());
        assert_eq!(selector.index(), 2);
        selector.reset();
        assert_eq!(selector.index(), 0);
        Ok(())
    }

    #[test]
    fn empty_catalog_is_rejected() {
        assert!(OverlayCatalog::new(vec![]).is_err());
        assert!(OverlaySelector::new(0).is_err());
    }

    #[test]
    fn empty_image_is_rejected() {
        let bad = OverlayAsset {
            metadata: OverlayMetadata::default(),
            image: RgbaImage::new(0, 0),
        };
        assert!(OverlayCatalog::new(vec![asset("ok"), bad]).is_err());
    }

    #[test]
    fn manifest_resolves_images_relative_to_itself() -> Result<()> {
        let dir = tempfile::tempdir()?;
        RgbaImage::from_pixel(8, 8, Rgba([0, 255, 0, 255])).save(dir.path().join("one.png"))?;
        let manifest = dir.path().join("overlays.json");
        fs::write(
            &manifest,
            r#"{"overlays": [{"image": "one.png", "title": "One", "date": "2009",
                "author": "A", "client": "C", "location": "L"}]}"#,
        )?;
        let catalog = OverlayCatalog::from_manifest(&manifest)?;
        assert_eq!(catalog.len(), 1);
        let lines = catalog.get(0).unwrap().metadata.lines();
        assert_eq!(lines, ["One", "2009", "A", "C", "L"]);
        Ok(())
    }

    #[test]
    fn default_set_needs_five_images() -> Result<()> {
        let dir = tempfile::tempdir()?;
        for i in 1..=5 {
            RgbaImage::new(2, 2).save(dir.path().join(format!("artvert{}.png", i)))?;
        }
        let catalog = OverlayCatalog::default_set(dir.path())?;
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.get(0).unwrap().metadata.client, "Polo");

        fs::remove_file(dir.path().join("artvert3.png"))?;
        assert!(OverlayCatalog::default_set(dir.path()).is_err());
        Ok(())
    }
}
