//! Region of interest: the quadrilateral in model-image pixels that overlays
//! are mapped onto.
//!
//! The ROI file sits next to the model image (`<model>.roi`). It is read line
//! by line; tokens are separated by whitespace or commas, non-numeric tokens
//! are dropped, and all values are flattened into one list. The first eight
//! values are four `(x, y)` corners in declaration order.
//!
//! Corner winding is taken as given. A short file yields fewer than four
//! corners; that is reported, not repaired.

use anyhow::Result;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::geometry::Point2;

pub const ROI_SUFFIX: &str = ".roi";

/// Corner points of the overlay quad, in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Roi {
    points: Vec<Point2>,
}

/// `<model path>.roi`
pub fn roi_path(model_path: &Path) -> PathBuf {
    let mut name = model_path.as_os_str().to_os_string();
    name.push(ROI_SUFFIX);
    PathBuf::from(name)
}

/// Flatten all integer tokens of `text`, in order.
pub fn parse_values(text: &str) -> Vec<i32> {
    text.lines()
        .flat_map(|line| line.split(|c: char| c.is_whitespace() || c == ','))
        .filter(|token| !token.is_empty())
        .filter_map(|token| token.parse::<i32>().ok())
        .collect()
}

/// Parse ROI text: pairs from the first eight values.
pub fn parse_roi(text: &str) -> Roi {
    let values = parse_values(text);
    let points = values
        .chunks_exact(2)
        .take(4)
        .map(|pair| Point2::new(pair[0] as f64, pair[1] as f64))
        .collect();
    Roi { points }
}

impl Roi {
    pub fn from_points(points: Vec<Point2>) -> Self {
        Self { points }
    }

    /// Load the ROI file. A missing file yields an empty ROI and a warning.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => {
                let roi = parse_roi(&text);
                if !roi.is_complete() {
                    log::warn!(
                        "roi file {} holds {} corners, expected 4",
                        path.display(),
                        roi.points.len()
                    );
                }
                Ok(roi)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::warn!("roi file not found: {}", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read roi file {}: {}", path.display(), e)),
        }
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    pub fn is_complete(&self) -> bool {
        self.points.len() == 4
    }

    /// The four corners, when the file supplied all of them.
    pub fn corners(&self) -> Option<[Point2; 4]> {
        match self.points.as_slice() {
            [a, b, c, d] => Some([*a, *b, *c, *d]),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eight_integers_become_four_ordered_points() {
        let roi = parse_roi("10 20\n30 40\n50 60\n70 80\n");
        assert_eq!(
            roi.points(),
            &[
                Point2::new(10.0, 20.0),
                Point2::new(30.0, 40.0),
                Point2::new(50.0, 60.0),
                Point2::new(70.0, 80.0),
            ]
        );
        assert!(roi.is_complete());
    }

    #[test]
    fn commas_and_junk_tokens_are_tolerated() {
        let values = parse_values("12, 34 abc\n56,78\n\n x 9 10 11 12 13");
        assert_eq!(values, vec![12, 34, 56, 78, 9, 10, 11, 12, 13]);
        let roi = parse_roi("12, 34 abc\n56,78\n\n x 9 10 11 12 13");
        assert_eq!(roi.points().len(), 4);
        assert_eq!(roi.points()[3], Point2::new(11.0, 12.0));
    }

    #[test]
    fn six_values_yield_three_points() {
        let roi = parse_roi("1 2 3 4 5 6");
        assert_eq!(roi.points().len(), 3);
        assert!(roi.corners().is_none());
    }

    #[test]
    fn roi_path_appends_suffix() {
        assert_eq!(roi_path(Path::new("data/model.bmp")), PathBuf::from("data/model.bmp.roi"));
    }

    #[test]
    fn missing_file_is_an_empty_roi() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let roi = Roi::load(&dir.path().join("absent.roi"))?;
        assert!(roi.points().is_empty());
        Ok(())
    }

    #[test]
    fn load_reads_file_contents() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("model.png.roi");
        fs::write(&path, "0 0 100 0\n100 50 0 50\n")?;
        let roi = Roi::load(&path)?;
        assert_eq!(roi.corners().unwrap()[2], Point2::new(100.0, 50.0));
        Ok(())
    }
}
