use ndarray::{Array2, ArrayView1};

use super::processor::FrameResult;

/// Name of the synthetic column holding the 1-based frame number.
pub const FRAME_COLUMN: &str = "frame";

/// Columns scaled from pixels to nanometres.
pub fn is_spatial_column(name: &str) -> bool {
    matches!(name, "x" | "y" | "z") || name.starts_with("sigma")
}

/// Column-major localization table for a whole stack.
///
/// `columns` has shape `(n_columns, n_rows)`; row `i` of the table is
/// column `i` of the array.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    headers: Vec<String>,
    columns: Array2<f64>,
}

impl Dataset {
    /// Assemble the table from per-frame results ordered by frame index.
    ///
    /// Spatial columns are multiplied by `pixel_size_nm`; every other column
    /// keeps its native unit.
    pub fn from_frames(fit_headers: &[&str], frames: &[FrameResult], pixel_size_nm: f64) -> Self {
        let n_rows: usize = frames.iter().map(FrameResult::len).sum();
        let mut headers: Vec<String> = fit_headers.iter().map(|h| h.to_string()).collect();
        headers.push(FRAME_COLUMN.to_string());

        let scale: Vec<f64> = fit_headers
            .iter()
            .map(|h| if is_spatial_column(h) { pixel_size_nm } else { 1.0 })
            .collect();
        let frame_col = fit_headers.len();

        let mut columns = Array2::<f64>::zeros((headers.len(), n_rows));
        let mut row = 0;
        for frame in frames {
            for loc in &frame.localizations {
                for (k, s) in scale.iter().enumerate() {
                    let v = loc.params.get(k).copied().unwrap_or(f64::NAN);
                    columns[[k, row]] = v * s;
                }
                columns[[frame_col, row]] = frame.frame_number() as f64;
                row += 1;
            }
        }

        Self { headers, columns }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn n_rows(&self) -> usize {
        self.columns.ncols()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    pub fn columns(&self) -> &Array2<f64> {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        let k = self.headers.iter().position(|h| h == name)?;
        Some(self.columns.row(k))
    }

    /// One localization, in header order.
    pub fn row(&self, index: usize) -> Option<Vec<f64>> {
        (index < self.n_rows()).then(|| self.columns.column(index).to_vec())
    }
}
