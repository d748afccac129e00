//! Chart rendering port.

use std::path::Path;

use crate::domain::error::YieldtraderError;
use crate::domain::performance::ChartData;

pub trait ChartPort {
    /// Render `chart` to `output_path`.
    fn render(&self, chart: &ChartData, output_path: &Path) -> Result<(), YieldtraderError>;
}
