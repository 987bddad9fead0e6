use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to read header row: {0}")]
    Header(#[source] csv::Error),
    #[error("missing required column `{0}`")]
    MissingColumn(&'static str),
    #[error("row {row}: {source}")]
    Row { row: usize, source: csv::Error },
    #[error("row {row}: invalid {column} value `{value}`")]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
    },
}

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("chart directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("drawing failed: {0}")]
    Draw(String),
}

impl<E> From<plotters::drawing::DrawingAreaErrorKind<E>> for ChartError
where
    E: std::error::Error + Send + Sync,
{
    fn from(e: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        ChartError::Draw(e.to_string())
    }
}
