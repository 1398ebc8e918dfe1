use thiserror::Error;

/// Errors raised while synthesizing or exporting the contract document.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("failed to render specification: {0}")]
    Render(#[from] serde_json::Error),

    #[error("failed to serialize specification to YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("docs generation exited with status {status:?}: {output}")]
    DocsGeneration { status: Option<i32>, output: String },
}
