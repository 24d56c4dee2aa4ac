use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CckError {
    #[error("Schema mismatch in {context}: missing columns {missing:?}, available columns {available:?}")]
    SchemaMismatch {
        context: String,
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("Numerically degenerate: {0}")]
    NumericDegenerate(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CckError {
    /// Schema error for a table missing required columns.
    pub fn missing_columns(context: &str, missing: &[&str], available: &[String]) -> Self {
        CckError::SchemaMismatch {
            context: context.to_string(),
            missing: missing.iter().map(|s| s.to_string()).collect(),
            available: available.to_vec(),
        }
    }
}

/// Construction-time failures collected across ensembles, rendered as one
/// human-readable message for the plugin-initialization error view.
#[derive(Debug, Default)]
pub struct InitializationErrors(pub Vec<String>);

impl InitializationErrors {
    pub fn push(&mut self, message: String) {
        self.0.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for InitializationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Plugin initialization failed:")?;
        for message in &self.0 {
            writeln!(f, "  - {message}")?;
        }
        Ok(())
    }
}
