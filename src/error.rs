use thiserror::Error;

/// Structural pipeline errors. Both variants abort the run: continuing past
/// either would silently corrupt the output dataset.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("no exchange rate for currency code '{code}'")]
    UnknownCurrency { code: String },

    #[error("lemmatizer returned {received} texts for {sent} inputs")]
    LemmaCountMismatch { sent: usize, received: usize },
}
