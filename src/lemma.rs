use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ProcessError;

/// Texts per request; the service normalizes each text independently, so
/// chunking only bounds payload size.
const CHUNK_SIZE: usize = 100;

#[derive(Serialize)]
struct LemmaRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct LemmaResponse {
    lemmas: Vec<String>,
}

/// Lemmatize the ordered corpus of description texts.
///
/// The reply must line up one-to-one with the inputs. Every downstream
/// field is joined back by position, so a count mismatch aborts the run
/// instead of silently corrupting it.
pub async fn lemmatize_corpus(
    client: &reqwest::Client,
    url: &str,
    texts: &[String],
) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(CHUNK_SIZE) {
        let response: LemmaResponse = client
            .post(url)
            .json(&LemmaRequest { texts: chunk })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("Failed to read lemmatizer response")?;

        if response.lemmas.len() != chunk.len() {
            return Err(ProcessError::LemmaCountMismatch {
                sent: chunk.len(),
                received: response.lemmas.len(),
            }
            .into());
        }
        out.extend(response.lemmas);
    }
    info!(texts = texts.len(), "Lemmatized corpus");
    Ok(out)
}
