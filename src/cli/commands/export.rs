//! Export command implementation.

use crate::cli::preflight;
use crate::cli::Output;
use crate::config::Settings;
use crate::error::Result as CoachResult;
use crate::rag::IndexLoader;
use crate::vector_store::LoadedPair;
use anyhow::Result;
use std::io::Write;

/// Run the export command.
pub async fn run_export(selector: &str, output: Option<String>, settings: Settings) -> Result<()> {
    preflight::check_selector(&settings, selector)?;

    let loader = IndexLoader::new(&settings);
    let agent = loader.load(selector).await?;

    match output {
        Some(path) => {
            let path = Settings::expand_path(&path);
            let file = std::fs::File::create(&path)?;
            let rows = write_embeddings_csv(file, &agent.pair)?;
            Output::success(&format!("Exported {} rows to {}", rows, path.display()));
        }
        None => {
            let stdout = std::io::stdout();
            write_embeddings_csv(stdout.lock(), &agent.pair)?;
        }
    }

    Ok(())
}

/// Write one `Filename,Text,Dim_0..` row per index entry. Returns the row count.
pub fn write_embeddings_csv<W: Write>(writer: W, pair: &LoadedPair) -> CoachResult<usize> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec!["Filename".to_string(), "Text".to_string()];
    header.extend((0..pair.index.dimension()).map(|i| format!("Dim_{}", i)));
    csv.write_record(&header)?;

    for (record, vector) in pair.metadata.iter().zip(pair.index.vectors()) {
        let mut row = Vec::with_capacity(vector.len() + 2);
        row.push(record.filename.clone());
        row.push(record.text.clone());
        row.extend(vector.iter().map(|v| v.to_string()));
        csv.write_record(&row)?;
    }

    csv.flush()?;
    Ok(pair.metadata.len())
}
