// Corpus persistence as pretty-printed JSON

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::Context;

use super::CorpusIndex;

/// Write the merged corpus to `path`, creating parent directories.
pub fn save_corpus(index: &CorpusIndex, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to create corpus file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, index)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    log::info!("Saved {} works to {}", index.len(), path.display());
    Ok(())
}

/// Read a corpus written by [`save_corpus`].
pub fn load_corpus(path: &Path) -> anyhow::Result<CorpusIndex> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open corpus file {}", path.display()))?;
    let index = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse corpus file {}", path.display()))?;
    Ok(index)
}
