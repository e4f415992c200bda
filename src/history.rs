use crate::error::StoreError;
use crate::i18n::{Language, Msg};
use crate::speedtest::Measurement;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

/// Append-only session history, mirrored to a JSON file after every change.
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
    measurements: Vec<Measurement>,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            measurements: Vec::new(),
        }
    }

    /// Reads a previously persisted snapshot. A missing file is an empty history.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let measurements = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        Ok(Self { path, measurements })
    }

    /// Renames an unreadable snapshot to `<path>.bad` so the next write cannot
    /// replace it. Returns the new location.
    pub fn set_aside(path: &Path) -> Result<PathBuf, StoreError> {
        let mut name = path.as_os_str().to_owned();
        name.push(".bad");
        let target = PathBuf::from(name);
        fs::rename(path, &target).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(target)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn all(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn latest(&self) -> Option<&Measurement> {
        self.measurements.last()
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn append(&mut self, measurement: Measurement) {
        self.measurements.push(measurement);
    }

    /// Appends and persists. If the write fails the append is undone, so the
    /// in-memory history never runs ahead of the file.
    pub fn record(&mut self, measurement: Measurement) -> Result<(), StoreError> {
        self.append(measurement);
        if let Err(e) = self.persist() {
            self.measurements.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Overwrites the snapshot file with the whole history.
    pub fn persist(&self) -> Result<(), StoreError> {
        write_file(&self.path, |out| Ok(serde_json::to_writer(out, &self.measurements)?))
    }

    /// Writes the whole history to `path`. Nothing is written for an empty history.
    pub fn export(&self, format: ExportFormat, path: &Path, lang: Language) -> Result<(), StoreError> {
        if self.is_empty() {
            return Err(StoreError::NoData);
        }
        write_file(path, |out| self.export_to(format, out, lang))?;
        log::info!("exported {} results to {}", self.len(), path.display());
        Ok(())
    }

    pub fn export_to<W: Write>(&self, format: ExportFormat, writer: W, lang: Language) -> Result<(), StoreError> {
        if self.is_empty() {
            return Err(StoreError::NoData);
        }
        match format {
            ExportFormat::Csv => self.write_csv(writer, lang),
            ExportFormat::Json => Ok(serde_json::to_writer_pretty(writer, &self.measurements)?),
        }
    }

    fn write_csv<W: Write>(&self, writer: W, lang: Language) -> Result<(), StoreError> {
        let mut wtr = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);

        wtr.write_record([
            lang.text(Msg::DownloadSeries),
            lang.text(Msg::UploadSeries),
            lang.text(Msg::PingColumn),
        ])?;
        for m in &self.measurements {
            wtr.write_record([
                m.download_mbps.to_string(),
                m.upload_mbps.to_string(),
                m.ping_ms.to_string(),
            ])?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

/// Replaces `path` with whatever `write` produces. The data goes to a temp file
/// next to `path` that is renamed over it once complete, so a failed or
/// interrupted write leaves the old file as it was.
fn write_file<F>(path: &Path, write: F) -> Result<(), StoreError>
where
    F: FnOnce(&mut dyn Write) -> Result<(), StoreError>,
{
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.display().to_string(),
        source,
    };
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent).map_err(io_err)?;
            parent
        }
        None => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        write(&mut out)?;
        out.flush().map_err(io_err)?;
    }
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store(dir: &Path) -> ResultStore {
        let mut store = ResultStore::new(dir.join("speed_results.json"));
        store.append(Measurement::new(50.2, 10.1, 15.0));
        store.append(Measurement::new(48.0, 9.8, 20.0));
        store
    }

    #[test]
    fn csv_export_has_header_then_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(dir.path());
        let path = dir.path().join("speed_results.csv");

        store.export(ExportFormat::Csv, &path, Language::English).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "Download Speed (Mbps),Upload Speed (Mbps),Ping (ms)\n50.2,10.1,15\n48,9.8,20\n"
        );
    }

    #[test]
    fn csv_export_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(dir.path());
        let path = dir.path().join("out.csv");

        store.export(ExportFormat::Csv, &path, Language::French).unwrap();
        let first = fs::read(&path).unwrap();
        store.export(ExportFormat::Csv, &path, Language::French).unwrap();
        let second = fs::read(&path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn csv_header_follows_language() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(dir.path());
        let mut buf = Vec::new();
        store.export_to(ExportFormat::Csv, &mut buf, Language::French).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Débit descendant (Mbps),Débit montant (Mbps),Ping (ms)\n"));
    }

    #[test]
    fn empty_history_exports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("h.json"));
        let path = dir.path().join("out.csv");

        let err = store.export(ExportFormat::Csv, &path, Language::English).unwrap_err();
        assert!(matches!(err, StoreError::NoData));
        assert!(!path.exists());

        let err = store.export(ExportFormat::Json, &path, Language::English).unwrap_err();
        assert!(matches!(err, StoreError::NoData));
        assert!(!path.exists());
    }

    #[test]
    fn persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(dir.path());
        store.persist().unwrap();

        let loaded = ResultStore::load(store.path()).unwrap();
        assert_eq!(loaded.all(), store.all());
    }

    #[test]
    fn snapshot_is_a_list_of_triples() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(dir.path());
        store.persist().unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(text, "[[50.2,10.1,15.0],[48.0,9.8,20.0]]");
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::load(dir.path().join("missing.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn load_rejects_malformed_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "[[1.0, 2.0]]").unwrap();
        assert!(matches!(ResultStore::load(&path), Err(StoreError::Json(_))));
    }

    #[test]
    fn malformed_snapshot_can_be_set_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speed_results.json");
        fs::write(&path, "[[50.2,10.1,").unwrap();

        let moved = ResultStore::set_aside(&path).unwrap();

        assert_eq!(moved, dir.path().join("speed_results.json.bad"));
        assert_eq!(fs::read_to_string(&moved).unwrap(), "[[50.2,10.1,");
        assert!(ResultStore::load(&path).unwrap().is_empty());
    }

    #[test]
    fn record_persists_the_full_history() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ResultStore::new(dir.path().join("nested").join("h.json"));
        store.record(Measurement::new(1.0, 2.0, 3.0)).unwrap();
        store.record(Measurement::new(4.0, 5.0, 6.0)).unwrap();

        let loaded = ResultStore::load(store.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.latest(), Some(&Measurement::new(4.0, 5.0, 6.0)));
    }

    #[test]
    fn interrupted_write_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = sample_store(dir.path());
        store.persist().unwrap();

        let err = write_file(store.path(), |out| {
            out.write_all(b"[[50.2,10.1,").unwrap();
            Err(StoreError::NoData)
        })
        .unwrap_err();
        assert!(matches!(err, StoreError::NoData));

        let loaded = ResultStore::load(store.path()).unwrap();
        assert_eq!(loaded.all(), store.all());
        // The half-written temp file is gone too.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_record_leaves_history_untouched() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the write fail.
        let mut store = ResultStore::new(dir.path());
        assert!(store.record(Measurement::new(1.0, 2.0, 3.0)).is_err());
        assert!(store.is_empty());
    }
}
