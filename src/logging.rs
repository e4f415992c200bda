use std::path::Path;

/// Sends `log` records to `path`. The terminal belongs to the UI, so nothing is
/// written to stdout or stderr.
pub fn init_logger(min_level: log::LevelFilter, path: &Path) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            // UTC, since the local offset can't be read safely once threads exist.
            let now = time::OffsetDateTime::now_utc();
            let stamp = now
                .format(&time::macros::format_description!(
                    "[[[year]-[month]-[day]][[[hour]:[minute]:[second][subsecond digits:3]]"
                ))
                .unwrap_or_default();

            out.finish(format_args!(
                "{}[{}][{}] {}",
                stamp,
                record.target(),
                record.level(),
                message
            ))
        })
        .level(min_level)
        .level_for("hyper_util", log::LevelFilter::Warn)
        .level_for("reqwest", log::LevelFilter::Warn)
        .chain(fern::log_file(path)?)
        .apply()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speedboard.log");
        init_logger(log::LevelFilter::Info, &path).unwrap();

        log::info!("hello from the test");
        log::logger().flush();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[INFO] hello from the test"));
    }
}
