use crate::i18n::Language;
use crate::ui::theme::ThemeKind;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "speedboard", version)]
#[command(about = "Measure download, upload and ping, and keep a history of the results")]
pub struct Args {
    /// Config file to use instead of the default location
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Server id to test against; skips best-server discovery
    #[arg(short, long, value_name = "ID")]
    pub server: Option<String>,

    /// Display language (en, ar or fr)
    #[arg(short = 'L', long)]
    pub language: Option<Language>,

    /// Colour theme
    #[arg(short, long, value_enum)]
    pub theme: Option<ThemeKind>,

    /// Write debug logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Minimum level written to the log file
    #[arg(long, default_value = "info")]
    pub log_level: log::LevelFilter,

    /// Run a single test without the terminal UI and print the result
    #[arg(long)]
    pub once: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let args = Args::parse_from([
            "speedboard", "--server", "4242", "-L", "fr", "--theme", "light", "--once",
        ]);
        assert_eq!(args.server.as_deref(), Some("4242"));
        assert_eq!(args.language, Some(Language::French));
        assert_eq!(args.theme, Some(ThemeKind::Light));
        assert_eq!(args.log_level, log::LevelFilter::Info);
        assert!(args.once);
    }

    #[test]
    fn rejects_unknown_theme() {
        assert!(Args::try_parse_from(["speedboard", "--theme", "solarized"]).is_err());
    }

    #[test]
    fn rejects_unknown_language() {
        assert!(Args::try_parse_from(["speedboard", "--language", "de"]).is_err());
    }
}
