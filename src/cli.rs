use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::capture::CaptureRegion;
use crate::error::ConfigError;
use crate::settings::UserSettings;
use crate::shortcut::ShortcutBinding;

#[derive(Debug, Parser)]
#[command(name = "avr")]
#[command(about = "AVR - capture the screen on a shortcut, OCR it, and keep the text in a daily knowledge file")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Keyboard shortcut, modifier(s)+key, e.g. cmd+x or ctrl+shift+s [default: cmd+x]
    #[arg(short, long, global = true)]
    pub shortcut: Option<ShortcutBinding>,

    /// Directory holding running_knowledge_<date>.md files
    #[arg(short, long, global = true, env = "KNOWLEDGE_SOURCE_PATH")]
    pub knowledge_dir: Option<PathBuf>,

    /// Only keep this part of the screen, as x,y,width,height
    #[arg(long, global = true)]
    pub region: Option<CaptureRegion>,

    /// Tesseract language code(s), e.g. eng or eng+deu
    #[arg(long, global = true)]
    pub lang: Option<String>,

    /// Disable the start/complete/error sounds
    #[arg(long, global = true)]
    pub no_sound: bool,

    /// Settings file (default: <config dir>/avr/settings.json)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Listen for the shortcut until Ctrl+C (default)
    Listen,
    /// Capture, recognize and append once, then exit
    Capture,
    /// Check that screen capture, OCR and the knowledge directory are usable
    Doctor,
    /// Print the captures recorded for a day
    Show {
        /// Day to show as YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show or change the persisted settings
    Settings {
        /// Default keyboard shortcut
        #[arg(long)]
        set_shortcut: Option<ShortcutBinding>,
        /// Turn sounds on or off
        #[arg(long)]
        sound: Option<bool>,
        /// Default OCR language
        #[arg(long)]
        set_lang: Option<String>,
        /// Default capture region, x,y,width,height
        #[arg(long, conflicts_with = "clear_region")]
        set_region: Option<CaptureRegion>,
        /// Capture the full screen again
        #[arg(long)]
        clear_region: bool,
        /// Default knowledge directory
        #[arg(long)]
        set_knowledge_dir: Option<PathBuf>,
    },
}

/// Options for one run after merging the command line over saved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub binding: ShortcutBinding,
    pub knowledge_dir: PathBuf,
    pub region: Option<CaptureRegion>,
    pub language: String,
    pub sound: bool,
}

impl Cli {
    pub fn selected_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Listen)
    }

    /// Command line wins over settings; the knowledge directory falls back to
    /// `<data dir>/avr/knowledge`.
    pub fn resolve(&self, settings: &UserSettings) -> Result<RunConfig, ConfigError> {
        let knowledge_dir = self
            .knowledge_dir
            .clone()
            .or_else(|| settings.knowledge_dir.clone())
            .or_else(default_knowledge_dir)
            .ok_or_else(|| ConfigError::KnowledgeDir {
                path: PathBuf::new(),
                reason: "no knowledge directory given and no data directory on this system".into(),
            })?;

        Ok(RunConfig {
            binding: self
                .shortcut
                .clone()
                .or_else(|| settings.shortcut.clone())
                .unwrap_or_default(),
            knowledge_dir,
            region: self.region.or(settings.capture.region),
            language: self
                .lang
                .clone()
                .unwrap_or_else(|| settings.ocr.language.clone()),
            sound: settings.sound.enabled && !self.no_sound,
        })
    }
}

/// Reads `.env` from the working directory or one of its parents into the
/// process environment. Variables that are already set keep their values.
/// Returns the file that was read.
pub fn load_env_file() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

pub fn default_knowledge_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("avr").join("knowledge"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_to_listen_with_cmd_x() {
        let cli = Cli::try_parse_from(["avr", "-k", "/tmp/avr-notes"]).unwrap();
        assert!(matches!(cli.selected_command(), Command::Listen));
        let config = cli.resolve(&UserSettings::default()).unwrap();
        assert_eq!(config.binding, ShortcutBinding::default());
    }

    #[test]
    fn accepts_shortcut_after_subcommand() {
        let cli = Cli::try_parse_from(["avr", "listen", "--shortcut", "ctrl+shift+s"]).unwrap();
        assert_eq!(cli.shortcut.map(|b| b.to_string()).as_deref(), Some("ctrl+shift+s"));
    }

    #[test]
    fn unrecognized_shortcut_is_a_usage_error() {
        let err = Cli::try_parse_from(["avr", "-s", "hyper+x"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn bad_region_is_a_usage_error() {
        let err = Cli::try_parse_from(["avr", "--region", "1,2,3"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn command_line_overrides_settings() {
        let cli = Cli::try_parse_from([
            "avr",
            "-s",
            "ctrl+f1",
            "-k",
            "/tmp/avr-notes",
            "--lang",
            "deu",
            "--region",
            "0,0,100,50",
            "--no-sound",
        ])
        .unwrap();

        let mut settings = UserSettings::default();
        settings.knowledge_dir = Some(PathBuf::from("/elsewhere"));
        settings.ocr.language = "fra".into();
        settings.shortcut = "alt+x".parse().ok();

        let config = cli.resolve(&settings).unwrap();
        assert_eq!(config.binding.to_string(), "ctrl+f1");
        assert_eq!(config.knowledge_dir, PathBuf::from("/tmp/avr-notes"));
        assert_eq!(config.language, "deu");
        assert_eq!(config.region.map(|r| r.height), Some(50));
        assert!(!config.sound);
    }

    #[test]
    fn settings_fill_unset_options() {
        let mut cli = Cli::try_parse_from(["avr"]).unwrap();
        cli.knowledge_dir = None;

        let mut settings = UserSettings::default();
        settings.knowledge_dir = Some(PathBuf::from("/from/settings"));
        settings.ocr.language = "fra".into();
        settings.capture.region = "5,5,10,10".parse().ok();
        settings.shortcut = "alt+x".parse().ok();

        let config = cli.resolve(&settings).unwrap();
        assert_eq!(config.binding.to_string(), "alt+x");
        assert_eq!(config.knowledge_dir, PathBuf::from("/from/settings"));
        assert_eq!(config.language, "fra");
        assert_eq!(config.region.map(|r| r.x), Some(5));
        assert!(config.sound);
    }

    #[test]
    fn parses_show_date() {
        let cli = Cli::try_parse_from(["avr", "show", "--date", "2024-03-09"]).unwrap();
        match cli.selected_command() {
            Command::Show { date } => assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 9)),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
