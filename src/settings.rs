use std::path::PathBuf;

/// User preferences, stored as `key=value` lines.
#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    /// `auto`, `en` or `zh-CN`.
    pub language: String,
    /// Padding kept between the displayed image and the canvas edge, in points.
    pub viewport_margin: f32,
    /// Show the color swatch that follows the pointer.
    pub live_preview: bool,
    /// Where history records are kept. Empty means `<config dir>/history`.
    pub history_dir: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            language: "auto".to_string(),
            viewport_margin: 40.0,
            live_preview: true,
            history_dir: String::new(),
        }
    }
}

impl AppSettings {
    /// Per-user configuration directory.
    /// On Linux:   ~/.config/hexpick  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\Hexpick
    /// On macOS:   ~/Library/Application Support/Hexpick
    /// Fallback:   the executable's directory.
    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let base = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                });
            return Some(base.join("hexpick"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("Hexpick"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("Hexpick"),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.to_path_buf()))
        }
    }

    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("hexpick_settings.cfg"))
    }

    /// Directory handed to [`crate::storage::FileStore`].
    pub fn resolved_history_dir(&self) -> Option<PathBuf> {
        if self.history_dir.trim().is_empty() {
            Self::config_dir().map(|d| d.join("history"))
        } else {
            Some(PathBuf::from(self.history_dir.trim()))
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "language={}\n\
             viewport_margin={}\n\
             live_preview={}\n\
             history_dir={}\n",
            self.language, self.viewport_margin, self.live_preview, self.history_dir,
        )
    }

    /// Parse settings text. Unknown keys and unparsable values keep their defaults.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "language" if !val.is_empty() => s.language = val.to_string(),
                "viewport_margin" => {
                    if let Ok(v) = val.parse::<f32>()
                        && v.is_finite()
                    {
                        s.viewport_margin = v.clamp(0.0, 400.0);
                    }
                }
                "live_preview" => {
                    if let Ok(v) = val.parse::<bool>() {
                        s.live_preview = v;
                    }
                }
                "history_dir" => s.history_dir = val.to_string(),
                _ => {}
            }
        }
        s
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            log_warn!("Saving settings to {} failed: {}", path.display(), e);
        }
    }

    /// Load settings from disk (defaults if the file is missing or unreadable)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::from_config_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_text_round_trips() {
        let settings = AppSettings {
            language: "zh-CN".into(),
            viewport_margin: 12.5,
            live_preview: false,
            history_dir: "/tmp/hexpick-history".into(),
        };
        assert_eq!(
            AppSettings::from_config_str(&settings.to_config_string()),
            settings
        );
    }

    #[test]
    fn bad_values_keep_defaults() {
        let s = AppSettings::from_config_str(
            "viewport_margin=wide\nlive_preview=sometimes\nunknown=1\nlanguage=\nnot a line\n",
        );
        assert_eq!(s, AppSettings::default());
    }

    #[test]
    fn margin_is_clamped() {
        let s = AppSettings::from_config_str("viewport_margin=-5");
        assert_eq!(s.viewport_margin, 0.0);
        let s = AppSettings::from_config_str("viewport_margin=inf");
        assert_eq!(s.viewport_margin, 40.0);
    }

    #[test]
    fn explicit_history_dir_wins() {
        let s = AppSettings::from_config_str("history_dir=  /data/picks  ");
        assert_eq!(s.resolved_history_dir(), Some(PathBuf::from("/data/picks")));
    }
}
