//! CLI 配置
//!
//! 包含 CLI 特有的配置：按子系统划分的日志级别

use moonbridge_config::Subsystem;
use tracing::Level;

/// CLI 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub global: Level,
    pub state: Option<Level>,
    pub value: Option<Level>,
    pub native: Option<Level>,
    pub reflect: Option<Level>,
    pub coroutine: Option<Level>,
    pub registry: Option<Level>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global: Level::WARN,
            state: None,
            value: None,
            native: None,
            reflect: None,
            coroutine: None,
            registry: None,
        }
    }
}

impl LogConfig {
    /// `-v` 的次数映射为全局级别
    pub fn from_verbosity(verbose: u8) -> Self {
        let global = match verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            global,
            ..Self::default()
        }
    }

    /// Get log level for a specific subsystem
    pub fn level_for(&self, subsystem: Subsystem) -> Level {
        let specific = match subsystem {
            Subsystem::State => self.state,
            Subsystem::Value => self.value,
            Subsystem::Native => self.native,
            Subsystem::Reflect => self.reflect,
            Subsystem::Coroutine => self.coroutine,
            Subsystem::Registry => self.registry,
        };
        specific.unwrap_or(self.global)
    }

    pub fn set(&mut self, subsystem: Subsystem, level: Level) {
        let slot = match subsystem {
            Subsystem::State => &mut self.state,
            Subsystem::Value => &mut self.value,
            Subsystem::Native => &mut self.native,
            Subsystem::Reflect => &mut self.reflect,
            Subsystem::Coroutine => &mut self.coroutine,
            Subsystem::Registry => &mut self.registry,
        };
        *slot = Some(level);
    }
}

/// 解析 `SUBSYSTEM=LEVEL`（供 `--log` 使用）
pub fn parse_target_level(text: &str) -> Result<(Subsystem, Level), String> {
    let (name, level) = text
        .split_once('=')
        .ok_or_else(|| format!("expected SUBSYSTEM=LEVEL, got '{}'", text))?;
    let subsystem = Subsystem::ALL
        .into_iter()
        .find(|s| s.as_str() == name)
        .ok_or_else(|| format!("unknown subsystem '{}'", name))?;
    let level = level
        .parse::<Level>()
        .map_err(|_| format!("unknown log level '{}'", level))?;
    Ok((subsystem, level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_falls_back_to_global() {
        let mut cfg = LogConfig::from_verbosity(1);
        assert_eq!(cfg.level_for(Subsystem::Reflect), Level::INFO);
        cfg.set(Subsystem::Reflect, Level::TRACE);
        assert_eq!(cfg.level_for(Subsystem::Reflect), Level::TRACE);
        assert_eq!(cfg.level_for(Subsystem::State), Level::INFO);
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(LogConfig::from_verbosity(0).global, Level::WARN);
        assert_eq!(LogConfig::from_verbosity(2).global, Level::DEBUG);
        assert_eq!(LogConfig::from_verbosity(9).global, Level::TRACE);
    }

    #[test]
    fn test_parse_target_level() {
        assert_eq!(
            parse_target_level("coroutine=debug").unwrap(),
            (Subsystem::Coroutine, Level::DEBUG)
        );
        assert!(parse_target_level("coroutine").is_err());
        assert!(parse_target_level("vm=debug").is_err());
        assert!(parse_target_level("state=loud").is_err());
    }
}
