/// log4rs setup helpers for applications and demos that do not bring their own
/// logger; the library itself only talks to the `log` facade.
///
use anyhow::Result;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::Path;

pub const CONSOLE_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%S%.3f)} {h({l})} {T} {t} - {m}{n}";

/// build a console-only log4rs config at the given level
pub fn console_config(level: LevelFilter) -> Result<Config> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(CONSOLE_PATTERN)))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level))?;

    Ok(config)
}

/// install a console logger; fails if a logger is already installed
pub fn init_console(level: LevelFilter) -> Result<()> {
    log4rs::init_config(console_config(level)?)?;
    Ok(())
}

/// install a logger from a log4rs yaml/json/toml file
pub fn init_file<P: AsRef<Path>>(path: P) -> Result<()> {
    log4rs::init_file(path, Default::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_config_root_level() {
        let config = console_config(LevelFilter::Debug).expect("should build the config");
        assert_eq!(config.root().level(), LevelFilter::Debug);
        assert_eq!(config.appenders().len(), 1);
    }

    #[test]
    fn missing_file() {
        assert!(init_file("./no-such-dir/log4rs.yaml").is_err());
    }
}
