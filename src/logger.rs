use crate::cli::LogLevel;
use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter, fmt::layer, fmt::time::LocalTime, layer::SubscriberExt,
    util::SubscriberInitExt, Registry,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Format {
    Terminal,
    Ci,
    Json,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

pub fn setup_logger(level: LogLevel, format: Format) -> eyre::Result<()> {
    let time_format = time::macros::format_description!(
        "[year]-[month]-[day] [hour repr:24]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
    );
    let builder = Registry::default().with(LevelFilter::from(Level::from(level)));

    match format {
        Format::Json => builder
            .with(layer().json().with_timer(LocalTime::new(time_format)))
            .try_init()?,
        Format::Ci | Format::Terminal => builder
            .with(
                layer()
                    .with_ansi(format == Format::Terminal)
                    .with_target(false)
                    .with_timer(LocalTime::new(time_format)),
            )
            .try_init()?,
    }

    Ok(())
}
