use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Configuration error: {0}")]
    Config(#[from] configuration::ConfigError),

    #[error("Data error: {0}")]
    Data(#[from] data::DataError),

    #[error("Funding error: {0}")]
    Funding(#[from] funding::FundingError),

    #[error("Portfolio error: {0}")]
    Portfolio(#[from] portfolio::PortfolioError),

    #[error("Strategy execution error: {0}")]
    Strategy(#[from] strategies::StrategyError),

    #[error("Execution simulation error: {0}")]
    Executor(#[from] executor::ExecutorError),

    #[error("Analytics calculation error: {0}")]
    Analytics(#[from] analytics::AnalyticsError),

    #[error("Progress bar template error: {0}")]
    ProgressBarTemplate(String),

    #[error("No candle data available for {0}")]
    DataUnavailable(String),

    #[error("No new candle arrived within {0:?}")]
    NoDataTimeout(Duration),

    #[error("Live poller failed: {0}")]
    Poller(String),
}

impl From<indicatif::style::TemplateError> for BacktestError {
    fn from(error: indicatif::style::TemplateError) -> Self {
        BacktestError::ProgressBarTemplate(error.to_string())
    }
}
