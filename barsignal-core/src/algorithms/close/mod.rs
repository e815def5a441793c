//! Exit algorithms: portfolio flatten, hard-limit reset, trailing stop, and
//! the MACD placeholder.

pub mod macd;
pub mod portfolio;
pub mod reset;
pub mod trailing_stop;

pub use macd::MacdClose;
pub use portfolio::PortfolioFlatten;
pub use reset::HardLimitReset;
pub use trailing_stop::TrailingStop;
