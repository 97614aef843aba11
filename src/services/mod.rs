//! External collaborators: indicator data, universe, and message delivery

pub mod indicator_api;
pub mod market_data;
pub mod notifier;
pub mod telegram;

pub use indicator_api::HttpIndicatorProvider;
pub use market_data::{
    FetchError, IndicatorProvider, StaticUniverse, UniverseError, UniverseProvider,
};
pub use notifier::{Notifier, NotifyError};
pub use telegram::TelegramNotifier;
