pub mod api;
pub mod dispatcher;
pub mod settings;

pub use dispatcher::Dispatcher;
pub use settings::PushSettings;
