pub mod decoder;
pub mod metrics;
pub mod mqtt;
pub mod providers;
pub mod relay;

pub use decoder::{decode, DecodeError};
pub use self::metrics::{get_metrics, init_metrics, record_message, record_provider_call};
pub use mqtt::{
    BusError, ConnectionObserver, LoggingObserver, MessageHandler, MqttConnection,
};
pub use providers::{BarkProvider, MockPushProvider, ProviderError, PushProvider};
pub use relay::{RelayOutcome, SmsRelay};
