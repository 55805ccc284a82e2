use env_logger::{Builder, Env, Target};
use log::error;
use std::panic;

/// Filter for the hook loggers, in `env_logger` syntax. Logging is off
/// unless this is set.
pub const LOG_ENV: &str = "CODETRACKER_LOG";

/// Send log records to stderr. Hooks must keep stdout clean, the host reads
/// it.
pub fn init() {
    let env = Env::new().filter_or(LOG_ENV, "off");
    let _ = Builder::from_env(env)
        .target(Target::Stderr)
        .format_timestamp_millis()
        .try_init();
}

/// Replace the default panic printer with a log record, so a panic stays
/// as quiet as any other failure.
pub fn install_panic_hook(hook: &'static str) {
    panic::set_hook(Box::new(move |info| {
        let payload = info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("Box<dyn Any>");
        let location = info
            .location()
            .map_or_else(|| "<unknown>".to_owned(), |location| location.to_string());
        error!("{hook}: panicked at {location}: {message}");
    }));
}
