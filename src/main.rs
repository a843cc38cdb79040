#![cfg(not(target_arch = "wasm32"))]

use log::{error, info, LevelFilter};

fn main() {
    env_logger::Builder::new()
        .filter_level(if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .format_timestamp_millis()
        .format_target(false)
        .parse_default_env()
        .init();

    info!("Starting basalt viewer (native)...");
    if let Err(e) = basalt_engine::run_native() {
        error!("Engine terminated abruptly: {e:?}");
        std::process::exit(1);
    }
}
