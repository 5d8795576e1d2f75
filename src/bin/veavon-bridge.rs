use log::info;
use tokio_util::sync::CancellationToken;
use veavon_bridge::config::Config;
use veavon_bridge::error::AppRunError;
use veavon_bridge::{init_logging, run};

#[tokio::main]
async fn main() -> Result<(), AppRunError> {
    init_logging();
    info!(concat!("Veavon Bridge ", env!("CARGO_PKG_VERSION")));

    let config = Config::from_env()?;
    let cancel = CancellationToken::new();

    let mut bridge = tokio::spawn(run(config, cancel.clone()));

    tokio::select! {
        result = &mut bridge => {
            result.expect("Failed to join the bridge task")?;
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received; shutting down");
            cancel.cancel();
            bridge.await.expect("Failed to join the bridge task")?;
        },
    }

    Ok(())
}
