//! Test publisher: emits a synthetic reading to the inbound topic on a
//! fixed interval until interrupted.

use std::process::ExitCode;

use envmon_core::env;
use envmon_core::telemetry::{init_tracing, shutdown_signal};
use envmon_worker::simulate::{synthetic_reading, SimulatorConfig};
use rumqttc::{AsyncClient, Event, Packet, QoS};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing("envmon_sim=info,envmon_worker=info");

    let config = match SimulatorConfig::from_lookup(&env::process_env) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid simulator configuration");
            return ExitCode::FAILURE;
        }
    };
    let options = match config.broker.mqtt_options() {
        Ok(options) => options,
        Err(e) => {
            tracing::error!(error = %e, "Failed to prepare MQTT connection");
            return ExitCode::FAILURE;
        }
    };

    let (client, mut eventloop) = AsyncClient::new(options, 16);
    let driver = tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => tracing::info!("Connected to broker"),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Connection error, retrying");
                    tokio::time::sleep(envmon_delivery::mqtt::RECONNECT_DELAY).await;
                }
            }
        }
    });

    tracing::info!(
        host = %config.broker.host,
        topic = %config.topic,
        interval_secs = config.interval.as_secs(),
        "Publishing synthetic readings"
    );

    let mut ticker = tokio::time::interval(config.interval);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            _ = ticker.tick() => {
                let reading = synthetic_reading(&mut rand::rng());
                let payload = reading.to_string();
                match client.publish(config.topic.as_str(), QoS::AtLeastOnce, false, payload).await {
                    Ok(()) => tracing::info!(reading = %reading, "Reading published"),
                    Err(e) => tracing::warn!(error = %e, "Failed to queue reading"),
                }
            }
        }
    }

    let _ = client.disconnect().await;
    driver.abort();
    ExitCode::SUCCESS
}
