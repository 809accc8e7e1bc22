use std::path::PathBuf;

use albion_mail_lib::{load_config, AppConfig, CaptureError, CaptureSession, ConfigError, SessionSummary};
use thiserror::Error;

use crate::utils;
use crate::Args;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("Failed to write {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn run(args: Args) -> Result<(), AppError> {
    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, &args);
    utils::init_logging(config.is_debug);

    if args.list_devices {
        return list_devices();
    }

    log::info!("🔍 Albion Online Mail Extractor Started");

    let mut session = CaptureSession::from_config(&config);
    let mut detected = 0usize;
    session.on_classified_mail_detected(move |notice| {
        detected += notice.item_count;
        println!("📧 Mail with {} item(s), {} so far", notice.item_count, detected);
        for line in &notice.lines {
            println!("   {}", line);
        }
    });

    session.start();
    let capture_result = capture(&mut session, &args, &config);
    let summary = session.stop();

    // Whatever was captured before a failure is still exported.
    if summary.game_packets > 0 {
        export(&session, &config, args.print_csv)?;
    }
    print_summary(&summary);

    capture_result
}

fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(device) = &args.device {
        config.device = Some(device.clone());
    }
    if let Some(csv) = &args.csv {
        config.csv_path = csv.to_string_lossy().into_owned();
    }
    if let Some(json) = &args.json {
        config.json_path = json.to_string_lossy().into_owned();
    }
    if args.debug {
        config.is_debug = true;
    }
}

fn export(session: &CaptureSession, config: &AppConfig, print_csv: bool) -> Result<(), AppError> {
    let csv = session.render_csv();
    let json = session.render_json();

    for (path, text) in [(&config.csv_path, &csv), (&config.json_path, &json)] {
        let path = PathBuf::from(path);
        utils::write_export(&path, text).map_err(|source| AppError::Export { path: path.clone(), source })?;
        log::info!("💾 Wrote {}", path.display());
    }

    if print_csv && !csv.is_empty() {
        println!("{}", csv);
    }
    Ok(())
}

fn print_summary(summary: &SessionSummary) {
    println!("📊 Total packets: {}", summary.total_packets);
    println!("🎮 Albion packets: {}", summary.game_packets);
    println!(
        "📦 Mail items: {} ({} black market), mails: {}, dropped mails: {}",
        summary.mail_items, summary.black_market_items, summary.mails, summary.dropped_mails
    );
    if summary.dropped_datagrams > 0 {
        println!("⚠️  {} datagrams not retained (capacity reached)", summary.dropped_datagrams);
    }
}

#[cfg(feature = "capture")]
fn capture(session: &mut CaptureSession, args: &Args, config: &AppConfig) -> Result<(), AppError> {
    use albion_mail_lib::services::sniffer::{run_capture, CaptureOptions, CaptureSource};

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

    let source = match &args.file {
        Some(path) => CaptureSource::File(path.clone()),
        None => {
            println!("⏹️  Press Enter to stop capture");
            std::thread::spawn(move || {
                let mut line = String::new();
                let _ = std::io::stdin().read_line(&mut line);
                let _ = stop_tx.send(());
            });
            CaptureSource::Device(config.device.clone())
        }
    };

    let options = CaptureOptions {
        source,
        read_timeout_ms: config.read_timeout_ms,
        max_packets: args.max_packets,
    };
    run_capture(session, &options, &stop_rx)?;
    Ok(())
}

#[cfg(not(feature = "capture"))]
fn capture(_session: &mut CaptureSession, _args: &Args, _config: &AppConfig) -> Result<(), AppError> {
    Err(CaptureError::Unsupported.into())
}

#[cfg(feature = "capture")]
fn list_devices() -> Result<(), AppError> {
    let devices = albion_mail_lib::services::sniffer::list_devices()?;
    if devices.is_empty() {
        return Err(CaptureError::NoDevice.into());
    }
    for (index, (name, desc)) in devices.iter().enumerate() {
        println!("{}: {} - {}", index, name, desc.as_deref().unwrap_or("No description"));
    }
    Ok(())
}

#[cfg(not(feature = "capture"))]
fn list_devices() -> Result<(), AppError> {
    Err(CaptureError::Unsupported.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from(["albion-mail-extractor", "--device", "eth3", "--csv", "out/bm.csv", "--debug"]);
        let mut config = AppConfig::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.device.as_deref(), Some("eth3"));
        assert_eq!(config.csv_path, "out/bm.csv");
        assert_eq!(config.json_path, "mails.json");
        assert!(config.is_debug);
    }

    #[test]
    fn test_export_writes_both_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("exports");
        let config = AppConfig {
            csv_path: dir.join("bm.csv").to_string_lossy().into_owned(),
            json_path: dir.join("mails.json").to_string_lossy().into_owned(),
            ..AppConfig::default()
        };

        let mut session = CaptureSession::from_config(&config);
        session.start();
        session.ingest_datagram(albion_mail_lib::RawDatagram::new(
            std::net::Ipv4Addr::LOCALHOST,
            std::net::Ipv4Addr::LOCALHOST,
            5055,
            40000,
            b"4|T4_BAG|400|100",
        ));
        session.stop();

        export(&session, &config, false).unwrap();
        assert_eq!(std::fs::read_to_string(dir.join("bm.csv")).unwrap(), "400,4,T4_BAG");
        assert!(std::fs::read_to_string(dir.join("mails.json")).unwrap().contains("T4_BAG"));
    }
}
