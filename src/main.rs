mod app;
mod utils;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Capture Albion Online traffic and export mail item listings as CSV/JSON.")]
pub struct Args {
    /// JSON config file (created with defaults when missing)
    #[arg(long, default_value = "albion-mail.json")]
    pub config: PathBuf,

    /// Capture device name (defaults to the first device pcap reports)
    #[arg(long)]
    pub device: Option<String>,

    /// Replay a .pcap file instead of capturing live
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Print the available capture devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Stop after this many captured frames
    #[arg(long)]
    pub max_packets: Option<u64>,

    /// Where to write the black-market CSV
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Where to write the mail JSON
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Also print the CSV rows to stdout when capture ends
    #[arg(long)]
    pub print_csv: bool,

    /// Verbose logging
    #[arg(long)]
    pub debug: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match app::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
