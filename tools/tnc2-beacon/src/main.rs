use std::time::Duration;

use clap::Parser;
use log::{info, warn};
use tnc2app::adapter::{NullMonitor, NullSettings};
use tnc2app::app::Tnc2App;
use tnc2app::config::TncConfig;
use tnc2app::session::CommandOutcome;
use tnc2app::station::{StationAddress, parse_path};
use tnc2app::tnc::TcpTncFactory;

#[derive(Parser)]
struct Args {
    #[arg(short = 's', default_value = "127.0.0.1", help = "Host running the KISS modem")]
    host: String,
    #[arg(short = 'p', default_value = "8001", help = "KISS TCP port")]
    port: u16,
    #[arg(short = 'c', value_parser = valid_callsign, help = "Your callsign")]
    mycall: StationAddress,
    #[arg(short = 'd', default_value = "BEACON", value_parser = valid_callsign, help = "Beacon destination")]
    dest: StationAddress,
    #[arg(short = 'v', default_value = "", help = "Digipeaters, e.g. WIDE1-1,WIDE2-1")]
    via: String,
    #[arg(short = 'e', default_value = "600", help = "Seconds between beacons")]
    every: u64,
    #[arg(help = "Beacon text")]
    text: String,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let path = match parse_path(&args.via) {
        Ok(path) => path,
        Err(e) => {
            println!("Invalid digipeater path: {e}");
            std::process::exit(1);
        }
    };

    let factory = TcpTncFactory::new(args.host, args.port);
    let app = Tnc2App::new(factory, TncConfig::new(args.mycall), NullMonitor, NullSettings);
    println!("{}", app.set_unproto(args.dest, path));

    loop {
        let result = app.send_unproto(&args.text);
        match result.outcome {
            CommandOutcome::Done => info!("beacon sent"),
            CommandOutcome::NotConnected => {
                warn!("{result}");
                let reconnect = app.reconnect();
                if !reconnect.is_success() {
                    warn!("{reconnect}");
                }
            }
            _ => warn!("{result}"),
        }
        std::thread::sleep(Duration::from_secs(args.every));
    }
}

fn valid_callsign(c: &str) -> Result<StationAddress, String> {
    StationAddress::from_callsign(c).map_err(|e| e.to_string())
}
