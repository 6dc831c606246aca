use std::io::stdin;

use clap::Parser;
use log::info;
use tnc2app::adapter::{MonitorAdapter, NullSettings};
use tnc2app::app::Tnc2App;
use tnc2app::config::TncConfig;
use tnc2app::session::LinkEvent;
use tnc2app::station::{StationAddress, parse_path};
use tnc2app::tnc::TcpTncFactory;
use tnc2app::MonitorLine;

#[derive(Parser)]
struct Args {
    #[arg(short = 's', default_value = "127.0.0.1", help = "Host running the KISS modem")]
    host: String,
    #[arg(short = 'p', default_value = "8001", help = "KISS TCP port")]
    port: u16,
    #[arg(short = 'c', value_parser = valid_callsign, help = "Your callsign")]
    mycall: StationAddress,
    #[arg(value_parser = valid_callsign, help = "Station to connect to, e.g. N0CALL-5")]
    peer: StationAddress,
    #[arg(short = 'v', default_value = "", help = "Digipeaters, e.g. WIDE1-1,WIDE2-1")]
    via: String,
    #[arg(long, default_value = "5", help = "Seconds to wait for each connection attempt")]
    t1: u64,
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

    let mut config = TncConfig::new(args.mycall);
    config.t1 = std::time::Duration::from_secs(args.t1);
    let factory = TcpTncFactory::new(args.host, args.port);
    let app = Tnc2App::new(factory, config, LinkPrinter, NullSettings);

    let result = app.connect(args.peer, path);
    println!("{result}");
    if !result.linked {
        std::process::exit(1);
    }

    for line in stdin().lines() {
        let Ok(line) = line else {
            break;
        };
        let result = app.send_linked(&line);
        if !result.is_success() {
            println!("{result}");
            break;
        }
    }

    let state = app.state();
    if let Some(peer) = state.peer() {
        info!("end of input, disconnecting from {peer}");
    }
    if state.is_connected() {
        println!("{}", app.disconnect());
    }
    app.close();
}

fn valid_callsign(c: &str) -> Result<StationAddress, String> {
    StationAddress::from_callsign(c).map_err(|e| e.to_string())
}

/// Shows what the peer sends us and any change to the link.
struct LinkPrinter;
impl MonitorAdapter for LinkPrinter {
    fn frame_heard(&self, _line: &MonitorLine) {}

    fn link_event(&self, event: LinkEvent) {
        match event {
            LinkEvent::DisconnectedByPeer(peer) | LinkEvent::DroppedByPeer(peer) => {
                println!("*** DISCONNECTED from {peer}")
            }
            LinkEvent::TransportLost => println!("*** lost connection to KISS modem"),
            LinkEvent::ConnectedFrom(peer) => println!("*** CONNECTED to {peer}"),
        }
    }

    fn data_received(&self, _from: &StationAddress, data: &[u8]) {
        let text = String::from_utf8_lossy(data).replace('\r', "\n");
        print!("{text}");
    }
}
