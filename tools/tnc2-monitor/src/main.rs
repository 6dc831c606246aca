use clap::Parser;
use log::info;
use tnc2app::adapter::{MonitorAdapter, NullSettings};
use tnc2app::app::Tnc2App;
use tnc2app::config::TncConfig;
use tnc2app::session::LinkEvent;
use tnc2app::station::StationAddress;
use tnc2app::tnc::TcpTncFactory;
use tnc2app::MonitorLine;

#[derive(Parser)]
struct Args {
    #[arg(short = 's', default_value = "127.0.0.1", help = "Host running the KISS modem")]
    host: String,
    #[arg(short = 'p', default_value = "8001", help = "KISS TCP port")]
    port: u16,
    #[arg(short = 'c', default_value = "N0CALL", value_parser = valid_callsign, help = "Your callsign")]
    mycall: StationAddress,
    #[arg(short = 'd', help = "Show a hex dump of each information field")]
    detail: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut config = TncConfig::new(args.mycall);
    config.monitor = true;
    config.monitor_detail = args.detail;
    info!("monitoring KISS modem at {}:{}", args.host, args.port);
    let factory = TcpTncFactory::new(args.host, args.port);
    let _app = Tnc2App::new(factory, config, ConsoleMonitor, NullSettings);

    loop {
        std::thread::park();
    }
}

fn valid_callsign(c: &str) -> Result<StationAddress, String> {
    StationAddress::from_callsign(c).map_err(|e| e.to_string())
}

struct ConsoleMonitor;
impl MonitorAdapter for ConsoleMonitor {
    fn frame_heard(&self, line: &MonitorLine) {
        println!("{line}");
    }

    fn link_event(&self, event: LinkEvent) {
        println!("*** {event:?}");
    }

    fn data_received(&self, _from: &StationAddress, data: &[u8]) {
        println!("{}", String::from_utf8_lossy(data));
    }
}
