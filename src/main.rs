//! `station-link` binary exercising the link API from the command line.

mod cli;

use std::time::Duration;

use clap::Parser;
use cli::{Cli, Command, LinkArgs};
use station_link::{
    DuplexMode,
    LinkConfig,
    LinkError,
    SendOptions,
    SendOutcome,
    SendReport,
    SerialSettings,
    StationLink,
    frame::{STATUS_NOT_READY, STATUS_READY},
};

fn link_config(args: &LinkArgs) -> (SerialSettings, LinkConfig) {
    let serial =
        SerialSettings::new(args.port.to_string_lossy().into_owned()).with_baud_rate(args.baud);
    let duplex = if args.half_duplex {
        DuplexMode::Half
    } else {
        DuplexMode::Full
    };
    let config = LinkConfig::default()
        .with_wait_timeout(Duration::from_millis(args.wait_ms))
        .with_retry_count(args.attempts)
        .with_duplex(duplex);
    (serial, config)
}

fn describe(report: &SendReport) -> String {
    let outcome = match &report.outcome {
        SendOutcome::Acknowledged(true) => "accepted".to_owned(),
        SendOutcome::Acknowledged(false) => "refused by badge".to_owned(),
        SendOutcome::Status(STATUS_READY) => "ready to receive".to_owned(),
        SendOutcome::Status(STATUS_NOT_READY) => "receive buffers full".to_owned(),
        SendOutcome::Status(other) => format!("status {other:#04x}"),
        SendOutcome::Payload(bytes) => format!("payload {:02x?}", bytes.as_ref()),
        SendOutcome::NoData => "no data".to_owned(),
        SendOutcome::Sent => "sent".to_owned(),
        SendOutcome::Failed => "no response".to_owned(),
    };
    format!("{outcome} ({} retries)", report.retries())
}

async fn listen(link: &StationLink) -> Result<(), LinkError> {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            received = link.receive() => {
                if let Some(received) = received? {
                    println!("{:02x?} {:?}", received.payload.as_ref(), received.info);
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), LinkError> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let (serial, config) = link_config(&cli.link);
    let link = StationLink::open(&serial, config)?;

    let result = match cli.command {
        Command::Send {
            payload,
            cross_board,
        } => link
            .send(payload.0, SendOptions::queue_tx().with_cross_board(cross_board))
            .await
            .map(|report| println!("{}", describe(&report))),
        Command::Retrieve => link
            .send(Vec::new(), SendOptions::retrieve_rx())
            .await
            .map(|report| println!("{}", describe(&report))),
        Command::Status => link
            .send(Vec::new(), SendOptions::get_status())
            .await
            .map(|report| println!("{}", describe(&report))),
        Command::Display { text } => link
            .display(text.into_bytes())
            .await
            .map(|report| println!("{}", describe(&report))),
        Command::Listen => listen(&link).await,
    };
    link.close().await;
    result
}
