use std::net::Ipv4Addr;

use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};

use chat_client::connection::Connection;
use chat_client::console::{self, OutputSink};
use chat_client::session::Session;

#[derive(Parser, Debug)]
struct Args {
    /// Host of the chat server
    #[arg(short = 'H', long, default_value_t = Ipv4Addr::LOCALHOST)]
    pub host: Ipv4Addr,

    /// Port of the chat server
    #[arg(short, long, default_value_t = 4000)]
    pub port: u16,

    #[clap(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .parse_default_env()
        .init();

    let mut connection = Connection::connect((args.host, args.port)).await?;
    info!("Connected to {}:{}", args.host, args.port);
    println!("Connected to the server.");

    let mut input = BufReader::new(tokio::io::stdin());

    println!("Enter username:");
    let mut username = String::new();
    input
        .read_line(&mut username)
        .await
        .context("Failed to read username")?;
    let username = username.trim_end().to_string();

    connection.login(&username).await?;
    let (reader, writer) = connection.into_split();

    let (sink, sink_rx) = OutputSink::new();
    let writer_task = tokio::spawn(console::write_lines(sink_rx, tokio::io::stdout()));

    let session = Session::new(username, reader, writer, sink);
    session.run(input).await?;

    // Every sink handle is gone once the session is over; wait for the
    // console writer to drain so no queued line is lost at exit.
    writer_task.await?;
    Ok(())
}
