//! SMS notification demo against a simulated modem.
//!
//! This example demonstrates:
//! - Subscribing to `+CMTI` with a typed parser
//! - Composing requests through the catalog
//! - Reading the stored message when the notification arrives
//!
//! # Running
//!
//! ```text
//! RUST_LOG=atwire=debug cargo run --example sms_notify
//! ```

use atwire::catalog::sms;
use atwire::Engine;
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Scripted modem: acknowledges every command, announces one message and
/// serves it on `+CMGR`.
async fn simulated_modem(read: DuplexStream, mut write: DuplexStream) -> std::io::Result<()> {
    let mut lines = BufReader::new(read).lines();

    while let Some(line) = lines.next_line().await? {
        let reply = match line.trim() {
            "AT+CNMI=2,1" => "OK\r\n+CMTI: \"SM\",1\r\n".to_string(),
            "AT+CMGR=1" => concat!(
                "+CMGR: \"REC UNREAD\",\"+4917\",,\"24/01/01,12:00:00+04\"\r\n",
                "Hello from the network\r\n",
                "OK\r\n"
            )
            .to_string(),
            "AT+CMGD=1" => "OK\r\n".to_string(),
            _ => "ERROR\r\n".to_string(),
        };
        write.write_all(reply.as_bytes()).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (host_read, device_write) = duplex(1024);
    let (host_write, device_read) = duplex(1024);
    tokio::spawn(simulated_modem(device_read, device_write));

    // Subscribers run on the reader task; hand work back to main.
    let (tx, mut arrivals) = mpsc::unbounded_channel();
    let engine = Engine::builder()
        .on_event(sms::NEW_MESSAGE_EVENT, sms::parse_new_message, move |msg| {
            let _ = tx.send(msg);
        })
        .start(host_read, host_write)?;

    sms::set_new_message_indication(&engine, true).await?;

    if let Some(notice) = arrivals.recv().await {
        println!("New message in {} at index {}", notice.storage, notice.index);

        let message = sms::read_message(&engine, notice.index).await?;
        println!("From {}: {}", message.header.address, message.text);

        sms::delete_message(&engine, notice.index).await?;
    }

    Ok(())
}
