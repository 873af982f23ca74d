use clap::Parser;
use otgw::{Data, Event, Gateway, Reply, message::Value, serial::SerialLink};
use std::{error::Error, time::Duration};
use tokio::time;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Serial port path
    #[arg(short, long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Command to send once the gateway is initialized (e.g. TT=19.5), can be repeated
    #[arg(short, long)]
    command: Vec<String>,

    /// Request summary reports instead of individual messages
    #[arg(short, long)]
    summary: bool,

    /// Seconds to wait before reconnecting after the port is closed
    #[arg(short, long)]
    reconnect: Option<u64>,
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Status(status) => format!("master: {}, slave: {}", status.master, status.slave),
        Value::Number(num) => format!("{num:.2}"),
        Value::Byte(byte) => byte.to_string(),
        Value::Indexed { index, value } => format!("[{index}] = {value}"),
        Value::Capacity {
            capacity,
            modulation_limit,
        } => format!("{capacity} kW, min. modulation {modulation_limit}%"),
        Value::Product {
            product_type,
            version,
        } => format!("type {product_type}, version {version}"),
        Value::Raw {
            byte1,
            byte2,
            fixed_point,
        } => format!("{byte1:02x} {byte2:02x} ({fixed_point:.2})"),
    }
}

fn print_event(event: &Event) {
    match event {
        Event::Data {
            raw,
            data: Data::Message(msg),
        } => println!(
            "{raw}  {:<21} {:<14} {}: {}",
            msg.frame.direction,
            msg.message_type(),
            msg.label,
            format_value(&msg.value)
        ),
        Event::Data {
            data: Data::Summary(record),
            ..
        } => {
            for (name, value) in record.iter() {
                println!("{name}: {value}");
            }
        }
        Event::ProtocolError(code) => eprintln!("Gateway error: {code} ({})", code.description()),
        Event::MalformedData { line, reason } => eprintln!("Malformed line {line:?}: {reason}"),
        other => println!("{other:?}"),
    }
}

fn poll_replies(replies: &mut Vec<(String, Reply)>) {
    replies.retain_mut(|(cmd, reply)| match reply.try_recv() {
        Ok(Some(resp)) => {
            let note = if resp.mismatch { " (mismatch)" } else { "" };

            println!("{cmd}: {}{note}", resp.answer);

            false
        }
        Ok(None) => true,
        Err(_) => false,
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args = Args::parse();
    let mut gw = Gateway::new(SerialLink::new(args.port));
    let mut replies = Vec::new();

    gw.connect().await?;

    loop {
        while let Some(event) = gw.next_event().await {
            print_event(&event);

            if event == Event::Initialized {
                println!(
                    "Gateway: {} ({} mode, hot water {})",
                    gw.about().unwrap_or_default(),
                    gw.mode().map_or("unknown", Into::into),
                    if gw.hot_water_enabled() { "enabled" } else { "disabled" }
                );

                let summary = args.summary.then_some("PS=1");

                for cmd in args.command.iter().map(String::as_str).chain(summary) {
                    match gw.send_command(cmd).await {
                        Ok(reply) => replies.push((cmd.to_owned(), reply)),
                        Err(err) => eprintln!("Failed to send {cmd}: {err}"),
                    }
                }
            }

            poll_replies(&mut replies);
        }

        let Some(secs) = args.reconnect else {
            return Ok(());
        };

        time::sleep(Duration::from_secs(secs)).await;

        if let Err(err) = gw.connect().await {
            eprintln!("Failed to reconnect: {err}");
        }
    }
}
