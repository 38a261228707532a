use std::env;
use std::error::Error;

use futures_util::{SinkExt, StreamExt};
use hub_core::{InboundMessage, OutboundFrame};
use hub_protocol::{decode_outbound, encode_inbound};
use hub_server::identity::{USER_ID_HEADER, USER_NAME_HEADER};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;

/// Parse "<receiver_id> <content...>".
fn parse_line(line: &str) -> Option<InboundMessage> {
    let (receiver, content) = line.split_once(char::is_whitespace)?;
    let receiver_id = receiver.parse().ok()?;
    Some(InboundMessage::new(receiver_id, content.trim()))
}

fn print_frame(frame: &OutboundFrame) {
    match frame {
        OutboundFrame::Direct(m) => println!(
            "[{}] {} ({}): {}",
            m.timestamp.format("%H:%M:%S"),
            m.sender_name,
            m.sender_id,
            m.content
        ),
        OutboundFrame::Presence(p) => println!(
            "* {} ({}) is {}",
            p.display_name,
            p.user_id,
            if p.online { "online" } else { "offline" }
        ),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let (user_id, user_name) = match (args.next(), args.next()) {
        (Some(id), Some(name)) => (id, name),
        _ => {
            eprintln!("usage: chat_client <user_id> <display_name>");
            std::process::exit(2);
        }
    };

    // Where to connect: env override or default.
    let url = env::var("HUB_CLIENT_URL").unwrap_or_else(|_| "ws://127.0.0.1:8000/ws".to_string());

    // Stand-in for the auth layer that would normally set these.
    let mut request = url.as_str().into_client_request()?;
    request.headers_mut().insert(USER_ID_HEADER, user_id.parse()?);
    request.headers_mut().insert(USER_NAME_HEADER, user_name.parse()?);

    println!("Connecting to {} as {} ({})...", url, user_name, user_id);
    let (ws, _response) = tokio_tungstenite::connect_async(request).await?;
    println!("Connected.");
    println!("Type messages like:");
    println!("  2 hello bob");
    println!("Type 'quit' or 'exit' to leave.\n");

    let (mut sink, mut stream) = ws.split();

    let printer = tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            match msg {
                // Anything that is not a status event or envelope is a raw
                // direct message.
                Ok(Message::Text(text)) => match decode_outbound(&text) {
                    Ok(frame) => print_frame(&frame),
                    Err(_) => println!("> {text}"),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    eprintln!("connection error: {e}");
                    break;
                }
            }
        }
        println!("Server closed the connection.");
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
            break;
        }

        let Some(msg) = parse_line(trimmed) else {
            eprintln!("Expected '<receiver_id> <message>'.");
            continue;
        };

        let text = encode_inbound(&msg)?;
        if sink.send(Message::Text(text)).await.is_err() {
            break;
        }
    }

    println!("Exiting client.");
    let _ = sink.close().await;
    let _ = printer.await;
    Ok(())
}
