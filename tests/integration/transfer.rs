use crate::*;

use std::time::Duration;

use anyhow::Result;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use reverb_core::chunk::{reversed_output_path, split_chunks};
use reverb_core::wire::reverse_chunk;
use reverb_net::client::{run_transfer, TransferError};

/// "HELLO WORLD" at a fixed chunk length of 5, all the way through to the
/// derived output file.
#[tokio::test]
async fn hello_world_end_to_end() -> Result<()> {
    let (addr, _shutdown) = start_server(4).await?;

    let dir = std::env::temp_dir().join(format!("reverb-e2e-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let input = dir.join("greeting.txt");
    std::fs::write(&input, "HELLO WORLD")?;

    let content = std::fs::read_to_string(&input)?;
    let mut rng = StdRng::seed_from_u64(0);
    let chunks = split_chunks(&content, 5, 5, &mut rng)?;
    assert_eq!(chunks, vec!["HELLO", " WORL", "D"]);

    let mut stream = TcpStream::connect(addr).await?;
    let mut printed = Vec::new();
    let reversed = run_transfer(&mut stream, &chunks, |i, text| {
        printed.push(format!("{i}: {text}"));
    })
    .await?;

    assert_eq!(reversed, "OLLEHLROW D");
    assert_eq!(printed, vec!["1: OLLEH", "2: LROW ", "3: D"]);

    let output = reversed_output_path(&input);
    std::fs::write(&output, &reversed)?;
    assert_eq!(output, dir.join("greeting_reversed.txt"));
    assert_eq!(std::fs::read_to_string(&output)?, "OLLEHLROW D");

    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}

/// Random chunk lengths: the reassembled result is exactly the per-chunk
/// reversal, and sending it back restores the original text.
#[tokio::test]
async fn random_lengths_round_trip() -> Result<()> {
    let (addr, _shutdown) = start_server(4).await?;

    let content = "Pack my box with five dozen liquor jugs. \
                   Sphinx of black quartz, judge my vow.";

    for seed in [1u64, 2, 3] {
        let mut rng = StdRng::seed_from_u64(seed);
        let chunks = split_chunks(content, 2, 13, &mut rng)?;

        let mut stream = TcpStream::connect(addr).await?;
        let reversed = run_transfer(&mut stream, &chunks, |_, _| {}).await?;

        let expected: String = chunks.iter().map(|c| reverse_chunk(c)).collect();
        assert_eq!(reversed, expected);

        // Send the reversed pieces back: reversal is an involution.
        let back: Vec<String> = chunks.iter().map(|c| reverse_chunk(c)).collect();
        let mut stream = TcpStream::connect(addr).await?;
        let restored = run_transfer(&mut stream, &back, |_, _| {}).await?;
        assert_eq!(restored, content);
    }
    Ok(())
}

#[tokio::test]
async fn non_ascii_content_survives_the_trip() -> Result<()> {
    let (addr, _shutdown) = start_server(4).await?;

    let content = "smörgåsbord — これはテストです — ζωή";
    let mut rng = StdRng::seed_from_u64(9);
    let chunks = split_chunks(content, 3, 8, &mut rng)?;

    let mut stream = TcpStream::connect(addr).await?;
    let reversed = run_transfer(&mut stream, &chunks, |_, _| {}).await?;

    let expected: String = chunks.iter().map(|c| reverse_chunk(c)).collect();
    assert_eq!(reversed, expected);
    Ok(())
}

/// Several clients at once — sessions are independent.
#[tokio::test]
async fn concurrent_clients_do_not_interfere() -> Result<()> {
    let (addr, _shutdown) = start_server(8).await?;

    let mut handles = Vec::new();
    for n in 0..6u64 {
        handles.push(tokio::spawn(async move {
            let content = format!("client {n} payload {}", "x".repeat(n as usize * 10));
            let mut rng = StdRng::seed_from_u64(n);
            let chunks = split_chunks(&content, 3, 9, &mut rng).unwrap();
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let reversed = run_transfer(&mut stream, &chunks, |_, _| {}).await.unwrap();
            let expected: String = chunks.iter().map(|c| reverse_chunk(c)).collect();
            assert_eq!(reversed, expected);
        }));
    }
    for handle in handles {
        handle.await?;
    }
    Ok(())
}

/// With a single session slot, a second client waits in the backlog until
/// the first connection closes.
#[tokio::test]
async fn connection_cap_queues_excess_clients() -> Result<()> {
    let (addr, _shutdown) = start_server(1).await?;

    // First client takes the only slot and holds it open mid-session.
    let mut holder = TcpStream::connect(addr).await?;
    holder.write_all(b"INIT0001").await?;
    let mut agre = [0u8; 4];
    holder.read_exact(&mut agre).await?;
    assert_eq!(&agre, b"AGRE");

    // Second client can connect but gets no service while the slot is held.
    let second = tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        run_transfer(&mut stream, &["queued".to_string()], |_, _| {})
            .await
            .unwrap()
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!second.is_finished(), "second client served before slot freed");

    drop(holder);
    let reversed = tokio::time::timeout(Duration::from_secs(5), second).await??;
    assert_eq!(reversed, "deueuq");
    Ok(())
}

/// A handshake answered with anything but AGRE aborts the transfer, so the
/// caller never writes an output file.
#[tokio::test]
async fn non_agre_handshake_reply_aborts() -> Result<()> {
    let fake = TcpListener::bind("127.0.0.1:0").await?;
    let addr = fake.local_addr()?;
    tokio::spawn(async move {
        let (mut conn, _) = fake.accept().await.unwrap();
        let mut init = [0u8; 8];
        conn.read_exact(&mut init).await.unwrap();
        conn.write_all(b"ANS_").await.unwrap();
    });

    let mut stream = TcpStream::connect(addr).await?;
    let dir = std::env::temp_dir().join(format!("reverb-abort-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let input = dir.join("doc.txt");

    let result = run_transfer(&mut stream, &["abc".to_string()], |_, _| {}).await;
    assert!(matches!(result, Err(TransferError::Wire(_))));

    // The driver failed, so the caller skips the write: no output file.
    assert!(!reversed_output_path(&input).exists());
    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}

/// A server that disappears mid-frame surfaces truncation, not a short chunk.
#[tokio::test]
async fn server_closing_mid_frame_is_truncation() -> Result<()> {
    let fake = TcpListener::bind("127.0.0.1:0").await?;
    let addr = fake.local_addr()?;
    tokio::spawn(async move {
        let (mut conn, _) = fake.accept().await.unwrap();
        let mut init = [0u8; 8];
        conn.read_exact(&mut init).await.unwrap();
        conn.write_all(b"AGRE").await.unwrap();
        let mut req = [0u8; 12];
        conn.read_exact(&mut req).await.unwrap();
        // Declares four bytes, delivers one, hangs up.
        conn.write_all(b"ANS_0004o").await.unwrap();
    });

    let mut stream = TcpStream::connect(addr).await?;
    let result = run_transfer(&mut stream, &["honk".to_string()], |_, _| {}).await;
    assert!(matches!(
        result,
        Err(TransferError::Wire(reverb_core::wire::WireError::Truncated(_)))
    ));
    Ok(())
}

/// One misbehaving client never affects the next one.
#[tokio::test]
async fn bad_client_leaves_server_healthy() -> Result<()> {
    let (addr, _shutdown) = start_server(4).await?;

    // Garbage tag: the server logs and closes that connection.
    let mut bad = TcpStream::connect(addr).await?;
    bad.write_all(b"XXXXXXXX").await?;
    let mut buf = Vec::new();
    bad.read_to_end(&mut buf).await?;
    assert!(buf.is_empty(), "garbage must not get a reply");
    drop(bad);

    // A well-behaved client is served as usual.
    let mut good = TcpStream::connect(addr).await?;
    let reversed = run_transfer(&mut good, &["fine".to_string()], |_, _| {}).await?;
    assert_eq!(reversed, "enif");
    Ok(())
}

/// REQ_ with no prior INIT is served; the server does not gate requests on
/// the handshake.
#[tokio::test]
async fn request_without_handshake_is_served() -> Result<()> {
    let (addr, _shutdown) = start_server(4).await?;

    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(b"REQ_0005HELLO").await?;

    let mut reply = [0u8; 13];
    stream.read_exact(&mut reply).await?;
    assert_eq!(&reply, b"ANS_0005OLLEH");
    Ok(())
}
