//! Integration tests for atwire.
//!
//! Each test runs a full engine against a scripted fake modem connected
//! through in-memory duplex streams.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

use atwire::catalog::{proprietary, sms};
use atwire::codec::{ArgCursor, IntFormat, ParamList, Terminator};
use atwire::{AtError, ConfirmStatus, Engine, EngineBuilder, EngineConfig, TimeoutClass};

/// Device side of the connection.
struct FakeModem {
    read: DuplexStream,
    write: DuplexStream,
}

impl FakeModem {
    /// Read one request, up to CRLF or the Ctrl-Z payload terminator.
    async fn expect_request(&mut self) -> String {
        let mut bytes = Vec::new();
        loop {
            let byte = self.read.read_u8().await.unwrap();
            bytes.push(byte);
            if byte == 0x1A || bytes.ends_with(b"\r\n") {
                break;
            }
        }
        String::from_utf8(bytes).unwrap()
    }

    async fn reply(&mut self, text: &str) {
        self.write.write_all(text.as_bytes()).await.unwrap();
    }
}

fn connect(builder: EngineBuilder) -> (Engine, FakeModem) {
    let (host_read, device_write) = duplex(4096);
    let (host_write, device_read) = duplex(4096);
    let engine = builder.start(host_read, host_write).unwrap();
    (
        engine,
        FakeModem {
            read: device_read,
            write: device_write,
        },
    )
}

/// Response payload "5,10,3,2" decodes to four u8 values in order.
#[tokio::test]
async fn test_read_pin_attempts() {
    let (engine, mut modem) = connect(Engine::builder());

    let device = tokio::spawn(async move {
        assert_eq!(modem.expect_request().await, "AT%CPININFO\r\n");
        modem.reply("\r\n%CPININFO: 5,10,3,2\r\n\r\nOK\r\n").await;
        modem
    });

    let attempts = proprietary::read_pin_attempts(&engine).await.unwrap();
    assert_eq!(
        (attempts.pin, attempts.puk, attempts.pin2, attempts.puk2),
        (5, 10, 3, 2)
    );
    device.await.unwrap();
}

/// An unrelated event between the response payload and the confirmation
/// reaches its subscriber exactly once and leaves the payload intact.
#[tokio::test]
async fn test_event_interleaved_with_response() {
    let (tx, mut events) = mpsc::unbounded_channel();
    let (engine, mut modem) = connect(Engine::builder().on_event(
        sms::NEW_MESSAGE_EVENT,
        sms::parse_new_message,
        move |msg| {
            let _ = tx.send(msg);
        },
    ));

    let device = tokio::spawn(async move {
        modem.expect_request().await;
        modem
            .reply("%CPININFO: 5,10,3,2\r\n+CMTI: \"SM\",3\r\nOK\r\n")
            .await;
        modem
    });

    let attempts = proprietary::read_pin_attempts(&engine).await.unwrap();
    assert_eq!(attempts.puk2, 2);

    let msg = events.recv().await.unwrap();
    assert_eq!(msg.storage, sms::Storage::Sim);
    assert_eq!(msg.index, 3);
    assert!(events.try_recv().is_err());

    device.await.unwrap();
}

/// No confirmation within the class timeout fails instead of hanging, and
/// the engine accepts the next request afterwards.
#[tokio::test(start_paused = true)]
async fn test_timeout_then_next_request() {
    let (engine, mut modem) = connect(
        Engine::builder().timeout(TimeoutClass::Sms, Duration::from_millis(500)),
    );

    let device = tokio::spawn(async move {
        assert_eq!(modem.expect_request().await, "AT+CMGD=4\r\n");
        // Silence.
        assert_eq!(modem.expect_request().await, "AT+CMGD=5\r\n");
        modem.reply("OK\r\n").await;
        modem
    });

    let err = sms::delete_message(&engine, 4).await.unwrap_err();
    assert!(matches!(
        err,
        AtError::TransactionTimeout {
            class: TimeoutClass::Sms,
            after
        } if after == Duration::from_millis(500)
    ));

    sms::delete_message(&engine, 5).await.unwrap();
    device.await.unwrap();
}

/// A confirmation other than the expected one fails and exposes the status.
#[tokio::test]
async fn test_mismatched_confirmation() {
    let (engine, mut modem) = connect(Engine::builder());

    let device = tokio::spawn(async move {
        modem.expect_request().await;
        modem.reply("ERROR\r\n").await;
        modem.expect_request().await;
        modem.reply("+CMS ERROR: 500\r\n").await;
        modem
    });

    let err = proprietary::set_network_attachment(&engine, true)
        .await
        .unwrap_err();
    assert!(matches!(err, AtError::UnexpectedStatus { .. }));
    assert_eq!(err.status(), Some(ConfirmStatus::Failure));

    let err = sms::delete_message(&engine, 1).await.unwrap_err();
    assert_eq!(err.device_error().map(|e| e.code), Some(500));

    device.await.unwrap();
}

/// Expecting a failure status succeeds when the device reports it.
#[tokio::test]
async fn test_expected_failure_status() {
    let (engine, mut modem) = connect(Engine::builder());

    let device = tokio::spawn(async move {
        modem.expect_request().await;
        modem.reply("ERROR\r\n").await;
        modem
    });

    let mut composer = engine.begin().await;
    composer.compose(&ParamList::new("AT+CFUN=99")).unwrap();
    let response = composer
        .send()
        .await
        .unwrap()
        .wait_for_confirm(TimeoutClass::Power, ConfirmStatus::Failure)
        .await
        .unwrap();
    assert!(response.is_empty());

    device.await.unwrap();
}

/// Omitted trailing parameters vanish; an omitted middle one leaves an
/// empty field.
#[tokio::test]
async fn test_trailing_optional_wire_form() {
    let (engine, mut modem) = connect(Engine::builder());

    let device = tokio::spawn(async move {
        let mut requests = Vec::new();
        for _ in 0..3 {
            requests.push(modem.expect_request().await);
            modem.reply("OK\r\n").await;
        }
        requests
    });

    sms::set_storage_locations(&engine, sms::Storage::Sim, None, Some(sms::Storage::Phone))
        .await
        .unwrap();
    proprietary::ping(
        &engine,
        proprietary::IpFormat::Ipv4,
        "8.8.8.8",
        proprietary::PingOptions::default(),
    )
    .await
    .unwrap();
    proprietary::switch_rat(&engine, proprietary::Rat::CatM, Some(1), None)
        .await
        .unwrap();

    assert_eq!(
        device.await.unwrap(),
        vec![
            "AT+CPMS=\"SM\",,\"ME\"\r\n",
            "AT%PINGCMD=0,\"8.8.8.8\"\r\n",
            "AT%RATACT=\"CATM\",1\r\n",
        ]
    );
}

/// Payload-bearing request: command head, CR, payload, Ctrl-Z.
#[tokio::test]
async fn test_send_message_with_payload() {
    let (engine, mut modem) = connect(Engine::builder());

    let device = tokio::spawn(async move {
        let request = modem.expect_request().await;
        modem.reply("> ").await;
        modem.reply("\r\n+CMGS: 12\r\n\r\nOK\r\n").await;
        request
    });

    let reference = sms::send_message(&engine, "+4917", None, "hello")
        .await
        .unwrap();
    assert_eq!(reference, 12);
    assert_eq!(device.await.unwrap(), "AT+CMGS=\"+4917\"\rhello\x1a");
}

/// The device echo of the command is neither captured nor dispatched.
#[tokio::test]
async fn test_echo_suppressed() {
    let (engine, mut modem) = connect(Engine::builder());

    let device = tokio::spawn(async move {
        modem.expect_request().await;
        modem.reply("AT%CMATT?\r\n%CMATT: 1\r\nOK\r\n").await;
        modem
    });

    let mut composer = engine.begin().await;
    composer.compose(&ParamList::new("AT%CMATT?")).unwrap();
    let response = composer
        .send()
        .await
        .unwrap()
        .confirm(TimeoutClass::Proprietary)
        .await
        .unwrap();
    assert_eq!(response.lines(), ["%CMATT: 1"]);

    device.await.unwrap();
}

/// Results that arrive with a registered prefix go to the subscriber.
#[tokio::test]
async fn test_dns_result_as_event() {
    let (tx, mut results) = mpsc::unbounded_channel();
    let (engine, mut modem) = connect(Engine::builder().on_event(
        proprietary::DNS_RESOLVE_EVENT,
        proprietary::parse_dns_result,
        move |result| {
            let _ = tx.send(result);
        },
    ));

    let device = tokio::spawn(async move {
        let request = modem.expect_request().await;
        modem.reply("%DNSRSLV: 0,\"93.184.216.34\"\r\nOK\r\n").await;
        request
    });

    proprietary::resolve_domain_name(&engine, 1, "example.com", None)
        .await
        .unwrap();
    assert_eq!(device.await.unwrap(), "AT%DNSRSLV=1,\"example.com\"\r\n");

    let result = results.recv().await.unwrap();
    assert_eq!(result.address, "93.184.216.34");
}

/// A malformed event is dropped; the next one is delivered.
#[tokio::test]
async fn test_malformed_event_skipped() {
    let (tx, mut events) = mpsc::unbounded_channel();
    let (_engine, mut modem) = connect(Engine::builder().on_event(
        sms::NEW_MESSAGE_EVENT,
        sms::parse_new_message,
        move |msg| {
            let _ = tx.send(msg);
        },
    ));

    modem
        .reply("+CMTI: \"SM\",lots\r\n+CREG: 1\r\n+CMTI: \"ME\",4\r\n")
        .await;

    let msg = events.recv().await.unwrap();
    assert_eq!(msg.storage, sms::Storage::Phone);
    assert_eq!(msg.index, 4);
}

/// Only one request may be composed or in flight at a time.
#[tokio::test]
async fn test_busy_while_in_flight() {
    let (engine, mut modem) = connect(Engine::builder());

    let mut composer = engine.begin().await;
    composer.compose(&ParamList::new("AT")).unwrap();
    let pending = composer.send().await.unwrap();

    assert!(matches!(engine.try_begin(), Err(AtError::Busy)));

    assert_eq!(modem.expect_request().await, "AT\r\n");
    modem.reply("OK\r\n").await;
    pending.confirm(TimeoutClass::General).await.unwrap();

    assert!(engine.try_begin().is_ok());
}

/// Events subscribed at runtime, list responses parsed line by line.
#[tokio::test]
async fn test_list_messages_and_runtime_subscription() {
    let (engine, mut modem) = connect(Engine::builder());

    let (tx, mut pings) = mpsc::unbounded_channel();
    engine.subscribe(proprietary::PING_EVENT, proprietary::parse_ping_reply, move |r| {
        let _ = tx.send(r);
    });

    let device = tokio::spawn(async move {
        assert_eq!(modem.expect_request().await, "AT+CMGL=\"ALL\"\r\n");
        modem
            .reply(concat!(
                "+CMGL: 1,\"REC READ\",\"+4917\",,\"24/01/01,12:00:00+04\"\r\n",
                "hi there\r\n",
                "%PINGCMD: 1,\"8.8.8.8\",40,117\r\n",
                "+CMGL: 2,\"STO UNSENT\",\"+4918\"\r\n",
                "draft\r\n",
                "OK\r\n",
            ))
            .await;
        modem
    });

    let messages = sms::list_messages(&engine, sms::MessageState::All)
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text, "hi there");
    assert_eq!(
        messages[0].header.timestamp.as_deref(),
        Some("24/01/01,12:00:00+04")
    );
    assert_eq!(messages[1].header.state, sms::MessageState::StoredUnsent);

    assert_eq!(pings.recv().await.unwrap().rtt, 40);
    device.await.unwrap();
}

/// A subscriber for the listing prefix does not take the listing's own
/// header lines; unsolicited records still reach it.
#[tokio::test]
async fn test_list_messages_with_record_subscriber() {
    let (tx, mut records) = mpsc::unbounded_channel();
    let (engine, mut modem) = connect(Engine::builder().on_event(
        "+CMGL",
        sms::parse_list_record,
        move |header| {
            let _ = tx.send(header);
        },
    ));

    let device = tokio::spawn(async move {
        modem.expect_request().await;
        modem
            .reply("+CMGL: 1,\"REC READ\",\"+4917\"\r\nhi\r\nOK\r\n")
            .await;
        modem
            .reply("+CMGL: 9,\"REC UNREAD\",\"+4918\"\r\n")
            .await;
        modem
    });

    let messages = sms::list_messages(&engine, sms::MessageState::All)
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].header.index, Some(1));
    assert_eq!(messages[0].text, "hi");

    assert_eq!(records.recv().await.unwrap().index, Some(9));
    assert!(records.try_recv().is_err());
    device.await.unwrap();
}

/// A subscriber may unsubscribe itself without stalling the engine.
#[tokio::test]
async fn test_subscriber_unsubscribes_itself() {
    let (engine, mut modem) = connect(Engine::builder());
    let engine = Arc::new(engine);

    let (tx, mut events) = mpsc::unbounded_channel();
    let weak = Arc::downgrade(&engine);
    engine.subscribe(sms::NEW_MESSAGE_EVENT, sms::parse_new_message, move |msg| {
        if let Some(engine) = weak.upgrade() {
            engine.unsubscribe(sms::NEW_MESSAGE_EVENT);
        }
        let _ = tx.send(msg);
    });

    let device = tokio::spawn(async move {
        modem.reply("+CMTI: \"SM\",1\r\n+CMTI: \"SM\",2\r\n").await;
        assert_eq!(modem.expect_request().await, "AT+CMGD=1\r\n");
        modem.reply("OK\r\n").await;
        modem
    });

    assert_eq!(events.recv().await.unwrap().index, 1);
    tokio::time::timeout(Duration::from_secs(2), sms::delete_message(&engine, 1))
        .await
        .expect("engine stalled")
        .unwrap();
    assert!(events.try_recv().is_err());
    device.await.unwrap();
}

/// JSON configuration reaches the engine.
#[tokio::test]
async fn test_engine_from_json_config() {
    let config = EngineConfig::from_json(
        r#"{ "timeouts": { "general": 250 }, "precedence": "confirmation_first" }"#,
    )
    .unwrap();
    let (engine, _modem) = connect(Engine::builder().config(config));

    assert_eq!(
        engine.config().timeouts.get(TimeoutClass::General),
        Duration::from_millis(250)
    );
}

/// Codec pieces compose the way the catalog uses them.
#[test]
fn test_codec_round_trip_through_param_list() {
    let mut buf = atwire::codec::CommandBuffer::with_capacity(64);
    ParamList::new("AT%X=")
        .int(-5, IntFormat::I8)
        .int(0xBEEFu16, IntFormat::HEX16)
        .finish(&mut buf)
        .unwrap();
    assert_eq!(buf.as_bytes(), b"AT%X=-5,BEEF\r\n");

    let mut args = ArgCursor::new("-5,BEEF");
    assert_eq!(
        args.next_int::<i8>(IntFormat::I8, Terminator::Delim).unwrap(),
        -5
    );
    assert_eq!(
        args.next_int::<u16>(IntFormat::HEX16, Terminator::End).unwrap(),
        0xBEEF
    );
}
