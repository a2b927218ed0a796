//! Short message service commands (text mode).
//!
//! Listing and reading return the message header line and its text as one
//! [`Message`]; the text is the line(s) following each header.

use crate::at_enum;
use crate::codec::{ArgCursor, IntFormat, ParamList, Quoting, Terminator};
use crate::config::TimeoutClass;
use crate::engine::Engine;
use crate::error::{AtError, Result};
use crate::protocol::split_prefix;
use crate::transaction::Response;

/// Prefix of the new-message notification.
pub const NEW_MESSAGE_EVENT: &str = "+CMTI";

const LIST_PREFIX: &str = "+CMGL";
const READ_PREFIX: &str = "+CMGR";

at_enum! {
    /// Message status filter and record state.
    pub enum MessageState {
        ReceivedUnread => "REC UNREAD",
        ReceivedRead => "REC READ",
        StoredUnsent => "STO UNSENT",
        StoredSent => "STO SENT",
        All => "ALL",
    }
}

at_enum! {
    /// Message storage area.
    pub enum Storage {
        Broadcast => "BM",
        Phone => "ME",
        Any => "MT",
        Sim => "SM",
        TerminalAdapter => "TA",
        StatusReport => "SR",
    }
}

/// Usage of one storage area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageSlot {
    pub storage: Storage,
    pub used: u8,
    pub total: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageUsage {
    pub read_delete: StorageSlot,
    pub write_send: StorageSlot,
    pub receive: StorageSlot,
}

/// `+CMTI` notification: a message was stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewMessage {
    pub storage: Storage,
    pub index: u8,
}

/// Header fields of a listed or read message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    /// Storage index; not reported by `+CMGR`.
    pub index: Option<u8>,
    pub state: MessageState,
    pub address: String,
    /// Service centre timestamp, present for received messages.
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub text: String,
}

/// Select storage areas; omitted areas are left unchanged.
pub async fn set_storage_locations(
    engine: &Engine,
    read_delete: Storage,
    write_send: Option<Storage>,
    receive: Option<Storage>,
) -> Result<()> {
    let params = ParamList::new("AT+CPMS=")
        .enum_value(read_delete, Quoting::Quoted)
        .opt_enum(write_send, Quoting::Quoted)
        .opt_enum(receive, Quoting::Quoted);
    engine.request(&params, TimeoutClass::Sms).await?;
    Ok(())
}

pub async fn read_storage_usage(engine: &Engine) -> Result<StorageUsage> {
    let response = engine
        .request(&ParamList::new("AT+CPMS?"), TimeoutClass::Sms)
        .await?;
    let mut args = response.args("+CPMS")?;

    let read_delete = storage_slot(&mut args, Terminator::Delim)?;
    let write_send = storage_slot(&mut args, Terminator::Delim)?;
    let receive = storage_slot(&mut args, Terminator::End)?;
    Ok(StorageUsage {
        read_delete,
        write_send,
        receive,
    })
}

fn storage_slot(args: &mut ArgCursor<'_>, last: Terminator) -> Result<StorageSlot> {
    Ok(StorageSlot {
        storage: args.next_enum(Terminator::Delim)?,
        used: args.next_int(IntFormat::U8, Terminator::Delim)?,
        total: args.next_int(IntFormat::U8, last)?,
    })
}

pub async fn delete_message(engine: &Engine, index: u8) -> Result<()> {
    let params = ParamList::new("AT+CMGD=").int(index, IntFormat::U8);
    engine.request(&params, TimeoutClass::Sms).await?;
    Ok(())
}

/// Delete every stored message (delete flag 4).
pub async fn delete_all_messages(engine: &Engine) -> Result<()> {
    let params = ParamList::new("AT+CMGD=")
        .int(0u8, IntFormat::U8)
        .int(4u8, IntFormat::U8);
    engine.request(&params, TimeoutClass::Sms).await?;
    Ok(())
}

/// Send a text message; returns the message reference.
pub async fn send_message(
    engine: &Engine,
    address: &str,
    address_type: Option<u8>,
    text: &str,
) -> Result<u8> {
    let params = ParamList::new("AT+CMGS=")
        .quoted(address)
        .opt_int(address_type, IntFormat::U8);
    let response = engine
        .request_with_payload(&params, text.as_bytes(), TimeoutClass::Sms)
        .await?;
    response
        .args("+CMGS")?
        .next_int(IntFormat::U8, Terminator::End)
}

/// Turn `+CMTI` notifications on or off.
pub async fn set_new_message_indication(engine: &Engine, enabled: bool) -> Result<()> {
    let (mode, mt) = if enabled { (2u8, 1u8) } else { (1, 0) };
    let params = ParamList::new("AT+CNMI=")
        .int(mode, IntFormat::U8)
        .int(mt, IntFormat::U8);
    engine.request(&params, TimeoutClass::Sms).await?;
    Ok(())
}

pub async fn list_messages(engine: &Engine, filter: MessageState) -> Result<Vec<Message>> {
    let params = ParamList::new("AT+CMGL=").enum_value(filter, Quoting::Quoted);
    let response = engine.request(&params, TimeoutClass::Sms).await?;
    collect_messages(&response, LIST_PREFIX, parse_list_record)
}

pub async fn read_message(engine: &Engine, index: u8) -> Result<Message> {
    let params = ParamList::new("AT+CMGR=").int(index, IntFormat::U8);
    let response = engine.request(&params, TimeoutClass::Sms).await?;
    collect_messages(&response, READ_PREFIX, parse_read_record)?
        .into_iter()
        .next()
        .ok_or_else(|| AtError::malformed(format!("no message at index {}", index)))
}

fn collect_messages(
    response: &Response,
    prefix: &str,
    parse: fn(&mut ArgCursor<'_>) -> Result<MessageHeader>,
) -> Result<Vec<Message>> {
    let mut messages: Vec<Message> = Vec::new();

    for line in response.lines() {
        match split_prefix(line) {
            Some((p, args)) if p == prefix => {
                let header = parse(&mut ArgCursor::new(args))?;
                messages.push(Message {
                    header,
                    text: String::new(),
                });
            }
            _ => {
                let message = messages.last_mut().ok_or_else(|| {
                    AtError::malformed(format!("text before first {} line", prefix))
                })?;
                if !message.text.is_empty() {
                    message.text.push('\n');
                }
                message.text.push_str(line);
            }
        }
    }

    Ok(messages)
}

/// `+CMTI: <storage>,<index>`
pub fn parse_new_message(args: &mut ArgCursor<'_>) -> Result<NewMessage> {
    Ok(NewMessage {
        storage: args.next_enum(Terminator::Delim)?,
        index: args.next_int(IntFormat::U8, Terminator::End)?,
    })
}

/// `+CMGL: <index>,<state>,<address>[,<alpha>,<timestamp>]`
pub fn parse_list_record(args: &mut ArgCursor<'_>) -> Result<MessageHeader> {
    let index = args.next_int(IntFormat::U8, Terminator::Delim)?;
    let mut header = parse_read_record(args)?;
    header.index = Some(index);
    Ok(header)
}

/// `+CMGR: <state>,<address>[,<alpha>,<timestamp>]`
pub fn parse_read_record(args: &mut ArgCursor<'_>) -> Result<MessageHeader> {
    let state = args.next_enum(Terminator::Delim)?;
    let address = args
        .next_quoted_string_stripped(Terminator::Delim)?
        .to_string();

    let timestamp = if args.count_args() >= 2 {
        args.next_string(Terminator::Delim)?;
        Some(
            args.next_quoted_string_stripped(Terminator::Delim)?
                .to_string(),
        )
    } else {
        None
    };

    Ok(MessageHeader {
        index: None,
        state,
        address,
        timestamp,
    })
}
