//! A small set of modem commands built on the [`Engine`](crate::Engine).
//!
//! Each function composes one request, waits for its confirmation and
//! decodes the response. Event parsers are plain functions suitable for
//! [`EngineBuilder::on_event`](crate::EngineBuilder::on_event):
//!
//! | prefix | parser |
//! |---|---|
//! | `%DNSRSLV` | [`proprietary::parse_dns_result`] |
//! | `%PINGCMD` | [`proprietary::parse_ping_reply`] |
//! | `+CMTI` | [`sms::parse_new_message`] |
//! | `+CMGL` | [`sms::parse_list_record`] |
//! | `+CMGR` | [`sms::parse_read_record`] |

pub mod proprietary;
pub mod sms;
