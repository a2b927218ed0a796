//! Vendor-specific (`%`-prefixed) commands.

use crate::at_enum;
use crate::codec::{ArgCursor, AtEnum, IntFormat, ParamList, Quoting, Terminator};
use crate::config::TimeoutClass;
use crate::engine::Engine;
use crate::error::{AtError, Result};

/// Prefix of the asynchronous name resolution result.
pub const DNS_RESOLVE_EVENT: &str = "%DNSRSLV";

/// Prefix of each asynchronous ping reply.
pub const PING_EVENT: &str = "%PINGCMD";

const CERTCMD: &str = "%CERTCMD";

at_enum! {
    /// Radio access technology.
    pub enum Rat {
        Default => "DEFAULT",
        CatM => "CATM",
        NbIot => "NBIOT",
    }
}

at_enum! {
    /// IP address family used for PDN and name resolution.
    pub enum IpFormat {
        Ipv4 => "IP",
        Ipv6 => "IPV6",
        Ipv4v6 => "IPV4V6",
    }
}

impl IpFormat {
    /// Numeric code used where the family is passed as an integer.
    pub fn code(self) -> u8 {
        match self {
            IpFormat::Ipv4 => 0,
            IpFormat::Ipv6 => 1,
            IpFormat::Ipv4v6 => 2,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        Self::ALL
            .get(usize::from(code))
            .copied()
            .ok_or_else(|| AtError::malformed(format!("unknown IP format code {}", code)))
    }
}

/// Remaining PIN/PUK entry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinAttempts {
    pub pin: u8,
    pub puk: u8,
    pub pin2: u8,
    pub puk2: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatStatus {
    pub rat: Rat,
    pub mode: u8,
    pub source: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsResult {
    pub format: IpFormat,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingReply {
    pub id: u8,
    pub address: String,
    /// Round trip time in milliseconds.
    pub rtt: u16,
    pub ttl: u16,
}

/// Optional ping parameters; `None` leaves the device default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PingOptions {
    pub count: Option<u8>,
    pub size: Option<u16>,
    pub timeout: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdnParameters {
    pub session_id: u8,
    /// Empty to leave unchanged.
    pub apn: String,
    pub ip_format: Option<IpFormat>,
}

pub async fn read_network_attachment(engine: &Engine) -> Result<u8> {
    let response = engine
        .request(&ParamList::new("AT%CMATT?"), TimeoutClass::Proprietary)
        .await?;
    response
        .args("%CMATT")?
        .next_int(IntFormat::U8, Terminator::End)
}

pub async fn set_network_attachment(engine: &Engine, attached: bool) -> Result<()> {
    let params = ParamList::new("AT%CMATT=").int(u8::from(attached), IntFormat::U8);
    engine.request(&params, TimeoutClass::Proprietary).await?;
    Ok(())
}

pub async fn read_pin_attempts(engine: &Engine) -> Result<PinAttempts> {
    let response = engine
        .request(&ParamList::new("AT%CPININFO"), TimeoutClass::Proprietary)
        .await?;
    let mut args = response.args("%CPININFO")?;
    Ok(PinAttempts {
        pin: args.next_int(IntFormat::U8, Terminator::Delim)?,
        puk: args.next_int(IntFormat::U8, Terminator::Delim)?,
        pin2: args.next_int(IntFormat::U8, Terminator::Delim)?,
        puk2: args.next_int(IntFormat::U8, Terminator::End)?,
    })
}

/// Switch radio access technology without a full reboot.
pub async fn switch_rat(
    engine: &Engine,
    rat: Rat,
    storage: Option<u8>,
    source: Option<u8>,
) -> Result<()> {
    let params = ParamList::new("AT%RATACT=")
        .enum_value(rat, Quoting::Quoted)
        .opt_int(storage, IntFormat::U8)
        .opt_int(source, IntFormat::U8);
    engine.request(&params, TimeoutClass::Proprietary).await?;
    Ok(())
}

pub async fn read_rat_status(engine: &Engine) -> Result<RatStatus> {
    let response = engine
        .request(&ParamList::new("AT%RATACT?"), TimeoutClass::Proprietary)
        .await?;
    let mut args = response.args("%RATACT")?;
    Ok(RatStatus {
        rat: args.next_enum(Terminator::Delim)?,
        mode: args.next_int(IntFormat::U8, Terminator::Delim)?,
        source: args.next_int(IntFormat::U8, Terminator::End)?,
    })
}

/// Start name resolution; the result arrives as a [`DNS_RESOLVE_EVENT`].
pub async fn resolve_domain_name(
    engine: &Engine,
    session_id: u8,
    domain: &str,
    format: Option<IpFormat>,
) -> Result<()> {
    let params = ParamList::new("AT%DNSRSLV=")
        .int(session_id, IntFormat::U8)
        .quoted(domain)
        .opt_int(format.map(IpFormat::code), IntFormat::U8);
    let mut composer = engine.begin().await;
    composer.compose(&params)?.results_as_events();
    composer.send().await?.confirm(TimeoutClass::Dns).await?;
    Ok(())
}

pub fn parse_dns_result(args: &mut ArgCursor<'_>) -> Result<DnsResult> {
    let code: u8 = args.next_int(IntFormat::U8, Terminator::Delim)?;
    Ok(DnsResult {
        format: IpFormat::from_code(code)?,
        address: args.next_quoted_string_stripped(Terminator::End)?.to_string(),
    })
}

/// Start a ping; each reply arrives as a [`PING_EVENT`].
pub async fn ping(
    engine: &Engine,
    format: IpFormat,
    address: &str,
    options: PingOptions,
) -> Result<()> {
    let params = ParamList::new("AT%PINGCMD=")
        .int(format.code(), IntFormat::U8)
        .quoted(address)
        .opt_int(options.count, IntFormat::U8)
        .opt_int(options.size, IntFormat::U16)
        .opt_int(options.timeout, IntFormat::U16);
    let mut composer = engine.begin().await;
    composer.compose(&params)?.results_as_events();
    composer.send().await?.confirm(TimeoutClass::Proprietary).await?;
    Ok(())
}

pub fn parse_ping_reply(args: &mut ArgCursor<'_>) -> Result<PingReply> {
    Ok(PingReply {
        id: args.next_int(IntFormat::U8, Terminator::Delim)?,
        address: args.next_quoted_string_stripped(Terminator::Delim)?.to_string(),
        rtt: args.next_int(IntFormat::U16, Terminator::Delim)?,
        ttl: args.next_int(IntFormat::U16, Terminator::End)?,
    })
}

/// Names of the stored credential files.
pub async fn list_credentials(engine: &Engine) -> Result<Vec<String>> {
    let params = ParamList::new(format!("AT{}=", CERTCMD)).quoted("DIR");
    let response = engine.request(&params, TimeoutClass::Proprietary).await?;

    let Ok(mut args) = response.args(CERTCMD) else {
        return Ok(Vec::new());
    };
    let count = args.count_args();
    let mut names = Vec::with_capacity(count);
    for i in 0..count {
        let term = if i + 1 == count {
            Terminator::End
        } else {
            Terminator::Delim
        };
        names.push(args.next_quoted_string_stripped(term)?.to_string());
    }
    Ok(names)
}

/// Contents of a credential file.
///
/// PEM content spans several lines; they are joined with `\n`.
pub async fn read_credential(engine: &Engine, name: &str) -> Result<String> {
    let params = ParamList::new(format!("AT{}=", CERTCMD))
        .quoted("READ")
        .quoted(name);
    let response = engine.request(&params, TimeoutClass::Proprietary).await?;

    let first = response.args(CERTCMD)?.rest();
    let mut content = first.to_string();
    for line in response.lines().iter().skip(1) {
        content.push('\n');
        content.push_str(line);
    }

    let content = content.trim();
    let content = content
        .strip_prefix('"')
        .and_then(|c| c.strip_suffix('"'))
        .unwrap_or(content);
    Ok(content.to_string())
}

pub async fn write_credential(engine: &Engine, name: &str, format: u8, data: &str) -> Result<()> {
    let params = ParamList::new(format!("AT{}=", CERTCMD))
        .quoted("WRITE")
        .quoted(name)
        .int(format, IntFormat::U8)
        .quoted(data);
    engine.request(&params, TimeoutClass::Proprietary).await?;
    Ok(())
}

pub async fn delete_credential(engine: &Engine, name: &str) -> Result<()> {
    let params = ParamList::new(format!("AT{}=", CERTCMD))
        .quoted("DELETE")
        .quoted(name);
    engine.request(&params, TimeoutClass::Proprietary).await?;
    Ok(())
}

pub async fn set_pdn_parameters(engine: &Engine, parameters: &PdnParameters) -> Result<()> {
    let apn = (!parameters.apn.is_empty()).then(|| parameters.apn.as_str());
    let params = ParamList::new("AT%PDNSET=")
        .int(parameters.session_id, IntFormat::U8)
        .opt_quoted(apn)
        .opt_enum(parameters.ip_format, Quoting::Quoted);
    engine.request(&params, TimeoutClass::Proprietary).await?;
    Ok(())
}

pub async fn read_pdn_parameters(engine: &Engine) -> Result<PdnParameters> {
    let response = engine
        .request(&ParamList::new("AT%PDNSET?"), TimeoutClass::Proprietary)
        .await?;
    parse_pdn_parameters(&mut response.args("%PDNSET")?)
}

/// `%PDNSET: <session>,<apn>,<ip format>[,...]`; fields after the IP
/// format are not decoded.
pub fn parse_pdn_parameters(args: &mut ArgCursor<'_>) -> Result<PdnParameters> {
    let session_id = args.next_int(IntFormat::U8, Terminator::Delim)?;
    let apn = args.next_quoted_string_stripped(Terminator::Delim)?.to_string();
    let ip_format = args.next_enum(Terminator::Delim)?;
    Ok(PdnParameters {
        session_id,
        apn,
        ip_format: Some(ip_format),
    })
}
