//! AT command encoding for the ESP8266 serial Wi-Fi modem.
//!
//! Three frame shapes, always CRLF-terminated:
//!
//! ```text
//! bare           AT+RST\r\n
//! query          AT+CWMODE_CUR?\r\n
//! parameterized  AT+CWJAP_CUR="ssid","pass"\r\n
//! ```
//!
//! Every builder computes the exact frame length up front and allocates
//! exactly once; on allocation failure nothing is transmitted and the
//! caller's inputs are untouched. Finished frames are handed to the
//! transmission engine with ownership transferred and completion awaited,
//! so a command call returns once the whole frame is on the wire.
//!
//! Response parsing and association logic live above this layer; received
//! bytes are read straight off the line's receive queue.

use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::logging::format_to_buffer;
use crate::port::LinePort;
use crate::rx::DEFAULT_RX_CAPACITY;
use crate::tx::TxPayload;
use crate::uart::Uart;

/// Frame terminator.
const CRLF: &[u8] = b"\r\n";

// Command keywords, as the modem expects them on the wire.
pub const CMD_RESET: &[u8] = b"AT+RST";
pub const CMD_FIRMWARE_VERSION: &[u8] = b"AT+GMR";
pub const CMD_ECHO_ON: &[u8] = b"ATE1";
pub const CMD_ECHO_OFF: &[u8] = b"ATE0";
pub const CMD_FACTORY_RESET: &[u8] = b"AT+RESTORE";
pub const CMD_SLEEP: &[u8] = b"AT+SLEEP";
pub const CMD_WIFI_MODE_CUR: &[u8] = b"AT+CWMODE_CUR";
pub const CMD_WIFI_MODE_DEF: &[u8] = b"AT+CWMODE_DEF";
pub const CMD_JOIN_AP_CUR: &[u8] = b"AT+CWJAP_CUR";
pub const CMD_JOIN_AP_DEF: &[u8] = b"AT+CWJAP_DEF";
pub const CMD_LIST_APS: &[u8] = b"AT+CWLAP";
pub const CMD_QUIT_AP: &[u8] = b"AT+CWQAP";
pub const CMD_UART_CONFIG_CUR: &[u8] = b"AT+UART_CUR";
pub const CMD_UART_CONFIG_DEF: &[u8] = b"AT+UART_DEF";
pub const CMD_TX_POWER: &[u8] = b"AT+RFPOWER";
pub const CMD_CONNECTION_STATUS: &[u8] = b"AT+CIPSTATUS";
pub const CMD_GET_IP: &[u8] = b"AT+CIFSR";
pub const CMD_MULTIPLEXING: &[u8] = b"AT+CIPMUX";

/// One parameter of a parameterized command.
pub enum Param<'a> {
    /// A single raw character, e.g. a mode digit.
    Char(u8),
    /// A raw byte string, copied verbatim.
    Bytes(&'a [u8]),
    /// A byte string wrapped in double quotes on the wire (SSIDs,
    /// passwords).
    Quoted(&'a [u8]),
}

impl Param<'_> {
    /// On-wire length of this parameter.
    fn wire_len(&self) -> usize {
        match self {
            Param::Char(_) => 1,
            Param::Bytes(bytes) => bytes.len(),
            Param::Quoted(bytes) => bytes.len() + 2,
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Param::Char(c) => out.push(*c),
            Param::Bytes(bytes) => out.extend_from_slice(bytes),
            Param::Quoted(bytes) => {
                out.push(b'"');
                out.extend_from_slice(bytes);
                out.push(b'"');
            }
        }
    }
}

fn frame_with_capacity(len: usize) -> Result<Vec<u8>> {
    let mut frame = Vec::new();
    frame.try_reserve_exact(len).map_err(|_| Error::NoMemory)?;
    Ok(frame)
}

/// Build `KEYWORD\r\n`.
pub fn bare_frame(keyword: &[u8]) -> Result<Vec<u8>> {
    let mut frame = frame_with_capacity(keyword.len() + CRLF.len())?;
    frame.extend_from_slice(keyword);
    frame.extend_from_slice(CRLF);
    Ok(frame)
}

/// Build `KEYWORD?\r\n`.
pub fn query_frame(keyword: &[u8]) -> Result<Vec<u8>> {
    let mut frame = frame_with_capacity(keyword.len() + 1 + CRLF.len())?;
    frame.extend_from_slice(keyword);
    frame.push(b'?');
    frame.extend_from_slice(CRLF);
    Ok(frame)
}

/// Build `KEYWORD=p1,p2,...\r\n`.
///
/// The length is recomputed from the parameter list itself; nothing is
/// inferred from keyword storage sizes.
pub fn param_frame(keyword: &[u8], params: &[Param<'_>]) -> Result<Vec<u8>> {
    if params.is_empty() {
        return Err(Error::WrongArgument);
    }

    let params_len: usize = params.iter().map(Param::wire_len).sum();
    let separators = 1 + (params.len() - 1); // '=' plus the commas
    let len = keyword.len() + separators + params_len + CRLF.len();

    let mut frame = frame_with_capacity(len)?;
    frame.extend_from_slice(keyword);
    frame.push(b'=');
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            frame.push(b',');
        }
        param.write_to(&mut frame);
    }
    frame.extend_from_slice(CRLF);

    debug_assert_eq!(frame.len(), len);
    Ok(frame)
}

/// Whether a configuration command takes effect now or persists in the
/// modem's flash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigScope {
    Current,
    Persistent,
}

/// Wi-Fi operating mode (`AT+CWMODE`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WifiMode {
    Station,
    AccessPoint,
    Both,
}

impl WifiMode {
    fn wire_char(self) -> u8 {
        match self {
            Self::Station => b'1',
            Self::AccessPoint => b'2',
            Self::Both => b'3',
        }
    }
}

/// Modem sleep mode (`AT+SLEEP`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SleepMode {
    Disabled,
    Light,
    Modem,
}

impl SleepMode {
    fn wire_char(self) -> u8 {
        match self {
            Self::Disabled => b'0',
            Self::Light => b'1',
            Self::Modem => b'2',
        }
    }
}

/// Connection multiplexing (`AT+CIPMUX`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Multiplexing {
    Single,
    Multiple,
}

impl Multiplexing {
    fn wire_char(self) -> u8 {
        match self {
            Self::Single => b'0',
            Self::Multiple => b'1',
        }
    }
}

/// Access point credentials for `AT+CWJAP`.
#[derive(Clone, Copy, Debug)]
pub struct AccessPoint<'a> {
    pub ssid: &'a [u8],
    pub password: &'a [u8],
}

/// Serial parameters for reconfiguring the modem's own UART
/// (`AT+UART_CUR` / `AT+UART_DEF`). Wire characters per the AT reference:
/// databits 5-8 literally, stopbits 1/2/3 for 1/1.5/2, parity 0/1/2 for
/// none/odd/even, flow control 0-3 as a bit pair.
#[derive(Clone, Copy, Debug)]
pub struct ModemUartConfig {
    pub baud: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: u8,
    pub flow_control: u8,
}

impl ModemUartConfig {
    pub const fn new_8n1(baud: u32) -> Self {
        Self {
            baud,
            data_bits: b'8',
            stop_bits: b'1',
            parity: b'0',
            flow_control: b'0',
        }
    }
}

/// Command encoder bound to the line the modem is wired to.
///
/// Every method is synchronous: it returns once the frame has been fully
/// clocked out, or with `Busy`/`NoMemory` and nothing transmitted.
pub struct Modem<'a, P: LinePort, const RX: usize = DEFAULT_RX_CAPACITY> {
    uart: &'a Uart<P, RX>,
}

impl<'a, P: LinePort, const RX: usize> Modem<'a, P, RX> {
    pub const fn new(uart: &'a Uart<P, RX>) -> Self {
        Self { uart }
    }

    /// The line this modem talks over.
    pub fn uart(&self) -> &'a Uart<P, RX> {
        self.uart
    }

    /// Pop the oldest response byte from the line's receive queue.
    pub fn read_byte(&self) -> Option<u8> {
        self.uart.read_byte()
    }

    fn transmit(&self, frame: Vec<u8>) -> Result<()> {
        self.uart.send(TxPayload::Owned(frame), true)
    }

    fn send_bare(&self, keyword: &[u8]) -> Result<()> {
        self.transmit(bare_frame(keyword)?)
    }

    fn send_query(&self, keyword: &[u8]) -> Result<()> {
        self.transmit(query_frame(keyword)?)
    }

    fn send_with_params(&self, keyword: &[u8], params: &[Param<'_>]) -> Result<()> {
        self.transmit(param_frame(keyword, params)?)
    }

    fn scoped(current: &'static [u8], persistent: &'static [u8], scope: ConfigScope) -> &'static [u8] {
        match scope {
            ConfigScope::Current => current,
            ConfigScope::Persistent => persistent,
        }
    }

    /// Software-reset the modem.
    pub fn reset(&self) -> Result<()> {
        self.send_bare(CMD_RESET)
    }

    /// Ask for the firmware version string.
    pub fn firmware_version(&self) -> Result<()> {
        self.send_bare(CMD_FIRMWARE_VERSION)
    }

    /// Turn command echo on or off.
    pub fn set_echo(&self, on: bool) -> Result<()> {
        self.send_bare(if on { CMD_ECHO_ON } else { CMD_ECHO_OFF })
    }

    /// Restore the configuration saved in the modem's flash.
    pub fn factory_reset(&self) -> Result<()> {
        self.send_bare(CMD_FACTORY_RESET)
    }

    /// Select the sleep mode.
    pub fn set_sleep_mode(&self, mode: SleepMode) -> Result<()> {
        self.send_with_params(CMD_SLEEP, &[Param::Char(mode.wire_char())])
    }

    /// Select the Wi-Fi operating mode.
    pub fn set_wifi_mode(&self, mode: WifiMode, scope: ConfigScope) -> Result<()> {
        let keyword = Self::scoped(CMD_WIFI_MODE_CUR, CMD_WIFI_MODE_DEF, scope);
        self.send_with_params(keyword, &[Param::Char(mode.wire_char())])
    }

    /// Query the Wi-Fi operating mode.
    pub fn query_wifi_mode(&self, scope: ConfigScope) -> Result<()> {
        self.send_query(Self::scoped(CMD_WIFI_MODE_CUR, CMD_WIFI_MODE_DEF, scope))
    }

    /// Join an access point. SSID and password go out quoted.
    pub fn join_access_point(&self, ap: &AccessPoint<'_>, scope: ConfigScope) -> Result<()> {
        let keyword = Self::scoped(CMD_JOIN_AP_CUR, CMD_JOIN_AP_DEF, scope);
        self.send_with_params(
            keyword,
            &[Param::Quoted(ap.ssid), Param::Quoted(ap.password)],
        )
    }

    /// Leave the current access point.
    pub fn quit_access_point(&self) -> Result<()> {
        self.send_bare(CMD_QUIT_AP)
    }

    /// List visible access points.
    pub fn list_access_points(&self) -> Result<()> {
        self.send_bare(CMD_LIST_APS)
    }

    /// Reconfigure the modem's UART. Takes effect after the response is
    /// sent at the old rate; the caller reconfigures its own line then.
    pub fn set_uart_config(&self, config: &ModemUartConfig, scope: ConfigScope) -> Result<()> {
        let keyword = Self::scoped(CMD_UART_CONFIG_CUR, CMD_UART_CONFIG_DEF, scope);

        let mut baud_text = [0u8; 10];
        let baud_len = format_to_buffer(&mut baud_text, format_args!("{}", config.baud));

        self.send_with_params(
            keyword,
            &[
                Param::Bytes(&baud_text[..baud_len]),
                Param::Char(config.data_bits),
                Param::Char(config.stop_bits),
                Param::Char(config.parity),
                Param::Char(config.flow_control),
            ],
        )
    }

    /// Set the RF TX power, in units of 0.25 dBm, range 0..=82.
    pub fn set_tx_power(&self, quarter_dbm: u8) -> Result<()> {
        if quarter_dbm > 82 {
            return Err(Error::WrongArgument);
        }
        let mut text = [0u8; 3];
        let len = format_to_buffer(&mut text, format_args!("{}", quarter_dbm));
        self.send_with_params(CMD_TX_POWER, &[Param::Bytes(&text[..len])])
    }

    /// Ask for the connection status summary.
    pub fn connection_status(&self) -> Result<()> {
        self.send_bare(CMD_CONNECTION_STATUS)
    }

    /// Ask for the station/AP IP addresses.
    pub fn ip_address(&self) -> Result<()> {
        self.send_bare(CMD_GET_IP)
    }

    /// Select single or multiple connection mode.
    pub fn set_multiplexing(&self, mode: Multiplexing) -> Result<()> {
        self.send_with_params(CMD_MULTIPLEXING, &[Param::Char(mode.wire_char())])
    }
}
