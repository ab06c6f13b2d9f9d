//! Modbus TCP transport for coil writes

use crate::channel::ChannelId;
use crate::config::PlcConfig;
use crate::error::CnsError;
use crate::port::ActuatorPort;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;
const EXCEPTION_FLAG: u8 = 0x80;
const COIL_ON: u16 = 0xFF00;
const COIL_OFF: u16 = 0x0000;
const MBAP_HEADER_LEN: usize = 7;
/// Largest ADU allowed by Modbus TCP
const MAX_ADU_LEN: usize = 260;

/// Encode a Write Single Coil request ADU.
pub fn encode_write_single_coil(transaction_id: u16, unit_id: u8, address: u16, active: bool) -> Bytes {
    let mut buf = BytesMut::with_capacity(12);
    buf.put_u16(transaction_id);
    buf.put_u16(0); // protocol id
    buf.put_u16(6);
    buf.put_u8(unit_id);
    buf.put_u8(FC_WRITE_SINGLE_COIL);
    buf.put_u16(address);
    buf.put_u16(if active { COIL_ON } else { COIL_OFF });
    buf.freeze()
}

/// Decoded controller reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoilReply {
    /// Echo of the written address and value
    Written { address: u16, active: bool },
    /// Modbus exception code
    Exception(u8),
}

/// Check a reply ADU against the request that produced it.
pub fn decode_reply(frame: &[u8], transaction_id: u16, unit_id: u8) -> Result<CoilReply, String> {
    if frame.len() < MBAP_HEADER_LEN + 1 {
        return Err(format!("reply too short: {} bytes", frame.len()));
    }

    let mut buf = frame;
    let tid = buf.get_u16();
    let protocol = buf.get_u16();
    let length = buf.get_u16() as usize;
    let unit = buf.get_u8();

    if tid != transaction_id {
        return Err(format!("transaction id mismatch: sent {}, got {}", transaction_id, tid));
    }
    if protocol != 0 {
        return Err(format!("unexpected protocol id {}", protocol));
    }
    if unit != unit_id {
        return Err(format!("unit id mismatch: sent {}, got {}", unit_id, unit));
    }
    if length != buf.remaining() + 1 {
        return Err(format!("length field {} does not match payload", length));
    }

    let function = buf.get_u8();
    if function == FC_WRITE_SINGLE_COIL | EXCEPTION_FLAG {
        if buf.remaining() < 1 {
            return Err("exception reply without code".to_string());
        }
        return Ok(CoilReply::Exception(buf.get_u8()));
    }
    if function != FC_WRITE_SINGLE_COIL {
        return Err(format!("unexpected function code {:#04x}", function));
    }
    if buf.remaining() != 4 {
        return Err(format!("write reply has {} data bytes", buf.remaining()));
    }

    let address = buf.get_u16();
    let value = buf.get_u16();
    let active = match value {
        COIL_ON => true,
        COIL_OFF => false,
        other => return Err(format!("invalid coil value {:#06x}", other)),
    };
    Ok(CoilReply::Written { address, active })
}

/// Blocking Modbus TCP client.
///
/// After a communication fault the socket is dropped and the next write
/// reconnects once before giving up on that write.
pub struct ModbusTcpPort {
    config: PlcConfig,
    stream: Option<TcpStream>,
    transaction_id: u16,
    opened: bool,
}

impl ModbusTcpPort {
    pub fn new(config: PlcConfig) -> Self {
        Self {
            config,
            stream: None,
            transaction_id: 0,
            opened: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn open_stream(&self) -> Result<TcpStream, String> {
        let endpoint = self.config.endpoint();
        let addrs: Vec<SocketAddr> = endpoint
            .to_socket_addrs()
            .map_err(|e| e.to_string())?
            .collect();
        if addrs.is_empty() {
            return Err(format!("{} did not resolve", endpoint));
        }

        let mut last_err = String::new();
        for addr in addrs {
            let attempt = match self.config.connect_timeout_ms {
                Some(ms) => TcpStream::connect_timeout(&addr, Duration::from_millis(ms)),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    let timeout = self.config.io_timeout_ms.map(Duration::from_millis);
                    stream.set_read_timeout(timeout).map_err(|e| e.to_string())?;
                    stream.set_write_timeout(timeout).map_err(|e| e.to_string())?;
                    let _ = stream.set_nodelay(true);
                    return Ok(stream);
                }
                Err(e) => last_err = e.to_string(),
            }
        }
        Err(last_err)
    }

    fn next_transaction_id(&mut self) -> u16 {
        self.transaction_id = self.transaction_id.wrapping_add(1);
        self.transaction_id
    }

    fn exchange(stream: &mut TcpStream, request: &[u8]) -> std::io::Result<Vec<u8>> {
        stream.write_all(request)?;
        stream.flush()?;

        let mut header = [0u8; MBAP_HEADER_LEN];
        stream.read_exact(&mut header)?;
        let length = u16::from_be_bytes([header[4], header[5]]) as usize;
        if length == 0 || MBAP_HEADER_LEN + length - 1 > MAX_ADU_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("bad MBAP length {}", length),
            ));
        }

        let mut frame = header.to_vec();
        frame.resize(MBAP_HEADER_LEN + length - 1, 0);
        stream.read_exact(&mut frame[MBAP_HEADER_LEN..])?;
        Ok(frame)
    }
}

impl ActuatorPort for ModbusTcpPort {
    fn connect(&mut self) -> Result<(), CnsError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = self.open_stream().map_err(|reason| CnsError::Connect {
            address: self.config.endpoint(),
            reason,
        })?;
        info!("Connected to PLC at {}", self.config.endpoint());
        self.stream = Some(stream);
        self.opened = true;
        Ok(())
    }

    fn write_coil(&mut self, channel: ChannelId, active: bool) -> Result<(), CnsError> {
        if self.stream.is_none() {
            if !self.opened {
                return Err(CnsError::NotConnected { channel });
            }
            debug!("Reconnecting to PLC at {}", self.config.endpoint());
            let stream = self
                .open_stream()
                .map_err(|reason| CnsError::Comm { channel, reason: format!("reconnect failed: {}", reason) })?;
            self.stream = Some(stream);
        }

        let tid = self.next_transaction_id();
        let unit_id = self.config.unit_id;
        let request = encode_write_single_coil(tid, unit_id, channel.0, active);

        let exchanged = match self.stream.as_mut() {
            Some(stream) => Self::exchange(stream, &request),
            None => return Err(CnsError::NotConnected { channel }),
        };
        let frame = match exchanged {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping PLC connection after I/O error: {}", e);
                self.stream = None;
                return Err(CnsError::Comm { channel, reason: e.to_string() });
            }
        };

        match decode_reply(&frame, tid, unit_id) {
            Ok(CoilReply::Written { address, active: echoed }) if address == channel.0 && echoed == active => Ok(()),
            Ok(CoilReply::Written { address, active: echoed }) => Err(CnsError::Comm {
                channel,
                reason: format!("reply echoed coil {} = {}", address, echoed),
            }),
            Ok(CoilReply::Exception(code)) => Err(CnsError::Exception { channel, code }),
            Err(reason) => {
                // Stream position is unknown after a malformed reply
                self.stream = None;
                Err(CnsError::Comm { channel, reason })
            }
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            info!("Closed PLC connection to {}", self.config.endpoint());
        }
        self.opened = false;
    }

    fn describe(&self) -> String {
        format!("Modbus TCP {} unit {}", self.config.endpoint(), self.config.unit_id)
    }
}

impl Drop for ModbusTcpPort {
    fn drop(&mut self) {
        self.close();
    }
}
