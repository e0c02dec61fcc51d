use byteorder::{ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{self, Read, Write};

/// Return code in connack
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum ConnectReturnCode {
    Success = 0,
    RefusedProtocolVersion,
    BadClientId,
    ServiceUnavailable,
    BadUserNamePassword,
    NotAuthorized,
    Unknown,
}

impl fmt::Display for ConnectReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectReturnCode::Success => write!(f, "Success"),
            ConnectReturnCode::RefusedProtocolVersion => write!(f, "Refused Protocol Version"),
            ConnectReturnCode::BadClientId => write!(f, "Bad Client ID"),
            ConnectReturnCode::ServiceUnavailable => write!(f, "Service Unavailable"),
            ConnectReturnCode::BadUserNamePassword => write!(f, "Bad Username or Password"),
            ConnectReturnCode::NotAuthorized => write!(f, "Not Authorized"),
            ConnectReturnCode::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct ConnackPacket {
    pub session_present: bool,
    pub return_code: ConnectReturnCode,
}

impl fmt::Display for ConnackPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "CONNACK: {} Session present: {}",
            self.return_code, self.session_present
        )
    }
}

impl ConnackPacket {
    pub fn accepted() -> Self {
        Self {
            session_present: false,
            return_code: ConnectReturnCode::Success,
        }
    }

    pub fn write(&self, buf: &mut impl Write) -> io::Result<()> {
        buf.write_u8(self.session_present as u8)?;
        buf.write_u8(self.return_code as u8)?;
        Ok(())
    }

    pub fn from_bytes(bytes: &mut impl Read) -> io::Result<ConnackPacket> {
        let session_present = bytes.read_u8()? != 0;
        let return_code = match bytes.read_u8()? {
            0 => ConnectReturnCode::Success,
            1 => ConnectReturnCode::RefusedProtocolVersion,
            2 => ConnectReturnCode::BadClientId,
            3 => ConnectReturnCode::ServiceUnavailable,
            4 => ConnectReturnCode::BadUserNamePassword,
            5 => ConnectReturnCode::NotAuthorized,
            _ => ConnectReturnCode::Unknown,
        };
        Ok(ConnackPacket {
            session_present,
            return_code,
        })
    }
}

#[cfg(test)]
mod connack_write_tests {
    use super::*;

    #[test]
    fn accepted_literal_bytes() {
        let mut buf = Vec::new();
        ConnackPacket::accepted().write(&mut buf).unwrap();
        assert_eq!(buf, &[0x00, 0x00]);
    }
}
