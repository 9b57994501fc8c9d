//! Little-endian wire structs for plaintext content carried inside addressed
//! payloads. The enclosing packet envelope (dest/src hash, MAC, ciphertext
//! framing) is owned by the out-of-scope wire codec; this module only covers
//! the plaintext shapes the room-server core itself must parse or build.

/// Plaintext of an `ANON_REQ` (login request).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonReqPlaintext {
    /// The requesting client's clock.
    pub timestamp: u32,
    /// The post-sync cutoff the client is requesting.
    pub sync_since: u32,
    /// Null-terminated password, already stripped of its terminator here.
    pub password: String,
}

impl AnonReqPlaintext {
    /// Parse `{timestamp(4) || sync_since(4) || password(null-terminated)}`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 9 {
            return None;
        }
        let timestamp = u32::from_le_bytes(bytes[0..4].try_into().ok()?);
        let sync_since = u32::from_le_bytes(bytes[4..8].try_into().ok()?);
        let pw_bytes = &bytes[8..];
        let end = pw_bytes.iter().position(|&b| b == 0).unwrap_or(pw_bytes.len());
        let password = String::from_utf8_lossy(&pw_bytes[..end]).into_owned();
        Some(Self {
            timestamp,
            sync_since,
            password,
        })
    }
}

/// Login response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoginCode {
    /// Login accepted.
    Ok = 0,
}

/// 13-byte plaintext of a login response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    /// Echoes the server's clock at response time.
    pub tag: u32,
    /// Always [`LoginCode::Ok`] on this path; failed logins get no response.
    pub code: LoginCode,
    /// Non-zero admin/guest-or-readonly indicator: 1 = admin, 2 = guest/read-only, 0 = read-write.
    pub admin_flag: u8,
    /// The resolved permissions byte.
    pub permissions: u8,
}

impl LoginResponse {
    /// Encode to the 13-byte wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; 13] {
        let mut out = [0u8; 13];
        out[0..4].copy_from_slice(&self.tag.to_le_bytes());
        out[4] = self.code as u8;
        out[5] = 0; // legacy, always zero
        out[6] = self.admin_flag;
        out[7] = self.permissions;
        out[8..12].copy_from_slice(&0u32.to_le_bytes()); // random(4), always zero
        out[12] = 0x01; // version
        out
    }
}

/// Plaintext of a `TXT_MSG` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxtMsgContent {
    /// Sender's clock at send time.
    pub timestamp: u32,
    /// Which kind of text message this is.
    pub txt_type: crate::room::domain_types::TxtType,
    /// Reserved flag byte (signed-message variant only).
    pub flags: u8,
    /// The message bytes, trimmed of trailing zero padding.
    pub message: Vec<u8>,
}

impl TxtMsgContent {
    /// Header size for a given txt type: 5 bytes for plain/cli, 9 for signed.
    #[must_use]
    pub const fn header_len(txt_type: crate::room::domain_types::TxtType) -> usize {
        match txt_type {
            crate::room::domain_types::TxtType::PlainSigned => 9,
            crate::room::domain_types::TxtType::Plain | crate::room::domain_types::TxtType::Cli => 5,
        }
    }

    /// Strip zero padding introduced by block-cipher framing, given the header size.
    #[must_use]
    pub fn trim_padding(raw: &[u8], header_len: usize) -> &[u8] {
        if raw.len() <= header_len {
            return raw;
        }
        let body = &raw[header_len..];
        let end = body.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        &raw[..header_len + end]
    }

    /// Parse `{timestamp(4) || txt_type(1) || message(..)}`, determining the
    /// header length (and thus the padding trim point) from the type byte.
    /// `0` = Plain, `1` = `PlainSigned`, `2` = Cli.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() < 5 {
            return None;
        }
        let timestamp = u32::from_le_bytes(raw[0..4].try_into().ok()?);
        let txt_type = match raw[4] {
            0 => crate::room::domain_types::TxtType::Plain,
            1 => crate::room::domain_types::TxtType::PlainSigned,
            2 => crate::room::domain_types::TxtType::Cli,
            _ => return None,
        };
        let header_len = Self::header_len(txt_type);
        if raw.len() < header_len {
            return None;
        }
        let trimmed = Self::trim_padding(raw, header_len);
        let flags = if header_len == 9 { raw[5] } else { 0 };
        Some(Self {
            timestamp,
            txt_type,
            flags,
            message: trimmed[header_len..].to_vec(),
        })
    }

    /// Encode `{timestamp(4) || type_byte(1) || message}`, padded with the
    /// 9-byte header for `PlainSigned`.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let type_byte = match self.txt_type {
            crate::room::domain_types::TxtType::Plain => 0,
            crate::room::domain_types::TxtType::PlainSigned => 1,
            crate::room::domain_types::TxtType::Cli => 2,
        };
        let mut out = Vec::with_capacity(Self::header_len(self.txt_type) + self.message.len());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.push(type_byte);
        if Self::header_len(self.txt_type) == 9 {
            out.push(self.flags);
            out.extend_from_slice(&[0u8; 3]);
        }
        out.extend_from_slice(&self.message);
        out
    }
}

/// Plaintext of a `REQ` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContent {
    /// Response correlation tag, reflected back verbatim.
    pub timestamp: u32,
    /// Which request this is.
    pub req_type: crate::room::domain_types::ReqType,
    /// Request-specific payload (e.g. `sync_since` for keepalive).
    pub data: Vec<u8>,
}

impl RequestContent {
    /// Parse `{timestamp(4) || req_type(1) || data(..)}`. `req_type` is
    /// `0`=Keepalive, `1`=`GetStatus`, `2`=`GetTelemetry`, `3`=`GetAccessList`.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() < 5 {
            return None;
        }
        let timestamp = u32::from_le_bytes(raw[0..4].try_into().ok()?);
        let req_type = match raw[4] {
            0 => crate::room::domain_types::ReqType::Keepalive,
            1 => crate::room::domain_types::ReqType::GetStatus,
            2 => crate::room::domain_types::ReqType::GetTelemetry,
            3 => crate::room::domain_types::ReqType::GetAccessList,
            _ => return None,
        };
        Some(Self {
            timestamp,
            req_type,
            data: raw[5..].to_vec(),
        })
    }
}

/// Plaintext of a `PATH` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathContent {
    /// Relay hash sequence.
    pub path: Vec<u8>,
    /// Type tag of the piggybacked extra payload.
    pub extra_type: u8,
    /// The piggybacked extra payload bytes.
    pub extra: Vec<u8>,
}

impl PathContent {
    /// Parse `{path_len(1) || path(path_len) || extra_type(1) || extra(..)}`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let path_len = *bytes.first()? as usize;
        if bytes.len() < 1 + path_len + 1 {
            return None;
        }
        let path = bytes[1..1 + path_len].to_vec();
        let extra_type = bytes[1 + path_len];
        let extra = bytes[1 + path_len + 1..].to_vec();
        Some(Self {
            path,
            extra_type,
            extra,
        })
    }

    /// Encode back to wire form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.path.len() + self.extra.len());
        #[allow(clippy::cast_possible_truncation)]
        out.push(self.path.len() as u8);
        out.extend_from_slice(&self.path);
        out.push(self.extra_type);
        out.extend_from_slice(&self.extra);
        out
    }

    /// Reverse a flood-recorded relay path for a path-return response.
    #[must_use]
    pub fn reversed_path(path: &[u8]) -> Vec<u8> {
        path.iter().rev().copied().collect()
    }
}

/// The 52-byte server statistics blob answered by `GetStatus`.
///
/// Field offsets are part of the wire contract; see the crate's design notes
/// for the full table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Battery voltage, millivolts.
    pub batt_mv: u16,
    /// Outbound transmit queue length.
    pub tx_queue_len: u16,
    /// Radio noise floor, dBm.
    pub noise_floor_dbm: i16,
    /// RSSI of the most recently received packet, dBm.
    pub last_rssi_dbm: i16,
    /// Total packets received.
    pub n_packets_recv: u32,
    /// Total packets sent.
    pub n_packets_sent: u32,
    /// Cumulative airtime, seconds.
    pub total_airtime_s: u32,
    /// Process uptime, seconds.
    pub total_uptime_s: u32,
    /// Flood sends.
    pub n_sent_flood: u32,
    /// Direct sends.
    pub n_sent_direct: u32,
    /// Flood receives.
    pub n_recv_flood: u32,
    /// Direct receives.
    pub n_recv_direct: u32,
    /// Count of error events observed.
    pub err_events: u16,
    /// SNR of the most recently received packet, times 4.
    pub last_snr_x4: i16,
    /// Direct-route duplicate count.
    pub n_direct_dups: u16,
    /// Flood duplicate count.
    pub n_flood_dups: u16,
    /// Posts accepted.
    pub n_posted: u16,
    /// Posts pushed via the sync loop.
    pub n_post_push: u16,
}

impl ServerStats {
    /// Encode to the fixed 52-byte little-endian blob.
    #[must_use]
    pub fn encode(&self) -> [u8; 52] {
        let mut out = [0u8; 52];
        out[0..2].copy_from_slice(&self.batt_mv.to_le_bytes());
        out[2..4].copy_from_slice(&self.tx_queue_len.to_le_bytes());
        out[4..6].copy_from_slice(&self.noise_floor_dbm.to_le_bytes());
        out[6..8].copy_from_slice(&self.last_rssi_dbm.to_le_bytes());
        out[8..12].copy_from_slice(&self.n_packets_recv.to_le_bytes());
        out[12..16].copy_from_slice(&self.n_packets_sent.to_le_bytes());
        out[16..20].copy_from_slice(&self.total_airtime_s.to_le_bytes());
        out[20..24].copy_from_slice(&self.total_uptime_s.to_le_bytes());
        out[24..28].copy_from_slice(&self.n_sent_flood.to_le_bytes());
        out[28..32].copy_from_slice(&self.n_sent_direct.to_le_bytes());
        out[32..36].copy_from_slice(&self.n_recv_flood.to_le_bytes());
        out[36..40].copy_from_slice(&self.n_recv_direct.to_le_bytes());
        out[40..42].copy_from_slice(&self.err_events.to_le_bytes());
        out[42..44].copy_from_slice(&self.last_snr_x4.to_le_bytes());
        out[44..46].copy_from_slice(&self.n_direct_dups.to_le_bytes());
        out[46..48].copy_from_slice(&self.n_flood_dups.to_le_bytes());
        out[48..50].copy_from_slice(&self.n_posted.to_le_bytes());
        out[50..52].copy_from_slice(&self.n_post_push.to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::domain_types::TxtType;

    #[test]
    fn anon_req_parses_password() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&100u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(b"admin123\0");
        let parsed = AnonReqPlaintext::parse(&bytes).unwrap();
        assert_eq!(parsed.timestamp, 100);
        assert_eq!(parsed.password, "admin123");
    }

    #[test]
    fn server_stats_round_trip_offsets() {
        let stats = ServerStats {
            batt_mv: 4200,
            n_posted: 7,
            ..Default::default()
        };
        let bytes = stats.encode();
        assert_eq!(bytes.len(), 52);
        assert_eq!(u16::from_le_bytes([bytes[0], bytes[1]]), 4200);
        assert_eq!(u16::from_le_bytes([bytes[48], bytes[49]]), 7);
    }

    #[test]
    fn trim_padding_strips_trailing_zeros() {
        let raw = [1, 2, 3, 4, 5, b'h', b'i', 0, 0, 0];
        let trimmed = TxtMsgContent::trim_padding(&raw, TxtMsgContent::header_len(TxtType::Plain));
        assert_eq!(trimmed, &[1, 2, 3, 4, 5, b'h', b'i']);
    }

    #[test]
    fn path_content_round_trips() {
        let content = PathContent {
            path: vec![1, 2, 3],
            extra_type: 9,
            extra: vec![0xAA, 0xBB],
        };
        let encoded = content.encode();
        let parsed = PathContent::parse(&encoded).unwrap();
        assert_eq!(parsed, content);
    }
}
