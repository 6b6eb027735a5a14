//! DNS wire-format codec.
//!
//! Pure functions and types over byte buffers: big-endian integers, domain
//! names with RFC 1035 section 4.1.4 compression, the message header with
//! its packed flag word, questions and resource records with typed RDATA.
//!
//! Every parse failure surfaces as [`Error::FormatError`]; no partial
//! records are ever produced.

#[cfg(feature = "logging")]
use crate::log::trace;
use crate::{Error, Result};
use std::{
    collections::HashMap,
    fmt,
    net::{Ipv4Addr, Ipv6Addr},
    str,
};

pub(crate) const DNS_PORT: u16 = 53;
pub(crate) const MESSAGE_HEADER_LEN: usize = 12;
pub(crate) const DOMAIN_LABEL_LIMIT: usize = 63;
pub(crate) const DOMAIN_NAME_LIMIT: usize = 255;

/// Ceiling for a single UDP payload, enforced on send and receive.
pub const MAX_MSG_SIZE: usize = 4096;

// Definitions for the DNS message header "flags" field.
//
// The "flags" field is 16-bit long, in this format:
// (RFC 1035 section 4.1.1, AD/CD per RFC 2535)
//
//   0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
// |QR|   Opcode  |AA|TC|RD|RA| Z|AD|CD|   RCODE   |
//
pub(crate) const FLAGS_QR: u16 = 0x8000;
pub(crate) const FLAGS_OPCODE: u16 = 0x7800;
pub(crate) const FLAGS_AA: u16 = 0x0400;
pub(crate) const FLAGS_TC: u16 = 0x0200;
pub(crate) const FLAGS_RD: u16 = 0x0100;
pub(crate) const FLAGS_RA: u16 = 0x0080;
pub(crate) const FLAGS_Z: u16 = 0x0040;
pub(crate) const FLAGS_AD: u16 = 0x0020;
pub(crate) const FLAGS_CD: u16 = 0x0010;
pub(crate) const FLAGS_RCODE: u16 = 0x000F;

pub(crate) const OPCODE_SHIFT: u16 = 11;

/// Standard query opcode.
pub const OPCODE_QUERY: u8 = 0;

/// Response codes from RFC 1035 section 4.1.1 and RFC 2136.
pub const RC_NOERROR: u8 = 0;
pub const RC_FORMERR: u8 = 1;
pub const RC_SERVFAIL: u8 = 2;
pub const RC_NXDOMAIN: u8 = 3;
pub const RC_NOTIMP: u8 = 4;
pub const RC_REFUSED: u8 = 5;
pub const RC_YXDOMAIN: u8 = 6;
pub const RC_YXRRSET: u8 = 7;
pub const RC_NOTAUTH: u8 = 8;
pub const RC_NOTZONE: u8 = 9;

const POINTER_MASK: u16 = 0xC000;

/// A resource record type.
///
/// The resolver only issues queries for the closed set below; anything else
/// parsed off the wire is carried as [`RecordType::Unknown`] so unexpected
/// records can be skipped without data loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Ns,
    Cname,
    Txt,
    Aaaa,
    Unknown(u16),
}

impl RecordType {
    pub(crate) fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::A,
            2 => Self::Ns,
            5 => Self::Cname,
            16 => Self::Txt,
            28 => Self::Aaaa,
            other => Self::Unknown(other),
        }
    }

    pub(crate) fn to_u16(self) -> u16 {
        match self {
            Self::A => 1,
            Self::Ns => 2,
            Self::Cname => 5,
            Self::Txt => 16,
            Self::Aaaa => 28,
            Self::Unknown(other) => other,
        }
    }

    /// Parses a record type mnemonic, e.g. `"A"` or `"cname"`.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "NS" => Ok(Self::Ns),
            "CNAME" => Ok(Self::Cname),
            "TXT" => Ok(Self::Txt),
            "AAAA" => Ok(Self::Aaaa),
            _ => Err(Error::InvalidRecordType(name.to_string())),
        }
    }

    /// Whether the resolver may issue a query for this type.
    pub fn is_supported(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::Ns => write!(f, "NS"),
            Self::Cname => write!(f, "CNAME"),
            Self::Txt => write!(f, "TXT"),
            Self::Aaaa => write!(f, "AAAA"),
            Self::Unknown(other) => write!(f, "TYPE{}", other),
        }
    }
}

/// A resource record class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassType {
    In,
    Ch,
    Unknown(u16),
}

impl ClassType {
    pub(crate) fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::In,
            3 => Self::Ch,
            other => Self::Unknown(other),
        }
    }

    pub(crate) fn to_u16(self) -> u16 {
        match self {
            Self::In => 1,
            Self::Ch => 3,
            Self::Unknown(other) => other,
        }
    }

    pub(crate) fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "IN" => Ok(Self::In),
            "CH" => Ok(Self::Ch),
            _ => Err(Error::ParametersMissing(format!(
                "unrecognized class {}",
                name
            ))),
        }
    }
}

impl fmt::Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => write!(f, "IN"),
            Self::Ch => write!(f, "CH"),
            Self::Unknown(other) => write!(f, "CLASS{}", other),
        }
    }
}

/// Appends a 16-bit integer in network byte order.
pub(crate) fn pack_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Appends a 32-bit integer in network byte order.
pub(crate) fn pack_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub(crate) fn u16_from_be_slice(bytes: &[u8]) -> Result<u16> {
    if bytes.len() < 2 {
        return Err(Error::FormatError(format!(
            "need 2 octets for u16, have {}",
            bytes.len()
        )));
    }
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn u32_from_be_slice(bytes: &[u8]) -> Result<u32> {
    if bytes.len() < 4 {
        return Err(Error::FormatError(format!(
            "need 4 octets for u32, have {}",
            bytes.len()
        )));
    }
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Generates a random 16-bit DNS message identifier.
pub(crate) fn generate_id() -> u16 {
    fastrand::u16(..)
}

/// A domain name in canonical form: lower-cased labels joined by `.`,
/// with no trailing separator. The root name is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainName {
    value: String,
}

impl DomainName {
    /// Canonicalises `name` and validates its labels.
    ///
    /// Each label must be 1..=63 octets and the whole name must fit the
    /// 255-octet encoded limit.
    pub fn new(name: &str) -> Result<Self> {
        let trimmed = name.strip_suffix('.').unwrap_or(name);
        let value = trimmed.to_ascii_lowercase();
        if value.is_empty() {
            return Ok(Self { value });
        }

        let mut encoded_len = 1; // terminating zero octet
        for label in value.split('.') {
            if label.is_empty() {
                return Err(Error::FormatError(format!("empty label in {:?}", name)));
            }
            if label.len() > DOMAIN_LABEL_LIMIT {
                return Err(Error::FormatError(format!(
                    "label {:?} exceeds {} octets",
                    label, DOMAIN_LABEL_LIMIT
                )));
            }
            encoded_len += 1 + label.len();
        }
        if encoded_len > DOMAIN_NAME_LIMIT {
            return Err(Error::FormatError(format!(
                "name {:?} exceeds {} encoded octets",
                name, DOMAIN_NAME_LIMIT
            )));
        }

        Ok(Self { value })
    }

    /// The root name `.`.
    pub fn root() -> Self {
        Self {
            value: String::new(),
        }
    }

    /// The canonical value, without a trailing dot.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn is_root(&self) -> bool {
        self.value.is_empty()
    }

    /// The fully qualified rendering with a trailing dot, as used in
    /// BIND files and dig-like output.
    pub fn fqdn(&self) -> String {
        format!("{}.", self.value)
    }

    // Writes this name into `buf`, compressing against `names`.
    //
    // `names` maps each canonical suffix already emitted in this message to
    // its absolute offset. On a hit the two-octet pointer `0xC000 | offset`
    // is emitted and the walk stops; on a miss the current offset is
    // recorded for the remaining suffix and one label is emitted. An empty
    // remaining suffix emits the terminating zero octet.
    pub(crate) fn write(&self, buf: &mut Vec<u8>, names: &mut HashMap<String, u16>) {
        let end = self.value.len();
        let mut here = 0;

        while here < end {
            let remaining = &self.value[here..end];
            match names.get(remaining).copied() {
                Some(offset) => {
                    pack_u16(buf, offset | POINTER_MASK);
                    return;
                }
                None => {
                    // Remember the remaining suffix so later names can
                    // point to it. Offsets above the 14-bit pointer range
                    // cannot occur: the payload ceiling is 4096 octets.
                    names.insert(remaining.to_string(), buf.len() as u16);

                    let stop = match remaining.find('.') {
                        Some(i) => here + i,
                        None => end,
                    };
                    let label = &self.value[here..stop];
                    buf.push(label.len() as u8);
                    buf.extend_from_slice(label.as_bytes());
                    here = stop + 1;
                }
            }
        }

        buf.push(0);
    }

    /// Reads a name from `buffer` starting at `offset`.
    ///
    /// Returns the name and the offset just past its in-place encoding.
    /// Compression pointers are followed without moving the caller's
    /// cursor; a pointer must refer to an offset strictly before its own
    /// position, and the number of pointer hops is bounded by the buffer
    /// length so crafted loops are rejected.
    pub(crate) fn read(buffer: &[u8], offset: usize) -> Result<(Self, usize)> {
        let mut labels: Vec<String> = Vec::new();
        let mut pos = offset;
        let mut next = None; // caller cursor once the first pointer is seen
        let mut hops = 0;
        let mut encoded_len = 1;

        loop {
            let length = *buffer.get(pos).ok_or_else(|| {
                Error::FormatError(format!(
                    "name runs past the end of the message at offset {}",
                    pos
                ))
            })? as usize;

            if length == 0 {
                if next.is_none() {
                    next = Some(pos + 1);
                }
                break;
            }

            match length & 0xC0 {
                0x00 => {
                    let label = buffer.get(pos + 1..pos + 1 + length).ok_or_else(|| {
                        Error::FormatError(format!(
                            "label at offset {} runs past the end of the message",
                            pos
                        ))
                    })?;
                    let label = str::from_utf8(label)
                        .map_err(|e| Error::FormatError(format!("label is not utf-8: {}", e)))?;
                    encoded_len += 1 + length;
                    if encoded_len > DOMAIN_NAME_LIMIT {
                        return Err(Error::FormatError(format!(
                            "name exceeds {} encoded octets",
                            DOMAIN_NAME_LIMIT
                        )));
                    }
                    labels.push(label.to_ascii_lowercase());
                    pos += 1 + length;
                }
                0xC0 => {
                    let pointer = (u16_from_be_slice(buffer.get(pos..pos + 2).ok_or_else(
                        || Error::FormatError("truncated compression pointer".to_string()),
                    )?)? & !POINTER_MASK) as usize;
                    if pointer >= pos {
                        return Err(Error::FormatError(format!(
                            "compression pointer {} does not refer backwards from {}",
                            pointer, pos
                        )));
                    }
                    hops += 1;
                    if hops > buffer.len() {
                        return Err(Error::FormatError(
                            "compression pointer loop".to_string(),
                        ));
                    }
                    if next.is_none() {
                        next = Some(pos + 2);
                    }
                    pos = pointer;
                }
                // The 01 and 10 combinations are reserved.
                _ => {
                    return Err(Error::FormatError(format!(
                        "invalid label length octet 0x{:x} at offset {}",
                        length, pos
                    )));
                }
            }
        }

        let name = Self {
            value: labels.join("."),
        };
        Ok((name, next.unwrap_or(offset)))
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fqdn())
    }
}

/// Which kind of message a header is being built for. Only affects the
/// header defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// An outgoing request: fresh identifier, RD set.
    Request,
    /// A remote response, about to be overwritten by a parse.
    Response,
    /// The caller-facing resolver response: identifier zero, QR, RD and
    /// RA set.
    ResolverResponse,
}

/// The 12-octet DNS message header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub is_response: bool,
    pub opcode: u8,
    pub authoritative: bool,
    pub truncation: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    /// Reserved bit 6. Always zero on build, preserved on parse.
    pub zero: bool,
    pub authentic_data: bool,
    pub checking_disabled: bool,
    pub rcode: u8,
    pub num_questions: u16,
    pub num_answers: u16,
    pub num_authorities: u16,
    pub num_additionals: u16,
}

impl Header {
    pub(crate) fn new(mt: MessageType) -> Self {
        let (id, is_response, recursion_desired, recursion_available) = match mt {
            MessageType::Request => (generate_id(), false, true, false),
            MessageType::Response => (0, true, false, false),
            MessageType::ResolverResponse => (0, true, true, true),
        };
        Self {
            id,
            is_response,
            opcode: OPCODE_QUERY,
            authoritative: false,
            truncation: false,
            recursion_desired,
            recursion_available,
            zero: false,
            authentic_data: false,
            checking_disabled: false,
            rcode: RC_NOERROR,
            num_questions: 0,
            num_answers: 0,
            num_authorities: 0,
            num_additionals: 0,
        }
    }

    /// Assembles the 16-bit flag word by integer bit operations.
    pub(crate) fn pack_flags(&self) -> u16 {
        let mut flags = 0u16;
        if self.is_response {
            flags |= FLAGS_QR;
        }
        flags |= (u16::from(self.opcode) << OPCODE_SHIFT) & FLAGS_OPCODE;
        if self.authoritative {
            flags |= FLAGS_AA;
        }
        if self.truncation {
            flags |= FLAGS_TC;
        }
        if self.recursion_desired {
            flags |= FLAGS_RD;
        }
        if self.recursion_available {
            flags |= FLAGS_RA;
        }
        if self.zero {
            flags |= FLAGS_Z;
        }
        if self.authentic_data {
            flags |= FLAGS_AD;
        }
        if self.checking_disabled {
            flags |= FLAGS_CD;
        }
        flags | (u16::from(self.rcode) & FLAGS_RCODE)
    }

    /// The inverse extraction of [`Header::pack_flags`].
    pub(crate) fn unpack_flags(&mut self, flags: u16) {
        self.is_response = flags & FLAGS_QR != 0;
        self.opcode = ((flags & FLAGS_OPCODE) >> OPCODE_SHIFT) as u8;
        self.authoritative = flags & FLAGS_AA != 0;
        self.truncation = flags & FLAGS_TC != 0;
        self.recursion_desired = flags & FLAGS_RD != 0;
        self.recursion_available = flags & FLAGS_RA != 0;
        self.zero = flags & FLAGS_Z != 0;
        self.authentic_data = flags & FLAGS_AD != 0;
        self.checking_disabled = flags & FLAGS_CD != 0;
        self.rcode = (flags & FLAGS_RCODE) as u8;
    }

    pub(crate) fn write(&self, buf: &mut Vec<u8>) {
        pack_u16(buf, self.id);
        pack_u16(buf, self.pack_flags());
        pack_u16(buf, self.num_questions);
        pack_u16(buf, self.num_answers);
        pack_u16(buf, self.num_authorities);
        pack_u16(buf, self.num_additionals);
    }

    pub(crate) fn read(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < MESSAGE_HEADER_LEN {
            return Err(Error::FormatError(format!(
                "header is too short: {} octets",
                buffer.len()
            )));
        }
        let mut header = Self::new(MessageType::Response);
        header.id = u16_from_be_slice(&buffer[..2])?;
        header.unpack_flags(u16_from_be_slice(&buffer[2..4])?);
        header.num_questions = u16_from_be_slice(&buffer[4..6])?;
        header.num_answers = u16_from_be_slice(&buffer[6..8])?;
        header.num_authorities = u16_from_be_slice(&buffer[8..10])?;
        header.num_additionals = u16_from_be_slice(&buffer[10..12])?;
        Ok(header)
    }
}

/// A DNS question entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: DomainName,
    pub qtype: RecordType,
    pub qclass: ClassType,
}

impl Question {
    pub fn new(name: DomainName, qtype: RecordType) -> Self {
        Self {
            name,
            qtype,
            qclass: ClassType::In,
        }
    }

    pub(crate) fn write(&self, buf: &mut Vec<u8>, names: &mut HashMap<String, u16>) {
        self.name.write(buf, names);
        pack_u16(buf, self.qtype.to_u16());
        pack_u16(buf, self.qclass.to_u16());
    }

    pub(crate) fn read(buffer: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (name, offset) = DomainName::read(buffer, offset)?;
        let fields = buffer.get(offset..offset + 4).ok_or_else(|| {
            Error::FormatError(format!("question at offset {} is truncated", offset))
        })?;
        let qtype = RecordType::from_u16(u16_from_be_slice(&fields[..2])?);
        let qclass = ClassType::from_u16(u16_from_be_slice(&fields[2..4])?);
        Ok((
            Self {
                name,
                qtype,
                qclass,
            },
            offset + 4,
        ))
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.qclass, self.qtype)
    }
}

/// The type-specific payload of a resource record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    /// An IPv4 address, 4 octets on the wire.
    A(Ipv4Addr),
    /// An IPv6 address, 16 octets on the wire.
    Aaaa(Ipv6Addr),
    /// The canonical name an alias points to. May use compression.
    Cname(DomainName),
    /// The host name of a name server. May use compression.
    Ns(DomainName),
    /// An uninterpreted octet string of length RDLENGTH.
    Txt(Vec<u8>),
    /// RDATA of a record type the codec does not interpret, kept opaque
    /// so the record can be skipped without data loss.
    Other(Vec<u8>),
}

impl RData {
    pub(crate) fn write(&self, buf: &mut Vec<u8>, names: &mut HashMap<String, u16>) {
        match self {
            Self::A(addr) => buf.extend_from_slice(&addr.octets()),
            Self::Aaaa(addr) => buf.extend_from_slice(&addr.octets()),
            Self::Cname(name) | Self::Ns(name) => name.write(buf, names),
            Self::Txt(bytes) | Self::Other(bytes) => buf.extend_from_slice(bytes),
        }
    }

    // RDATA codec dispatch, driven by the record type.
    fn read(
        rtype: RecordType,
        buffer: &[u8],
        offset: usize,
        rdlength: usize,
    ) -> Result<(Self, usize)> {
        let field = |len: usize| {
            buffer.get(offset..offset + len).ok_or_else(|| {
                Error::FormatError(format!("rdata at offset {} is truncated", offset))
            })
        };

        match rtype {
            RecordType::A => {
                let octets: [u8; 4] = field(4)?.try_into().unwrap();
                Ok((Self::A(Ipv4Addr::from(octets)), offset + 4))
            }
            RecordType::Aaaa => {
                let octets: [u8; 16] = field(16)?.try_into().unwrap();
                Ok((Self::Aaaa(Ipv6Addr::from(octets)), offset + 16))
            }
            RecordType::Cname => {
                let (name, next) = DomainName::read(buffer, offset)?;
                Ok((Self::Cname(name), next))
            }
            RecordType::Ns => {
                let (name, next) = DomainName::read(buffer, offset)?;
                Ok((Self::Ns(name), next))
            }
            RecordType::Txt => Ok((Self::Txt(field(rdlength)?.to_vec()), offset + rdlength)),
            RecordType::Unknown(_) => {
                Ok((Self::Other(field(rdlength)?.to_vec()), offset + rdlength))
            }
        }
    }

    /// Renders the payload as BIND-file text: dotted quad, colon-hex
    /// address, fully qualified name, or the raw text of a TXT record.
    pub fn to_text(&self) -> String {
        match self {
            Self::A(addr) => addr.to_string(),
            Self::Aaaa(addr) => addr.to_string(),
            Self::Cname(name) | Self::Ns(name) => name.fqdn(),
            Self::Txt(bytes) | Self::Other(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Parses BIND-file text into a payload for `rtype`.
    pub fn from_text(rtype: RecordType, text: &str) -> Result<Self> {
        match rtype {
            RecordType::A => text
                .parse::<Ipv4Addr>()
                .map(Self::A)
                .map_err(|e| Error::ParametersMissing(format!("bad A rdata {:?}: {}", text, e))),
            RecordType::Aaaa => text.parse::<Ipv6Addr>().map(Self::Aaaa).map_err(|e| {
                Error::ParametersMissing(format!("bad AAAA rdata {:?}: {}", text, e))
            }),
            RecordType::Cname => Ok(Self::Cname(DomainName::new(text)?)),
            RecordType::Ns => Ok(Self::Ns(DomainName::new(text)?)),
            RecordType::Txt => Ok(Self::Txt(text.as_bytes().to_vec())),
            RecordType::Unknown(_) => Err(Error::InvalidRecordType(rtype.to_string())),
        }
    }

    /// The CNAME or NS target, when this payload carries a name.
    pub fn name_target(&self) -> Option<&DomainName> {
        match self {
            Self::Cname(name) | Self::Ns(name) => Some(name),
            _ => None,
        }
    }
}

/// A DNS resource record.
#[derive(Debug, Clone)]
pub struct Resource {
    pub name: DomainName,
    pub rtype: RecordType,
    pub class: ClassType,
    /// Time to live in seconds. Zero means never cache.
    pub ttl: u32,
    /// Length of the uncompressed RDATA in octets.
    pub rdlength: u16,
    pub rdata: RData,
}

// RDLENGTH is a wire artifact: compression can shrink the same RDATA
// between two encodings, so equality is over the decoded content only.
impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.rtype == other.rtype
            && self.class == other.class
            && self.ttl == other.ttl
            && self.rdata == other.rdata
    }
}

impl Eq for Resource {}

impl Resource {
    pub fn new(name: DomainName, rtype: RecordType, class: ClassType, ttl: u32, rdata: RData) -> Self {
        let rdlength = Self::uncompressed_rdata_len(&rdata) as u16;
        Self {
            name,
            rtype,
            class,
            ttl,
            rdlength,
            rdata,
        }
    }

    fn uncompressed_rdata_len(rdata: &RData) -> usize {
        match rdata {
            RData::A(_) => 4,
            RData::Aaaa(_) => 16,
            RData::Cname(name) | RData::Ns(name) => {
                if name.is_root() {
                    1
                } else {
                    name.as_str().len() + 2
                }
            }
            RData::Txt(bytes) | RData::Other(bytes) => bytes.len(),
        }
    }

    pub(crate) fn write(&self, buf: &mut Vec<u8>, names: &mut HashMap<String, u16>) {
        self.name.write(buf, names);
        pack_u16(buf, self.rtype.to_u16());
        pack_u16(buf, self.class.to_u16());
        pack_u32(buf, self.ttl);

        // RDLENGTH is patched once the RDATA is written: compression may
        // shrink a name below its uncompressed length.
        pack_u16(buf, 0);
        let rdata_start = buf.len();
        self.rdata.write(buf, names);
        let rdlength = (buf.len() - rdata_start) as u16;
        buf[rdata_start - 2..rdata_start].copy_from_slice(&rdlength.to_be_bytes());
    }

    pub(crate) fn read(buffer: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (name, offset) = DomainName::read(buffer, offset)?;
        let fields = buffer.get(offset..offset + 10).ok_or_else(|| {
            Error::FormatError(format!("resource at offset {} is truncated", offset))
        })?;
        let rtype = RecordType::from_u16(u16_from_be_slice(&fields[..2])?);
        let class = ClassType::from_u16(u16_from_be_slice(&fields[2..4])?);
        let ttl = u32_from_be_slice(&fields[4..8])?;
        let rdlength = u16_from_be_slice(&fields[8..10])? as usize;
        let offset = offset + 10;

        let (rdata, next) = RData::read(rtype, buffer, offset, rdlength)?;
        if next != offset + rdlength {
            return Err(Error::FormatError(format!(
                "rdata of {} record for {} decoded to offset {}, expected {}",
                rtype,
                name,
                next,
                offset + rdlength
            )));
        }

        trace!("decoded {} {} record, ttl {}", name, rtype, ttl);

        Ok((
            Self {
                name,
                rtype,
                class,
                ttl,
                rdlength: rdlength as u16,
                rdata,
            },
            next,
        ))
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.name,
            self.ttl,
            self.class,
            self.rtype,
            self.rdata.to_text()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> DomainName {
        DomainName::new(s).unwrap()
    }

    #[test]
    fn test_pack_unpack_integers() {
        for value in [0u16, 1, 0x1234, u16::MAX] {
            let mut buf = Vec::new();
            pack_u16(&mut buf, value);
            assert_eq!(u16_from_be_slice(&buf).unwrap(), value);
        }
        for value in [0u32, 1, 0xdead_beef, u32::MAX] {
            let mut buf = Vec::new();
            pack_u32(&mut buf, value);
            assert_eq!(u32_from_be_slice(&buf).unwrap(), value);
        }
        assert!(u16_from_be_slice(&[1]).is_err());
        assert!(u32_from_be_slice(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_flag_word_bijection() {
        let mut header = Header::new(MessageType::Response);
        for flags in 0..=u16::MAX {
            header.unpack_flags(flags);
            assert_eq!(header.pack_flags(), flags, "flag word 0x{:04x}", flags);
        }
    }

    #[test]
    fn test_domain_name_canonical_form() {
        assert_eq!(name("Example.COM.").as_str(), "example.com");
        assert_eq!(name(".").as_str(), "");
        assert!(name(".").is_root());
        assert!(DomainName::new("a..b").is_err());

        let long_label = "a".repeat(64);
        assert!(DomainName::new(&long_label).is_err());

        // 4 * 64 encoded octets exceed the 255 limit.
        let long_name = ["b".repeat(63), "b".repeat(63), "b".repeat(63), "b".repeat(63)].join(".");
        assert!(DomainName::new(&long_name).is_err());
    }

    #[test]
    fn test_name_roundtrip() {
        let mut names = HashMap::new();
        let mut buf = Vec::new();
        name("www.example.com").write(&mut buf, &mut names);

        let (decoded, next) = DomainName::read(&buf, 0).unwrap();
        assert_eq!(decoded.as_str(), "www.example.com");
        assert_eq!(next, buf.len());
    }

    #[test]
    fn test_name_compression_emits_backwards_pointer() {
        let mut names = HashMap::new();
        let mut buf = Vec::new();
        name("example.com").write(&mut buf, &mut names);
        let first_len = buf.len();

        let pointer_at = buf.len();
        name("www.example.com").write(&mut buf, &mut names);

        // "www" label (4 octets) then a two-octet pointer to offset 0.
        assert_eq!(buf.len(), first_len + 4 + 2);
        let pointer = u16_from_be_slice(&buf[pointer_at + 4..]).unwrap();
        assert_eq!(pointer & 0xC000, 0xC000);
        assert!(((pointer & !0xC000) as usize) < pointer_at + 4);

        let (decoded, _) = DomainName::read(&buf, pointer_at).unwrap();
        assert_eq!(decoded.as_str(), "www.example.com");
    }

    #[test]
    fn test_name_rejects_forward_pointer_and_loop() {
        // A pointer at offset 0 pointing at itself.
        let buf = vec![0xC0, 0x00];
        assert!(DomainName::read(&buf, 0).is_err());

        // A label followed by a pointer back into the label's own start,
        // which decodes back to the same pointer endlessly if unchecked.
        let buf = vec![1, b'a', 0xC0, 0x02];
        assert!(DomainName::read(&buf, 2).is_err());
    }

    #[test]
    fn test_name_rejects_reserved_length_bits() {
        let buf = vec![0x80 | 0x9, b'x'];
        assert!(DomainName::read(&buf, 0).is_err());
    }

    #[test]
    fn test_question_roundtrip() {
        let question = Question::new(name("example.com"), RecordType::Txt);
        let mut names = HashMap::new();
        let mut buf = Vec::new();
        question.write(&mut buf, &mut names);

        let (decoded, next) = Question::read(&buf, 0).unwrap();
        assert_eq!(decoded, question);
        assert_eq!(next, buf.len());
    }

    #[test]
    fn test_resource_roundtrip_each_type() {
        let records = [
            Resource::new(
                name("a.example.com"),
                RecordType::A,
                ClassType::In,
                300,
                RData::A(Ipv4Addr::new(93, 184, 216, 34)),
            ),
            Resource::new(
                name("a.example.com"),
                RecordType::Aaaa,
                ClassType::In,
                300,
                RData::Aaaa("2606:2800:220:1::".parse().unwrap()),
            ),
            Resource::new(
                name("www.example.com"),
                RecordType::Cname,
                ClassType::In,
                60,
                RData::Cname(name("example.com")),
            ),
            Resource::new(
                name("example.com"),
                RecordType::Ns,
                ClassType::In,
                86400,
                RData::Ns(name("ns1.example.com")),
            ),
            Resource::new(
                name("example.com"),
                RecordType::Txt,
                ClassType::In,
                60,
                RData::Txt(b"v=spf1 -all".to_vec()),
            ),
        ];

        for record in records {
            let mut names = HashMap::new();
            let mut buf = Vec::new();
            record.write(&mut buf, &mut names);

            let (decoded, next) = Resource::read(&buf, 0).unwrap();
            assert_eq!(decoded, record);
            assert_eq!(next, buf.len());
        }
    }

    #[test]
    fn test_unknown_rdata_kept_opaque() {
        // An MX record: preference 10, exchange "mail" (uncompressed).
        let mut buf = Vec::new();
        name("example.com").write(&mut buf, &mut HashMap::new());
        pack_u16(&mut buf, 15); // MX
        pack_u16(&mut buf, 1);
        pack_u32(&mut buf, 60);
        let rdata = [0u8, 10, 4, b'm', b'a', b'i', b'l', 0];
        pack_u16(&mut buf, rdata.len() as u16);
        buf.extend_from_slice(&rdata);

        let (decoded, next) = Resource::read(&buf, 0).unwrap();
        assert_eq!(decoded.rtype, RecordType::Unknown(15));
        assert_eq!(decoded.rdata, RData::Other(rdata.to_vec()));
        assert_eq!(next, buf.len());
    }

    #[test]
    fn test_truncated_resource_fails() {
        let record = Resource::new(
            name("example.com"),
            RecordType::A,
            ClassType::In,
            300,
            RData::A(Ipv4Addr::new(1, 2, 3, 4)),
        );
        let mut buf = Vec::new();
        record.write(&mut buf, &mut HashMap::new());

        for cut in 1..buf.len() {
            assert!(
                Resource::read(&buf[..cut], 0).is_err(),
                "parse succeeded on a {}-octet prefix",
                cut
            );
        }
    }

    #[test]
    fn test_record_type_parse() {
        assert_eq!(RecordType::parse("a").unwrap(), RecordType::A);
        assert_eq!(RecordType::parse("AAAA").unwrap(), RecordType::Aaaa);
        assert!(matches!(
            RecordType::parse("MX"),
            Err(Error::InvalidRecordType(_))
        ));
        assert!(!RecordType::Unknown(15).is_supported());
    }
}
