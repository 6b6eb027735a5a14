//! In-memory form of a DNS message.
//!
//! A [`Message`] is a header plus the four record sections, carrying the
//! compression dictionary used when packing. Header counts equal section
//! lengths at every observable point: records only enter a message through
//! the `add_*` methods or the parser.

use crate::dns_parser::{
    DomainName, Header, MessageType, Question, RData, RecordType, Resource, MESSAGE_HEADER_LEN,
};
use crate::Result;
use std::{collections::HashMap, fmt};

/// Human-readable status for a response code, as dig prints it.
pub fn rcode_name(rcode: u8) -> &'static str {
    match rcode {
        crate::dns_parser::RC_NOERROR => "NOERROR",
        crate::dns_parser::RC_FORMERR => "FORMERR",
        crate::dns_parser::RC_SERVFAIL => "SERVFAIL",
        crate::dns_parser::RC_NXDOMAIN => "NXDOMAIN",
        crate::dns_parser::RC_NOTIMP => "NOTIMP",
        crate::dns_parser::RC_REFUSED => "REFUSED",
        crate::dns_parser::RC_YXDOMAIN => "YXDOMAIN",
        crate::dns_parser::RC_YXRRSET => "YXRRSET",
        crate::dns_parser::RC_NOTAUTH => "NOTAUTH",
        crate::dns_parser::RC_NOTZONE => "NOTZONE",
        _ => "RESERVED",
    }
}

/// A DNS message, request or response.
#[derive(Debug, Clone)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<Resource>,
    pub authority: Vec<Resource>,
    pub additional: Vec<Resource>,

    /// Message-scoped compression dictionary: canonical suffix to the
    /// absolute offset of its first occurrence in the packed buffer.
    names: HashMap<String, u16>,
}

// The compression dictionary is packing state, not message content.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header
            && self.questions == other.questions
            && self.answers == other.answers
            && self.authority == other.authority
            && self.additional == other.additional
    }
}

impl Eq for Message {}

impl Message {
    pub fn new(mt: MessageType) -> Self {
        Self {
            header: Header::new(mt),
            questions: Vec::new(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
            names: HashMap::new(),
        }
    }

    /// Builds an outgoing request with a fresh identifier, RD set and the
    /// single question installed.
    pub fn new_request(name: DomainName, qtype: RecordType) -> Self {
        let mut message = Self::new(MessageType::Request);
        message.add_question(name, qtype);
        message
    }

    pub fn add_question(&mut self, name: DomainName, qtype: RecordType) {
        self.questions.push(Question::new(name, qtype));
        self.header.num_questions = self.questions.len() as u16;
    }

    pub fn add_answer(&mut self, record: Resource) {
        self.answers.push(record);
        self.header.num_answers = self.answers.len() as u16;
    }

    pub fn add_authority(&mut self, record: Resource) {
        self.authority.push(record);
        self.header.num_authorities = self.authority.len() as u16;
    }

    pub fn add_additional(&mut self, record: Resource) {
        self.additional.push(record);
        self.header.num_additionals = self.additional.len() as u16;
    }

    /// Packs the message: header first, then each section in order
    /// Question, Answer, Authority, Additional. The compression dictionary
    /// threads through every name-bearing field so each repeated suffix
    /// after the first becomes a pointer.
    pub fn pack(&mut self) -> Vec<u8> {
        self.names.clear();
        let mut buf = Vec::with_capacity(MESSAGE_HEADER_LEN);
        self.header.write(&mut buf);
        for question in &self.questions {
            question.write(&mut buf, &mut self.names);
        }
        for record in self
            .answers
            .iter()
            .chain(self.authority.iter())
            .chain(self.additional.iter())
        {
            record.write(&mut buf, &mut self.names);
        }
        buf
    }

    /// Unpacks a message: the header is read first, its counts are
    /// trusted, and exactly QD/AN/NS/AR records are parsed in order.
    pub fn unpack(buffer: &[u8]) -> Result<Self> {
        let header = Header::read(buffer)?;
        let mut offset = MESSAGE_HEADER_LEN;

        let mut questions = Vec::with_capacity(header.num_questions as usize);
        for _ in 0..header.num_questions {
            let (question, next) = Question::read(buffer, offset)?;
            questions.push(question);
            offset = next;
        }

        let mut read_section = |count: u16| -> Result<Vec<Resource>> {
            let mut records = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (record, next) = Resource::read(buffer, offset)?;
                records.push(record);
                offset = next;
            }
            Ok(records)
        };

        let answers = read_section(header.num_answers)?;
        let authority = read_section(header.num_authorities)?;
        let additional = read_section(header.num_additionals)?;

        Ok(Self {
            header,
            questions,
            answers,
            authority,
            additional,
            names: HashMap::new(),
        })
    }

    /// A message answers `request` iff it is a response and the
    /// identifiers match.
    pub fn is_response_to(&self, request: &Message) -> bool {
        self.header.is_response && self.header.id == request.header.id
    }

    pub fn find_answers(&self, rtype: RecordType) -> Vec<&Resource> {
        self.answers.iter().filter(|r| r.rtype == rtype).collect()
    }

    pub fn find_authority(&self, rtype: RecordType) -> Vec<&Resource> {
        self.authority.iter().filter(|r| r.rtype == rtype).collect()
    }

    pub fn find_additional(&self, rtype: RecordType) -> Vec<&Resource> {
        self.additional.iter().filter(|r| r.rtype == rtype).collect()
    }

    /// Whether `name` is one of the question names.
    pub fn has_question(&self, name: &DomainName) -> bool {
        self.questions.iter().any(|q| &q.name == name)
    }

    /// Whether `name` is the target of a CNAME already in the answer
    /// section. Together with [`Message::has_question`] this keeps a
    /// caller-facing response restricted to records relevant to the
    /// original question or to a CNAME chain that began from it.
    pub fn has_answer_target(&self, name: &DomainName) -> bool {
        self.answers
            .iter()
            .any(|r| matches!(&r.rdata, RData::Cname(target) if target == name))
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = &self.header;
        writeln!(
            f,
            ";; ->>HEADER<<- opcode: {}, status: {}, id: {}",
            header.opcode,
            rcode_name(header.rcode),
            header.id
        )?;

        let mut flags = Vec::new();
        for (set, label) in [
            (header.is_response, "qr"),
            (header.authoritative, "aa"),
            (header.truncation, "tc"),
            (header.recursion_desired, "rd"),
            (header.recursion_available, "ra"),
        ] {
            if set {
                flags.push(label);
            }
        }
        writeln!(
            f,
            ";; flags: {}; QUERY: {}, ANSWER: {}, AUTHORITY: {}, ADDITIONAL: {}",
            flags.join(" "),
            header.num_questions,
            header.num_answers,
            header.num_authorities,
            header.num_additionals
        )?;

        if !self.questions.is_empty() {
            writeln!(f, "\n;; QUESTION SECTION:")?;
            for question in &self.questions {
                writeln!(f, ";{}", question)?;
            }
        }
        for (section, records) in [
            ("ANSWER", &self.answers),
            ("AUTHORITY", &self.authority),
            ("ADDITIONAL", &self.additional),
        ] {
            if !records.is_empty() {
                writeln!(f, "\n;; {} SECTION:", section)?;
                for record in records {
                    writeln!(f, "{}", record)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns_parser::ClassType;
    use std::net::Ipv4Addr;

    fn name(s: &str) -> DomainName {
        DomainName::new(s).unwrap()
    }

    fn a_record(owner: &str, addr: [u8; 4]) -> Resource {
        Resource::new(
            name(owner),
            RecordType::A,
            ClassType::In,
            300,
            RData::A(Ipv4Addr::from(addr)),
        )
    }

    #[test]
    fn test_message_roundtrip() {
        let mut message = Message::new(MessageType::ResolverResponse);
        message.add_question(name("www.example.com"), RecordType::A);
        message.add_answer(Resource::new(
            name("www.example.com"),
            RecordType::Cname,
            ClassType::In,
            60,
            RData::Cname(name("example.com")),
        ));
        message.add_answer(a_record("example.com", [93, 184, 216, 34]));
        message.add_authority(Resource::new(
            name("example.com"),
            RecordType::Ns,
            ClassType::In,
            86400,
            RData::Ns(name("ns1.example.com")),
        ));
        message.add_additional(a_record("ns1.example.com", [192, 0, 2, 1]));

        let packed = message.pack();
        let decoded = Message::unpack(&packed).unwrap();

        assert_eq!(decoded, message);
        assert_eq!(decoded.header.num_questions, decoded.questions.len() as u16);
        assert_eq!(decoded.header.num_answers, decoded.answers.len() as u16);
        assert_eq!(decoded.header.num_authorities, decoded.authority.len() as u16);
        assert_eq!(decoded.header.num_additionals, decoded.additional.len() as u16);
    }

    #[test]
    fn test_counts_track_appends() {
        let mut message = Message::new(MessageType::Request);
        assert_eq!(message.header.num_questions, 0);
        message.add_question(name("example.com"), RecordType::A);
        assert_eq!(message.header.num_questions, 1);
        message.add_answer(a_record("example.com", [1, 2, 3, 4]));
        message.add_answer(a_record("example.com", [1, 2, 3, 5]));
        assert_eq!(message.header.num_answers, 2);
    }

    #[test]
    fn test_request_sets_identifier_and_rd() {
        let request = Message::new_request(name("example.com"), RecordType::A);
        assert!(!request.header.is_response);
        assert!(request.header.recursion_desired);
        assert_eq!(request.questions.len(), 1);
    }

    #[test]
    fn test_is_response_to_matches_id() {
        let request = Message::new_request(name("example.com"), RecordType::A);

        let mut response = Message::new(MessageType::Response);
        response.header.id = request.header.id;
        assert!(response.is_response_to(&request));

        response.header.id = request.header.id.wrapping_add(1);
        assert!(!response.is_response_to(&request));

        let mut query = Message::new_request(name("example.com"), RecordType::A);
        query.header.id = request.header.id;
        query.header.is_response = false;
        assert!(!query.is_response_to(&request));
    }

    #[test]
    fn test_answer_target_tracks_cname_chain() {
        let mut response = Message::new(MessageType::ResolverResponse);
        response.add_question(name("www.github.com"), RecordType::A);
        assert!(response.has_question(&name("www.github.com")));
        assert!(!response.has_answer_target(&name("github.com")));

        response.add_answer(Resource::new(
            name("www.github.com"),
            RecordType::Cname,
            ClassType::In,
            60,
            RData::Cname(name("github.com")),
        ));
        assert!(response.has_answer_target(&name("github.com")));
    }

    #[test]
    fn test_find_section_helpers() {
        let mut message = Message::new(MessageType::Response);
        message.add_answer(a_record("example.com", [1, 2, 3, 4]));
        message.add_authority(Resource::new(
            name("example.com"),
            RecordType::Ns,
            ClassType::In,
            3600,
            RData::Ns(name("ns1.example.com")),
        ));
        message.add_additional(a_record("ns1.example.com", [192, 0, 2, 1]));

        assert_eq!(message.find_answers(RecordType::A).len(), 1);
        assert!(message.find_answers(RecordType::Txt).is_empty());
        assert_eq!(message.find_authority(RecordType::Ns).len(), 1);
        assert_eq!(message.find_additional(RecordType::A).len(), 1);
    }
}
