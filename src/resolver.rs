//! The iterative resolution state machine.
//!
//! One resolver instance processes one query at a time. A walk starts at
//! a root server chosen uniformly at random from the hints, follows
//! delegations through TLD and authoritative servers, chases CNAMEs, and
//! deposits every caller-visible answer in both the response and the
//! cache.
//!
//! Per walk step the states are
//! `Start -> Query -> Classify -> {TerminalAnswer | FollowCNAME |
//! FollowDelegationGlue | FollowDelegationNoGlue | Fail}`:
//! a CNAME re-enters `Start` with a new name, a delegation re-enters
//! `Query` with a new server, and the terminal states either fill the
//! caller response or surface as its RCODE.

#[cfg(feature = "logging")]
use crate::log::{debug, trace};
use crate::bind_file::BindFile;
use crate::config::ResolverConfig;
use crate::dns_parser::{
    DomainName, MessageType, RData, RecordType, Resource, DNS_PORT, RC_FORMERR, RC_NOTIMP,
    RC_SERVFAIL,
};
use crate::message::Message;
use crate::transport::{Connector, UdpConnector};
use crate::{Error, Result};
use std::net::Ipv4Addr;

/// Ceiling on delegation steps per top-level call. CNAME chases and
/// sub-walks for name-server hosts draw from the same budget, so a
/// malicious delegation loop cannot keep the walk alive.
const MAX_HOPS: u32 = 16;

/// Datagrams that fail the validity check are discarded and the socket
/// read again at most this many times per query.
const MAX_RERECEIVES: u32 = 3;

/// A recursive DNS resolver over a persistent record cache.
pub struct Resolver {
    hints: BindFile,
    cache: BindFile,
    connector: Box<dyn Connector>,
}

impl Resolver {
    /// Builds a resolver resolving over UDP port 53. Root hints and the
    /// cache are loaded eagerly from the configured paths.
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        Self::with_connector(config, Box::new(UdpConnector::new()))
    }

    /// Builds a resolver over a custom [`Connector`], the seam scripted
    /// name servers use in tests.
    pub fn with_connector(
        config: &ResolverConfig,
        connector: Box<dyn Connector>,
    ) -> Result<Self> {
        let hints = BindFile::load(&config.root_hints)?;
        if hints.a_addresses().is_empty() {
            return Err(Error::NameServerFetch(format!(
                "no root server addresses in {}",
                config.root_hints.display()
            )));
        }
        let cache = BindFile::load(&config.cache)?;
        Ok(Self {
            hints,
            cache,
            connector,
        })
    }

    /// Resolves `name` / `rtype` and returns the caller-facing response.
    ///
    /// The response always comes back well formed: failures surface as
    /// its RCODE (NOTIMP for an unsupported record type, SERVFAIL for a
    /// walk that could not complete) with an empty answer set, never as
    /// an abrupt termination.
    pub fn resolve(&mut self, name: &str, rtype: RecordType) -> Message {
        let mut response = Message::new(MessageType::ResolverResponse);

        let qname = match DomainName::new(name) {
            Ok(qname) => qname,
            Err(e) => {
                debug!("rejecting query for {:?}: {}", name, e);
                response.header.rcode = RC_FORMERR;
                return response;
            }
        };
        response.add_question(qname.clone(), rtype);

        if !rtype.is_supported() {
            debug!("record type {} is outside the supported set", rtype);
            response.header.rcode = RC_NOTIMP;
            return response;
        }

        let mut hops = 0;
        if let Err(e) = self.resolve_records(&qname, rtype, &mut response, &mut hops) {
            debug!("resolution of {} {} failed: {}", qname, rtype, e);
            response.header.rcode = match e {
                Error::InvalidRecordType(_) => RC_NOTIMP,
                _ => RC_SERVFAIL,
            };
        }
        response
    }

    /// Serves `name` / `rtype` from the cache when possible, otherwise
    /// starts an iterative walk.
    fn resolve_records(
        &mut self,
        name: &DomainName,
        rtype: RecordType,
        response: &mut Message,
        hops: &mut u32,
    ) -> Result<()> {
        let cached = self.cache.resolve(name, rtype);
        if !cached.is_empty() {
            debug!("cache hit: {} records for {} {}", cached.len(), name, rtype);
            for record in cached {
                response.add_answer(record);
            }
            return Ok(());
        }
        self.walk(name, rtype, response, hops)
    }

    // The iterative loop: query `current_ns`, classify the reply, and
    // either terminate on an answer or re-enter with the next server.
    fn walk(
        &mut self,
        name: &DomainName,
        rtype: RecordType,
        response: &mut Message,
        hops: &mut u32,
    ) -> Result<()> {
        let mut current_ns = self.pick_root()?;
        let mut request = Message::new_request(name.clone(), rtype);

        loop {
            if *hops >= MAX_HOPS {
                return Err(Error::NameServerFetch(format!(
                    "hop ceiling of {} reached while resolving {}",
                    MAX_HOPS, name
                )));
            }
            *hops += 1;

            let reply = self.exchange(current_ns, &mut request)?;

            // Answer present.
            if reply.header.num_answers > 0 {
                return self.absorb_answers(&reply, name, rtype, response, hops);
            }

            // Delegation: glue address if present, otherwise resolve the
            // first NS host with a fresh walk of its own.
            if reply.header.num_authorities > 0 {
                if let Some(glue) = reply.find_additional(RecordType::A).first() {
                    if let RData::A(address) = &glue.rdata {
                        trace!("delegation with glue: {} -> {}", glue.name, address);
                        current_ns = *address;
                        continue;
                    }
                }

                let ns_host = reply
                    .find_authority(RecordType::Ns)
                    .first()
                    .and_then(|record| record.rdata.name_target())
                    .cloned()
                    .ok_or_else(|| {
                        Error::NameServerFetch(format!("no NS records in delegation for {}", name))
                    })?;
                trace!("delegation without glue, resolving name server {}", ns_host);
                current_ns = self.resolve_name_server(&ns_host, hops)?;
                continue;
            }

            return Err(Error::NameServerFetch(format!(
                "response for {} carries neither answers nor a delegation",
                name
            )));
        }
    }

    /// Consumes the Answer section of `reply`: CNAME redirection for
    /// address queries, terminal answers otherwise. TXT and CNAME queries
    /// treat the Answer section as terminal.
    fn absorb_answers(
        &mut self,
        reply: &Message,
        name: &DomainName,
        rtype: RecordType,
        response: &mut Message,
        hops: &mut u32,
    ) -> Result<()> {
        if matches!(rtype, RecordType::A | RecordType::Aaaa) {
            let aliases: Vec<Resource> = reply
                .answers
                .iter()
                .filter(|record| record.rtype == RecordType::Cname && record.name == *name)
                .cloned()
                .collect();
            if let Some(first) = aliases.first() {
                let target = first.rdata.name_target().cloned().ok_or_else(|| {
                    Error::FormatError(format!("CNAME record for {} carries no target", name))
                })?;
                for alias in aliases {
                    self.append_answer(alias, response);
                }
                debug!("following CNAME {} -> {}", name, target);
                return self.resolve_records(&target, rtype, response, hops);
            }
        }

        for record in reply.find_answers(rtype) {
            if response.has_question(&record.name) || response.has_answer_target(&record.name) {
                self.append_answer(record.clone(), response);
            }
        }
        Ok(())
    }

    /// Appends a record to the caller response and absorbs it into the
    /// cache. Delegation NS and glue records never pass through here;
    /// only caller-visible answers are cached.
    fn append_answer(&mut self, record: Resource, response: &mut Message) {
        self.cache.add(&record);
        response.add_answer(record);
    }

    /// Resolves the address of a name server met in a glueless
    /// delegation: a fresh walk starting again from a random root,
    /// sharing the caller's hop budget.
    fn resolve_name_server(&mut self, host: &DomainName, hops: &mut u32) -> Result<Ipv4Addr> {
        let mut scratch = Message::new(MessageType::ResolverResponse);
        scratch.add_question(host.clone(), RecordType::A);
        self.resolve_records(host, RecordType::A, &mut scratch, hops)?;

        scratch
            .answers
            .iter()
            .find_map(|record| match &record.rdata {
                RData::A(address) => Some(*address),
                _ => None,
            })
            .ok_or_else(|| {
                Error::NameServerFetch(format!("no address found for name server {}", host))
            })
    }

    /// Sends `request` to `server` and returns the first datagram that
    /// passes the validity check: a parseable response whose identifier
    /// matches. Spoofed, stray or undecodable datagrams are discarded
    /// and the socket read again within a fixed bound.
    fn exchange(&mut self, server: Ipv4Addr, request: &mut Message) -> Result<Message> {
        let buffer = request.pack();
        let mut transport = self
            .connector
            .connect(server, DNS_PORT)
            .map_err(|e| Error::NameServerFetch(format!("connect to {}: {}", server, e)))?;
        transport.send(&buffer)?;
        trace!("sent {} octet query to {}", buffer.len(), server);

        let mut reads = 0;
        loop {
            let datagram = transport.receive().map_err(|e| {
                Error::NameServerFetch(format!("receive from {}: {}", server, e))
            })?;
            match Message::unpack(&datagram) {
                Ok(reply) if reply.is_response_to(request) => {
                    trace!(
                        "reply from {}: AN={} NS={} AR={}",
                        server,
                        reply.header.num_answers,
                        reply.header.num_authorities,
                        reply.header.num_additionals
                    );
                    return Ok(reply);
                }
                Ok(reply) => {
                    debug!(
                        "discarding datagram from {}: id {} does not answer {}",
                        server, reply.header.id, request.header.id
                    );
                }
                Err(e) => {
                    debug!("discarding undecodable datagram from {}: {}", server, e);
                }
            }

            reads += 1;
            if reads > MAX_RERECEIVES {
                return Err(Error::NameServerFetch(format!(
                    "no valid response from {} after {} reads",
                    server,
                    reads
                )));
            }
        }
    }

    /// One root server A address, chosen uniformly at random to spread
    /// load across the hints.
    fn pick_root(&self) -> Result<Ipv4Addr> {
        let roots = self.hints.a_addresses();
        if roots.is_empty() {
            return Err(Error::NameServerFetch(
                "no root server addresses in hints".to_string(),
            ));
        }
        let root = roots[fastrand::usize(..roots.len())];
        debug!("starting walk at root server {}", root);
        Ok(root)
    }

    /// Read access to the cache, for callers that want to inspect what a
    /// resolution deposited.
    pub fn cache(&self) -> &BindFile {
        &self.cache
    }

    /// Writes the surviving cache entries back to disk. Root hints are
    /// read-only and left untouched.
    pub fn close(&mut self) -> Result<()> {
        self.cache.sync()
    }
}
