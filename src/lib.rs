//! A recursive DNS resolver with a persistent record cache.
//!
//! Given a domain name and a record type, [`Resolver::resolve`] walks the
//! public DNS hierarchy starting from the root name servers, follows
//! delegations through TLD and authoritative servers, chases CNAME
//! redirections, and returns the answer set as a caller-facing response
//! message. Resource records picked up along the way live in an on-disk
//! cache in BIND-like zone-file form, so repeat queries are served
//! locally and the cache survives restarts.
//!
//! Queries are resolved sequentially within one resolver instance; the
//! only blocking points are the UDP exchanges (bounded by a receive
//! timeout) and cache file I/O at startup and shutdown.
//!
//! # Usage
//!
//! ```no_run
//! use iterdns::{RecordType, Resolver, ResolverConfig};
//! use std::path::Path;
//!
//! let config = ResolverConfig::new(
//!     Path::new("/etc/iterdns/root-servers.conf"),
//!     Path::new("/var/lib/iterdns/resolver-cache.conf"),
//! ).expect("paths must be absolute");
//!
//! let mut resolver = Resolver::new(&config).expect("failed to load hints or cache");
//! let response = resolver.resolve("example.com", RecordType::A);
//! for answer in &response.answers {
//!     println!("{}", answer);
//! }
//! resolver.close().expect("failed to write the cache back");
//! ```
//!
//! # Limitations
//!
//! This implementation follows RFC 1035 over UDP only. It does not act as
//! an authoritative server and has no DNSSEC validation, EDNS(0), TCP
//! fallback, zone transfers or punycode conversion.

#![forbid(unsafe_code)]
#![allow(clippy::single_component_path_imports)]

// log for logging (optional).
#[cfg(feature = "logging")]
use log;

#[cfg(not(feature = "logging"))]
#[macro_use]
mod log {
    macro_rules! trace {
        ($($arg:expr),*) => {{
            let _ = ($($arg),*); // avoid warnings about unused variables.
        }};
    }
    macro_rules! debug {
        ($($arg:expr),*) => {{
            let _ = ($($arg),*);
        }};
    }
    macro_rules! info {
        ($($arg:expr),*) => {{
            let _ = ($($arg),*);
        }};
    }
    macro_rules! warn {
        ($($arg:expr),*) => {{
            let _ = ($($arg),*);
        }};
    }
    macro_rules! error {
        ($($arg:expr),*) => {{
            let _ = ($($arg),*);
        }};
    }
}

mod bind_file;
mod config;
mod dns_parser;
mod error;
mod message;
mod resolver;
mod transport;

pub use bind_file::{BindFile, CachedResource};
pub use config::ResolverConfig;
pub use dns_parser::{
    ClassType, DomainName, Header, MessageType, Question, RData, RecordType, Resource,
    MAX_MSG_SIZE, RC_FORMERR, RC_NOERROR, RC_NOTIMP, RC_NXDOMAIN, RC_REFUSED, RC_SERVFAIL,
};
pub use error::{Error, Result};
pub use message::{rcode_name, Message};
pub use resolver::Resolver;
pub use transport::{Connector, Transport, UdpConnector, UdpTransport};
