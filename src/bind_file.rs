//! A persistent, TTL-gated store of resource records.
//!
//! Both the resolver cache and the root-hints list are BIND-like text
//! files, one record per line: `NAME TTL CLASS TYPE RDATA [LAST_MODIFIED]`.
//! The trailing RFC 3339 timestamp is present in cache files and absent in
//! root-hints files.

#[cfg(feature = "logging")]
use crate::log::{debug, trace};
use crate::dns_parser::{ClassType, DomainName, RData, RecordType, Resource};
use crate::{e_fmt, Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use std::{
    collections::HashSet,
    fs,
    net::Ipv4Addr,
    path::{Path, PathBuf},
};

/// A resource record with the time it entered the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResource {
    pub resource: Resource,
    pub last_modified: DateTime<Utc>,
}

impl CachedResource {
    /// A record has expired once more than TTL seconds passed since it
    /// was last modified. Expired entries are never served and are
    /// dropped on the next write-back.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        (now - self.last_modified).num_seconds() > i64::from(self.resource.ttl)
    }
}

/// In-memory representation of one BIND-like file.
pub struct BindFile {
    path: PathBuf,
    records: Vec<CachedResource>,
}

impl BindFile {
    /// Loads all records from `path`.
    ///
    /// Blank lines and `;` comment lines are skipped. Lines with a
    /// missing or unparseable LAST_MODIFIED field load as last-modified
    /// now, so root hints remain usable while cache entries re-validate
    /// against their TTL.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| e_fmt!("failed to read {}: {}", path.display(), e))?;
        let now = Utc::now();

        let mut records = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }
            records.push(Self::parse_line(line, index + 1, now)?);
        }

        debug!(
            "loaded {} records from {}",
            records.len(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    fn parse_line(line: &str, line_number: usize, now: DateTime<Utc>) -> Result<CachedResource> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            return Err(Error::ParametersMissing(format!(
                "line {}: expected at least 5 fields, found {}",
                line_number,
                fields.len()
            )));
        }

        let name = DomainName::new(fields[0])?;
        let ttl: u32 = fields[1].parse().map_err(|e| {
            Error::ParametersMissing(format!("line {}: bad ttl {:?}: {}", line_number, fields[1], e))
        })?;
        let class = ClassType::parse(fields[2])?;
        let rtype = RecordType::parse(fields[3])?;
        let rdata = RData::from_text(rtype, fields[4])?;

        let last_modified = fields
            .get(5)
            .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
            .map(|stamp| stamp.with_timezone(&Utc))
            .unwrap_or(now);

        Ok(CachedResource {
            resource: Resource::new(name, rtype, class, ttl, rdata),
            last_modified,
        })
    }

    /// All non-expired records matching `name` and `rtype` by canonical
    /// compare.
    pub fn find(&self, name: &DomainName, rtype: RecordType) -> Vec<&Resource> {
        let now = Utc::now();
        self.records
            .iter()
            .filter(|cached| {
                !cached.is_expired(now)
                    && cached.resource.name == *name
                    && cached.resource.rtype == rtype
            })
            .map(|cached| &cached.resource)
            .collect()
    }

    /// Like [`BindFile::find`], but for A/AAAA queries also follows CNAME
    /// chains inside the store: the CNAME record(s) are prepended to any
    /// address records ultimately found for the first target. Never
    /// crosses to the network.
    pub fn resolve(&self, name: &DomainName, rtype: RecordType) -> Vec<Resource> {
        let mut found = Vec::new();
        let mut visited = HashSet::new();
        self.resolve_into(name, rtype, &mut found, &mut visited);
        found
    }

    fn resolve_into(
        &self,
        name: &DomainName,
        rtype: RecordType,
        found: &mut Vec<Resource>,
        visited: &mut HashSet<DomainName>,
    ) {
        let direct = self.find(name, rtype);
        if !direct.is_empty() {
            found.extend(direct.into_iter().cloned());
            return;
        }

        if !matches!(rtype, RecordType::A | RecordType::Aaaa) {
            return;
        }

        let aliases = self.find(name, RecordType::Cname);
        if aliases.is_empty() || !visited.insert(name.clone()) {
            return;
        }
        let target = aliases
            .first()
            .and_then(|alias| alias.rdata.name_target())
            .cloned();
        found.extend(aliases.into_iter().cloned());
        if let Some(target) = target {
            trace!("cache: following {} to {}", name, target);
            self.resolve_into(&target, rtype, found, visited);
        }
    }

    /// Absorbs `record` with last-modified now. A record with TTL zero is
    /// never admitted. Duplicates are not collapsed at insert time; the
    /// sweep at write-back drops them only once expired.
    pub fn add(&mut self, record: &Resource) {
        if record.ttl == 0 {
            return;
        }
        trace!("cache: absorbing {}", record);
        self.records.push(CachedResource {
            resource: record.clone(),
            last_modified: Utc::now(),
        });
    }

    /// Rewrites the backing file, emitting only unexpired records in
    /// insertion order.
    pub fn sync(&mut self) -> Result<()> {
        let now = Utc::now();
        self.records.retain(|cached| !cached.is_expired(now));

        let mut contents = String::new();
        for cached in &self.records {
            let record = &cached.resource;
            contents.push_str(&format!(
                "{} {} {} {} {} {}\n",
                record.name,
                record.ttl,
                record.class,
                record.rtype,
                record.rdata.to_text(),
                cached
                    .last_modified
                    .to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }

        fs::write(&self.path, contents)
            .map_err(|e| e_fmt!("failed to write {}: {}", self.path.display(), e))?;
        debug!(
            "synced {} records to {}",
            self.records.len(),
            self.path.display()
        );
        Ok(())
    }

    /// The IPv4 addresses of all non-expired A records, in file order.
    /// For a root-hints file these are the root server addresses.
    pub fn a_addresses(&self) -> Vec<Ipv4Addr> {
        let now = Utc::now();
        self.records
            .iter()
            .filter(|cached| !cached.is_expired(now))
            .filter_map(|cached| match &cached.resource.rdata {
                RData::A(addr) => Some(*addr),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn name(s: &str) -> DomainName {
        DomainName::new(s).unwrap()
    }

    fn bind_file(contents: &str) -> (NamedTempFile, BindFile) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let bind = BindFile::load(file.path()).unwrap();
        (file, bind)
    }

    #[test]
    fn test_load_root_hints_without_timestamp() {
        let (_file, hints) = bind_file(
            "; root servers\n\
             a.root-servers.net. 3600000 IN A 198.41.0.4\n\
             \n\
             b.root-servers.net. 3600000 IN A 199.9.14.201\n",
        );
        assert_eq!(hints.len(), 2);
        assert_eq!(
            hints.a_addresses(),
            vec![
                Ipv4Addr::new(198, 41, 0, 4),
                Ipv4Addr::new(199, 9, 14, 201)
            ]
        );
    }

    #[test]
    fn test_load_accepts_ch_class_and_txt() {
        let (_file, cache) = bind_file("version.bind. 60 CH TXT 9.16.1\n");
        let found = cache.find(&name("version.bind"), RecordType::Txt);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].class, ClassType::Ch);
    }

    #[test]
    fn test_load_rejects_short_line() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"example.com. 300 IN A\n").unwrap();
        assert!(matches!(
            BindFile::load(file.path()),
            Err(Error::ParametersMissing(_))
        ));
    }

    #[test]
    fn test_find_honors_ttl() {
        let stamp = (Utc::now() - Duration::seconds(400))
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let (_file, cache) = bind_file(&format!(
            "stale.example.com. 300 IN A 1.2.3.4 {}\n\
             live.example.com. 3600 IN A 5.6.7.8 {}\n",
            stamp, stamp
        ));

        assert!(cache.find(&name("stale.example.com"), RecordType::A).is_empty());
        assert_eq!(cache.find(&name("live.example.com"), RecordType::A).len(), 1);
    }

    #[test]
    fn test_malformed_timestamp_loads_as_now() {
        let (_file, cache) =
            bind_file("example.com. 300 IN A 1.2.3.4 not-a-timestamp\n");
        assert_eq!(cache.find(&name("example.com"), RecordType::A).len(), 1);
    }

    #[test]
    fn test_add_rejects_zero_ttl() {
        let (_file, mut cache) = bind_file("");
        cache.add(&Resource::new(
            name("example.com"),
            RecordType::A,
            ClassType::In,
            0,
            RData::A(Ipv4Addr::new(1, 2, 3, 4)),
        ));
        assert!(cache.is_empty());

        cache.add(&Resource::new(
            name("example.com"),
            RecordType::A,
            ClassType::In,
            60,
            RData::A(Ipv4Addr::new(1, 2, 3, 4)),
        ));
        assert_eq!(cache.find(&name("example.com"), RecordType::A).len(), 1);
    }

    #[test]
    fn test_resolve_follows_cname_chain_in_order() {
        let (_file, cache) = bind_file(
            "www.example.com. 300 IN CNAME example.com.\n\
             example.com. 300 IN A 1.2.3.4\n",
        );

        let found = cache.resolve(&name("www.example.com"), RecordType::A);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].rtype, RecordType::Cname);
        assert_eq!(found[1].rdata, RData::A(Ipv4Addr::new(1, 2, 3, 4)));
    }

    #[test]
    fn test_resolve_survives_cname_loop() {
        let (_file, cache) = bind_file(
            "a.example.com. 300 IN CNAME b.example.com.\n\
             b.example.com. 300 IN CNAME a.example.com.\n",
        );
        let found = cache.resolve(&name("a.example.com"), RecordType::A);
        // Both aliases surface, then the chase stops.
        assert!(found.iter().all(|r| r.rtype == RecordType::Cname));
    }

    #[test]
    fn test_sync_drops_expired_and_preserves_live() {
        let stale_stamp = (Utc::now() - Duration::seconds(400))
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let (file, mut cache) = bind_file(&format!(
            "stale.example.com. 300 IN A 1.2.3.4 {}\n",
            stale_stamp
        ));
        cache.add(&Resource::new(
            name("live.example.com"),
            RecordType::A,
            ClassType::In,
            3600,
            RData::A(Ipv4Addr::new(5, 6, 7, 8)),
        ));

        cache.sync().unwrap();

        let reloaded = BindFile::load(file.path()).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(
            reloaded.find(&name("live.example.com"), RecordType::A).len(),
            1
        );
        assert!(reloaded
            .find(&name("stale.example.com"), RecordType::A)
            .is_empty());
    }

    #[test]
    fn test_sync_then_load_keeps_live_set() {
        let (file, mut cache) = bind_file("");
        for (host, addr) in [("a.example.com", [1, 1, 1, 1]), ("b.example.com", [2, 2, 2, 2])] {
            cache.add(&Resource::new(
                name(host),
                RecordType::A,
                ClassType::In,
                3600,
                RData::A(Ipv4Addr::from(addr)),
            ));
        }
        cache.sync().unwrap();

        let reloaded = BindFile::load(file.path()).unwrap();
        assert_eq!(reloaded.len(), 2);
        for host in ["a.example.com", "b.example.com"] {
            assert_eq!(reloaded.find(&name(host), RecordType::A).len(), 1);
        }
    }
}
