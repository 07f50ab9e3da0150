//! The behavior table.
//!
//! Each behavior listens on `base_port + offset`. Offsets are a stable contract with the
//! clients under test, so entries are never renumbered. Offset 0 is left unbound: connecting
//! to the base port itself is refused.

use std::fmt;
use std::sync::Arc;

use crate::raw::{RawFactory, RawProtocol, behaviors as raw};
use crate::server::Engine;
use crate::web::{self, Site};

/// One behavior per listening port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BehaviorId {
    ListenForever,
    EmptyTerminateImmediately,
    EmptyTerminateOnReceive,
    MalformedTerminateImmediately,
    MalformedTerminateOnReceive,
    FiveSecondDrip,
    ThirtySecondDrip,
    Sleep,
    Status,
    ContentLengthLie,
    LargeHeader,
    Retries,
    DropRandom,
    Unparseable,
    TooLongContentLength,
    IncompleteResponse,
}

/// How a behavior talks to its peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Raw bytes on the socket, no http parsing.
    Raw,
    /// A parsed request and a (possibly broken) response.
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BehaviorSpec {
    pub id: BehaviorId,
    pub offset: u16,
    pub transport: Transport,
    pub description: &'static str,
}

impl BehaviorSpec {
    const fn new(id: BehaviorId, offset: u16, transport: Transport, description: &'static str) -> Self {
        Self { id, offset, transport, description }
    }

    /// The port for this behavior, `None` when it would not fit in a `u16`.
    pub fn port(&self, base_port: u16) -> Option<u16> {
        base_port.checked_add(self.offset)
    }
}

/// Largest offset in [`BEHAVIORS`].
pub const MAX_OFFSET: u16 = 16;

pub const BEHAVIORS: [BehaviorSpec; 16] = [
    BehaviorSpec::new(BehaviorId::ListenForever, 1, Transport::Raw, "accepts the connection and never answers"),
    BehaviorSpec::new(BehaviorId::EmptyTerminateImmediately, 2, Transport::Raw, "closes as soon as the connection is made"),
    BehaviorSpec::new(BehaviorId::EmptyTerminateOnReceive, 3, Transport::Raw, "closes once the request arrives"),
    BehaviorSpec::new(BehaviorId::MalformedTerminateImmediately, 4, Transport::Raw, "writes 'foo bar' on connect, then closes"),
    BehaviorSpec::new(BehaviorId::MalformedTerminateOnReceive, 5, Transport::Raw, "writes 'foo bar' once the request arrives, then closes"),
    BehaviorSpec::new(BehaviorId::FiveSecondDrip, 6, Transport::Raw, "sends a 204 response one byte every 5 seconds"),
    BehaviorSpec::new(BehaviorId::ThirtySecondDrip, 7, Transport::Raw, "sends a 204 response one byte every 30 seconds"),
    BehaviorSpec::new(BehaviorId::Sleep, 8, Transport::Http, "waits ?sleep=N seconds before answering"),
    BehaviorSpec::new(BehaviorId::Status, 9, Transport::Http, "answers with the ?status=N status code"),
    BehaviorSpec::new(BehaviorId::ContentLengthLie, 10, Transport::Raw, "sends 1MB of data past a 3 byte content-length"),
    BehaviorSpec::new(BehaviorId::LargeHeader, 11, Transport::Http, "sends a ?size=N byte cookie header"),
    BehaviorSpec::new(BehaviorId::Retries, 12, Transport::Http, "fails ?tries=N - 1 times for a ?key before succeeding"),
    BehaviorSpec::new(BehaviorId::DropRandom, 13, Transport::Raw, "drops a ?failrate=F fraction of requests without answering"),
    BehaviorSpec::new(BehaviorId::Unparseable, 14, Transport::Http, "answers in a content type the client did not ask for"),
    BehaviorSpec::new(BehaviorId::TooLongContentLength, 15, Transport::Http, "declares a content-length longer than the body"),
    BehaviorSpec::new(BehaviorId::IncompleteResponse, 16, Transport::Raw, "sends a negotiated body 2000 bytes short, then closes"),
];

impl BehaviorId {
    pub fn name(self) -> &'static str {
        match self {
            Self::ListenForever => "listen-forever",
            Self::EmptyTerminateImmediately => "empty-terminate-immediately",
            Self::EmptyTerminateOnReceive => "empty-terminate-on-receive",
            Self::MalformedTerminateImmediately => "malformed-terminate-immediately",
            Self::MalformedTerminateOnReceive => "malformed-terminate-on-receive",
            Self::FiveSecondDrip => "five-second-drip",
            Self::ThirtySecondDrip => "thirty-second-drip",
            Self::Sleep => "sleep",
            Self::Status => "status",
            Self::ContentLengthLie => "content-length-lie",
            Self::LargeHeader => "large-header",
            Self::Retries => "retries",
            Self::DropRandom => "drop-random",
            Self::Unparseable => "unparseable",
            Self::TooLongContentLength => "too-long-content-length",
            Self::IncompleteResponse => "incomplete-response",
        }
    }

    /// The table entry for this behavior.
    pub fn spec(self) -> &'static BehaviorSpec {
        let index = match self {
            Self::ListenForever => 0,
            Self::EmptyTerminateImmediately => 1,
            Self::EmptyTerminateOnReceive => 2,
            Self::MalformedTerminateImmediately => 3,
            Self::MalformedTerminateOnReceive => 4,
            Self::FiveSecondDrip => 5,
            Self::ThirtySecondDrip => 6,
            Self::Sleep => 7,
            Self::Status => 8,
            Self::ContentLengthLie => 9,
            Self::LargeHeader => 10,
            Self::Retries => 11,
            Self::DropRandom => 12,
            Self::Unparseable => 13,
            Self::TooLongContentLength => 14,
            Self::IncompleteResponse => 15,
        };
        &BEHAVIORS[index]
    }

    /// Builds what serves the connections accepted for this behavior.
    pub(crate) fn binding(self, engine: &Engine) -> Result<Binding, matchit::InsertError> {
        let config = engine.config();

        let binding = match self {
            Self::ListenForever => Binding::raw(|| raw::ListenForever),
            Self::EmptyTerminateImmediately => Binding::raw(|| raw::TerminateImmediately::new(b"")),
            Self::EmptyTerminateOnReceive => Binding::raw(|| raw::TerminateOnReceive::new(b"")),
            Self::MalformedTerminateImmediately => Binding::raw(|| raw::TerminateImmediately::new(raw::MALFORMED)),
            Self::MalformedTerminateOnReceive => Binding::raw(|| raw::TerminateOnReceive::new(raw::MALFORMED)),
            Self::FiveSecondDrip => {
                let unit = config.short_drip();
                Binding::raw(move || raw::ByteDripResponse::new(unit))
            }
            Self::ThirtySecondDrip => {
                let unit = config.long_drip();
                Binding::raw(move || raw::ByteDripResponse::new(unit))
            }
            Self::ContentLengthLie => Binding::raw(|| raw::ContentLengthLie),
            Self::DropRandom => {
                let rng = engine.rng();
                let drop_rate = config.drop_rate();
                Binding::raw(move || raw::DropRandom::new(Arc::clone(&rng), drop_rate))
            }
            Self::IncompleteResponse => Binding::raw(|| raw::IncompleteResponse),

            Self::Sleep => Binding::http(web::sleep_site(config.default_sleep())?),
            Self::Status => Binding::http(web::status_site()?),
            Self::LargeHeader => Binding::http(web::large_header_site()?),
            Self::Retries => Binding::http(web::retries_site(engine.store().clone())?),
            Self::Unparseable => Binding::http(web::unparseable_site()?),
            Self::TooLongContentLength => Binding::http(web::toolong_site()?),
        };

        Ok(binding)
    }
}

impl fmt::Display for BehaviorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What an accepted connection is handed to.
#[derive(Clone)]
pub(crate) enum Binding {
    Raw(RawFactory),
    Http(Arc<Site>),
}

impl Binding {
    fn raw<P, F>(factory: F) -> Self
    where
        P: RawProtocol + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        Binding::Raw(Arc::new(move || Box::new(factory()) as Box<dyn RawProtocol>))
    }

    fn http(site: Site) -> Self {
        Binding::Http(Arc::new(site))
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Raw(_) => f.write_str("Binding::Raw"),
            Binding::Http(_) => f.write_str("Binding::Http"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn offsets_are_distinct() {
        let offsets: HashSet<u16> = BEHAVIORS.iter().map(|spec| spec.offset).collect();
        assert_eq!(offsets.len(), BEHAVIORS.len());
        assert!(!offsets.contains(&0));
        assert_eq!(offsets.iter().max(), Some(&MAX_OFFSET));
    }

    #[test]
    fn every_id_has_one_entry() {
        let ids: HashSet<BehaviorId> = BEHAVIORS.iter().map(|spec| spec.id).collect();
        assert_eq!(ids.len(), BEHAVIORS.len());

        for spec in &BEHAVIORS {
            assert_eq!(spec.id.spec(), spec);
        }
    }

    #[test]
    fn stable_port_map() {
        assert_eq!(BehaviorId::ListenForever.spec().port(5500), Some(5501));
        assert_eq!(BehaviorId::Sleep.spec().port(5500), Some(5508));
        assert_eq!(BehaviorId::Status.spec().port(5500), Some(5509));
        assert_eq!(BehaviorId::Retries.spec().port(5500), Some(5512));
        assert_eq!(BehaviorId::IncompleteResponse.spec().port(5500), Some(5516));
        assert_eq!(BehaviorId::TooLongContentLength.spec().transport, Transport::Http);
        assert_eq!(BehaviorId::DropRandom.spec().transport, Transport::Raw);
    }

    #[test]
    fn port_overflow() {
        assert_eq!(BehaviorId::IncompleteResponse.spec().port(u16::MAX - 10), None);
        assert_eq!(BehaviorId::ListenForever.spec().port(u16::MAX - 1), Some(u16::MAX));
    }

    #[test]
    fn every_behavior_binds() {
        let engine = Engine::new(crate::HammsConfig::default(), crate::RetryStore::new());
        for spec in &BEHAVIORS {
            let binding = spec.id.binding(&engine).unwrap();
            match (spec.transport, binding) {
                (Transport::Raw, Binding::Raw(_)) | (Transport::Http, Binding::Http(_)) => {}
                (transport, binding) => panic!("{} is {transport:?} but bound as {binding:?}", spec.id),
            }
        }
    }
}
