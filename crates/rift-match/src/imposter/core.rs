//! Core Imposter struct and stub resolution.
//!
//! An imposter holds its stubs in definition order. Resolving a request walks
//! them in that order, stops at the first stub whose predicates all hold, and
//! takes that stub's next response. The per-stub response cursor is the only
//! state a resolution touches.

use super::cycler::ResponseCursor;
use super::types::{
    ImposterConfig, ImposterError, MatchReport, ResponseMode, StubConfig, StubResponse, PROTOCOLS,
};
use crate::predicate::{parse_predicates, Encoding, Operator, Predicate};
use crate::request::Request;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// A compiled stub: predicates (implicitly AND-ed) plus a cycling list of responses.
#[derive(Debug)]
pub struct Stub {
    pub id: Option<String>,
    pub scenario_name: Option<String>,
    predicates: Vec<Predicate>,
    responses: Vec<StubResponse>,
    cursor: ResponseCursor,
}

impl Stub {
    /// Build a stub from compiled predicates. An empty response list gets a
    /// single default `is` response.
    pub fn new(predicates: Vec<Predicate>, mut responses: Vec<StubResponse>) -> Self {
        if responses.is_empty() {
            responses.push(StubResponse::default());
        }
        Self {
            id: None,
            scenario_name: None,
            predicates,
            responses,
            cursor: ResponseCursor::new(),
        }
    }

    /// Compile a stub definition. `index` is the stub's position, used in error locations.
    pub fn from_config(
        config: &StubConfig,
        index: usize,
        mode: ResponseMode,
    ) -> Result<Self, ImposterError> {
        let location = format!("stubs[{index}].predicates");
        let predicates = parse_predicates(&config.predicates, &location)?;

        if mode == ResponseMode::Binary {
            if let Some(i) = predicates
                .iter()
                .position(|p| p.uses_operator(Operator::Matches))
            {
                return Err(ImposterError::MatchesInBinaryMode(format!("{location}[{i}]")));
            }
        }

        let mut stub = Self::new(predicates, config.responses.clone());
        stub.id = config.id.clone();
        stub.scenario_name = config.scenario_name.clone();
        Ok(stub)
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn responses(&self) -> &[StubResponse] {
        &self.responses
    }

    /// Whether every predicate holds. A stub without predicates matches everything.
    pub fn matches(&self, request: &Request, encoding: Encoding) -> bool {
        self.predicates
            .iter()
            .all(|predicate| predicate.evaluate_encoded(request, encoding))
    }

    /// Take the current response and advance the cursor.
    pub fn next_response(&self) -> (usize, &StubResponse) {
        let index = self.cursor.next_for(&self.responses);
        (index, &self.responses[index])
    }

    /// The response the next resolution would return, without advancing.
    pub fn peek_response(&self) -> (usize, &StubResponse) {
        let index = self.cursor.peek(self.responses.len() as u32) as usize;
        (index, &self.responses[index])
    }

    /// Rewind the cursor to the first response.
    pub fn reset(&self) {
        self.cursor.reset();
    }
}

/// Outcome of resolving a request against an imposter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a> {
    Matched {
        stub_index: usize,
        stub_id: Option<&'a str>,
        scenario_name: Option<&'a str>,
        response_index: usize,
        response: &'a StubResponse,
    },
    /// No stub matched; the caller picks the default behavior
    NoMatch,
}

impl Resolution<'_> {
    pub fn is_match(&self) -> bool {
        matches!(self, Resolution::Matched { .. })
    }

    pub fn response(&self) -> Option<&StubResponse> {
        match self {
            Resolution::Matched { response, .. } => Some(*response),
            Resolution::NoMatch => None,
        }
    }

    pub fn report(&self, request_number: Option<u64>) -> MatchReport {
        match *self {
            Resolution::Matched {
                stub_index,
                stub_id,
                scenario_name,
                response_index,
                response,
            } => MatchReport {
                matched: true,
                request_number,
                stub_index: Some(stub_index),
                stub_id: stub_id.map(str::to_string),
                scenario_name: scenario_name.map(str::to_string),
                response_index: Some(response_index),
                response_type: Some(response.response_type().to_string()),
                response: Some(response.clone()),
            },
            Resolution::NoMatch => MatchReport {
                matched: false,
                request_number,
                stub_index: None,
                stub_id: None,
                scenario_name: None,
                response_index: None,
                response_type: None,
                response: None,
            },
        }
    }
}

/// Runtime state of an imposter
#[derive(Debug)]
pub struct Imposter {
    pub name: Option<String>,
    pub port: Option<u16>,
    pub protocol: String,
    encoding: Encoding,
    stubs: Vec<Stub>,
    /// Request count
    request_count: AtomicU64,
}

impl Imposter {
    /// A text-mode HTTP imposter over already compiled stubs.
    pub fn new(stubs: Vec<Stub>) -> Self {
        Self {
            name: None,
            port: None,
            protocol: "http".to_string(),
            encoding: Encoding::Utf8,
            stubs,
            request_count: AtomicU64::new(0),
        }
    }

    /// Build an imposter, parsing and validating every stub's predicates.
    pub fn from_config(config: &ImposterConfig) -> Result<Self, ImposterError> {
        if !PROTOCOLS.contains(&config.protocol.as_str()) {
            return Err(ImposterError::InvalidProtocol(config.protocol.clone()));
        }

        let stubs = config
            .stubs
            .iter()
            .enumerate()
            .map(|(index, stub)| Stub::from_config(stub, index, config.mode))
            .collect::<Result<Vec<_>, _>>()?;

        let encoding = match config.mode {
            ResponseMode::Text => Encoding::Utf8,
            ResponseMode::Binary => Encoding::Base64,
        };

        info!(
            "Built {} imposter{} with {} stubs",
            config.protocol,
            config
                .name
                .as_deref()
                .map(|n| format!(" '{n}'"))
                .unwrap_or_default(),
            stubs.len()
        );

        Ok(Self {
            name: config.name.clone(),
            port: config.port,
            protocol: config.protocol.clone(),
            encoding,
            stubs,
            request_count: AtomicU64::new(0),
        })
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn stubs(&self) -> &[Stub] {
        &self.stubs
    }

    /// First stub whose predicates all match, with its index. Later stubs are
    /// not evaluated.
    pub fn find_matching_stub(&self, request: &Request) -> Option<(usize, &Stub)> {
        self.stubs
            .iter()
            .enumerate()
            .find(|(_, stub)| stub.matches(request, self.encoding))
    }

    /// Resolve a request: pick the first matching stub and take its next response.
    pub fn resolve(&self, request: &Request) -> Resolution<'_> {
        self.increment_request_count();
        self.select(request, Stub::next_response)
    }

    /// Like [`resolve`](Self::resolve) but leaves every cursor and the request
    /// count untouched.
    pub fn preview(&self, request: &Request) -> Resolution<'_> {
        self.select(request, Stub::peek_response)
    }

    /// Resolve and describe the outcome, numbering the request.
    pub fn resolve_report(&self, request: &Request) -> MatchReport {
        let number = self.increment_request_count() + 1;
        self.select(request, Stub::next_response).report(Some(number))
    }

    fn select<'a>(
        &'a self,
        request: &Request,
        pick: impl FnOnce(&'a Stub) -> (usize, &'a StubResponse),
    ) -> Resolution<'a> {
        match self.find_matching_stub(request) {
            Some((stub_index, stub)) => {
                let (response_index, response) = pick(stub);
                debug!(
                    "Request matched stub {} (response {} of {})",
                    stub_index,
                    response_index,
                    stub.responses.len()
                );
                Resolution::Matched {
                    stub_index,
                    stub_id: stub.id.as_deref(),
                    scenario_name: stub.scenario_name.as_deref(),
                    response_index,
                    response,
                }
            }
            None => {
                debug!("No stub matched among {} stubs", self.stubs.len());
                Resolution::NoMatch
            }
        }
    }

    /// Increment request count, returning the previous value
    pub fn increment_request_count(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get request count
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Rewind every stub's response cursor.
    pub fn reset_cursors(&self) {
        self.stubs.iter().for_each(Stub::reset);
    }
}
