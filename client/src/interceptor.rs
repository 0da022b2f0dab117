//! Streaming form submission
//!
//! A form opts in with two attributes:
//!
//! ```html
//! <form data-stream="/chat/completion" data-stream-swap="beforeend:.messages">
//! ```
//!
//! On submit, the form's fields are posted to the `data-stream` action and
//! the response body is patched into the element matched by the selector,
//! node by node, as it arrives.

use crate::parser::{FragmentParser, ParsedNode};
use crate::patcher::{PatchAction, Patcher};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::LocalBoxStream;
use std::fmt;
use std::str::FromStr;
use streamchat_domain::PatchInstruction;
use thiserror::Error;
use tracing::{debug, warn};

pub const ATTR_STREAM: &str = "data-stream";
pub const ATTR_STREAM_SWAP: &str = "data-stream-swap";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A form's streaming attributes are unusable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolConfigurationError {
    #[error("missing {0} attribute")]
    MissingAttribute(&'static str),

    #[error("{ATTR_STREAM} action is empty")]
    EmptyAction,

    #[error("swap directive {0:?} is not <mode>:<selector>")]
    MalformedSwap(String),

    #[error("unsupported swap mode {0:?}, only beforeend is supported")]
    UnsupportedMode(String),

    #[error("swap directive has an empty selector")]
    EmptySelector,
}

/// The request or its body failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("response has no body")]
    EmptyBody,

    #[error("body read failed: {0}")]
    Read(String),
}

/// The document could not be patched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("no element matches {0:?}")]
    TargetNotFound(String),

    #[error("element {0} not found")]
    MissingElement(String),

    #[error("DOM error: {0}")]
    Dom(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error(transparent)]
    Configuration(#[from] ProtocolConfigurationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Where streamed nodes go: `beforeend:<selector>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapDirective {
    selector: String,
}

impl SwapDirective {
    pub const MODE: &'static str = "beforeend";

    pub fn parse(value: &str) -> Result<Self, ProtocolConfigurationError> {
        let (mode, selector) = value
            .split_once(':')
            .ok_or_else(|| ProtocolConfigurationError::MalformedSwap(value.to_string()))?;
        if mode.trim() != Self::MODE {
            return Err(ProtocolConfigurationError::UnsupportedMode(
                mode.trim().to_string(),
            ));
        }
        let selector = selector.trim();
        if selector.is_empty() {
            return Err(ProtocolConfigurationError::EmptySelector);
        }
        Ok(Self {
            selector: selector.to_string(),
        })
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }
}

impl FromStr for SwapDirective {
    type Err = ProtocolConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SwapDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", Self::MODE, self.selector)
    }
}

/// A form's validated streaming declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamForm {
    action: String,
    swap: SwapDirective,
}

impl StreamForm {
    /// Validate the values of the `data-stream` and `data-stream-swap` attributes
    pub fn from_attributes(
        action: Option<&str>,
        swap: Option<&str>,
    ) -> Result<Self, ProtocolConfigurationError> {
        let action = action.ok_or(ProtocolConfigurationError::MissingAttribute(ATTR_STREAM))?;
        if action.trim().is_empty() {
            return Err(ProtocolConfigurationError::EmptyAction);
        }
        let swap = swap.ok_or(ProtocolConfigurationError::MissingAttribute(ATTR_STREAM_SWAP))?;
        Ok(Self {
            action: action.trim().to_string(),
            swap: SwapDirective::parse(swap)?,
        })
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn swap(&self) -> &SwapDirective {
        &self.swap
    }
}

/// Form fields in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSubmission {
    fields: Vec<(String, String)>,
}

impl FormSubmission {
    pub fn new(fields: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
        }
    }

    /// Add the control that triggered the submit, if it has a name
    pub fn with_submitter(mut self, name: Option<&str>, value: Option<&str>) -> Self {
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            self.fields
                .push((name.to_string(), value.unwrap_or_default().to_string()));
        }
        self
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// `application/x-www-form-urlencoded` body
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.fields.iter())
            .finish()
    }
}

pub type ByteStream = LocalBoxStream<'static, Result<Bytes, TransportError>>;

/// Issues the POST and exposes the body as it arrives
#[async_trait(?Send)]
pub trait StreamTransport {
    async fn post(&self, action: &str, body: String) -> Result<ByteStream, TransportError>;
}

/// The live document, as seen by one submission
pub trait DomSink {
    /// Place the patcher anchor at the end of the element matching `selector`
    fn attach(&mut self, selector: &str) -> Result<(), SinkError>;

    /// Build `node` outside the document and insert it before the anchor
    fn graft(&mut self, node: &ParsedNode) -> Result<(), SinkError>;

    /// Apply a patch instruction to the document
    fn execute(&mut self, instruction: &PatchInstruction) -> Result<(), SinkError>;

    /// Remove the anchor
    fn detach(&mut self);
}

/// What a submission did to the document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReport {
    pub grafted: usize,
    pub executed: usize,
    /// The body ended with a transport error
    pub aborted: bool,
}

/// Drives transport, parser, patcher and document for each submission
pub struct StreamingSubmitter<T> {
    transport: T,
}

impl<T: StreamTransport> StreamingSubmitter<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Validate a form's raw attributes, then submit it.
    ///
    /// Configuration errors are returned before anything is sent.
    pub async fn submit_declared<S: DomSink>(
        &self,
        action: Option<&str>,
        swap: Option<&str>,
        submission: &FormSubmission,
        sink: &mut S,
    ) -> Result<SubmitReport, SubmitError> {
        let form = StreamForm::from_attributes(action, swap)?;
        self.submit(&form, submission, sink).await
    }

    /// Post `submission` and patch the response into `sink`.
    ///
    /// A body that fails mid-stream is a clean stop: grafted nodes stay,
    /// deferred instructions run, and the partial tail is discarded.
    pub async fn submit<S: DomSink>(
        &self,
        form: &StreamForm,
        submission: &FormSubmission,
        sink: &mut S,
    ) -> Result<SubmitReport, SubmitError> {
        sink.attach(form.swap().selector())?;

        let mut body = match self.transport.post(form.action(), submission.encode()).await {
            Ok(body) => body,
            Err(e) => {
                sink.detach();
                return Err(e.into());
            }
        };

        let mut parser = FragmentParser::new();
        let mut patcher = Patcher::new();
        let mut report = SubmitReport::default();

        loop {
            match body.next().await {
                Some(Ok(chunk)) => {
                    for node in parser.feed(&chunk) {
                        route(&mut patcher, node);
                    }
                    apply(&mut patcher, sink, &mut report);
                }
                Some(Err(e)) => {
                    let discarded = parser.abort();
                    debug!(discarded, "Stream stopped early: {}", e);
                    report.aborted = true;
                    break;
                }
                None => {
                    for node in parser.finish() {
                        route(&mut patcher, node);
                    }
                    break;
                }
            }
        }

        patcher.finish();
        apply(&mut patcher, sink, &mut report);
        debug!(
            grafted = report.grafted,
            executed = report.executed,
            aborted = report.aborted,
            "Submission complete"
        );
        Ok(report)
    }
}

/// Separators release deferred instructions instead of being grafted
fn route(patcher: &mut Patcher<ParsedNode>, node: ParsedNode) {
    if node.is_instruction() {
        patcher.push(node, true);
    } else if node.is_separator() && patcher.deferred() > 0 {
        patcher.release();
    } else {
        patcher.push(node, false);
    }
}

fn apply<S: DomSink>(patcher: &mut Patcher<ParsedNode>, sink: &mut S, report: &mut SubmitReport) {
    while let Some(action) = patcher.next_action() {
        match action {
            PatchAction::Graft(node) => match sink.graft(&node) {
                Ok(()) => report.grafted += 1,
                Err(e) => warn!("Failed to graft node: {}", e),
            },
            PatchAction::Execute(node) => {
                let Some(instruction) = node.instruction() else {
                    continue;
                };
                match sink.execute(instruction) {
                    Ok(()) => report.executed += 1,
                    Err(e) => warn!(boundary = %instruction.boundary, "Failed to apply patch: {}", e),
                }
            }
            PatchAction::Detach => sink.detach(),
        }
    }
}
