//! Browser bindings
//!
//! Listens for `submit` on the document, so forms added after load are
//! covered too. The body is read with `fetch` and a `ReadableStream` reader,
//! nodes are built in detached `<template>` elements, and patch instructions
//! are applied from their `data-*` attributes rather than by running the
//! script.

use crate::interceptor::{
    ATTR_STREAM, ATTR_STREAM_SWAP, ByteStream, DomSink, FORM_CONTENT_TYPE, FormSubmission,
    SinkError, StreamForm, StreamTransport, StreamingSubmitter, TransportError,
};
use crate::parser::ParsedNode;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use streamchat_domain::{FALLBACK_TAG, InsertionMode, PatchInstruction};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{
    Document, Element, Event, FormData, Headers, HtmlFormElement, HtmlTemplateElement, Request,
    RequestCredentials, RequestInit, Response, ReadableStreamDefaultReader, SubmitEvent,
};

const ANCHOR_TAG: &str = "stream-patcher";

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    let document = document().map_err(|e| JsValue::from_str(&e.to_string()))?;
    let listener = Closure::<dyn FnMut(Event)>::new(on_submit);
    document.add_event_listener_with_callback("submit", listener.as_ref().unchecked_ref())?;
    listener.forget();
    Ok(())
}

fn on_submit(event: Event) {
    let Some(form) = event
        .target()
        .and_then(|target| target.dyn_into::<HtmlFormElement>().ok())
    else {
        return;
    };
    if !form.has_attribute(ATTR_STREAM) {
        return;
    }
    event.prevent_default();

    let stream_form = match StreamForm::from_attributes(
        form.get_attribute(ATTR_STREAM).as_deref(),
        form.get_attribute(ATTR_STREAM_SWAP).as_deref(),
    ) {
        Ok(stream_form) => stream_form,
        Err(e) => {
            report(&format!("streamchat: form not submitted: {e}"));
            return;
        }
    };

    let submission = match form_fields(&form) {
        Ok(submission) => submission,
        Err(e) => {
            report(&format!("streamchat: could not read form: {e:?}"));
            return;
        }
    };
    let submitter = event
        .dyn_ref::<SubmitEvent>()
        .and_then(SubmitEvent::submitter);
    let submission = submission.with_submitter(
        submitter.as_ref().and_then(|s| s.get_attribute("name")).as_deref(),
        submitter.as_ref().and_then(|s| s.get_attribute("value")).as_deref(),
    );

    spawn_local(async move {
        let mut sink = match document() {
            Ok(document) => WebDomSink::new(document),
            Err(e) => {
                report(&format!("streamchat: {e}"));
                return;
            }
        };
        let submitter = StreamingSubmitter::new(FetchTransport);
        if let Err(e) = submitter.submit(&stream_form, &submission, &mut sink).await {
            report(&format!("streamchat: submission failed: {e}"));
        }
    });
}

fn form_fields(form: &HtmlFormElement) -> Result<FormSubmission, JsValue> {
    let data = FormData::new_with_form(form)?;
    let entries = js_sys::try_iter(&data)?
        .ok_or_else(|| JsValue::from_str("FormData is not iterable"))?;
    let mut fields = Vec::new();
    for entry in entries {
        let pair = js_sys::Array::from(&entry?);
        // file inputs have no string value
        if let (Some(name), Some(value)) = (pair.get(0).as_string(), pair.get(1).as_string()) {
            fields.push((name, value));
        }
    }
    Ok(FormSubmission::new(fields))
}

fn document() -> Result<Document, SinkError> {
    web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| SinkError::Dom("no document".to_string()))
}

fn report(message: &str) {
    web_sys::console::error_1(&JsValue::from_str(message));
}

fn dom_error(e: JsValue) -> SinkError {
    SinkError::Dom(format!("{e:?}"))
}

/// `fetch` with a streamed body
struct FetchTransport;

#[async_trait(?Send)]
impl StreamTransport for FetchTransport {
    async fn post(&self, action: &str, body: String) -> Result<ByteStream, TransportError> {
        let request_error = |e: JsValue| TransportError::Request(format!("{e:?}"));
        let window =
            web_sys::window().ok_or_else(|| TransportError::Request("no window".to_string()))?;

        let headers = Headers::new().map_err(request_error)?;
        headers
            .set("Content-Type", FORM_CONTENT_TYPE)
            .map_err(request_error)?;
        let init = RequestInit::new();
        init.set_method("POST");
        init.set_credentials(RequestCredentials::SameOrigin);
        init.set_headers(&headers);
        init.set_body(&JsValue::from_str(&body));
        let request = Request::new_with_str_and_init(action, &init).map_err(request_error)?;

        let response: Response = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(request_error)?
            .dyn_into()
            .map_err(request_error)?;
        if !response.ok() {
            return Err(TransportError::Status(response.status()));
        }
        let reader: ReadableStreamDefaultReader = response
            .body()
            .ok_or(TransportError::EmptyBody)?
            .get_reader()
            .dyn_into()
            .map_err(|_| TransportError::Read("unexpected body reader".to_string()))?;

        Ok(stream::unfold(Some(reader), |state| async move {
            let reader = state?;
            match JsFuture::from(reader.read()).await {
                Ok(result) => {
                    let done = js_sys::Reflect::get(&result, &JsValue::from_str("done"))
                        .ok()
                        .and_then(|done| done.as_bool())
                        .unwrap_or(true);
                    if done {
                        return None;
                    }
                    let value = js_sys::Reflect::get(&result, &JsValue::from_str("value"))
                        .unwrap_or(JsValue::UNDEFINED);
                    let bytes = js_sys::Uint8Array::new(&value).to_vec();
                    Some((Ok(Bytes::from(bytes)), Some(reader)))
                }
                Err(e) => Some((Err(TransportError::Read(format!("{e:?}"))), None)),
            }
        })
        .boxed_local())
    }
}

/// The live document
struct WebDomSink {
    document: Document,
    anchor: Option<Element>,
}

impl WebDomSink {
    fn new(document: Document) -> Self {
        Self {
            document,
            anchor: None,
        }
    }

    fn element(&self, id: String) -> Result<Element, SinkError> {
        self.document
            .get_element_by_id(&id)
            .ok_or(SinkError::MissingElement(id))
    }
}

impl DomSink for WebDomSink {
    fn attach(&mut self, selector: &str) -> Result<(), SinkError> {
        let target = self
            .document
            .query_selector(selector)
            .map_err(dom_error)?
            .ok_or_else(|| SinkError::TargetNotFound(selector.to_string()))?;
        let anchor = self
            .document
            .create_element(ANCHOR_TAG)
            .map_err(dom_error)?;
        target.append_child(&anchor).map_err(dom_error)?;
        self.anchor = Some(anchor);
        Ok(())
    }

    fn graft(&mut self, node: &ParsedNode) -> Result<(), SinkError> {
        let anchor = self
            .anchor
            .as_ref()
            .ok_or_else(|| SinkError::MissingElement(ANCHOR_TAG.to_string()))?;
        let parent = anchor
            .parent_node()
            .ok_or_else(|| SinkError::MissingElement(ANCHOR_TAG.to_string()))?;

        // a detached template parses without running or fetching anything
        let holder: HtmlTemplateElement = self
            .document
            .create_element("template")
            .map_err(dom_error)?
            .dyn_into()
            .map_err(|_| SinkError::Dom("template element expected".to_string()))?;
        holder.set_inner_html(&node.markup);
        let built = self
            .document
            .import_node_with_deep(&holder.content(), true)
            .map_err(dom_error)?;
        parent.insert_before(&built, Some(&**anchor)).map_err(dom_error)?;
        Ok(())
    }

    fn execute(&mut self, instruction: &PatchInstruction) -> Result<(), SinkError> {
        let boundary = self.element(instruction.boundary.to_string())?;
        let template: HtmlTemplateElement = self
            .element(instruction.source.to_string())?
            .dyn_into()
            .map_err(|_| SinkError::Dom(format!("{} is not a template", instruction.source)))?;
        let fallback = boundary
            .query_selector(&format!(":scope>{FALLBACK_TAG}"))
            .map_err(dom_error)?;
        let content = template.content();

        match instruction.mode {
            InsertionMode::Append => {
                boundary
                    .insert_before(&content, fallback.as_deref())
                    .map_err(dom_error)?;
            }
            InsertionMode::Replace => {
                match &fallback {
                    Some(fallback) => boundary.replace_child(&content, fallback),
                    None => boundary.append_child(&content),
                }
                .map_err(dom_error)?;
                let parent = boundary
                    .parent_node()
                    .ok_or_else(|| SinkError::MissingElement(instruction.boundary.to_string()))?;
                while let Some(child) = boundary.first_child() {
                    parent
                        .insert_before(&child, Some(&*boundary))
                        .map_err(dom_error)?;
                }
                boundary.remove();
            }
        }
        template.remove();
        Ok(())
    }

    fn detach(&mut self) {
        if let Some(anchor) = self.anchor.take() {
            anchor.remove();
        }
    }
}
