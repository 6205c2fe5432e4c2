//! XML-RPC protocol support: method-call parsing, response assembly, and
//! the value codec mapping XML-RPC scalars onto `serde_json::Value`.
//!
//! XML-RPC carries exactly one call per body, has no call ids, and no
//! notion of a notification. A value the codec cannot represent (`null`
//! outside `<nil/>` decoding, out-of-range integers) downgrades that
//! outcome to an internal error instead of aborting the response.

use crate::error::{EncodeError, ParseError};
use crate::fault::{Fault, FaultKind};
use crate::invocation::{Invocation, Outcome, Params, RequestBatch, RpcVersion};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};
use tracing::error;

/// Content type for XML-RPC responses.
pub const CONTENT_TYPE: &str = "text/xml";

/// Parse an XML-RPC method-call body into a single canonical invocation.
pub fn parse_request(body: &[u8]) -> Result<RequestBatch, ParseError> {
    let (method, values) = parse_method_call(body)?;
    let params = if values.is_empty() {
        Params::None
    } else {
        Params::ByPosition(values)
    };
    Ok(RequestBatch::single(Invocation {
        method,
        params,
        call_id: None,
        notification: false,
        version: RpcVersion::default(),
    }))
}

/// Assemble the single outcome of an XML-RPC call into a response body.
pub fn assemble(outcomes: &[Outcome]) -> Vec<u8> {
    let outcome = match outcomes {
        [outcome] => outcome,
        _ => {
            error!(
                "XML-RPC dispatch produced {} outcomes for one call",
                outcomes.len()
            );
            return fault_body(&Fault::standard(FaultKind::InternalError));
        }
    };
    match &outcome.result {
        Err(fault) => fault_body(fault),
        Ok(value) => match encode_value(value) {
            Ok(encoded) => format!(
                "<?xml version=\"1.0\"?>\n<methodResponse><params><param>{}</param></params></methodResponse>",
                encoded
            )
            .into_bytes(),
            Err(err) => {
                error!("return value not representable in XML-RPC: {}", err);
                fault_body(&Fault::standard(FaultKind::InternalError))
            }
        },
    }
}

/// A fault response carrying the standard `{faultCode, faultString}` struct.
pub fn fault_body(fault: &Fault) -> Vec<u8> {
    format!(
        "<?xml version=\"1.0\"?>\n<methodResponse><fault><value><struct>\
         <member><name>faultCode</name><value><int>{}</int></value></member>\
         <member><name>faultString</name><value><string>{}</string></value></member>\
         </struct></value></fault></methodResponse>",
        fault.code,
        escape(&fault.message)
    )
    .into_bytes()
}

/// Encode a value as an XML-RPC `<value>` element.
fn encode_value(value: &Value) -> Result<String, EncodeError> {
    match value {
        Value::Null => Err(EncodeError("null has no XML-RPC representation".into())),
        Value::Bool(b) => Ok(format!(
            "<value><boolean>{}</boolean></value>",
            if *b { 1 } else { 0 }
        )),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(format!("<value><int>{}</int></value>", i))
            } else if n.is_u64() {
                Err(EncodeError(format!("integer {} out of range", n)))
            } else if let Some(f) = n.as_f64() {
                Ok(format!("<value><double>{}</double></value>", f))
            } else {
                Err(EncodeError(format!("number {} out of range", n)))
            }
        }
        Value::String(s) => Ok(format!("<value><string>{}</string></value>", escape(s))),
        Value::Array(items) => {
            let inner = items
                .iter()
                .map(encode_value)
                .collect::<Result<String, _>>()?;
            Ok(format!("<value><array><data>{}</data></array></value>", inner))
        }
        Value::Object(members) => {
            let inner = members
                .iter()
                .map(|(name, member)| {
                    Ok(format!(
                        "<member><name>{}</name>{}</member>",
                        escape(name),
                        encode_value(member)?
                    ))
                })
                .collect::<Result<String, EncodeError>>()?;
            Ok(format!("<value><struct>{}</struct></value>", inner))
        }
    }
}

fn parse_method_call(body: &[u8]) -> Result<(String, Vec<Value>), ParseError> {
    let mut events = EventReader::new(body);
    events.expect_start(b"methodCall")?;
    events.expect_start(b"methodName")?;
    let method = events.element_text(b"methodName")?;

    let mut params = Vec::new();
    match events.next()? {
        Event::End(e) if e.name().as_ref() == b"methodCall" => return Ok((method, params)),
        Event::Empty(e) if e.name().as_ref() == b"params" => {}
        Event::Start(e) if e.name().as_ref() == b"params" => loop {
            match events.next()? {
                Event::Start(e) if e.name().as_ref() == b"param" => {
                    events.expect_start(b"value")?;
                    params.push(events.parse_value()?);
                    events.expect_end(b"param")?;
                }
                Event::End(e) if e.name().as_ref() == b"params" => break,
                other => return Err(unexpected("param", &other)),
            }
        },
        other => return Err(unexpected("params", &other)),
    }
    events.expect_end(b"methodCall")?;
    Ok((method, params))
}

fn unexpected(wanted: &str, got: &Event<'_>) -> ParseError {
    ParseError(format!("expected <{}>, got {:?}", wanted, got))
}

/// Event cursor that skips prolog, comments, and inter-element whitespace.
struct EventReader<'a> {
    reader: Reader<&'a [u8]>,
}

impl<'a> EventReader<'a> {
    fn new(body: &'a [u8]) -> Self {
        EventReader {
            reader: Reader::from_reader(body),
        }
    }

    fn next(&mut self) -> Result<Event<'a>, ParseError> {
        loop {
            let event = self.reader.read_event()?;
            match event {
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => continue,
                Event::Text(ref text) => {
                    let content = text.unescape().map_err(|e| ParseError(e.to_string()))?;
                    if content.trim().is_empty() {
                        continue;
                    }
                    return Ok(event);
                }
                other => return Ok(other),
            }
        }
    }

    fn expect_start(&mut self, tag: &[u8]) -> Result<(), ParseError> {
        match self.next()? {
            Event::Start(e) if e.name().as_ref() == tag => Ok(()),
            other => Err(unexpected(&String::from_utf8_lossy(tag), &other)),
        }
    }

    fn expect_end(&mut self, tag: &[u8]) -> Result<(), ParseError> {
        match self.next()? {
            Event::End(e) if e.name().as_ref() == tag => Ok(()),
            other => Err(unexpected(&format!("/{}", String::from_utf8_lossy(tag)), &other)),
        }
    }

    /// Text content of an element whose start tag was just consumed;
    /// consumes through the matching end tag.
    fn element_text(&mut self, tag: &[u8]) -> Result<String, ParseError> {
        match self.next()? {
            Event::Text(text) => {
                let content = text
                    .unescape()
                    .map_err(|e| ParseError(e.to_string()))?
                    .into_owned();
                self.expect_end(tag)?;
                Ok(content)
            }
            Event::End(e) if e.name().as_ref() == tag => Ok(String::new()),
            other => Err(unexpected("text content", &other)),
        }
    }

    /// Parse a `<value>` whose start tag was just consumed; consumes
    /// through `</value>`.
    fn parse_value(&mut self) -> Result<Value, ParseError> {
        match self.next()? {
            // Untyped content inside <value> is a string.
            Event::Text(text) => {
                let content = text
                    .unescape()
                    .map_err(|e| ParseError(e.to_string()))?
                    .into_owned();
                self.expect_end(b"value")?;
                Ok(Value::String(content))
            }
            Event::End(e) if e.name().as_ref() == b"value" => Ok(Value::String(String::new())),
            Event::Empty(e) => {
                let value = match e.name().as_ref() {
                    b"nil" => Value::Null,
                    b"string" => Value::String(String::new()),
                    other => {
                        return Err(ParseError(format!(
                            "unsupported XML-RPC value type '{}'",
                            String::from_utf8_lossy(other)
                        )))
                    }
                };
                self.expect_end(b"value")?;
                Ok(value)
            }
            Event::Start(e) => {
                let tag = e.name().as_ref().to_vec();
                let value = self.parse_typed(&tag)?;
                self.expect_end(b"value")?;
                Ok(value)
            }
            other => Err(unexpected("value content", &other)),
        }
    }

    fn parse_typed(&mut self, tag: &[u8]) -> Result<Value, ParseError> {
        match tag {
            b"int" | b"i4" | b"i8" => {
                let text = self.element_text(tag)?;
                let number: i64 = text
                    .trim()
                    .parse()
                    .map_err(|_| ParseError(format!("invalid integer '{}'", text)))?;
                Ok(Value::from(number))
            }
            b"boolean" => {
                let text = self.element_text(tag)?;
                match text.trim() {
                    "1" => Ok(Value::Bool(true)),
                    "0" => Ok(Value::Bool(false)),
                    other => Err(ParseError(format!("invalid boolean '{}'", other))),
                }
            }
            b"double" => {
                let text = self.element_text(tag)?;
                let number: f64 = text
                    .trim()
                    .parse()
                    .map_err(|_| ParseError(format!("invalid double '{}'", text)))?;
                Ok(Value::from(number))
            }
            b"string" => Ok(Value::String(self.element_text(tag)?)),
            // Kept as its literal text; the engine has no date type.
            b"dateTime.iso8601" => Ok(Value::String(self.element_text(tag)?)),
            b"nil" => {
                self.expect_end(tag)?;
                Ok(Value::Null)
            }
            b"array" => self.parse_array(),
            b"struct" => self.parse_struct(),
            other => Err(ParseError(format!(
                "unsupported XML-RPC value type '{}'",
                String::from_utf8_lossy(other)
            ))),
        }
    }

    fn parse_array(&mut self) -> Result<Value, ParseError> {
        match self.next()? {
            Event::Empty(e) if e.name().as_ref() == b"data" => {
                self.expect_end(b"array")?;
                return Ok(Value::Array(Vec::new()));
            }
            Event::Start(e) if e.name().as_ref() == b"data" => {}
            other => return Err(unexpected("data", &other)),
        }
        let mut items = Vec::new();
        loop {
            match self.next()? {
                Event::Start(e) if e.name().as_ref() == b"value" => {
                    items.push(self.parse_value()?)
                }
                Event::End(e) if e.name().as_ref() == b"data" => break,
                other => return Err(unexpected("value", &other)),
            }
        }
        self.expect_end(b"array")?;
        Ok(Value::Array(items))
    }

    fn parse_struct(&mut self) -> Result<Value, ParseError> {
        let mut members = Map::new();
        loop {
            match self.next()? {
                Event::Start(e) if e.name().as_ref() == b"member" => {
                    self.expect_start(b"name")?;
                    let name = self.element_text(b"name")?;
                    self.expect_start(b"value")?;
                    let value = self.parse_value()?;
                    self.expect_end(b"member")?;
                    members.insert(name, value);
                }
                Event::End(e) if e.name().as_ref() == b"struct" => break,
                other => return Err(unexpected("member", &other)),
            }
        }
        Ok(Value::Object(members))
    }
}
