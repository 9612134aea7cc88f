//! NDJSON wire envelope between the acquisition service and its clients.
//!
//! Every message is a single JSON object terminated by a newline. Requests
//! flow into the service, responses and spectrum events flow out.

mod requests;
mod responses;

pub use requests::Request;
pub use responses::Response;

use thiserror::Error;

/// Codec error types
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("empty message line")]
    EmptyLine,
}

/// Encode a request into NDJSON format (JSON + newline)
pub fn encode_request(request: &Request) -> Result<String, CodecError> {
    let mut json = serde_json::to_string(request)?;
    json.push('\n');
    Ok(json)
}

/// Encode a response into NDJSON format
pub fn encode_response(response: &Response) -> Result<String, CodecError> {
    let mut json = serde_json::to_string(response)?;
    json.push('\n');
    Ok(json)
}

/// Decode a line of JSON into a Request
pub fn decode_request(line: &str) -> Result<Request, CodecError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(CodecError::EmptyLine);
    }
    Ok(serde_json::from_str(line)?)
}

/// Decode a line of JSON into a Response
pub fn decode_response(line: &str) -> Result<Response, CodecError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(CodecError::EmptyLine);
    }
    Ok(serde_json::from_str(line)?)
}
