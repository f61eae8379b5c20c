//! Turns a raw chat completions reply into a [`SearchResult`]

use super::models::{Citation, SearchMetadata, SearchResult};
use crate::error::SearchError;
use serde_json::{Map, Value};

/// Parse a decoded reply.
///
/// Fails when there is no choice, when the first choice has no content, or
/// when a field has the wrong JSON type. The error names the field.
pub fn parse_reply(reply: &Value, model: &str, query_time_ms: u64) -> Result<SearchResult, SearchError> {
    let root = reply
        .as_object()
        .ok_or_else(|| SearchError::parse("<root>", "expected a JSON object"))?;

    let choices = array_field(root, "choices", "choices")?;
    let first = match choices.first() {
        Some(choice) => choice,
        None => return Err(SearchError::parse("choices", "No choices in API response")),
    };

    let first = first
        .as_object()
        .ok_or_else(|| SearchError::parse("choices[0]", "expected an object"))?;
    let answer = match first.get("message") {
        None | Some(Value::Null) => String::new(),
        Some(Value::Object(message)) => string_field(message, "content", "choices[0].message.content")?,
        Some(_) => return Err(SearchError::parse("choices[0].message", "expected an object")),
    };

    if answer.is_empty() {
        return Err(SearchError::parse(
            "choices[0].message.content",
            "No content in API response",
        ));
    }

    let citations = extract_citations(root)?;
    let answer = link_citations(&answer, &citations);

    let search_focus = root.get("search_mode").and_then(|mode| match mode {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    });

    Ok(SearchResult {
        answer,
        citations,
        metadata: SearchMetadata {
            model_used: model.to_string(),
            query_time_ms,
            search_focus,
        },
    })
}

/// Citations from `search_results`, or from the flat `citations` URL list
/// when the structured list yields nothing.
pub fn extract_citations(root: &Map<String, Value>) -> Result<Vec<Citation>, SearchError> {
    let mut citations = Vec::new();

    for (i, entry) in array_field(root, "search_results", "search_results")?
        .iter()
        .enumerate()
    {
        let path = format!("search_results[{}]", i);
        let entry = entry
            .as_object()
            .ok_or_else(|| SearchError::parse(path.clone(), "expected an object"))?;

        citations.push(Citation {
            index: i as u32 + 1,
            url: string_field(entry, "url", &format!("{}.url", path))?,
            title: string_field(entry, "title", &format!("{}.title", path))?,
            snippet: string_field(entry, "snippet", &format!("{}.snippet", path))?,
        });
    }

    if citations.is_empty() {
        for (i, url) in array_field(root, "citations", "citations")?
            .iter()
            .enumerate()
        {
            let url = url
                .as_str()
                .ok_or_else(|| SearchError::parse(format!("citations[{}]", i), "expected a string"))?;
            citations.push(Citation::new(i as u32 + 1, url));
        }
    }

    Ok(citations)
}

/// Replace every literal `[n]` with `([display](url))` for each citation.
///
/// Plain substring replacement: repeated markers are all rewritten, markers
/// without a matching citation stay as they are.
pub fn link_citations(answer: &str, citations: &[Citation]) -> String {
    let mut answer = answer.to_string();
    for citation in citations {
        if citation.url.is_empty() || citation.index == 0 {
            continue;
        }
        let link = format!("([{}]({}))", citation.display_text(), citation.url);
        answer = answer.replace(&citation.marker(), &link);
    }
    answer
}

fn array_field<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a [Value], SearchError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(SearchError::parse(path, "expected an array")),
    }
}

fn string_field(obj: &Map<String, Value>, key: &str, path: &str) -> Result<String, SearchError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(SearchError::parse(path, "expected a string")),
    }
}
