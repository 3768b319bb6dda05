use crate::probe::ResolvedRequest;
use regex::{Captures, Regex};
use serde_json::Value;

/// The only header whose value is eligible for placeholder substitution.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Replaces every `{{ dependency.path.to.field }}` in `template` with the value
/// found at that path in `result`, parsed as JSON.
///
/// Substitution is best-effort: an unparseable `result` returns the template
/// unchanged, and a placeholder whose path is missing keeps its literal text.
pub fn resolve(template: &str, dependency: &str, result: &str) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }
    let Some(document) = parse_document(dependency, result) else {
        return template.to_string();
    };
    match placeholder_pattern(dependency) {
        Some(pattern) => substitute(template, &pattern, &document),
        None => template.to_string(),
    }
}

/// Applies one dependency's result to the body, the `Authorization` header and
/// every query value of `request`. Other headers pass through verbatim.
pub fn substitute_request(request: &mut ResolvedRequest, dependency: &str, payload: &str) {
    let Some(document) = parse_document(dependency, payload) else {
        return;
    };
    let Some(pattern) = placeholder_pattern(dependency) else {
        return;
    };

    if !request.body.is_empty() {
        request.body = substitute(&request.body, &pattern, &document);
    }
    if let Some(value) = request.headers.get_mut(AUTHORIZATION_HEADER) {
        *value = substitute(value, &pattern, &document);
    }
    for value in request.query.values_mut() {
        *value = substitute(value, &pattern, &document);
    }
}

fn parse_document(dependency: &str, payload: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(payload) {
        Ok(document) => Some(document),
        Err(err) => {
            tracing::debug!(
                dependency = %dependency,
                error = %err,
                "dependency result is not a JSON document; placeholders left as-is"
            );
            None
        }
    }
}

fn placeholder_pattern(dependency: &str) -> Option<Regex> {
    let pattern = format!(
        r"\{{\{{\s*{}\.([A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)*)\s*\}}\}}",
        regex::escape(dependency)
    );
    Regex::new(&pattern).ok()
}

fn substitute(template: &str, pattern: &Regex, document: &Value) -> String {
    pattern
        .replace_all(template, |caps: &Captures<'_>| match lookup(document, &caps[1]) {
            Some(value) => render(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

// maps only; arrays are not indexable
fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.as_object()?.get(segment))
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HttpMethod, ProbeIdentity};
    use std::collections::BTreeMap;
    use std::time::Duration;
    use url::Url;

    const LOGIN: &str = r#"{"data":{"token":"abc123","ttl":300,"admin":false},"session":"s-1","roles":["a"]}"#;

    #[test]
    fn substitutes_nested_fields() {
        let out = resolve(
            r#"{"token":"{{ login.data.token }}","ttl":{{login.data.ttl}}}"#,
            "login",
            LOGIN,
        );
        assert_eq!(out, r#"{"token":"abc123","ttl":300}"#);
    }

    #[test]
    fn renders_scalars_and_structures() {
        assert_eq!(resolve("{{ login.data.admin }}", "login", LOGIN), "false");
        assert_eq!(resolve("{{ login.session }}", "login", LOGIN), "s-1");
        assert_eq!(resolve("{{ login.roles }}", "login", LOGIN), r#"["a"]"#);
        assert_eq!(resolve("{{ x.v }}", "x", r#"{"v":null}"#), "null");
        assert_eq!(resolve("{{ x.v }}", "x", r#"{"v":1.5}"#), "1.5");
    }

    #[test]
    fn end_to_end_body_scenario() {
        assert_eq!(resolve("{{ A.x }}", "A", r#"{"x":1}"#), "1");
    }

    #[test]
    fn missing_path_keeps_placeholder_and_substitutes_others() {
        let out = resolve(
            "{{ login.data.missing }} / {{ login.session }} / {{ login.session.deeper }}",
            "login",
            LOGIN,
        );
        assert_eq!(out, "{{ login.data.missing }} / s-1 / {{ login.session.deeper }}");
    }

    #[test]
    fn arrays_are_not_indexable() {
        let out = resolve("{{ login.roles.0 }}", "login", LOGIN);
        assert_eq!(out, "{{ login.roles.0 }}");
    }

    #[test]
    fn unparseable_result_returns_template_unchanged() {
        let template = "Bearer {{ login.token }}";
        assert_eq!(resolve(template, "login", "not json"), template);
    }

    #[test]
    fn template_without_placeholders_for_key_is_unchanged() {
        let template = r#"{"a":"{{ other.field }}","b":"{{login}}","c":"{{ login. }}"}"#;
        assert_eq!(resolve(template, "login", LOGIN), template);
        assert_eq!(resolve("plain text", "login", LOGIN), "plain text");
    }

    #[test]
    fn dependency_key_is_matched_literally() {
        let payload = r#"{"v":"ok"}"#;
        assert_eq!(resolve("{{ get-token.v }}", "get-token", payload), "ok");
        assert_eq!(resolve("{{ aXb.v }}", "a.b", payload), "{{ aXb.v }}");
    }

    #[test]
    fn repeated_placeholder_is_replaced_everywhere() {
        let out = resolve("{{ A.x }}-{{A.x}}", "A", r#"{"x":"y"}"#);
        assert_eq!(out, "y-y");
    }

    #[test]
    fn sequential_passes_compose() {
        let first = resolve("{{ a.v }}:{{ b.v }}", "a", r#"{"v":"1"}"#);
        let second = resolve(&first, "b", r#"{"v":"2"}"#);
        assert_eq!(second, "1:2");
    }

    fn request() -> ResolvedRequest {
        let mut headers = BTreeMap::new();
        headers.insert(
            "Authorization".to_string(),
            "Bearer {{ login.data.token }}".to_string(),
        );
        headers.insert("X-Trace".to_string(), "{{ login.session }}".to_string());
        let mut query = BTreeMap::new();
        query.insert("session".to_string(), "{{ login.session }}".to_string());
        query.insert("static".to_string(), "value".to_string());
        ResolvedRequest {
            identity: ProbeIdentity::new("t", "charge"),
            address: Url::parse("http://example.com").expect("url"),
            method: HttpMethod::Post,
            body: r#"{"ttl":{{ login.data.ttl }}}"#.to_string(),
            headers,
            query,
            credentials: None,
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn substitute_request_touches_body_authorization_and_query_only() {
        let mut request = request();
        substitute_request(&mut request, "login", LOGIN);

        assert_eq!(request.body, r#"{"ttl":300}"#);
        assert_eq!(request.headers["Authorization"], "Bearer abc123");
        assert_eq!(request.headers["X-Trace"], "{{ login.session }}");
        assert_eq!(request.query["session"], "s-1");
        assert_eq!(request.query["static"], "value");
    }

    #[test]
    fn substitute_request_with_bad_payload_changes_nothing() {
        let mut request = request();
        substitute_request(&mut request, "login", "<html>");
        assert_eq!(request.body, r#"{"ttl":{{ login.data.ttl }}}"#);
        assert_eq!(request.headers["Authorization"], "Bearer {{ login.data.token }}");
        assert_eq!(request.query["session"], "{{ login.session }}");
    }
}
