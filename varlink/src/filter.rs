//! Projects arbitrary JSON input against a declared schema type.
//!
//! Fields are filled positionally (from a JSON array), by keyword (from a
//! JSON object), or structurally (any other object-shaped value); a field
//! that can't be found by any of those means is silently omitted rather than
//! treated as an error. Required-field enforcement, if a caller wants it, is
//! a separate concern layered on top of the filtered result.

use serde_json::Value;
use varlink_parser::{Interface, TypeExpr, VStruct};

/// Project `value` against `vstruct`, returning a JSON object containing only
/// the declared fields that could be resolved from `value`.
pub fn filter_params(value: &Value, vstruct: &VStruct, interface: &Interface) -> Value {
    let mut out = serde_json::Map::new();

    match value {
        Value::Array(positional) => {
            let mut it = positional.iter();
            for field in &vstruct.fields {
                match it.next() {
                    Some(v) => {
                        out.insert(field.name.clone(), filter_type(v, &field.vtype, interface));
                    }
                    None => continue, // exhausted positional args: silently omit
                }
            }
        }
        Value::Object(map) => {
            for field in &vstruct.fields {
                if let Some(v) = map.get(&field.name) {
                    out.insert(field.name.clone(), filter_type(v, &field.vtype, interface));
                }
                // absent key: silently omitted rather than treated as an error
            }
        }
        _ => {}
    }

    Value::Object(out)
}

fn filter_type(value: &Value, ty: &TypeExpr, interface: &Interface) -> Value {
    match ty {
        TypeExpr::Struct(s) => filter_params(value, s, interface),
        TypeExpr::Array(elem) => match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| filter_type(v, elem, interface))
                    .collect(),
            ),
            other => other.clone(),
        },
        TypeExpr::Custom(_) => match ty.resolve(interface) {
            Some(resolved) => filter_type(value, resolved, interface),
            None => value.clone(),
        },
        // primitives pass through unchanged; the JSON encoder is the final
        // authority on representation
        TypeExpr::Bool | TypeExpr::Int | TypeExpr::Float | TypeExpr::String => value.clone(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use varlink_parser::Varlink;

    fn iface(src: &str) -> Interface {
        Varlink::from_string(src).unwrap().interface
    }

    #[test]
    fn test_keyword_projection_drops_unknown_and_missing() {
        let v = iface("interface a.b\nmethod F(x: int, y: string) -> ()\n");
        let m = v.method("F").unwrap();
        let input = serde_json::json!({"x": 1, "bogus": true});
        let filtered = filter_params(&input, &m.input, &v);
        assert_eq!(filtered, serde_json::json!({"x": 1}));
    }

    #[test]
    fn test_positional_projection() {
        let v = iface("interface a.b\nmethod F(x: int, y: string) -> ()\n");
        let m = v.method("F").unwrap();
        let input = serde_json::json!([1, "hi"]);
        let filtered = filter_params(&input, &m.input, &v);
        assert_eq!(filtered, serde_json::json!({"x": 1, "y": "hi"}));
    }

    #[test]
    fn test_positional_exhausted_silently_omits() {
        let v = iface("interface a.b\nmethod F(x: int, y: string) -> ()\n");
        let m = v.method("F").unwrap();
        let input = serde_json::json!([1]);
        let filtered = filter_params(&input, &m.input, &v);
        assert_eq!(filtered, serde_json::json!({"x": 1}));
    }

    #[test]
    fn test_array_of_struct_recursion() {
        let v = iface(
            "interface a.b
type Item (name: string, extra: bool)
method F(items: Item[]) -> ()
",
        );
        let m = v.method("F").unwrap();
        let input = serde_json::json!({"items": [{"name": "a", "extra": true, "bogus": 1}]});
        let filtered = filter_params(&input, &m.input, &v);
        assert_eq!(
            filtered,
            serde_json::json!({"items": [{"name": "a", "extra": true}]})
        );
    }
}
