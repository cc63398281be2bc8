//! The interface description grammar, built with the `peg` crate.

use crate::model::{Alias, Field, Interface, Member, Method, TypeExpr, VError, VStruct};

fn trim_doc(s: &str) -> String {
    s.trim_matches(&[
        ' ', '\n', '\r', '\u{00A0}', '\u{FEFF}', '\u{1680}', '\u{180E}', '\u{2000}', '\u{2001}',
        '\u{2002}', '\u{2003}', '\u{2004}', '\u{2005}', '\u{2006}', '\u{2007}', '\u{2008}',
        '\u{2009}', '\u{200A}', '\u{202F}', '\u{205F}', '\u{3000}', '\u{2028}', '\u{2029}',
    ] as &[_])
    .to_string()
}

peg::parser! {
    grammar varlink() for str {
        /* Modeled after ECMA-262, 5th ed., 7.2 / 7.3. */
        rule whitespace()
            = quiet!{[' ' | '\t' | '\u{00A0}' | '\u{FEFF}' | '\u{1680}' | '\u{180E}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}']}
            / expected!("whitespace")

        rule eol_r()
            = "\r\n" / "\n" / "\r" / "\u{2028}" / "\u{2029}"

        rule comment()
            = quiet!{ "#" (!['\n' | '\r' | '\u{2028}' | '\u{2029}'][_])* eol_r() }
            / expected!("comment")

        rule wce()
            = quiet!{ whitespace() / comment() / eol_r() }
            / expected!("whitespace, comment or newline")

        rule field_name() -> &'input str
            = $(['a'..='z' | 'A'..='Z' | '0'..='9' | '_']+)

        rule member_name() -> &'input str
            = $(['A'..='Z'] ['a'..='z' | 'A'..='Z' | '0'..='9' | '_']*)

        rule interface_name() -> &'input str /* no hyphen at begin or end of a label */
            = quiet!{ $( ['a'..='z']+ (['-']*['a'..='z' | '0'..='9'])*
                ( "." ['a'..='z' | '0'..='9'] (['-']*['a'..='z' | '0'..='9'])* )+ ) }
            / expected!("reverse domain interface name")

        rule btype() -> TypeExpr
            = "bool" { TypeExpr::Bool }
            / "int" { TypeExpr::Int }
            / "float" { TypeExpr::Float }
            / "string" { TypeExpr::String }
            / n:member_name() { TypeExpr::Custom(n.to_string()) }
            / s:vstruct() { TypeExpr::Struct(s) }

        rule type_() -> TypeExpr
            = t:btype() wce()* "[]" { TypeExpr::Array(Box::new(t)) }
            / btype()

        rule field() -> Field
            = wce()* n:field_name() wce()* ":" wce()* t:type_() { Field { name: n.to_string(), vtype: t } }

        rule vstruct() -> VStruct
            = "(" wce()* f:field() ** ("," wce()*) wce()* ")" { VStruct { fields: f } }

        rule alias() -> Alias
            = d:$(wce()*) "type" wce()+ n:member_name() wce()* t:vstruct() {
                Alias { name: n.to_string(), doc: trim_doc(d), target: TypeExpr::Struct(t) }
            }

        rule error_decl() -> VError
            = d:$(wce()*) "error" wce()+ n:member_name() wce()* p:vstruct() {
                VError { name: n.to_string(), doc: trim_doc(d), parm: p }
            }

        rule method_decl() -> Method
            = d:$(wce()*) "method" wce()+ n:member_name() wce()* i:vstruct() wce()* "->" wce()* o:vstruct() {
                Method { name: n.to_string(), doc: trim_doc(d), input: i, output: o }
            }

        rule member() -> Member
            = m:method_decl() { Member::Method(m) }
            / a:alias() { Member::Alias(a) }
            / e:error_decl() { Member::Error(e) }

        pub rule interface() -> (String, String, Vec<Member>)
            = d:$(wce()*) "interface" wce()+ n:interface_name() wce()* mt:member()+ wce()* {
                (n.to_string(), trim_doc(d), mt)
            }
    }
}

pub(crate) fn parse(s: &str) -> crate::Result<Interface> {
    let (name, doc, members) = varlink::interface(s)?;
    Interface::from_members(name, doc, members)
}
