//! Pretty-printing for the schema model, mirroring the textual form a
//! `GetInterfaceDescription` reply carries on the wire.

use crate::model::{Field, Interface, Method, TypeExpr, VError, VStruct};
use std::fmt;

/// Render a schema node back into interface-description syntax.
pub trait Format {
    fn get_oneline(&self) -> String;
    fn get_multiline(&self, indent: usize, max: usize) -> String;
}

impl Format for TypeExpr {
    fn get_oneline(&self) -> String {
        match self {
            TypeExpr::Bool => "bool".into(),
            TypeExpr::Int => "int".into(),
            TypeExpr::Float => "float".into(),
            TypeExpr::String => "string".into(),
            TypeExpr::Custom(n) => n.clone(),
            TypeExpr::Struct(s) => s.get_oneline(),
            TypeExpr::Array(t) => format!("{}[]", t.get_oneline()),
        }
    }

    fn get_multiline(&self, indent: usize, max: usize) -> String {
        match self {
            TypeExpr::Struct(s) => s.get_multiline(indent, max),
            TypeExpr::Array(t) => format!("{}[]", t.get_multiline(indent, max)),
            _ => self.get_oneline(),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.get_oneline())
    }
}

impl Format for Field {
    fn get_oneline(&self) -> String {
        format!("{}: {}", self.name, self.vtype.get_oneline())
    }

    fn get_multiline(&self, indent: usize, max: usize) -> String {
        format!("{}: {}", self.name, self.vtype.get_multiline(indent, max))
    }
}

impl Format for VStruct {
    fn get_oneline(&self) -> String {
        let mut f = String::from("(");
        let mut iter = self.fields.iter();
        if let Some(first) = iter.next() {
            f += &first.get_oneline();
            for field in iter {
                f += ", ";
                f += &field.get_oneline();
            }
        }
        f + ")"
    }

    fn get_multiline(&self, indent: usize, max: usize) -> String {
        let mut f = String::from("(\n");
        let mut iter = self.fields.iter();
        if let Some(first) = iter.next() {
            f += &render_field(first, indent, max);
            for field in iter {
                f += ",\n";
                f += &render_field(field, indent, max);
            }
        }
        f += &format!("\n{:indent$})", "", indent = indent);
        f
    }
}

fn render_field(field: &Field, indent: usize, max: usize) -> String {
    let line = field.get_oneline();
    if line.len() + indent + 2 < max {
        format!("{:indent$}{}", "", line, indent = indent + 2)
    } else {
        format!(
            "{:indent$}{}",
            "",
            field.get_multiline(indent + 2, max),
            indent = indent + 2
        )
    }
}

impl fmt::Display for VStruct {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.get_oneline())
    }
}

impl Format for Interface {
    fn get_oneline(&self) -> String {
        self.get_multiline(0, usize::MAX)
    }

    fn get_multiline(&self, indent: usize, max: usize) -> String {
        let mut f = String::new();

        if !self.doc.is_empty() {
            f += &indented(&self.doc, indent);
            f += "\n";
        }
        f += &format!("{:indent$}interface {}\n", "", self.name, indent = indent);

        for t in self.alias_keys.iter().map(|k| &self.aliases[k]) {
            f += "\n";
            if !t.doc.is_empty() {
                f += &indented(&t.doc, indent);
                f += "\n";
            }
            f += &format!(
                "{:indent$}type {} {}\n",
                "",
                t.name,
                t.target.get_oneline(),
                indent = indent
            );
        }

        for m in self.method_keys.iter().map(|k| &self.methods[k]) {
            f += "\n";
            f += &method_line(m, indent, max);
        }

        for e in self.error_keys.iter().map(|k| &self.errors[k]) {
            f += "\n";
            f += &error_line(e, indent, max);
        }

        f
    }
}

fn indented(doc: &str, indent: usize) -> String {
    doc.split('\n')
        .map(|s| format!("{:indent$}{}", "", s, indent = indent))
        .collect::<Vec<_>>()
        .join("\n")
}

fn method_line(m: &Method, indent: usize, max: usize) -> String {
    let mut f = String::new();
    if !m.doc.is_empty() {
        f += &indented(&m.doc, indent);
        f += "\n";
    }
    let header = format!("method {}", m.name);
    let input = m.input.get_oneline();
    let output = m.output.get_oneline();
    if header.len() + input.len() + output.len() + 4 + indent <= max {
        f += &format!(
            "{:indent$}method {}{} -> {}\n",
            "",
            m.name,
            input,
            output,
            indent = indent
        );
    } else {
        f += &format!(
            "{:indent$}method {}{} -> {}\n",
            "",
            m.name,
            m.input.get_multiline(indent, max),
            m.output.get_multiline(indent, max),
            indent = indent
        );
    }
    f
}

fn error_line(e: &VError, indent: usize, max: usize) -> String {
    let mut f = String::new();
    if !e.doc.is_empty() {
        f += &indented(&e.doc, indent);
        f += "\n";
    }
    let line = format!("error {} {}", e.name, e.parm.get_oneline());
    if line.len() + indent <= max {
        f += &format!("{:indent$}{}\n", "", line, indent = indent);
    } else {
        f += &format!(
            "{:indent$}error {} {}\n",
            "",
            e.name,
            e.parm.get_multiline(indent, max),
            indent = indent
        );
    }
    f
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.get_multiline(0, 80))
    }
}
