//! The typed schema produced by parsing an interface description.

use std::collections::BTreeMap;

/// A type expression as it appears in a struct field, method signature, or type alias.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Bool,
    Int,
    Float,
    String,
    /// A reference to another member of the same interface, resolved lazily at
    /// first use rather than at parse time.
    Custom(String),
    Struct(VStruct),
    Array(Box<TypeExpr>),
}

impl TypeExpr {
    /// Resolve a `Custom` reference against the aliases declared on `interface`,
    /// following alias chains. Returns `None` if the name isn't declared.
    pub fn resolve<'a>(&'a self, interface: &'a Interface) -> Option<&'a TypeExpr> {
        match self {
            TypeExpr::Custom(name) => interface
                .aliases
                .get(name.as_str())
                .map(|a| &a.target)
                .and_then(|t| if let TypeExpr::Custom(_) = t {
                    t.resolve(interface)
                } else {
                    Some(t)
                }),
            other => Some(other),
        }
    }
}

/// An ordered field list: `(name: type, name: type, ...)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VStruct {
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub vtype: TypeExpr,
}

#[derive(Debug, Clone)]
pub struct Alias {
    pub name: String,
    pub doc: String,
    pub target: TypeExpr,
}

#[derive(Debug, Clone)]
pub struct VError {
    pub name: String,
    pub doc: String,
    pub parm: VStruct,
}

#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub doc: String,
    pub input: VStruct,
    pub output: VStruct,
}

pub(crate) enum Member {
    Method(Method),
    Alias(Alias),
    Error(VError),
}

/// A fully parsed interface: its name, its ordered members, and the original
/// doc comment that preceded the `interface` keyword.
#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    pub doc: String,
    pub methods: BTreeMap<String, Method>,
    pub method_keys: Vec<String>,
    pub aliases: BTreeMap<String, Alias>,
    pub alias_keys: Vec<String>,
    pub errors: BTreeMap<String, VError>,
    pub error_keys: Vec<String>,
}

impl Interface {
    pub(crate) fn from_members(
        name: String,
        doc: String,
        members: Vec<Member>,
    ) -> crate::Result<Interface> {
        let mut i = Interface {
            name: name.clone(),
            doc,
            methods: BTreeMap::new(),
            method_keys: Vec::new(),
            aliases: BTreeMap::new(),
            alias_keys: Vec::new(),
            errors: BTreeMap::new(),
            error_keys: Vec::new(),
        };

        for m in members {
            match m {
                Member::Method(m) => {
                    i.method_keys.push(m.name.clone());
                    if let Some(dup) = i.methods.insert(m.name.clone(), m) {
                        return Err(crate::Error::Duplicate {
                            interface: name,
                            message: format!("multiple definitions of method `{}`", dup.name),
                        });
                    }
                }
                Member::Alias(a) => {
                    i.alias_keys.push(a.name.clone());
                    if let Some(dup) = i.aliases.insert(a.name.clone(), a) {
                        return Err(crate::Error::Duplicate {
                            interface: name,
                            message: format!("multiple definitions of type `{}`", dup.name),
                        });
                    }
                }
                Member::Error(e) => {
                    i.error_keys.push(e.name.clone());
                    if let Some(dup) = i.errors.insert(e.name.clone(), e) {
                        return Err(crate::Error::Duplicate {
                            interface: name,
                            message: format!("multiple definitions of error `{}`", dup.name),
                        });
                    }
                }
            }
        }

        Ok(i)
    }

    /// Look up a declared method by name.
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }
}
