//! Public-surface signatures used to decide whether an incremental compile can be trusted.

use std::collections::BTreeMap;

/// JVM-style access flags carried by members.
pub mod modifiers {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const ABSTRACT: u16 = 0x0400;
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodSignature {
    pub name: String,
    pub parameter_types: Vec<String>,
    pub return_type: String,
    pub modifiers: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldSignature {
    pub name: String,
    pub type_name: String,
    pub modifiers: u16,
}

/// The public surface of one class. Members and interfaces are kept sorted so structural
/// equality ignores declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassSignature {
    pub name: String,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub methods: Vec<MethodSignature>,
    pub fields: Vec<FieldSignature>,
}

impl ClassSignature {
    pub fn new(
        name: impl Into<String>,
        superclass: Option<String>,
        mut interfaces: Vec<String>,
        mut methods: Vec<MethodSignature>,
        mut fields: Vec<FieldSignature>,
    ) -> Self {
        interfaces.sort();
        methods.sort();
        fields.sort();
        Self {
            name: name.into(),
            superclass,
            interfaces,
            methods,
            fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureDrift {
    Changed(String),
    Removed(String),
    Added(String),
}

impl SignatureDrift {
    pub fn class_name(&self) -> &str {
        match self {
            SignatureDrift::Changed(name)
            | SignatureDrift::Removed(name)
            | SignatureDrift::Added(name) => name,
        }
    }
}

/// Differences between two signature captures keyed by class name.
///
/// Classes that appear or disappear count as drift: a new type may be referenced by files that
/// were not recompiled, and a removed one may still be.
pub fn signature_drift(
    before: &BTreeMap<String, ClassSignature>,
    after: &BTreeMap<String, ClassSignature>,
) -> Vec<SignatureDrift> {
    let mut drift = Vec::new();
    for (name, old) in before {
        match after.get(name) {
            Some(new) if new == old => {}
            Some(_) => drift.push(SignatureDrift::Changed(name.clone())),
            None => drift.push(SignatureDrift::Removed(name.clone())),
        }
    }
    for name in after.keys() {
        if !before.contains_key(name) {
            drift.push(SignatureDrift::Added(name.clone()));
        }
    }
    drift
}
