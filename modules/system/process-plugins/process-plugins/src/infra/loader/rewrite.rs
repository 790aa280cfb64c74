//! Namespace rewriting of class unit references.
//!
//! Plugins may be compiled against an older spelling of the engine's base
//! library namespace. Every symbolic reference into that namespace is moved to
//! the namespace the host actually ships, matching whole package segments only:
//! with `org/camunda/bpm` as source, `org/camunda/bpmx/Foo` stays untouched.

use serde::Serialize;
use thiserror::Error;

use crate::infra::classfile::{ClassUnit, Constant, Instruction, MethodHandle};

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("invalid namespace '{0}'")]
    InvalidNamespace(String),

    #[error("malformed descriptor '{0}'")]
    Descriptor(String),

    #[error("malformed signature '{signature}' at offset {offset}")]
    Signature { signature: String, offset: usize },
}

/// Number of references changed per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RewriteStats {
    pub supertypes: usize,
    pub signatures: usize,
    pub fields: usize,
    pub methods: usize,
    pub instructions: usize,
    pub constants: usize,
    pub call_sites: usize,
}

impl RewriteStats {
    #[must_use]
    pub fn total(&self) -> usize {
        self.supertypes
            + self.signatures
            + self.fields
            + self.methods
            + self.instructions
            + self.constants
            + self.call_sites
    }
}

/// Maps references from one internal-name prefix to another.
#[derive(Debug, Clone)]
pub struct NamespaceRewriter {
    from: String,
    to: String,
    from_dotted: String,
    to_dotted: String,
}

impl NamespaceRewriter {
    /// Namespaces are internal-name prefixes such as `org/camunda/bpm`.
    ///
    /// # Errors
    ///
    /// Returns [`RewriteError::InvalidNamespace`] for empty or dotted namespaces.
    pub fn new(from: &str, to: &str) -> Result<Self, RewriteError> {
        let from = normalize(from)?;
        let to = normalize(to)?;
        Ok(Self {
            from_dotted: from.replace('/', "."),
            to_dotted: to.replace('/', "."),
            from,
            to,
        })
    }

    #[must_use]
    pub fn from_namespace(&self) -> &str {
        &self.from
    }

    #[must_use]
    pub fn to_namespace(&self) -> &str {
        &self.to
    }

    /// Maps an internal class name, or `None` if it is outside the source namespace.
    #[must_use]
    pub fn map_internal_name(&self, name: &str) -> Option<String> {
        map_prefix(name, &self.from, &self.to, '/')
    }

    /// Maps a field or method descriptor, or `None` if nothing changed.
    ///
    /// # Errors
    ///
    /// Returns [`RewriteError::Descriptor`] for an unterminated class reference.
    pub fn map_descriptor(&self, descriptor: &str) -> Result<Option<String>, RewriteError> {
        let mut out = String::with_capacity(descriptor.len());
        let mut changed = false;
        let mut rest = descriptor;
        while let Some(pos) = rest.find('L') {
            out.push_str(&rest[..=pos]);
            let tail = &rest[pos + 1..];
            let end = tail
                .find(';')
                .ok_or_else(|| RewriteError::Descriptor(descriptor.to_owned()))?;
            let name = &tail[..end];
            if let Some(mapped) = self.map_internal_name(name) {
                out.push_str(&mapped);
                changed = true;
            } else {
                out.push_str(name);
            }
            out.push(';');
            rest = &tail[end + 1..];
        }
        out.push_str(rest);
        Ok(changed.then_some(out))
    }

    /// Maps a string constant spelled either as an internal name or dotted.
    #[must_use]
    pub fn map_string(&self, value: &str) -> Option<String> {
        map_prefix(value, &self.from, &self.to, '/')
            .or_else(|| map_prefix(value, &self.from_dotted, &self.to_dotted, '.'))
    }

    /// Maps a type constant: internal name, array descriptor or method descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`RewriteError::Descriptor`] for malformed descriptors.
    pub fn map_type(&self, value: &str) -> Result<Option<String>, RewriteError> {
        if value.starts_with('(') || value.starts_with('[') {
            self.map_descriptor(value)
        } else {
            Ok(self.map_internal_name(value))
        }
    }

    /// Rewrites every reference in `unit` except its own name.
    ///
    /// Entry frames and digest are left stale; callers recompute them before linking.
    ///
    /// # Errors
    ///
    /// Returns [`RewriteError`] if a descriptor or signature cannot be parsed.
    pub fn rewrite(&self, unit: &mut ClassUnit) -> Result<RewriteStats, RewriteError> {
        let mut stats = RewriteStats::default();

        if let Some(super_name) = &mut unit.super_name
            && apply(super_name, |s| self.map_internal_name(s))
        {
            stats.supertypes += 1;
        }
        for interface in &mut unit.interfaces {
            if apply(interface, |s| self.map_internal_name(s)) {
                stats.supertypes += 1;
            }
        }
        if let Some(signature) = &mut unit.signature
            && try_apply(signature, |s| SignatureRewriter::new(self, s).class_signature())?
        {
            stats.signatures += 1;
        }

        for field in &mut unit.fields {
            if try_apply(&mut field.descriptor, |s| self.map_descriptor(s))? {
                stats.fields += 1;
            }
            if let Some(signature) = &mut field.signature
                && try_apply(signature, |s| SignatureRewriter::new(self, s).field_signature())?
            {
                stats.signatures += 1;
            }
            if let Some(constant) = &mut field.constant
                && self.rewrite_constant(constant)?
            {
                stats.constants += 1;
            }
        }

        for method in &mut unit.methods {
            if try_apply(&mut method.descriptor, |s| self.map_descriptor(s))? {
                stats.methods += 1;
            }
            if let Some(signature) = &mut method.signature
                && try_apply(signature, |s| SignatureRewriter::new(self, s).method_signature())?
            {
                stats.signatures += 1;
            }
            for exception in &mut method.exceptions {
                if apply(exception, |s| self.map_internal_name(s)) {
                    stats.methods += 1;
                }
            }
            for insn in &mut method.code {
                self.rewrite_instruction(insn, &mut stats)?;
            }
        }

        Ok(stats)
    }

    fn rewrite_instruction(
        &self,
        insn: &mut Instruction,
        stats: &mut RewriteStats,
    ) -> Result<(), RewriteError> {
        match insn {
            Instruction::Simple(_) => {}
            Instruction::Type { type_name, .. } => {
                if try_apply(type_name, |s| self.map_type(s))? {
                    stats.instructions += 1;
                }
            }
            Instruction::Field {
                owner, descriptor, ..
            }
            | Instruction::Method {
                owner, descriptor, ..
            } => {
                let owner_changed = try_apply(owner, |s| self.map_type(s))?;
                let descriptor_changed = try_apply(descriptor, |s| self.map_descriptor(s))?;
                if owner_changed || descriptor_changed {
                    stats.instructions += 1;
                }
            }
            Instruction::Ldc(constant) => {
                if self.rewrite_constant(constant)? {
                    stats.constants += 1;
                }
            }
            Instruction::InvokeDynamic {
                descriptor,
                bootstrap,
                arguments,
                ..
            } => {
                let mut changed = try_apply(descriptor, |s| self.map_descriptor(s))?;
                changed |= self.rewrite_handle(bootstrap)?;
                for argument in arguments {
                    changed |= self.rewrite_constant(argument)?;
                }
                if changed {
                    stats.call_sites += 1;
                }
            }
        }
        Ok(())
    }

    fn rewrite_constant(&self, constant: &mut Constant) -> Result<bool, RewriteError> {
        Ok(match constant {
            Constant::Int(_) | Constant::Long(_) => false,
            Constant::Str(value) => apply(value, |s| self.map_string(s)),
            Constant::Type(value) => try_apply(value, |s| self.map_type(s))?,
            Constant::Handle(handle) => self.rewrite_handle(handle)?,
        })
    }

    fn rewrite_handle(&self, handle: &mut MethodHandle) -> Result<bool, RewriteError> {
        let owner = apply(&mut handle.owner, |s| self.map_internal_name(s));
        let descriptor = try_apply(&mut handle.descriptor, |s| self.map_descriptor(s))?;
        Ok(owner || descriptor)
    }
}

fn normalize(namespace: &str) -> Result<String, RewriteError> {
    let trimmed = namespace.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed.contains('.') || trimmed.starts_with('/') {
        return Err(RewriteError::InvalidNamespace(namespace.to_owned()));
    }
    Ok(trimmed.to_owned())
}

fn map_prefix(value: &str, from: &str, to: &str, separator: char) -> Option<String> {
    let rest = value.strip_prefix(from)?;
    if rest.is_empty() || rest.starts_with(separator) {
        Some(format!("{to}{rest}"))
    } else {
        None
    }
}

fn apply(slot: &mut String, map: impl FnOnce(&str) -> Option<String>) -> bool {
    match map(slot) {
        Some(value) => {
            *slot = value;
            true
        }
        None => false,
    }
}

fn try_apply(
    slot: &mut String,
    map: impl FnOnce(&str) -> Result<Option<String>, RewriteError>,
) -> Result<bool, RewriteError> {
    match map(slot)? {
        Some(value) => {
            *slot = value;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Recursive-descent rewriter for generic signatures.
struct SignatureRewriter<'a> {
    rewriter: &'a NamespaceRewriter,
    input: &'a str,
    pos: usize,
    out: String,
    changed: bool,
}

impl<'a> SignatureRewriter<'a> {
    fn new(rewriter: &'a NamespaceRewriter, input: &'a str) -> Self {
        Self {
            rewriter,
            input,
            pos: 0,
            out: String::with_capacity(input.len()),
            changed: false,
        }
    }

    fn class_signature(mut self) -> Result<Option<String>, RewriteError> {
        if self.peek() == Some('<') {
            self.formal_type_parameters()?;
        }
        self.class_type()?;
        while !self.at_end() {
            self.class_type()?;
        }
        Ok(self.finish())
    }

    fn method_signature(mut self) -> Result<Option<String>, RewriteError> {
        if self.peek() == Some('<') {
            self.formal_type_parameters()?;
        }
        self.expect('(')?;
        while self.peek() != Some(')') {
            self.type_signature()?;
        }
        self.expect(')')?;
        if self.peek() == Some('V') {
            self.bump();
        } else {
            self.type_signature()?;
        }
        while self.peek() == Some('^') {
            self.bump();
            if self.peek() == Some('T') {
                self.type_variable()?;
            } else {
                self.class_type()?;
            }
        }
        self.expect_end()?;
        Ok(self.finish())
    }

    fn field_signature(mut self) -> Result<Option<String>, RewriteError> {
        self.reference_type()?;
        self.expect_end()?;
        Ok(self.finish())
    }

    fn finish(self) -> Option<String> {
        self.changed.then_some(self.out)
    }

    fn formal_type_parameters(&mut self) -> Result<(), RewriteError> {
        self.expect('<')?;
        while self.peek() != Some('>') {
            let name = self.identifier(&[':'])?;
            self.out.push_str(name);
            self.expect(':')?;
            if matches!(self.peek(), Some('L' | 'T' | '[')) {
                self.reference_type()?;
            }
            while self.peek() == Some(':') {
                self.bump();
                self.reference_type()?;
            }
        }
        self.expect('>')
    }

    fn type_signature(&mut self) -> Result<(), RewriteError> {
        match self.peek() {
            Some('B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z') => {
                self.bump();
                Ok(())
            }
            _ => self.reference_type(),
        }
    }

    fn reference_type(&mut self) -> Result<(), RewriteError> {
        match self.peek() {
            Some('L') => self.class_type(),
            Some('T') => self.type_variable(),
            Some('[') => {
                self.bump();
                self.type_signature()
            }
            _ => Err(self.error()),
        }
    }

    fn class_type(&mut self) -> Result<(), RewriteError> {
        self.expect('L')?;
        let name = self.identifier(&['<', '.', ';'])?;
        if let Some(mapped) = self.rewriter.map_internal_name(name) {
            self.out.push_str(&mapped);
            self.changed = true;
        } else {
            self.out.push_str(name);
        }
        if self.peek() == Some('<') {
            self.type_arguments()?;
        }
        while self.peek() == Some('.') {
            self.bump();
            let inner = self.identifier(&['<', '.', ';'])?;
            self.out.push_str(inner);
            if self.peek() == Some('<') {
                self.type_arguments()?;
            }
        }
        self.expect(';')
    }

    fn type_arguments(&mut self) -> Result<(), RewriteError> {
        self.expect('<')?;
        while self.peek() != Some('>') {
            match self.peek() {
                Some('*') => self.bump(),
                Some('+' | '-') => {
                    self.bump();
                    self.reference_type()?;
                }
                _ => self.reference_type()?,
            }
        }
        self.expect('>')
    }

    fn type_variable(&mut self) -> Result<(), RewriteError> {
        self.expect('T')?;
        let name = self.identifier(&[';'])?;
        self.out.push_str(name);
        self.expect(';')
    }

    fn identifier(&mut self, terminators: &[char]) -> Result<&'a str, RewriteError> {
        let input = self.input;
        let rest = &input[self.pos..];
        let len = rest
            .find(|c| terminators.contains(&c))
            .ok_or_else(|| self.error())?;
        if len == 0 {
            return Err(self.error());
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.out.push(c);
            self.pos += c.len_utf8();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), RewriteError> {
        if self.peek() == Some(expected) {
            self.bump();
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn expect_end(&self) -> Result<(), RewriteError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn error(&self) -> RewriteError {
        RewriteError::Signature {
            signature: self.input.to_owned(),
            offset: self.pos,
        }
    }
}
