//! Link-time verification metadata.
//!
//! Every method carries the verification types of its locals on entry. The
//! frame is derived from the owner and the method descriptor, so it goes stale
//! whenever a rewrite touches either and has to be recomputed before linking.

use super::error::VerifyError;
use super::model::{ClassUnit, MethodUnit, VerificationType};

/// Parses a method descriptor into the verification types of its parameters.
///
/// Returns `None` if the descriptor is malformed.
#[must_use]
pub fn parameter_types(descriptor: &str) -> Option<Vec<VerificationType>> {
    let rest = descriptor.strip_prefix('(')?;
    let (params, ret) = rest.split_once(')')?;

    let mut types = Vec::new();
    let mut cursor = params;
    while !cursor.is_empty() {
        let (vtype, tail) = field_type(cursor)?;
        types.push(vtype);
        cursor = tail;
    }

    if ret != "V" {
        let (_, tail) = field_type(ret)?;
        if !tail.is_empty() {
            return None;
        }
    }
    Some(types)
}

fn field_type(input: &str) -> Option<(VerificationType, &str)> {
    let first = input.chars().next()?;
    let rest = &input[first.len_utf8()..];
    match first {
        'B' | 'C' | 'I' | 'S' | 'Z' => Some((VerificationType::Integer, rest)),
        'F' => Some((VerificationType::Float, rest)),
        'J' => Some((VerificationType::Long, rest)),
        'D' => Some((VerificationType::Double, rest)),
        'L' => {
            let end = rest.find(';')?;
            if end == 0 {
                return None;
            }
            Some((VerificationType::Object(rest[..end].to_owned()), &rest[end + 1..]))
        }
        '[' => {
            let dims = input.chars().take_while(|c| *c == '[').count();
            let (_, tail) = field_type(&input[dims..])?;
            let consumed = input.len() - tail.len();
            Some((VerificationType::Object(input[..consumed].to_owned()), tail))
        }
        _ => None,
    }
}

/// Computes the entry frame of `method` declared in class `owner`.
///
/// # Errors
///
/// Returns [`VerifyError::BadDescriptor`] if the method descriptor is malformed.
pub fn expected_entry_frame(
    owner: &str,
    method: &MethodUnit,
) -> Result<Vec<VerificationType>, VerifyError> {
    let params = parameter_types(&method.descriptor).ok_or_else(|| VerifyError::BadDescriptor {
        member: format!("{owner}.{}", method.name),
        descriptor: method.descriptor.clone(),
    })?;

    let mut frame = Vec::with_capacity(params.len() + 1);
    if !method.is_static() {
        if method.name == "<init>" {
            frame.push(VerificationType::UninitializedThis);
        } else {
            frame.push(VerificationType::Object(owner.to_owned()));
        }
    }
    frame.extend(params);
    Ok(frame)
}

/// Recomputes every method's entry frame; methods with malformed descriptors keep
/// their shipped frame and are rejected by [`verify`].
pub fn recompute_frames(unit: &mut ClassUnit) {
    let owner = unit.name.clone();
    for method in &mut unit.methods {
        if let Ok(frame) = expected_entry_frame(&owner, method) {
            method.entry_frame = frame;
        }
    }
}

/// Checks the digest and every entry frame of a unit.
///
/// # Errors
///
/// Returns [`VerifyError`] describing the first inconsistency found.
pub fn verify(unit: &ClassUnit) -> Result<(), VerifyError> {
    let computed = unit.compute_digest()?;
    if computed != unit.digest {
        return Err(VerifyError::DigestMismatch {
            expected: unit.digest_hex(),
            computed: hex::encode(computed),
        });
    }

    for method in &unit.methods {
        let expected = expected_entry_frame(&unit.name, method)?;
        if expected != method.entry_frame {
            return Err(VerifyError::FrameMismatch {
                method: format!("{}.{}{}", unit.name, method.name, method.descriptor),
                expected: join(&expected),
                found: join(&method.entry_frame),
            });
        }
    }
    Ok(())
}

fn join(frame: &[VerificationType]) -> String {
    frame
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
