//! Tag algebra over the capability traits.
//!
//! Everything here reads and writes through [`SemanticTag`] and friends, so
//! the same rules apply whichever backend a handle belongs to.

use std::collections::HashSet;

use semantic_model::{
    check_user_key, sis_intersect, validate_name, KbError, KbResult, TagSnapshot,
};

use super::{SemanticTag, StSet, TxSemanticTag};

/// Two tags are identical iff they share at least one subject identifier.
pub fn identical<A, B>(a: &A, b: &B) -> KbResult<bool>
where
    A: SemanticTag + ?Sized,
    B: SemanticTag + ?Sized,
{
    Ok(sis_intersect(&a.si()?, &b.si()?))
}

/// Structural equality of two tags, independent of their backends.
pub fn same<A, B>(a: &A, b: &B) -> KbResult<bool>
where
    A: SemanticTag + ?Sized,
    B: SemanticTag + ?Sized,
{
    Ok(a.snapshot()?.same(&b.snapshot()?))
}

/// Merge `source` into `target` in place.
///
/// Returns `false` and leaves `target` untouched when the tags are not
/// identical. Either side without SIs fails with `InvalidTag` before anything
/// is written.
pub fn merge_tags<T, S>(target: &T, source: &S) -> KbResult<bool>
where
    T: SemanticTag + ?Sized,
    S: SemanticTag + ?Sized,
{
    merge_snapshot_into(target, &source.snapshot()?)
}

pub(crate) fn merge_snapshot_into<T>(target: &T, source: &TagSnapshot) -> KbResult<bool>
where
    T: SemanticTag + ?Sized,
{
    let current = target.snapshot()?;
    let merged = current.merge(source)?;
    if !current.identical(source) {
        return Ok(false);
    }

    let new_sis: Vec<&String> = merged
        .sis
        .iter()
        .filter(|si| !current.sis.contains(si))
        .collect();
    for si in &new_sis {
        target.check_si_free(si)?;
    }
    let new_name = match (&current.name, &merged.name) {
        (None, Some(name)) => {
            validate_name(name)?;
            Some(name.as_str())
        }
        _ => None,
    };
    let new_properties: Vec<(&str, &str)> = merged
        .properties
        .iter()
        .filter(|(key, _)| !current.properties.contains_key(key))
        .collect();
    for (key, _) in &new_properties {
        check_user_key(key)?;
    }

    target.write_atomically(&mut || {
        for si in &new_sis {
            target.add_si(si)?;
        }
        if let Some(name) = new_name {
            target.set_name(Some(name))?;
        }
        for (key, value) in &new_properties {
            target.set_property(key, value)?;
        }
        Ok(())
    })?;

    tracing::debug!(target: "kb::algebra", sis = ?merged.sis, "merged tag");
    Ok(true)
}

/// Merge `tag` into `set`; see [`StSet::merge`].
pub(crate) fn merge_into_set<S>(set: &S, tag: &dyn SemanticTag) -> KbResult<S::Tag>
where
    S: StSet + ?Sized,
{
    let incoming = tag.snapshot()?;
    incoming.validate()?;

    let mut owners: Vec<S::Tag> = Vec::new();
    for si in &incoming.sis {
        if let Some(member) = set.get_semantic_tag(&[si.as_str()])? {
            let member_sis = member.si()?;
            let known = owners
                .iter()
                .map(|o| o.si())
                .collect::<KbResult<Vec<_>>>()?
                .iter()
                .any(|sis| sis_intersect(sis, &member_sis));
            if !known {
                owners.push(member);
            }
        }
    }

    match owners.len() {
        0 => set.create_from_snapshot(&incoming),
        1 => {
            let member = owners.remove(0);
            merge_snapshot_into(&member, &incoming)?;
            Ok(member)
        }
        n => {
            tracing::warn!(
                target: "kb::algebra",
                sis = ?incoming.sis,
                members = n,
                "merge rejected: identifiers span several tags"
            );
            Err(KbError::DuplicateIdentifier(format!(
                "subject identifiers {:?} belong to {} different tags",
                incoming.sis, n
            )))
        }
    }
}

/// Fail with `CycleDetected` if `new_super` is `node` or one of its
/// descendants.
pub(crate) fn ensure_no_cycle<T: TxSemanticTag>(node: &T, new_super: &T) -> KbResult<()> {
    let node_sis = node.si()?;
    let mut seen: HashSet<String> = HashSet::new();
    let mut cursor = Some(new_super.clone());

    while let Some(current) = cursor {
        let sis = current.si()?;
        if sis_intersect(&sis, &node_sis) {
            return Err(KbError::CycleDetected {
                node: first(&node_sis),
                new_super: first(&new_super.si()?),
            });
        }
        if !seen.insert(first(&sis)) {
            break;
        }
        cursor = current.super_tag()?;
    }
    Ok(())
}

fn first(sis: &[String]) -> String {
    sis.first().cloned().unwrap_or_default()
}
